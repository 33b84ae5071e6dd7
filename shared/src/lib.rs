use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod date;

pub use date::{format_due_date, parse_due_date};

/// Shortest title, in characters, that may be persisted.
pub const MIN_TITLE_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(with = "date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub is_important: bool,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Builds the record the server persists for `owner`. The id and both
    /// timestamps are assigned here and never taken from the client.
    pub fn from_new(new: NewTask, owner: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            date: new.date,
            is_completed: new.is_completed,
            is_important: new.is_important,
            user_id: owner.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required fields")]
    MissingFields,
    #[error("Title must be at least 3 characters long")]
    TitleTooShort,
    #[error("Description cannot be empty")]
    EmptyDescription,
    #[error("Date must be a valid YYYY-MM-DD date")]
    InvalidDate,
}

/// Body of `POST /api/tasks`.
///
/// The three required fields are optional on the wire so that leaving one
/// out is reported as [`ValidationError::MissingFields`] instead of a decode
/// failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, alias = "isCompleted")]
    pub completed: bool,
    #[serde(default, alias = "isImportant")]
    pub important: bool,
}

/// A create request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub is_completed: bool,
    pub is_important: bool,
}

impl CreateTaskRequest {
    pub fn validate(&self) -> Result<NewTask, ValidationError> {
        let (Some(title), Some(description), Some(date)) = (
            present(&self.title),
            present(&self.description),
            present(&self.date),
        ) else {
            return Err(ValidationError::MissingFields);
        };

        check_title(title)?;
        let date = parse_due_date(date).ok_or(ValidationError::InvalidDate)?;

        Ok(NewTask {
            title: title.to_string(),
            description: description.to_string(),
            date,
            is_completed: self.completed,
            is_important: self.important,
        })
    }
}

/// Body of `PUT /api/tasks`. Every field except `id` is a partial update;
/// absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, alias = "completed", skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
    #[serde(default, alias = "important", skip_serializing_if = "Option::is_none")]
    pub is_important: Option<bool>,
}

impl UpdateTaskRequest {
    pub fn completion(id: Uuid, is_completed: bool) -> Self {
        Self {
            id: Some(id),
            is_completed: Some(is_completed),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<TaskPatch, ValidationError> {
        let title = match self.title.as_deref() {
            Some(title) => Some(check_title(title)?.to_string()),
            None => None,
        };
        let description = match self.description.as_deref() {
            Some(description) if description.trim().is_empty() => {
                return Err(ValidationError::EmptyDescription)
            }
            Some(description) => Some(description.trim().to_string()),
            None => None,
        };
        let date = match self.date.as_deref() {
            Some(raw) => Some(parse_due_date(raw).ok_or(ValidationError::InvalidDate)?),
            None => None,
        };

        Ok(TaskPatch {
            title,
            description,
            date,
            is_completed: self.is_completed,
            is_important: self.is_important,
        })
    }
}

/// A validated partial update, applied the same way on the server (before
/// persisting) and on the client (as an optimistic write).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub is_completed: Option<bool>,
    pub is_important: Option<bool>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.date.is_none()
            && self.is_completed.is_none()
            && self.is_important.is_none()
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(date) = self.date {
            task.date = date;
        }
        if let Some(is_completed) = self.is_completed {
            task.is_completed = is_completed;
        }
        if let Some(is_important) = self.is_important {
            task.is_important = is_important;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteTaskResponse {
    pub message: String,
    pub task: Task,
}

fn present(field: &Option<String>) -> Option<&str> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn check_title(title: &str) -> Result<&str, ValidationError> {
    let title = title.trim();
    if title.chars().count() < MIN_TITLE_LEN {
        return Err(ValidationError::TitleTooShort);
    }
    Ok(title)
}
