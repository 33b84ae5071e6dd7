//! Client-side cache of the signed-in user's tasks.
//!
//! `TaskState` is owned by the application model and is the only place the
//! task list is mutated. Each network operation is split in two halves:
//! a `begin_*` call that updates local state and returns whatever the
//! request needs, and a `finish_*` call that folds the server's answer back
//! in. Nothing here performs I/O.

use std::collections::{HashMap, VecDeque};

use shared::{CreateTaskRequest, DeleteTaskResponse, Task, TaskPatch, UpdateTaskRequest, ValidationError};
use uuid::Uuid;

use crate::error::ClientError;

/// Notifications kept on screen at once; older ones are dropped.
pub const MAX_NOTICES: usize = 5;

const MSG_FETCH_FAILED: &str = "Failed to fetch tasks. Please try again later.";
const MSG_CREATED: &str = "Task created successfully!";
const MSG_CREATE_FAILED: &str = "Something went wrong!";
const MSG_UPDATED: &str = "Task updated successfully";
const MSG_UPDATE_FAILED: &str = "Failed to update task. Please try again.";
const MSG_EDITED: &str = "Task edited successfully";
const MSG_EDIT_FAILED: &str = "Failed to edit task. Please try again.";
const MSG_DELETED: &str = "Task deleted successfully";
const MSG_DELETE_FAILED: &str = "Failed to delete task. Please try again.";
const MSG_UNAUTHORIZED: &str = "Unauthorized. Please sign in again.";
const MSG_NOT_FOUND: &str = "Task not found or already deleted.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    All,
    Important,
    Completed,
    Incomplete,
}

impl Filter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Filter::All => true,
            Filter::Important => task.is_important,
            Filter::Completed => task.is_completed,
            Filter::Incomplete => !task.is_completed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

impl NoticeKind {
    /// How long a notice of this kind stays up before it is dismissed.
    pub fn lifetime_ms(self) -> u32 {
        match self {
            NoticeKind::Success => 2_000,
            NoticeKind::Error => 4_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
    pub message: String,
}

/// Identifies one issued refresh. Only the answer to the most recent ticket
/// is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Toggle,
    Edit,
}

/// How a list response was folded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied,
    /// A newer refresh was issued after this one; the answer was dropped.
    Superseded,
    /// The server no longer accepts the session. State has been reset.
    SessionLost,
}

/// One optimistic write of a row. `generation` orders writes of the same id;
/// `before`/`after` are the row around the write, absent if the row was not
/// loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    generation: u64,
    before: Option<Task>,
    after: Option<Task>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskState {
    tasks: Vec<Task>,
    is_loading: bool,
    ready: bool,
    notices: VecDeque<Notice>,
    next_notice: u64,
    unscheduled: Vec<Notice>,
    issued_refreshes: u64,
    in_flight: HashMap<Uuid, usize>,
    next_write: u64,
    latest_write: HashMap<Uuid, u64>,
}

impl TaskState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn task(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn view(&self, filter: Filter) -> Vec<&Task> {
        self.tasks.iter().filter(|t| filter.matches(t)).collect()
    }

    pub fn completed_tasks(&self) -> Vec<&Task> {
        self.view(Filter::Completed)
    }

    pub fn incomplete_tasks(&self) -> Vec<&Task> {
        self.view(Filter::Incomplete)
    }

    pub fn important_tasks(&self) -> Vec<&Task> {
        self.view(Filter::Important)
    }

    /// True while a mutation of `id` awaits the server.
    pub fn is_pending(&self, id: Uuid) -> bool {
        self.in_flight.contains_key(&id)
    }

    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn dismiss(&mut self, notice_id: u64) {
        self.notices.retain(|n| n.id != notice_id);
    }

    /// Notices raised since the last call. The caller owns their expiry and
    /// hands each id back to `dismiss` after `NoticeKind::lifetime_ms`.
    pub fn take_new_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.unscheduled)
    }

    fn notify(&mut self, kind: NoticeKind, message: impl Into<String>) {
        self.next_notice += 1;
        let notice = Notice {
            id: self.next_notice,
            kind,
            message: message.into(),
        };
        self.unscheduled.push(notice.clone());
        self.notices.push_back(notice);
        while self.notices.len() > MAX_NOTICES {
            self.notices.pop_front();
        }
    }

    fn mark_in_flight(&mut self, id: Uuid) {
        *self.in_flight.entry(id).or_default() += 1;
    }

    fn clear_in_flight(&mut self, id: Uuid) {
        if let Some(count) = self.in_flight.get_mut(&id) {
            *count -= 1;
            if *count == 0 {
                self.in_flight.remove(&id);
            }
        }
    }

    /// Records that a signed-in session exists. The first observation kicks
    /// off the initial fetch; nothing is fetched before it.
    pub fn observe_session(&mut self) -> Option<RefreshTicket> {
        if self.ready {
            return None;
        }
        self.ready = true;
        self.begin_refresh()
    }

    /// Forgets everything tied to the current session. Refreshes issued
    /// before this point are superseded, so their answers are dropped.
    /// Notices stay up.
    pub fn sign_out(&mut self) {
        self.tasks.clear();
        self.ready = false;
        self.is_loading = false;
        self.in_flight.clear();
        self.latest_write.clear();
        self.issued_refreshes += 1;
    }

    /// Returns `None` until a session has been observed.
    pub fn begin_refresh(&mut self) -> Option<RefreshTicket> {
        if !self.ready {
            return None;
        }
        self.is_loading = true;
        self.issued_refreshes += 1;
        Some(RefreshTicket(self.issued_refreshes))
    }

    /// Applies a list response. Answers to superseded tickets are dropped so
    /// a slow, older response cannot overwrite a newer one. On failure the
    /// previous list stays in place, except that a 401 signs the user out.
    pub fn finish_refresh(
        &mut self,
        ticket: RefreshTicket,
        result: Result<Vec<Task>, ClientError>,
    ) -> RefreshOutcome {
        if ticket.0 != self.issued_refreshes {
            return RefreshOutcome::Superseded;
        }
        self.is_loading = false;
        match result {
            Ok(tasks) => self.tasks = tasks,
            Err(err) if err.status() == Some(401) => {
                self.sign_out();
                self.notify(NoticeKind::Error, MSG_UNAUTHORIZED);
                return RefreshOutcome::SessionLost;
            }
            Err(_) => {
                self.notify(NoticeKind::Error, MSG_FETCH_FAILED);
            }
        }
        RefreshOutcome::Applied
    }

    /// Validates a create form. A rejected form is reported as a notice and
    /// must not be sent.
    pub fn begin_create(&mut self, request: &CreateTaskRequest) -> Result<(), ValidationError> {
        request.validate().map(|_| ()).map_err(|err| {
            self.notify(NoticeKind::Error, err.to_string());
            err
        })
    }

    /// Creation is not applied optimistically; success triggers a full resync.
    pub fn finish_create(&mut self, result: Result<Task, ClientError>) -> Option<RefreshTicket> {
        match result {
            Ok(_) => {
                self.notify(NoticeKind::Success, MSG_CREATED);
                self.begin_refresh()
            }
            Err(err) => {
                let message = err.user_message().unwrap_or_else(|| MSG_CREATE_FAILED.to_string());
                self.notify(NoticeKind::Error, message);
                None
            }
        }
    }

    fn begin_update(&mut self, id: Uuid, patch: &TaskPatch) -> PendingWrite {
        self.mark_in_flight(id);
        self.next_write += 1;
        self.latest_write.insert(id, self.next_write);

        let mut write = PendingWrite {
            generation: self.next_write,
            before: None,
            after: None,
        };
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
            write.before = Some(task.clone());
            patch.apply_to(task);
            write.after = Some(task.clone());
        }
        write
    }

    /// Writes the new completion flag locally before the server confirms it.
    pub fn begin_toggle(&mut self, id: Uuid, is_completed: bool) -> (UpdateTaskRequest, PendingWrite) {
        let request = UpdateTaskRequest::completion(id, is_completed);
        let patch = TaskPatch {
            is_completed: Some(is_completed),
            ..TaskPatch::default()
        };
        (request, self.begin_update(id, &patch))
    }

    /// Validates and optimistically merges an edit. The returned request
    /// always carries `id`.
    pub fn begin_edit(
        &mut self,
        id: Uuid,
        mut request: UpdateTaskRequest,
    ) -> Result<(UpdateTaskRequest, PendingWrite), ValidationError> {
        let patch = request.validate().map_err(|err| {
            self.notify(NoticeKind::Error, err.to_string());
            err
        })?;
        request.id = Some(id);
        let write = self.begin_update(id, &patch);
        Ok((request, write))
    }

    /// Settles an update. Only the most recent write of a row may touch it:
    /// on success the server's record replaces whatever the row holds now,
    /// and on failure the pre-write row comes back if the row still shows
    /// this write.
    pub fn finish_update(
        &mut self,
        kind: UpdateKind,
        id: Uuid,
        write: PendingWrite,
        result: Result<Task, ClientError>,
    ) {
        self.clear_in_flight(id);
        let is_latest = self.latest_write.get(&id) == Some(&write.generation);
        if is_latest {
            self.latest_write.remove(&id);
        }

        match result {
            Ok(server) => {
                if is_latest {
                    if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
                        *task = server;
                    }
                }
                let message = match kind {
                    UpdateKind::Toggle => MSG_UPDATED,
                    UpdateKind::Edit => MSG_EDITED,
                };
                self.notify(NoticeKind::Success, message);
            }
            Err(err) => {
                if let (true, Some(before), Some(after)) = (is_latest, write.before, write.after) {
                    if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
                        if *task == after {
                            *task = before;
                        }
                    }
                }
                let fallback = match kind {
                    UpdateKind::Toggle => MSG_UPDATE_FAILED,
                    UpdateKind::Edit => MSG_EDIT_FAILED,
                };
                self.notify(NoticeKind::Error, failure_message(&err, fallback));
            }
        }
    }

    pub fn begin_remove(&mut self, id: Uuid) {
        self.mark_in_flight(id);
    }

    /// Deletion is not applied optimistically; success triggers a full resync.
    pub fn finish_remove(
        &mut self,
        id: Uuid,
        result: Result<DeleteTaskResponse, ClientError>,
    ) -> Option<RefreshTicket> {
        self.clear_in_flight(id);
        match result {
            Ok(_) => {
                self.notify(NoticeKind::Success, MSG_DELETED);
                self.begin_refresh()
            }
            Err(err) => {
                let message = failure_message(&err, MSG_DELETE_FAILED);
                self.notify(NoticeKind::Error, message);
                None
            }
        }
    }
}

/// 401 asks the user to sign in again, 404 says the task is gone; anything
/// else shows the server's text or `fallback`.
fn failure_message(err: &ClientError, fallback: &str) -> String {
    match err.status() {
        Some(401) => MSG_UNAUTHORIZED.to_string(),
        Some(404) => MSG_NOT_FOUND.to_string(),
        Some(status) if status >= 500 => fallback.to_string(),
        _ => err.user_message().unwrap_or_else(|| fallback.to_string()),
    }
}
