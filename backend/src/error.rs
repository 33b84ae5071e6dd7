use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shared::{ErrorBody, ValidationError};
use thiserror::Error;

use crate::store::StoreError;

/// Every failure a task endpoint can report. The `Display` text is the
/// `error` field of the JSON body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    BadRequest(String),
    #[error("Task not found")]
    NotFound,
    #[error("{message}")]
    Server {
        message: &'static str,
        #[source]
        source: StoreError,
    },
}

impl ApiError {
    /// Wraps a storage failure with the message shown to the client.
    pub fn server(message: &'static str) -> impl FnOnce(StoreError) -> ApiError {
        move |source| ApiError::Server { message, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            // the create endpoint has always answered missing fields with 401
            ApiError::Validation(ValidationError::MissingFields) => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Server { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Server { message, source } = &self {
            tracing::error!(error = %source, "{}", message);
        }
        (self.status(), Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_error_taxonomy() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(ValidationError::MissingFields).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(ValidationError::TitleTooShort).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(ValidationError::TitleTooShort).to_string(),
            "Title must be at least 3 characters long"
        );
    }
}
