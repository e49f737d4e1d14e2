//! Request-level errors and their responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    auth::SessionError,
    credentials::CredentialError,
    flash::Notice,
    items::ItemError,
    repository::RepositoryError,
    views::Reply,
};

/// AppError
///
/// Failures that end a request. Input problems (blank fields, taken usernames,
/// bad credentials) never get here: handlers recover from those by re-rendering
/// the form they came from.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,

    #[error("admin login required")]
    Unauthorized,

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => Reply::view("404", serde_json::Value::Null)
                .status(StatusCode::NOT_FOUND)
                .into_response(),
            // The intended action is dropped, not resumed after login.
            AppError::Unauthorized => Reply::redirect("/admin/login")
                .notice(Notice::error("Please log in as admin."))
                .into_response(),
            AppError::Internal(msg) => {
                // Log detailed error server-side, return generic view to client
                tracing::error!(error = %msg, "Internal server error");
                Reply::view("500", serde_json::Value::Null)
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .into_response()
            }
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<ItemError> for AppError {
    fn from(err: ItemError) -> Self {
        match err {
            ItemError::NotFound => AppError::NotFound,
            ItemError::InvalidInput => AppError::Internal("unhandled item validation error".to_string()),
            ItemError::Repository(e) => e.into(),
        }
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        AppError::Internal(err.to_string())
    }
}
