use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use database::RepositoryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("No authenticated identity on the request")]
    MissingIdentity,

    #[error("Storage error: {0}")]
    Backend(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type UserResult<T> = Result<T, UserError>;

impl From<RepositoryError> for UserError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => UserError::NotFound(what),
            RepositoryError::InvalidInput(msg) => UserError::InvalidInput(msg),
            RepositoryError::AlreadyExists(msg) => UserError::AlreadyExists(msg),
            RepositoryError::Backend(msg) => UserError::Backend(msg),
        }
    }
}

/// Status mapping: not found 404, bad input and duplicates 400, everything else 500.
impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound(_) => AppError::NotFound(err.to_string()),
            UserError::InvalidInput(_) | UserError::BadRequest(_) => {
                AppError::BadRequest(err.to_string())
            }
            UserError::AlreadyExists(_) => AppError::BadRequest(err.to_string()),
            UserError::MissingIdentity => AppError::InternalServerError(err.to_string()),
            UserError::Backend(msg) => AppError::Database(msg),
            UserError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
