use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngageError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Concurrent write in progress, retry")]
    Conflict,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<rusqlite::Error> for EngageError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => EngageError::Conflict,
            _ => EngageError::Database(err),
        }
    }
}

impl From<engage_shared::UnknownDirection> for EngageError {
    fn from(err: engage_shared::UnknownDirection) -> Self {
        EngageError::InvalidArgument(err.to_string())
    }
}

impl EngageError {
    /// Maps a missing row to `NotFound`, everything else through the normal conversion.
    pub fn missing(what: &'static str) -> impl FnOnce(rusqlite::Error) -> EngageError {
        move |err| match err {
            rusqlite::Error::QueryReturnedNoRows => EngageError::NotFound(what),
            other => other.into(),
        }
    }
}

impl IntoResponse for EngageError {
    fn into_response(self) -> Response {
        let status = match self {
            EngageError::NotFound(_) => StatusCode::NOT_FOUND,
            EngageError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            EngageError::Conflict => StatusCode::CONFLICT,
            EngageError::Unauthorized => StatusCode::UNAUTHORIZED,
            EngageError::Database(_) | EngageError::Pool(_) | EngageError::Task(_) => {
                tracing::error!(error = %self, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.to_string()).into_response()
    }
}
