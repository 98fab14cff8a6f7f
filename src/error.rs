//! Defines the app level error type and its conversion to JSON HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// A budget already exists for the requested category.
    ///
    /// Each category can have at most one budget. The client should edit the
    /// existing budget instead of creating a second one.
    #[error("a budget already exists for this category")]
    DuplicateBudgetCategory,

    /// The database reported a concurrent-access conflict (busy/locked).
    ///
    /// Budget adjustments retry this error a bounded number of times before
    /// surfacing it to the caller.
    #[error("the operation conflicted with a concurrent update, try again")]
    Conflict,

    /// A string could not be parsed as a category name.
    #[error("{0} is not a recognized category")]
    InvalidCategory(String),

    /// A negative amount was used to create or update a transaction.
    #[error("transaction amounts must not be negative")]
    NegativeAmount,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("budget.category") =>
            {
                Error::DuplicateBudgetCategory
            }
            rusqlite::Error::SqliteFailure(sql_error, _)
                if sql_error.code == rusqlite::ErrorCode::DatabaseBusy
                    || sql_error.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                Error::Conflict
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status_code, message) = match self {
            Error::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            Error::DuplicateBudgetCategory | Error::InvalidCategory(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            Error::NegativeAmount => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            Error::Conflict => (StatusCode::CONFLICT, self.to_string()),
            // SQL errors are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "an internal error occurred, check the server logs for more details".to_owned(),
                )
            }
        };

        (status_code, Json(json!({ "error": message }))).into_response()
    }
}
