use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use std::fmt;

/// a response with the status of `$builder` and `{"message": ...}` as body
macro_rules! json_message {
    ($builder:ident, $message:expr) => {
        HttpResponse::$builder().json(serde_json::json!({ "message": $message }))
    };
}

/// the one message every refused or unknown report gets, see [`MarkingError::denied`]
pub const NO_ACCESS: &str = "You do not have access to this report";

/**
 * Everything a marking operation can fail with.
 *
 * Each error belongs to the request that caused it, none of them ends the process.
 */
#[derive(Debug)]
pub enum MarkingError {
    InvalidCredentials,
    AccessDenied { message: String },
    Validation { message: String },
    NotFound { message: String },
    Persistence { message: String, error: String },
}

impl MarkingError {
    pub fn validation(message: impl Into<String>) -> Self {
        MarkingError::Validation {
            message: message.into(),
        }
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        MarkingError::AccessDenied {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        MarkingError::NotFound {
            message: message.into(),
        }
    }

    pub fn persistence(message: impl Into<String>, error: sqlx::Error) -> Self {
        MarkingError::Persistence {
            message: message.into(),
            error: error.to_string(),
        }
    }

    /// The answer for a student or report the caller may not see.
    ///
    /// Administrators see everything, so for them a missing row really is
    /// `NotFound`. Everybody else gets the same `AccessDenied` whether the
    /// row is missing or belongs to somebody else.
    pub fn denied(is_admin: bool, what: &str) -> Self {
        if is_admin {
            MarkingError::not_found(format!("{} was not found", what))
        } else {
            MarkingError::access_denied(NO_ACCESS)
        }
    }
}

impl fmt::Display for MarkingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkingError::InvalidCredentials => write!(f, "Invalid email or password"),
            MarkingError::AccessDenied { message } => write!(f, "{}", message),
            MarkingError::Validation { message } => write!(f, "{}", message),
            MarkingError::NotFound { message } => write!(f, "{}", message),
            MarkingError::Persistence { message, error } => write!(f, "{} ({})", message, error),
        }
    }
}

impl std::error::Error for MarkingError {}

impl From<sqlx::Error> for MarkingError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => MarkingError::not_found("The requested row was not found"),
            e => MarkingError::persistence("Error while talking to the database", e),
        }
    }
}

impl ResponseError for MarkingError {
    fn status_code(&self) -> StatusCode {
        match self {
            MarkingError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            MarkingError::AccessDenied { .. } => StatusCode::FORBIDDEN,
            MarkingError::Validation { .. } => StatusCode::BAD_REQUEST,
            MarkingError::NotFound { .. } => StatusCode::NOT_FOUND,
            MarkingError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            MarkingError::InvalidCredentials => json_message!(Unauthorized, self.to_string()),
            MarkingError::AccessDenied { message } => json_message!(Forbidden, message),
            MarkingError::Validation { message } => json_message!(BadRequest, message),
            MarkingError::NotFound { message } => json_message!(NotFound, message),
            // the database error stays in the log
            MarkingError::Persistence { message, .. } => json_message!(InternalServerError, message),
        }
    }
}
