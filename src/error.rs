use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("this slot is already booked")]
    AlreadyBooked,

    #[error("cannot modify availability with existing bookings")]
    HasActiveBookings,

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Conflict(String),

    #[error("account could not be matched to a unique user")]
    AccountConflict,

    #[error("account is deactivated, contact an administrator")]
    InactiveAccount,

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    code: &'static str,
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::AlreadyBooked => "ALREADY_BOOKED",
            ApiError::HasActiveBookings => "HAS_ACTIVE_BOOKINGS",
            ApiError::InvalidState(_) => "INVALID_STATE",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::AccountConflict => "ACCOUNT_CONFLICT",
            ApiError::InactiveAccount => "INACTIVE_ACCOUNT",
            ApiError::Database(_) => "INTERNAL",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "Validation Error",
            ApiError::NotFound(_) => "Not Found",
            ApiError::Forbidden(_) => "Forbidden",
            ApiError::Unauthorized => "Unauthorized",
            ApiError::AlreadyBooked => "Conflict",
            ApiError::HasActiveBookings => "Conflict",
            ApiError::InvalidState(_) => "Invalid State",
            ApiError::Conflict(_) => "Conflict",
            ApiError::AccountConflict => "Conflict",
            ApiError::InactiveAccount => "Forbidden",
            ApiError::Database(_) => "Internal Server Error",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidState(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) | ApiError::InactiveAccount => StatusCode::FORBIDDEN,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::AlreadyBooked
            | ApiError::HasActiveBookings
            | ApiError::Conflict(_)
            | ApiError::AccountConflict => StatusCode::CONFLICT,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            // Never leak database details to the caller.
            ApiError::Database(err) => {
                log::error!("database error: {err}");
                "an unexpected error occurred".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.label(),
            message,
            code: self.code(),
        })
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}
