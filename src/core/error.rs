use crate::entities::{ChartError, ProgressError, TotalsError};
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use tracing::error;

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: &'static str,
    details: Option<String>,
}

impl AppError {
    pub fn new(status: StatusCode, message: &'static str) -> Self {
        Self {
            status,
            message,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &'static str {
        self.message
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    // Common error constructors
    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: &'static str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: &'static str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: &'static str) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn conflict(message: &'static str) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal_server_error(message: &'static str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn service_unavailable(message: &'static str) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::not_found("Resource not found"),

            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    Self::conflict("Resource already exists").with_details(db_err.message())
                } else if db_err.is_foreign_key_violation() {
                    Self::bad_request("Referenced resource is missing or still in use")
                        .with_details(db_err.message())
                } else if db_err.is_check_violation() {
                    Self::bad_request("Constraint violation").with_details(db_err.message())
                } else {
                    error!("Database error: {}", db_err);
                    Self::bad_request("Database error")
                }
            }

            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                Self::service_unavailable("Database unavailable")
            }

            other => {
                error!("Unexpected sqlx error: {:?}", other);
                Self::internal_server_error("Internal server error")
            }
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::bad_request("Validation error").with_details(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        error!("Password hashing failed: {:?}", err);
        Self::internal_server_error("Failed to hash password")
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::unauthorized("Invalid or expired token").with_details(err.to_string())
    }
}

impl From<ChartError> for AppError {
    fn from(err: ChartError) -> Self {
        let message = match err {
            ChartError::InvalidToothNumber => "Invalid tooth number for this dentition",
            ChartError::DuplicateTooth => "Duplicate tooth number",
            ChartError::ToothNotCharted => "Tooth not charted",
            ChartError::TreatmentNotFound => "Treatment not found",
            ChartError::TreatmentClosed => "Completed or cancelled treatments cannot be modified",
            ChartError::NegativeCost => "Estimated cost cannot be negative",
        };
        match err {
            ChartError::ToothNotCharted | ChartError::TreatmentNotFound => Self::not_found(message),
            _ => Self::bad_request(message),
        }
    }
}

impl From<TotalsError> for AppError {
    fn from(err: TotalsError) -> Self {
        match err {
            TotalsError::NoItems => Self::bad_request("Invoice must contain at least one item"),
            TotalsError::DiscountExceedsSubtotal => {
                Self::bad_request("Discount cannot exceed the subtotal")
            }
        }
    }
}

impl From<ProgressError> for AppError {
    fn from(err: ProgressError) -> Self {
        match err {
            ProgressError::Regression { current } => {
                Self::bad_request("Training progress cannot decrease")
                    .with_details(format!("Current progress is {}%", current))
            }
            ProgressError::AlreadyCompleted => Self::bad_request("Training is already completed"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = Json(ErrorResponse {
            success: false,
            message: self.message,
            details: self.details,
        });
        (self.status, body).into_response()
    }
}
