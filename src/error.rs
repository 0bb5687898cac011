use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,

    #[error("caller does not own this resource")]
    NotOwner,

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    NotEligible(String),

    #[error("You already have an ongoing trip.")]
    DriverBusy,

    #[error("Trip route is missing. Please recreate the trip.")]
    MissingRoute,

    #[error("Driver must be within 100m of destination to complete trip.")]
    TooFarFromDestination,

    #[error("operation deadline exceeded")]
    Timeout,

    #[error("store unavailable: {0}")]
    Transient(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::NotOwner => StatusCode::FORBIDDEN,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::InvalidState(_)
            | AppError::NotEligible(_)
            | AppError::DriverBusy
            | AppError::MissingRoute
            | AppError::TooFarFromDestination => StatusCode::BAD_REQUEST,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "success": false,
            "message": self.to_string()
        }));

        (status, body).into_response()
    }
}
