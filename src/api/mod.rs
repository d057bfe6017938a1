//! REST API module.
//!
//! Contains all route handlers. Access gates are applied by the router, so
//! handlers behind a gate receive the verified [`crate::auth::Caller`] as an
//! extension.

mod coupons;
mod moderation;
mod payments;
mod products;
mod rankings;
mod reviews;
mod stats;
mod users;

pub use coupons::*;
pub use moderation::*;
pub use payments::*;
pub use products::*;
pub use rankings::*;
pub use reviews::*;
pub use stats::*;
pub use users::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// Reject blank required fields.
pub(crate) fn require_field(value: &str, message: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(message.to_string()));
    }
    Ok(())
}
