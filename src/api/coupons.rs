//! Coupon API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{require_field, success, ApiResult};
use crate::errors::AppError;
use crate::models::{Coupon, CreateCouponRequest, UpdateCouponRequest};
use crate::AppState;

fn validate_discount(discount: f64) -> Result<(), AppError> {
    if !discount.is_finite() || discount <= 0.0 {
        return Err(AppError::Validation(
            "Discount must be a positive number".to_string(),
        ));
    }
    Ok(())
}

/// GET /coupons - List all coupons.
pub async fn list_coupons(State(state): State<AppState>) -> ApiResult<Vec<Coupon>> {
    success(state.repo.list_coupons().await?)
}

/// GET /coupons/:id - Get a single coupon.
pub async fn get_coupon(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Coupon> {
    match state.repo.get_coupon(&id).await? {
        Some(coupon) => success(coupon),
        None => Err(AppError::NotFound(format!("Coupon {} not found", id))),
    }
}

/// POST /coupons - Create a coupon.
pub async fn create_coupon(
    State(state): State<AppState>,
    Json(request): Json<CreateCouponRequest>,
) -> ApiResult<Coupon> {
    require_field(&request.code, "Coupon code is required")?;
    require_field(&request.expiry, "Expiry date is required")?;
    let discount = request
        .discount
        .ok_or_else(|| AppError::Validation("Discount is required".to_string()))?;
    validate_discount(discount)?;

    success(state.repo.create_coupon(&request).await?)
}

/// PATCH /coupons/:id - Update a coupon.
pub async fn update_coupon(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateCouponRequest>,
) -> ApiResult<Coupon> {
    if let Some(code) = request.code.as_deref() {
        require_field(code, "Coupon code cannot be empty")?;
    }
    if let Some(discount) = request.discount {
        validate_discount(discount)?;
    }

    success(state.repo.update_coupon(&id, &request).await?)
}

/// DELETE /coupons/:id - Delete a coupon.
pub async fn delete_coupon(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.repo.delete_coupon(&id).await?;
    success(())
}
