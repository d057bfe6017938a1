//! Voting and moderation endpoints.

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use super::{require_field, success, ApiResult};
use crate::auth::Caller;
use crate::errors::AppError;
use crate::models::{
    normalize_email, Product, ReportResponse, UpdateFeaturedRequest, UpdateStatusRequest,
    VoterRequest,
};
use crate::AppState;

/// The acting email in a vote or report body must be the caller's own.
fn acting_email(
    caller: &Caller,
    request: &VoterRequest,
    missing: &str,
) -> Result<String, AppError> {
    require_field(&request.email, missing)?;

    let email = normalize_email(&request.email);
    if email != caller.email {
        return Err(AppError::Forbidden(
            "Votes and reports may only be cast for your own email".to_string(),
        ));
    }
    Ok(email)
}

/// PATCH /products/:id/upvote - Upvote once per email.
pub async fn upvote_product(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    Json(request): Json<VoterRequest>,
) -> ApiResult<Product> {
    let email = acting_email(&caller, &request, "Email is required for voting")?;

    let product = state.repo.upvote(&id, &email).await?;
    tracing::debug!(product = %id, upvotes = product.upvotes, "Upvote recorded");
    success(product)
}

/// PATCH /products/:id/report - Toggle a report by email.
pub async fn report_product(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    Json(request): Json<VoterRequest>,
) -> ApiResult<ReportResponse> {
    let email = acting_email(&caller, &request, "Email is required for reporting")?;

    let (action, product) = state.repo.toggle_report(&id, &email).await?;
    tracing::info!(product = %id, ?action, reports = product.reported.len(), "Report toggled");
    success(ReportResponse { action, product })
}

/// GET /reportedProducts - Products with active reports.
pub async fn reported_products(State(state): State<AppState>) -> ApiResult<Vec<Product>> {
    success(state.repo.reported_products().await?)
}

/// PATCH /products/:id/status - Set the moderation status.
///
/// Any non-empty status is stored as given.
pub async fn update_product_status(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<Product> {
    require_field(&request.status, "Status is required")?;

    let product = state.repo.set_status(&id, request.status.trim()).await?;
    tracing::info!(product = %id, status = %product.status, by = %caller.email, "Status changed");
    success(product)
}

/// PATCH /products/:id/featured - Set or clear the featured flag.
pub async fn update_product_featured(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    Json(request): Json<UpdateFeaturedRequest>,
) -> ApiResult<Product> {
    let product = state.repo.set_featured(&id, request.is_featured).await?;
    tracing::info!(product = %id, featured = product.is_featured, by = %caller.email, "Featured flag changed");
    success(product)
}
