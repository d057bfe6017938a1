//! Review endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{require_field, success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateReviewRequest, Review};
use crate::AppState;

/// POST /reviews - Append a review.
pub async fn create_review(
    State(state): State<AppState>,
    Json(request): Json<CreateReviewRequest>,
) -> ApiResult<Review> {
    require_field(&request.product_id, "Product ID is required")?;
    require_field(&request.user_email, "User email is required")?;
    require_field(&request.user_name, "User name is required")?;

    match request.rating {
        Some(rating) if (1..=5).contains(&rating) => {}
        Some(_) => {
            return Err(AppError::Validation(
                "Rating must be between 1 and 5".to_string(),
            ))
        }
        None => return Err(AppError::Validation("Rating is required".to_string())),
    }

    let review = state.repo.create_review(&request).await?;
    tracing::debug!(product = %review.product_id, rating = review.rating, "Review added");
    success(review)
}

/// GET /reviews/:product_id - Reviews for a product.
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> ApiResult<Vec<Review>> {
    success(state.repo.list_reviews(&product_id).await?)
}
