//! Derived product views: featured, trending and by status.

use axum::extract::{Query, State};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::models::{Product, ACCEPTED_STATUS};
use crate::AppState;

pub const FEATURED_LIMIT: usize = 4;
pub const TRENDING_LIMIT: usize = 6;

/// Upper bound for a caller-supplied view limit.
const MAX_VIEW_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub status: Option<String>,
}

fn view_limit(requested: Option<usize>, default: usize) -> usize {
    requested.unwrap_or(default).clamp(1, MAX_VIEW_LIMIT)
}

/// GET /featuredProducts - Featured products, newest first.
pub async fn featured_products(
    State(state): State<AppState>,
    Query(params): Query<ViewQuery>,
) -> ApiResult<Vec<Product>> {
    let limit = view_limit(params.limit, FEATURED_LIMIT);
    success(state.repo.featured_products(limit).await?)
}

/// GET /trendingProducts - Most upvoted products.
pub async fn trending_products(
    State(state): State<AppState>,
    Query(params): Query<ViewQuery>,
) -> ApiResult<Vec<Product>> {
    let limit = view_limit(params.limit, TRENDING_LIMIT);
    success(state.repo.trending_products(limit).await?)
}

/// GET /acceptedProducts - Products with a given status, `accepted` by default.
pub async fn accepted_products(
    State(state): State<AppState>,
    Query(params): Query<StatusQuery>,
) -> ApiResult<Vec<Product>> {
    let status = params
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(ACCEPTED_STATUS);
    success(state.repo.products_by_status(status).await?)
}
