//! Product submission, listing and editing endpoints.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use super::{require_field, success, ApiResult};
use crate::auth::Caller;
use crate::db::ProductQuery;
use crate::errors::AppError;
use crate::models::{normalize_email, Product, SubmitProductRequest, UpdateProductRequest};
use crate::AppState;

/// Maximum page size for product listings.
const MAX_PAGE_SIZE: usize = 100;

/// Deepest page a listing may start at.
const MAX_OFFSET: usize = 10_000;

/// Product listing query parameters.
#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    /// Full-text query over name, tags and description.
    #[serde(default)]
    pub search: Option<String>,
    /// Exact tag filter; also narrows search results.
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default = "default_page_size")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_page_size() -> usize {
    20
}

/// POST /addProducts - Submit a product, subject to the free-product quota.
pub async fn submit_product(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<SubmitProductRequest>,
) -> ApiResult<Product> {
    require_field(&request.email, "Owner email is required")?;
    require_field(&request.name, "Product name is required")?;

    if !caller.may_manage(&normalize_email(&request.email)) {
        return Err(AppError::Forbidden(
            "Products may only be submitted for your own account".to_string(),
        ));
    }

    let product = state.repo.submit_product(&request).await?;
    tracing::info!(product = %product.id, owner = %product.owner_email, "Product submitted");

    if let Err(e) = state.search.index_product(&product).await {
        tracing::warn!("Failed to index product: {}", e);
    }

    success(product)
}

/// GET /products - List products with optional search, tag filter and paging.
pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ProductListQuery>,
) -> ApiResult<Vec<Product>> {
    let limit = params.limit.clamp(1, MAX_PAGE_SIZE);
    if params.offset > MAX_OFFSET {
        return Err(AppError::Validation(format!(
            "Offset may not exceed {}",
            MAX_OFFSET
        )));
    }
    let tag = params
        .tag
        .as_deref()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty());

    let Some(search) = params.search.as_deref().filter(|s| !s.trim().is_empty()) else {
        let query = ProductQuery {
            tag,
            limit,
            offset: params.offset,
        };
        return success(state.repo.list_products(&query).await?);
    };

    let hits = state
        .search
        .search(search, tag.as_deref(), limit, params.offset)?;
    tracing::debug!(
        query = %search,
        hits = hits.len(),
        top_score = hits.first().map(|h| h.score),
        "Product search"
    );

    let mut products = Vec::with_capacity(hits.len());
    for hit in hits {
        if let Some(product) = state.repo.get_product(&hit.product_id).await? {
            products.push(product);
        }
    }

    success(products)
}

/// GET /products/:id - Get a single product.
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Product> {
    success(state.repo.require_product(&id).await?)
}

/// PATCH /products/:id - Edit a product's descriptive fields.
pub async fn update_product(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    Json(request): Json<UpdateProductRequest>,
) -> ApiResult<Product> {
    if let Some(name) = request.name.as_deref() {
        require_field(name, "Product name cannot be empty")?;
    }

    let existing = state.repo.require_product(&id).await?;
    if !caller.may_manage(&existing.owner_email) {
        return Err(AppError::Forbidden(
            "Only the owner or staff may edit this product".to_string(),
        ));
    }

    let product = state.repo.update_product(&id, &request).await?;

    if let Err(e) = state.search.index_product(&product).await {
        tracing::warn!("Failed to re-index product: {}", e);
    }

    success(product)
}

/// DELETE /products/:id - Delete a product.
pub async fn delete_product(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let existing = state.repo.require_product(&id).await?;
    if !caller.may_manage(&existing.owner_email) {
        return Err(AppError::Forbidden(
            "Only the owner or staff may delete this product".to_string(),
        ));
    }

    state.repo.delete_product(&id).await?;
    tracing::info!(product = %id, by = %caller.email, "Product deleted");

    if let Err(e) = state.search.remove_product(&id).await {
        tracing::warn!("Failed to remove product from index: {}", e);
    }

    success(())
}
