//! Admin dashboard statistics.

use axum::extract::State;

use super::{success, ApiResult};
use crate::models::SiteStats;
use crate::AppState;

/// GET /site-stats - Aggregate counts.
pub async fn site_stats(State(state): State<AppState>) -> ApiResult<SiteStats> {
    success(state.repo.site_stats().await?)
}
