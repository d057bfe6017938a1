//! Aggregate counters for the admin dashboard.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStats {
    pub users: i64,
    pub products: i64,
    pub reviews: i64,
    pub coupons: i64,
    pub accepted_products: i64,
    pub pending_products: i64,
    pub rejected_products: i64,
}
