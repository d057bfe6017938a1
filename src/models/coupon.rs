//! Coupon model.

use serde::{Deserialize, Serialize};

/// A discount coupon managed by admins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: String,
    pub code: String,
    pub expiry: String,
    pub description: String,
    pub discount: f64,
    pub created_at: String,
}

/// Request body for creating a coupon.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCouponRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default, alias = "expiryDate")]
    pub expiry: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub discount: Option<f64>,
}

/// Request body for updating a coupon.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCouponRequest {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, alias = "expiryDate")]
    pub expiry: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub discount: Option<f64>,
}
