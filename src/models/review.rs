//! Review model.

use serde::{Deserialize, Serialize};

/// An append-only review of a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub product_id: String,
    pub user_email: String,
    pub user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_image: Option<String>,
    pub description: String,
    pub rating: i64,
    pub created_at: String,
}

/// Request body for `POST /reviews`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub user_email: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub user_image: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rating: Option<i64>,
    /// Client-supplied timestamp; defaults to the server clock.
    #[serde(default)]
    pub created_at: Option<String>,
}
