//! Product model and moderation request bodies.

use serde::{Deserialize, Serialize};

/// Status assigned to newly submitted products.
pub const DEFAULT_STATUS: &str = "pending";

/// Status shown on the public accepted-products page.
pub const ACCEPTED_STATUS: &str = "accepted";

/// A submitted product with its voting and moderation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub owner_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_image: Option<String>,
    pub name: String,
    pub description: String,
    pub image: String,
    pub link: String,
    pub tags: Vec<String>,
    pub upvotes: i64,
    pub voters: Vec<String>,
    pub reported: Vec<String>,
    /// Free-form moderation status; `pending` on creation.
    pub status: String,
    pub is_featured: bool,
    pub created_at: String,
}

/// Request body for `POST /addProducts`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitProductRequest {
    /// Owner email; the submitting user must already be registered.
    #[serde(default, alias = "ownerEmail")]
    pub email: String,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub owner_image: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Request body for editing a product. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Request body carrying the acting email for upvote and report.
#[derive(Debug, Clone, Deserialize)]
pub struct VoterRequest {
    #[serde(default)]
    pub email: String,
}

/// Request body for `PATCH /products/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: String,
}

/// Request body for `PATCH /products/{id}/featured`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFeaturedRequest {
    #[serde(default = "default_featured", alias = "featured")]
    pub is_featured: bool,
}

fn default_featured() -> bool {
    true
}

/// Outcome of a report toggle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportAction {
    Reported,
    Unreported,
}

/// Response body for `PATCH /products/{id}/report`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub action: ReportAction,
    pub product: Product,
}

/// Normalize a tag list into set semantics, preserving first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tags_dedupes() {
        let tags = vec![
            "AI".to_string(),
            " ai ".to_string(),
            "Productivity".to_string(),
            "".to_string(),
        ];
        assert_eq!(normalize_tags(&tags), vec!["ai", "productivity"]);
    }

    #[test]
    fn test_report_action_labels() {
        assert_eq!(
            serde_json::to_string(&ReportAction::Reported).unwrap(),
            "\"reported\""
        );
        assert_eq!(
            serde_json::to_string(&ReportAction::Unreported).unwrap(),
            "\"unreported\""
        );
    }

    #[test]
    fn test_submit_request_accepts_owner_alias() {
        let req: SubmitProductRequest = serde_json::from_value(serde_json::json!({
            "ownerEmail": "maker@example.com",
            "name": "Widget"
        }))
        .unwrap();
        assert_eq!(req.email, "maker@example.com");
        assert!(req.tags.is_empty());
    }
}
