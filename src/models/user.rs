//! User model and role labels.

use serde::{Deserialize, Serialize};

/// Coarse-grained permission label attached to a user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Role::User),
            "moderator" => Some(Role::Moderator),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Moderators and admins.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }
}

/// Canonical form of an email address: trimmed and lowercased.
///
/// Applied wherever an email enters the system so that stored values, token
/// claims and request parameters compare with plain equality.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A registered user, keyed naturally by email.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Absent until explicitly assigned; read through [`User::effective_role`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub subscribed: bool,
    pub created_at: String,
}

impl User {
    pub fn effective_role(&self) -> Role {
        self.role.unwrap_or_default()
    }
}

/// Request body for registering a user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Result of a registration call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOutcome {
    pub inserted: bool,
    pub message: String,
    pub user: User,
}

/// Request body for `PATCH /users/{id}/role`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRoleRequest {
    #[serde(default)]
    pub role: String,
}

/// Request body for `PUT /users/{email}/subscription`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSubscriptionRequest {
    #[serde(default = "default_subscribed")]
    pub subscribed: bool,
}

fn default_subscribed() -> bool {
    true
}

/// Response body for `GET /users/role/{email}`.
#[derive(Debug, Clone, Serialize)]
pub struct RoleResponse {
    pub email: String,
    pub role: Role,
}
