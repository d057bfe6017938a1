//! Bearer-token authentication and role-based access gates.
//!
//! Token verification is delegated to an [`IdentityVerifier`]. The gates in
//! this module are applied per route group in `create_router`; each one
//! attaches the verified [`Caller`] to the request extensions.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{normalize_email, Role};
use crate::AppState;

/// A verified caller identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub email: String,
    pub role: Role,
}

impl Caller {
    /// Owners may manage their own products; staff may manage any.
    ///
    /// Both emails are expected in normalized form.
    pub fn may_manage(&self, owner_email: &str) -> bool {
        self.role.is_staff() || self.email == owner_email
    }
}

/// Validates a bearer credential and returns the email it was issued to.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<String, AppError>;
}

#[derive(Debug, Deserialize)]
struct IdentityClaims {
    #[serde(default)]
    email: String,
}

/// HS256 JWT verifier for tokens minted by the identity provider.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256];

        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
            validation.set_required_spec_claims(&["exp", "iss"]);
        }

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<String, AppError> {
        let claims = decode::<IdentityClaims>(token, &self.key, &self.validation)
            .map(|t| t.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token verification failed");
                AppError::Forbidden("Invalid or expired token".to_string())
            })?;

        let email = normalize_email(&claims.email);
        if email.is_empty() {
            return Err(AppError::Forbidden("Token has no email claim".to_string()));
        }

        Ok(email)
    }
}

/// Access requirement for a group of routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Any verified caller
    Authenticated,
    /// Moderators and admins
    Staff,
    /// Admins only
    Admin,
}

impl AccessPolicy {
    pub fn permits(&self, role: Role) -> bool {
        match self {
            AccessPolicy::Authenticated => true,
            AccessPolicy::Staff => role.is_staff(),
            AccessPolicy::Admin => role == Role::Admin,
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Authenticate the request and check the caller's role against `policy`.
pub async fn authorize(
    state: &AppState,
    policy: AccessPolicy,
    headers: &HeaderMap,
) -> Result<Caller, AppError> {
    let token = bearer_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let Some(verifier) = state.identity.as_ref() else {
        return Err(AppError::Forbidden(
            "Identity verification is not configured".to_string(),
        ));
    };

    let email = verifier.verify(token)?;

    // Callers who never registered hold the default role.
    let role = state
        .repo
        .get_user_by_email(&email)
        .await?
        .map(|u| u.effective_role())
        .unwrap_or_default();

    if !policy.permits(role) {
        tracing::info!(caller = %email, role = role.as_str(), ?policy, "Access denied");
        return Err(AppError::Forbidden(format!(
            "Role '{}' may not perform this action",
            role.as_str()
        )));
    }

    Ok(Caller { email, role })
}

async fn gate(state: &AppState, policy: AccessPolicy, mut request: Request, next: Next) -> Response {
    match authorize(state, policy, request.headers()).await {
        Ok(caller) => {
            request.extensions_mut().insert(caller);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Gate for routes open to any verified caller.
pub async fn require_authenticated(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    gate(&state, AccessPolicy::Authenticated, request, next).await
}

/// Gate for moderator and admin routes.
pub async fn require_staff(State(state): State<AppState>, request: Request, next: Next) -> Response {
    gate(&state, AccessPolicy::Staff, request, next).await
}

/// Gate for admin-only routes.
pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    gate(&state, AccessPolicy::Admin, request, next).await
}
