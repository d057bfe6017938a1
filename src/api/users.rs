//! User and role API endpoints.

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use super::{require_field, success, ApiResult};
use crate::auth::Caller;
use crate::errors::AppError;
use crate::models::{
    normalize_email, Product, RegisterOutcome, RegisterUserRequest, Role, RoleResponse, UpdateRoleRequest,
    UpdateSubscriptionRequest, User,
};
use crate::AppState;

/// POST /users - Register a user; repeat registrations report existence.
pub async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<RegisterUserRequest>,
) -> ApiResult<RegisterOutcome> {
    require_field(&request.email, "Email is required")?;
    if !request.email.contains('@') {
        return Err(AppError::Validation("Email is malformed".to_string()));
    }

    let outcome = state.repo.register_user(&request).await?;
    if outcome.inserted {
        tracing::info!(email = %outcome.user.email, "User registered");
    }
    success(outcome)
}

/// GET /users - List all users.
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    success(state.repo.list_users().await?)
}

/// GET /users/email/:email - Get a user by email.
pub async fn get_user_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<User> {
    let email = normalize_email(&email);
    match state.repo.get_user_by_email(&email).await? {
        Some(user) => success(user),
        None => Err(AppError::NotFound(format!("User {} not found", email))),
    }
}

/// GET /users/role/:email - Resolve a user's role.
pub async fn get_user_role(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<RoleResponse> {
    let email = normalize_email(&email);
    let role = state.repo.get_role(&email).await?;
    success(RoleResponse { email, role })
}

/// PATCH /users/:id/role - Assign a role.
pub async fn update_user_role(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    Json(request): Json<UpdateRoleRequest>,
) -> ApiResult<User> {
    let role = Role::parse(&request.role).ok_or_else(|| {
        AppError::Validation(format!(
            "Unknown role '{}'; expected user, moderator or admin",
            request.role
        ))
    })?;

    let user = state.repo.set_role(&id, role).await?;
    tracing::info!(by = %caller.email, user = %user.email, role = role.as_str(), "Role updated");
    success(user)
}

/// PUT /users/:email/subscription - Set the subscription flag.
pub async fn update_subscription(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(email): Path<String>,
    Json(request): Json<UpdateSubscriptionRequest>,
) -> ApiResult<User> {
    let email = normalize_email(&email);
    if caller.email != email && caller.role != Role::Admin {
        return Err(AppError::Forbidden(
            "Only the account holder or an admin may change a subscription".to_string(),
        ));
    }

    let user = state
        .repo
        .set_subscription(&email, request.subscribed)
        .await?;
    tracing::info!(email = %user.email, subscribed = user.subscribed, "Subscription updated");
    success(user)
}

/// GET /users/:email/products - Products submitted by a user.
pub async fn list_user_products(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(email): Path<String>,
) -> ApiResult<Vec<Product>> {
    let email = normalize_email(&email);
    if !caller.may_manage(&email) {
        return Err(AppError::Forbidden(
            "Only the owner or staff may list these products".to_string(),
        ));
    }

    success(state.repo.products_by_owner(&email).await?)
}
