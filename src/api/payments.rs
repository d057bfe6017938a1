//! Payment intent endpoint.

use axum::{extract::State, Extension, Json};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::auth::Caller;
use crate::errors::AppError;
use crate::payments::{amount_in_cents, PaymentIntent};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PaymentIntentRequest {
    #[serde(default)]
    pub price: Option<f64>,
}

/// POST /create-payment-intent - Start a subscription payment.
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<PaymentIntentRequest>,
) -> ApiResult<PaymentIntent> {
    let price = request
        .price
        .ok_or_else(|| AppError::Validation("Price is required".to_string()))?;
    let amount = amount_in_cents(price)?;

    let intent = state
        .payments
        .create_payment_intent(amount, &state.config.currency)
        .await?;
    tracing::info!(caller = %caller.email, amount, "Payment intent issued");
    success(intent)
}
