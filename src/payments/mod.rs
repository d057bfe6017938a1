//! Payment gateway adapter.
//!
//! Subscription checkout creates a payment intent with the gateway and hands
//! the client secret back to the browser, which completes the payment.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// A payment intent created by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub client_secret: String,
    pub amount: i64,
    pub currency: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
    ) -> Result<PaymentIntent, AppError>;
}

/// Convert a price in major units to the smallest currency unit.
pub fn amount_in_cents(price: f64) -> Result<i64, AppError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(AppError::Validation(
            "Price must be a positive number".to_string(),
        ));
    }
    Ok((price * 100.0).round() as i64)
}

#[derive(Debug, Deserialize)]
struct StripeIntentResponse {
    client_secret: String,
    amount: i64,
    currency: String,
}

/// Stripe payment intents over the REST API.
pub struct StripeGateway {
    http: reqwest::Client,
    api_base: String,
    secret_key: Option<String>,
}

impl StripeGateway {
    pub fn new(api_base: &str, secret_key: Option<String>) -> Self {
        let http = match reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
        {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "Failed to configure reqwest client; using defaults"
                );
                reqwest::Client::new()
            }
        };

        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
    ) -> Result<PaymentIntent, AppError> {
        let Some(secret_key) = self.secret_key.as_deref() else {
            return Err(AppError::Payment(
                "Payment gateway is not configured".to_string(),
            ));
        };

        let amount_param = amount.to_string();
        let params = [
            ("amount", amount_param.as_str()),
            ("currency", currency),
            ("payment_method_types[]", "card"),
        ];

        let response = self
            .http
            .post(format!("{}/v1/payment_intents", self.api_base))
            .basic_auth(secret_key, None::<&str>)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %body, "Payment intent creation rejected");
            return Err(AppError::Payment(format!(
                "Payment gateway returned {}",
                status
            )));
        }

        let intent: StripeIntentResponse = response.json().await?;
        tracing::info!(amount = intent.amount, currency = %intent.currency, "Payment intent created");

        Ok(PaymentIntent {
            client_secret: intent.client_secret,
            amount: intent.amount,
            currency: intent.currency,
        })
    }
}
