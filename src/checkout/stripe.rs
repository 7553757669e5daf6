//! Stripe-compatible payment provider client.
//!
//! Webhook authenticity uses the provider's signed-payload scheme: the
//! `Stripe-Signature` header carries `t=<unix>,v1=<hex hmac>` where the
//! HMAC-SHA256 is computed over `"{t}.{raw body}"` with the endpoint
//! secret. Timestamps outside the tolerance window are rejected to stop
//! replays of captured deliveries.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::config::StripeConfig;
use crate::purchases::models::LineItem;

type HmacSha256 = Hmac<Sha256>;

/// Replay window for webhook timestamps.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("signature header is missing the timestamp")]
    MissingTimestamp,
    #[error("signature header is missing the v1 signature")]
    MissingSignature,
    #[error("signature header is malformed")]
    Malformed,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutApiError {
    #[error("checkout request failed: {0}")]
    Transport(String),
    #[error("checkout provider returned {0}")]
    Provider(u16),
}

/// A created hosted-checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Redirect URL to the provider's hosted checkout page.
    pub url: String,
}

#[derive(Clone)]
pub struct StripeClient {
    config: StripeConfig,
    client: reqwest::Client,
}

impl StripeClient {
    pub fn new(config: StripeConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// Verify a webhook payload against its signature header.
    ///
    /// `Ok(false)` is a wrong or stale signature; `Err` means the header
    /// could not be parsed at all. Callers must reject both without
    /// processing, and without echoing verification detail back.
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<bool, SignatureError> {
        let mut timestamp: Option<i64> = None;
        let mut signature: Option<Vec<u8>> = None;

        for part in signature_header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => {
                    timestamp = Some(value.parse().map_err(|_| SignatureError::Malformed)?);
                }
                Some(("v1", value)) => {
                    // A non-hex v1 is a wrong signature, not a parse error.
                    signature = Some(hex::decode(value).unwrap_or_default());
                }
                Some(_) => {}
                None if part.trim().is_empty() => {}
                None => return Err(SignatureError::Malformed),
            }
        }

        let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
        let signature = signature.ok_or(SignatureError::MissingSignature)?;

        let age = chrono::Utc::now().timestamp() - timestamp;
        if age.abs() > SIGNATURE_TOLERANCE_SECS {
            return Ok(false);
        }

        let mut mac = HmacSha256::new_from_slice(self.config.webhook_secret.as_bytes())
            .map_err(|_| SignatureError::Malformed)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac.verify_slice(&signature).is_ok())
    }

    /// Create a hosted-checkout session for a cart.
    ///
    /// The cart is serialized into session metadata so the webhook can
    /// reconstruct it without a second lookup.
    pub async fn create_checkout_session(
        &self,
        items: &[LineItem],
        customer_email: &str,
        user_id: Option<&str>,
        success_url: &str,
        cancel_url: &str,
        currency: &str,
    ) -> Result<CheckoutSession, CheckoutApiError> {
        let cart: Vec<serde_json::Value> = items
            .iter()
            .map(|item| {
                serde_json::json!({
                    "name": item.name,
                    "price": item.unit_price,
                    "quantity": item.quantity,
                    "area": item.area,
                    "country": item.jurisdiction,
                })
            })
            .collect();
        let cart_json = serde_json::to_string(&cart)
            .map_err(|e| CheckoutApiError::Transport(e.to_string()))?;

        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), success_url.into()),
            ("cancel_url".into(), cancel_url.into()),
            ("customer_email".into(), customer_email.into()),
            ("metadata[items]".into(), cart_json),
        ];
        if let Some(user_id) = user_id {
            form.push(("metadata[userId]".into(), user_id.into()));
        }
        for (i, item) in items.iter().enumerate() {
            form.push((
                format!("line_items[{i}][price_data][currency]"),
                currency.into(),
            ));
            form.push((
                format!("line_items[{i}][price_data][product_data][name]"),
                item.name.clone(),
            ));
            form.push((
                format!("line_items[{i}][price_data][unit_amount]"),
                item.unit_price.to_string(),
            ));
            form.push((format!("line_items[{i}][quantity]"), item.quantity.to_string()));
        }

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.config.api_base))
            .basic_auth(&self.config.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(|e| CheckoutApiError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CheckoutApiError::Provider(response.status().as_u16()));
        }
        response
            .json()
            .await
            .map_err(|e| CheckoutApiError::Transport(e.to_string()))
    }
}
