//! Webhook event model and cart reconstruction.

use serde::Deserialize;

use crate::purchases::models::LineItem;

/// Inbound payment-provider event. Only the fields the pipeline reads are
/// modeled; everything else in the payload is ignored.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub object: CheckoutSessionObject,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: SessionMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionMetadata {
    /// Serialized cart, embedded at checkout-creation time.
    #[serde(default)]
    pub items: Option<String>,
    #[serde(default, rename = "userId")]
    pub user_id: Option<String>,
}

/// One cart entry as serialized into checkout metadata. Also the shape
/// the checkout-creation endpoint accepts.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CartItem {
    pub name: String,
    /// Minor currency units.
    pub price: i64,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub area: String,
    pub country: String,
}

fn default_quantity() -> u32 {
    1
}

impl WebhookEvent {
    /// Only a completed, paid, one-time-payment checkout is processed.
    /// Everything else is acknowledged as a no-op.
    pub fn is_eligible(&self) -> bool {
        self.event_type == "checkout.session.completed"
            && self.data.object.mode.as_deref() == Some("payment")
            && self.data.object.payment_status.as_deref() == Some("paid")
    }
}

impl CheckoutSessionObject {
    /// Reconstruct the purchased line items from embedded metadata.
    pub fn cart(&self) -> Result<Vec<LineItem>, String> {
        let raw = self
            .metadata
            .items
            .as_deref()
            .ok_or_else(|| "event metadata has no items".to_string())?;
        let cart: Vec<CartItem> =
            serde_json::from_str(raw).map_err(|e| format!("unparsable cart metadata: {e}"))?;
        if cart.is_empty() {
            return Err("cart metadata is empty".to_string());
        }
        Ok(cart
            .into_iter()
            .map(|c| LineItem::new(&c.name, &c.area, &c.country, c.price, c.quantity))
            .collect())
    }
}
