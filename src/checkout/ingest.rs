//! Webhook ingestion pipeline.
//!
//! verify signature -> check eligibility -> idempotency guard -> resolve
//! buyer identity -> create the pending ledger entry -> run the fan-out
//! orchestrator -> acknowledge. The ledger entry is the first durable side
//! effect, written before any generation starts, so a crash mid-generation
//! still leaves an inspectable record.

use uuid::Uuid;

use crate::db::AppState;
use crate::generation::orchestrator::generate_for_purchase;
use crate::purchases::models::{Purchase, UNKNOWN_USER};
use crate::purchases::store::{LedgerError, LedgerStore};

use super::event::WebhookEvent;
use super::stripe::SignatureError;

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// Signature did not match; nothing was processed.
    #[error("invalid webhook signature")]
    InvalidSignature,
    /// The header itself could not be parsed. Distinct from a mismatch so
    /// the boundary can answer 400 instead of 401.
    #[error("malformed signature header")]
    MalformedSignature(#[from] SignatureError),
    /// A verified payload that cannot be decoded is a provider-contract
    /// violation, not an ineligible event.
    #[error("malformed event payload: {0}")]
    MalformedEvent(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Terminal states of one webhook delivery. `Ignored` and `Duplicate` are
/// normal no-op outcomes, acknowledged with success.
#[derive(Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed { purchase_id: Uuid },
    Duplicate,
    Ignored,
}

/// Handle one inbound payment event end to end.
pub async fn process_event(
    state: &AppState,
    raw_body: &[u8],
    signature_header: &str,
) -> Result<WebhookOutcome, WebhookError> {
    if !state
        .stripe
        .verify_webhook_signature(raw_body, signature_header)?
    {
        log::warn!("Rejected webhook delivery with invalid signature");
        return Err(WebhookError::InvalidSignature);
    }

    let event: WebhookEvent = serde_json::from_slice(raw_body)
        .map_err(|e| WebhookError::MalformedEvent(e.to_string()))?;

    if !event.is_eligible() {
        log::info!(
            "Ignoring webhook event type '{}' (mode {:?}, payment_status {:?})",
            event.event_type,
            event.data.object.mode,
            event.data.object.payment_status
        );
        return Ok(WebhookOutcome::Ignored);
    }

    let session = &event.data.object;

    // Push-based delivery is at-least-once; the ledger lookup makes
    // processing at-most-once per external transaction id.
    if state
        .ledger
        .find_by_external_transaction_id(&session.id)
        .await?
        .is_some()
    {
        log::info!(
            "Duplicate delivery for transaction {}, acknowledging as no-op",
            session.id
        );
        return Ok(WebhookOutcome::Duplicate);
    }

    let items = session
        .cart()
        .map_err(WebhookError::MalformedEvent)?;

    let customer_email = session.customer_email.clone().unwrap_or_default();
    let user_id = resolve_user(state, session.metadata.user_id.as_deref(), &customer_email).await;

    let mut purchase = Purchase::new_pending(
        &session.id,
        &user_id,
        &customer_email,
        items,
        session.amount_total.unwrap_or(0),
        session.currency.as_deref().unwrap_or("eur"),
    );
    state.ledger.create(&purchase).await?;
    log::info!(
        "Created ledger entry {} for transaction {} (user {}, {} item(s))",
        purchase.id,
        purchase.external_transaction_id,
        purchase.user_id,
        purchase.items.len()
    );

    // Synchronous by design: the provider's retry timer is the only
    // latency bound, and correctness wins over async decoupling.
    generate_for_purchase(&state.generation, &mut purchase).await?;

    Ok(WebhookOutcome::Processed {
        purchase_id: purchase.id,
    })
}

/// Resolve the buyer: explicit metadata id first, then email lookup, then
/// the sentinel identity. Documents are still generated for the sentinel
/// and re-homed by reconciliation tooling later.
async fn resolve_user(state: &AppState, metadata_user_id: Option<&str>, email: &str) -> String {
    if let Some(id) = metadata_user_id {
        if !id.is_empty() {
            return id.to_string();
        }
    }
    if !email.is_empty() {
        if let Some(id) = state.resolve_user_by_email(email).await {
            return id;
        }
        log::warn!("No account matches customer email {}, using sentinel owner", email);
    } else {
        log::warn!("Event carried neither user id nor customer email, using sentinel owner");
    }
    UNKNOWN_USER.to_string()
}
