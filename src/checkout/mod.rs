//! Checkout and payment-event processing.
//!
//! - `stripe` - provider client: webhook signature verification and
//!   hosted-checkout session creation
//! - `event` - webhook event model, eligibility and cart reconstruction
//! - `ingest` - the verify -> dedupe -> ledger -> orchestrate pipeline
//! - `handlers` - HTTP boundary

pub mod event;
pub mod handlers;
pub mod ingest;
pub mod stripe;

pub use event::{CartItem, CheckoutSessionObject, WebhookEvent};
pub use ingest::{process_event, WebhookError, WebhookOutcome};
pub use stripe::{CheckoutSession, SignatureError, StripeClient};
