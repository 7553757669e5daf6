//! HTTP boundary for checkout creation and webhook ingestion.

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use utoipa::ToSchema;

use crate::db::AppState;
use crate::purchases::models::LineItem;
use crate::ErrorResponse;

use super::event::CartItem;
use super::ingest::{process_event, WebhookError, WebhookOutcome};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCheckoutRequest {
    pub items: Vec<CartItem>,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "eur".to_string()
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateCheckoutResponse {
    pub session_id: String,
    /// Redirect target: the provider's hosted checkout page.
    pub checkout_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: String,
}

fn email_looks_valid(email: &str) -> bool {
    static EMAIL_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = EMAIL_RE.get_or_init(|| {
        regex::Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid")
    });
    re.is_match(email)
}

#[utoipa::path(
    post,
    path = "/api/checkout",
    tag = "Checkout",
    request_body = CreateCheckoutRequest,
    responses(
        (status = 200, description = "Hosted checkout session created", body = CreateCheckoutResponse),
        (status = 400, description = "Invalid cart or email", body = ErrorResponse),
        (status = 502, description = "Payment provider rejected the request", body = ErrorResponse)
    )
)]
pub async fn create_checkout(
    req: web::Json<CreateCheckoutRequest>,
    data: web::Data<AppState>,
) -> impl Responder {
    if req.items.is_empty() {
        return HttpResponse::BadRequest()
            .json(ErrorResponse::bad_request("Cart must contain at least one item"));
    }
    if !email_looks_valid(&req.customer_email) {
        return HttpResponse::BadRequest()
            .json(ErrorResponse::bad_request("Customer email is not valid"));
    }
    if req.items.iter().any(|i| i.price <= 0 || i.quantity == 0) {
        return HttpResponse::BadRequest().json(ErrorResponse::bad_request(
            "Item prices must be positive and quantities at least 1",
        ));
    }

    let items: Vec<LineItem> = req
        .items
        .iter()
        .map(|c| LineItem::new(&c.name, &c.area, &c.country, c.price, c.quantity))
        .collect();
    let user_id = data.resolve_user_by_email(&req.customer_email).await;

    match data
        .stripe
        .create_checkout_session(
            &items,
            &req.customer_email,
            user_id.as_deref(),
            &req.success_url,
            &req.cancel_url,
            &req.currency,
        )
        .await
    {
        Ok(session) => {
            info!(
                "Created checkout session {} for {} ({} item(s))",
                session.id,
                req.customer_email,
                items.len()
            );
            HttpResponse::Ok().json(CreateCheckoutResponse {
                session_id: session.id,
                checkout_url: session.url,
            })
        }
        Err(e) => {
            error!("Checkout session creation failed: {}", e);
            HttpResponse::BadGateway()
                .json(ErrorResponse::new("BadGateway", "Payment provider unavailable"))
        }
    }
}

#[utoipa::path(
    post,
    path = "/webhooks/payment",
    tag = "Checkout",
    request_body(content = String, content_type = "application/json"),
    responses(
        (status = 200, description = "Event processed or acknowledged as no-op", body = WebhookAck),
        (status = 400, description = "Malformed signature header or payload", body = ErrorResponse),
        (status = 401, description = "Signature verification failed", body = ErrorResponse),
        (status = 500, description = "Processing error; provider should retry", body = ErrorResponse)
    )
)]
pub async fn payment_webhook(
    req: HttpRequest,
    body: web::Bytes,
    data: web::Data<AppState>,
) -> impl Responder {
    let signature_header = req
        .headers()
        .get("Stripe-Signature")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    match process_event(&data, &body, signature_header).await {
        Ok(outcome) => {
            let outcome_label = match outcome {
                WebhookOutcome::Processed { purchase_id } => {
                    info!("Webhook processed, purchase {}", purchase_id);
                    "processed"
                }
                WebhookOutcome::Duplicate => "duplicate",
                WebhookOutcome::Ignored => "ignored",
            };
            HttpResponse::Ok().json(WebhookAck {
                received: true,
                outcome: outcome_label.to_string(),
            })
        }
        // Verification detail stays in the logs, not in the response.
        Err(WebhookError::InvalidSignature) => HttpResponse::Unauthorized()
            .json(ErrorResponse::new("Unauthorized", "Webhook rejected")),
        Err(WebhookError::MalformedSignature(e)) => {
            error!("Unparsable webhook signature header: {}", e);
            HttpResponse::BadRequest().json(ErrorResponse::bad_request("Webhook rejected"))
        }
        Err(WebhookError::MalformedEvent(e)) => {
            error!("Malformed webhook payload: {}", e);
            HttpResponse::BadRequest()
                .json(ErrorResponse::bad_request("Event payload could not be decoded"))
        }
        Err(WebhookError::Ledger(e)) => {
            error!("Ledger error while processing webhook: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Event processing failed"))
        }
    }
}
