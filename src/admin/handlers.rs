use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log::error;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::auth::middleware::require_admin;
use crate::db::AppState;
use crate::generation::reprocess_purchase;
use crate::purchases::models::{Purchase, PurchaseStatus};
use crate::purchases::store::LedgerStore;
use crate::ErrorResponse;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListPurchasesQuery {
    /// Filter by rollup status: pending, completed or failed.
    pub status: Option<String>,
}

/// List all purchases, optionally filtered by status
#[utoipa::path(
    get,
    path = "/api/admin/purchases",
    tag = "Admin",
    params(ListPurchasesQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Purchase list", body = Vec<Purchase>),
        (status = 400, description = "Unknown status filter", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin access required", body = ErrorResponse)
    )
)]
pub async fn list_purchases(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<ListPurchasesQuery>,
) -> impl Responder {
    if let Err(e) = require_admin(&req, &state).await {
        return e.error_response();
    }

    let filter = match query.status.as_deref() {
        None => None,
        Some(raw) => match PurchaseStatus::parse(raw) {
            Some(status) => Some(status),
            None => {
                return HttpResponse::BadRequest().json(ErrorResponse::bad_request(
                    "Status must be pending, completed or failed",
                ));
            }
        },
    };

    match state.ledger.list(filter).await {
        Ok(purchases) => HttpResponse::Ok().json(purchases),
        Err(e) => {
            error!("Admin purchase listing failed: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to list purchases"))
        }
    }
}

/// List one user's purchases
///
/// Passing the literal id `unknown` lists purchases whose buyer was never
/// matched to an account, which is how unclaimed documents are found
/// during reconciliation.
#[utoipa::path(
    get,
    path = "/api/admin/users/{id}/purchases",
    tag = "Admin",
    params(("id" = String, Path, description = "User ID or the sentinel `unknown`")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Purchases owned by the user", body = Vec<Purchase>),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin access required", body = ErrorResponse)
    )
)]
pub async fn user_purchases(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    if let Err(e) = require_admin(&req, &state).await {
        return e.error_response();
    }

    let user_id = path.into_inner();
    match state.ledger.find_by_user(&user_id).await {
        Ok(purchases) => HttpResponse::Ok().json(purchases),
        Err(e) => {
            error!("Admin purchase listing for user {} failed: {}", user_id, e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to list purchases"))
        }
    }
}

/// Regenerate every incomplete item of one purchase
#[utoipa::path(
    post,
    path = "/api/admin/purchases/{id}/reprocess",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "Purchase ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Purchase after reprocessing", body = Purchase),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin access required", body = ErrorResponse),
        (status = 404, description = "Purchase not found", body = ErrorResponse)
    )
)]
pub async fn reprocess(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> impl Responder {
    let claims = match require_admin(&req, &state).await {
        Ok(c) => c,
        Err(e) => return e.error_response(),
    };

    let purchase_id = path.into_inner();
    let mut purchase = match state.ledger.find_by_id(purchase_id).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            return HttpResponse::NotFound().json(ErrorResponse::not_found("Purchase not found"));
        }
        Err(e) => {
            error!("Purchase lookup {} failed: {}", purchase_id, e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Purchase lookup failed"));
        }
    };

    log::info!(
        "Admin {} requested reprocessing of purchase {}",
        claims.sub,
        purchase_id
    );
    match reprocess_purchase(&state.generation, &mut purchase).await {
        Ok(()) => HttpResponse::Ok().json(purchase),
        Err(e) => {
            error!("Reprocessing purchase {} failed: {}", purchase_id, e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Reprocessing failed"))
        }
    }
}

/// Configure admin routes
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/purchases", web::get().to(list_purchases))
            .route("/users/{id}/purchases", web::get().to(user_purchases))
            .route("/purchases/{id}/reprocess", web::post().to(reprocess)),
    );
}
