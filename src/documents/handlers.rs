//! Purchase listing, artifact listing with fresh signed URLs, and
//! document download endpoints.

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log::error;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::middleware::{require_owner_or_admin, validate_request_token};
use crate::db::AppState;
use crate::purchases::models::{ArtifactKind, GeneratedUnit, ItemState, Purchase};
use crate::purchases::store::LedgerStore;
use crate::storage::{ObjectStorage, StorageError, SIGNED_URL_TTL_SECS};
use crate::ErrorResponse;

#[derive(Debug, Serialize, ToSchema)]
pub struct ArtifactLink {
    pub kind: ArtifactKind,
    pub artifact_id: String,
    /// Freshly signed; valid for the provider's maximum TTL from now.
    pub download_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnitArtifacts {
    pub document_id: Option<String>,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub links: Vec<ArtifactLink>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ItemArtifacts {
    pub item_id: Uuid,
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub units: Vec<UnitArtifacts>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PurchaseArtifactsResponse {
    pub purchase_id: Uuid,
    pub status: crate::purchases::models::PurchaseStatus,
    pub items: Vec<ItemArtifacts>,
}

/// List the caller's purchases
#[utoipa::path(
    get,
    path = "/api/purchases",
    tag = "Purchases",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Purchases owned by the caller", body = Vec<Purchase>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    )
)]
pub async fn list_my_purchases(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    let claims = match validate_request_token(&req) {
        Ok(c) => c,
        Err(e) => return e.error_response(),
    };

    match state.ledger.find_by_user(&claims.sub).await {
        Ok(purchases) => HttpResponse::Ok().json(purchases),
        Err(e) => {
            error!("Failed to list purchases for {}: {}", claims.sub, e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to list purchases"))
        }
    }
}

/// List a purchase's artifacts with freshly signed download URLs
#[utoipa::path(
    get,
    path = "/api/purchases/{id}/artifacts",
    tag = "Purchases",
    params(("id" = Uuid, Path, description = "Purchase ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Artifact listing", body = PurchaseArtifactsResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not the purchase owner", body = ErrorResponse),
        (status = 404, description = "Purchase not found", body = ErrorResponse)
    )
)]
pub async fn purchase_artifacts(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> impl Responder {
    let purchase_id = path.into_inner();

    let purchase = match state.ledger.find_by_id(purchase_id).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(ErrorResponse::not_found("Purchase not found"));
        }
        Err(e) => {
            error!("Purchase lookup {} failed: {}", purchase_id, e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Purchase lookup failed"));
        }
    };

    if let Err(e) = require_owner_or_admin(&req, &state, &purchase.user_id).await {
        return e.error_response();
    }

    let mut items = Vec::with_capacity(purchase.items.len());
    for item in &purchase.items {
        let (status, failure_reason, units) = match &item.state {
            ItemState::Pending => ("pending", None, Vec::new()),
            ItemState::Failed { reason } => ("failed", Some(reason.clone()), Vec::new()),
            ItemState::Completed { units, .. } => {
                let mut listed = Vec::with_capacity(units.len());
                for unit in units {
                    listed.push(resign_unit(&state, unit).await);
                }
                ("completed", None, listed)
            }
        };
        items.push(ItemArtifacts {
            item_id: item.id,
            name: item.name.clone(),
            status: status.to_string(),
            failure_reason,
            units,
        });
    }

    HttpResponse::Ok().json(PurchaseArtifactsResponse {
        purchase_id: purchase.id,
        status: purchase.status,
        items,
    })
}

/// Re-sign every populated slot of a unit. A slot whose re-signing fails
/// is dropped from the listing rather than served with a dead URL.
async fn resign_unit(state: &AppState, unit: &GeneratedUnit) -> UnitArtifacts {
    let mut links = Vec::new();
    for kind in ArtifactKind::ALL {
        let Some(artifact) = unit.artifacts.get(kind) else {
            continue;
        };
        match state
            .storage
            .signed_url(&artifact.storage_path, SIGNED_URL_TTL_SECS)
            .await
        {
            Ok(url) => links.push(ArtifactLink {
                kind,
                artifact_id: artifact.artifact_id.clone(),
                download_url: url,
            }),
            Err(e) => {
                error!("Re-signing {} failed: {}", artifact.storage_path, e);
            }
        }
    }
    UnitArtifacts {
        document_id: unit.document_id.clone(),
        generated_at: unit.generated_at,
        links,
    }
}

/// Download a document's representative artifact by document id
#[utoipa::path(
    get,
    path = "/api/documents/{document_id}",
    tag = "Purchases",
    params(("document_id" = String, Path, description = "Representative document ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Document bytes", content_type = "application/pdf"),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not the document owner", body = ErrorResponse),
        (status = 404, description = "Document not found", body = ErrorResponse)
    )
)]
pub async fn download_document(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let document_id = path.into_inner();

    let purchase = match state.ledger.find_by_document_id(&document_id).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(ErrorResponse::not_found("Document not found"));
        }
        Err(e) => {
            error!("Document lookup {} failed: {}", document_id, e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Document lookup failed"));
        }
    };

    if let Err(e) = require_owner_or_admin(&req, &state, &purchase.user_id).await {
        return e.error_response();
    }

    let Some((item, unit)) = purchase.find_document(&document_id) else {
        // The jsonb path matched but the in-memory scan did not; treat as
        // missing rather than serving an arbitrary unit.
        return HttpResponse::NotFound().json(ErrorResponse::not_found("Document not found"));
    };
    let Some(artifact) = unit.artifacts.representative() else {
        return HttpResponse::NotFound()
            .json(ErrorResponse::not_found("Document has no downloadable artifact"));
    };

    let bytes = match state.storage.download(&artifact.storage_path).await {
        Ok(bytes) => bytes,
        Err(StorageError::NotFound(path)) => {
            error!("Ledger references missing object {}", path);
            return HttpResponse::NotFound()
                .json(ErrorResponse::not_found("Document object is missing"));
        }
        Err(e) => {
            error!("Download of {} failed: {}", artifact.storage_path, e);
            return HttpResponse::BadGateway()
                .json(ErrorResponse::new("BadGateway", "Storage unavailable"));
        }
    };

    let content_type = mime_guess::from_path(&artifact.storage_path)
        .first_or_octet_stream()
        .to_string();
    let extension = artifact
        .storage_path
        .rsplit('.')
        .next()
        .unwrap_or("pdf");
    let filename = format!("{}.{}", sanitize_filename::sanitize(&item.name), extension);

    HttpResponse::Ok()
        .content_type(content_type)
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{filename}\""),
        ))
        .body(bytes)
}

/// Configure purchase/document read routes
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/purchases", web::get().to(list_my_purchases))
        .route(
            "/purchases/{id}/artifacts",
            web::get().to(purchase_artifacts),
        )
        .route("/documents/{document_id}", web::get().to(download_document));
}
