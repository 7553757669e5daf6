//! Fan-out generation orchestrator.
//!
//! For each purchased line item, produces `quantity` generated units, each
//! holding up to five artifacts: (template, sample) x (PDF, DOCX) plus a
//! study-material PDF. Sub-artifact failures leave their slot empty and
//! never abort the item; a line item's total failure never aborts the
//! purchase. The purchase-level rollup treats partial success as success.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::purchases::{
    ArtifactKind, ArtifactRef, ArtifactSet, GeneratedUnit, ItemState, LedgerError, LedgerStore,
    LineItem, Purchase,
};
use crate::storage::{artifact_path, ObjectStorage, SIGNED_URL_TTL_SECS};

use super::content::{ContentGenerator, DocumentVariant};
use super::renderer::{ArtifactFormat, DocumentRenderer, RenderRequest};

/// Collaborators the orchestrator fans out to.
#[derive(Clone)]
pub struct GenerationDeps {
    pub generator: Arc<ContentGenerator>,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub storage: Arc<dyn ObjectStorage>,
    pub ledger: Arc<dyn LedgerStore>,
}

/// Run the full generation pass for a freshly created ledger entry.
///
/// The webhook handler waits for this to finish before acknowledging;
/// added latency is accepted for correctness over async decoupling. The
/// ledger is updated after every item so a crash mid-purchase leaves an
/// inspectable partial record, and once more with the final rollup.
pub async fn generate_for_purchase(
    deps: &GenerationDeps,
    purchase: &mut Purchase,
) -> Result<(), LedgerError> {
    log::info!(
        "Generating documents for purchase {} ({} item(s), tx {})",
        purchase.id,
        purchase.items.len(),
        purchase.external_transaction_id
    );

    let user_id = purchase.user_id.clone();
    for index in 0..purchase.items.len() {
        let item = purchase.items[index].clone();
        let state = run_item(deps, &user_id, &item).await;
        purchase.items[index].state = state;

        // Persist per-item progress before moving to the next item.
        purchase.recompute_rollup();
        deps.ledger
            .update_items(
                purchase.id,
                &purchase.items,
                purchase.status,
                purchase.documents_generated,
                purchase.documents_failed,
            )
            .await?;
    }

    purchase.recompute_rollup();
    deps.ledger
        .update_items(
            purchase.id,
            &purchase.items,
            purchase.status,
            purchase.documents_generated,
            purchase.documents_failed,
        )
        .await?;

    log::info!(
        "Purchase {} finished: {} generated, {} failed, status {}",
        purchase.id,
        purchase.documents_generated,
        purchase.documents_failed,
        purchase.status.as_str()
    );
    Ok(())
}

/// Attempt all `quantity` units of one line item and decide its state.
///
/// `Completed` means every unit was attempted, not that every sub-artifact
/// succeeded. The one stricter rule: an item where every slot of every
/// unit came up empty is marked `Failed`, since a paid item with nothing
/// downloadable is a failure from the buyer's side.
pub(crate) async fn run_item(deps: &GenerationDeps, user_id: &str, item: &LineItem) -> ItemState {
    let mut units = Vec::with_capacity(item.quantity as usize);
    for unit_index in 0..item.quantity {
        let unit = run_unit(deps, user_id, item, unit_index).await;
        units.push(unit);
    }

    if units.iter().all(|u| u.artifacts.is_empty()) {
        log::error!(
            "Item '{}': every artifact attempt failed across {} unit(s)",
            item.name,
            units.len()
        );
        return ItemState::Failed {
            reason: "no artifacts produced".to_string(),
        };
    }

    // Representative artifact set of the first unit is copied up for
    // single-document consumers.
    let artifacts = units
        .first()
        .map(|u| u.artifacts.clone())
        .unwrap_or_default();
    ItemState::Completed { artifacts, units }
}

async fn run_unit(
    deps: &GenerationDeps,
    user_id: &str,
    item: &LineItem,
    unit_index: u32,
) -> GeneratedUnit {
    let mut artifacts = ArtifactSet::default();

    produce_variant(
        deps,
        user_id,
        item,
        DocumentVariant::Template,
        &[
            (ArtifactKind::TemplatePdf, ArtifactFormat::Pdf),
            (ArtifactKind::TemplateDocx, ArtifactFormat::Docx),
        ],
        &mut artifacts,
    )
    .await;

    produce_variant(
        deps,
        user_id,
        item,
        DocumentVariant::Sample,
        &[
            (ArtifactKind::SamplePdf, ArtifactFormat::Pdf),
            (ArtifactKind::SampleDocx, ArtifactFormat::Docx),
        ],
        &mut artifacts,
    )
    .await;

    // Study material ships as PDF only.
    produce_variant(
        deps,
        user_id,
        item,
        DocumentVariant::StudyMaterial,
        &[(ArtifactKind::StudyMaterialPdf, ArtifactFormat::Pdf)],
        &mut artifacts,
    )
    .await;

    let document_id = artifacts.representative().map(|a| a.artifact_id.clone());
    log::debug!(
        "Item '{}' unit {}: representative document {:?}",
        item.name,
        unit_index,
        document_id
    );

    GeneratedUnit {
        artifacts,
        document_id,
        generated_at: Utc::now(),
    }
}

/// Generate one variant's text and persist it in every requested format.
///
/// Failure of any step leaves the corresponding slot(s) empty; nothing
/// here aborts the unit.
async fn produce_variant(
    deps: &GenerationDeps,
    user_id: &str,
    item: &LineItem,
    variant: DocumentVariant,
    slots: &[(ArtifactKind, ArtifactFormat)],
    artifacts: &mut ArtifactSet,
) {
    let text = match deps
        .generator
        .generate(variant, &item.name, &item.area, &item.jurisdiction)
        .await
    {
        Ok(text) => text,
        Err(e) => {
            log::warn!(
                "Item '{}': {} text generation failed, leaving {} slot(s) empty: {}",
                item.name,
                variant.as_str(),
                slots.len(),
                e
            );
            return;
        }
    };

    let request = RenderRequest {
        title: item.name.clone(),
        body: text,
    };

    for (kind, format) in slots {
        match persist_artifact(deps, user_id, &request, *kind, *format).await {
            Ok(artifact) => artifacts.set(*kind, artifact),
            Err(e) => {
                log::warn!(
                    "Item '{}': artifact {} failed, slot left empty: {}",
                    item.name,
                    kind.as_str(),
                    e
                );
            }
        }
    }
}

async fn persist_artifact(
    deps: &GenerationDeps,
    user_id: &str,
    request: &RenderRequest,
    kind: ArtifactKind,
    format: ArtifactFormat,
) -> Result<ArtifactRef, String> {
    let bytes = deps
        .renderer
        .render(request, format)
        .await
        .map_err(|e| e.to_string())?;

    let artifact_id = Uuid::new_v4().to_string();
    let path = artifact_path(user_id, &artifact_id, kind.extension());
    deps.storage
        .persist(&path, &bytes, kind.content_type())
        .await
        .map_err(|e| e.to_string())?;

    let download_url = deps
        .storage
        .signed_url(&path, SIGNED_URL_TTL_SECS)
        .await
        .map_err(|e| e.to_string())?;

    Ok(ArtifactRef {
        artifact_id,
        storage_path: path,
        download_url,
    })
}
