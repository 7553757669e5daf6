//! On-demand reprocessing sweep.
//!
//! The orchestrator never retries a failed sub-artifact; this sweep is the
//! retry mechanism, run by an operator when buyers report missing files.
//! Its completeness bar is stricter than the orchestrator's: an item only
//! passes when it is completed AND all five slots are present. Anything
//! less regenerates the whole item from scratch - simpler and safer than
//! patching individual slots.

use crate::purchases::{ItemState, LedgerError, LedgerStore, Purchase, PurchaseStatus};

use super::orchestrator::{run_item, GenerationDeps};

/// Re-examine one purchase and regenerate every incomplete item.
pub async fn reprocess_purchase(
    deps: &GenerationDeps,
    purchase: &mut Purchase,
) -> Result<(), LedgerError> {
    let user_id = purchase.user_id.clone();
    let mut regenerated = 0usize;

    for index in 0..purchase.items.len() {
        let item = purchase.items[index].clone();
        if let ItemState::Completed { artifacts, .. } = &item.state {
            if artifacts.is_full() {
                log::debug!(
                    "Purchase {}: item '{}' already has all five artifacts, skipping",
                    purchase.id,
                    item.name
                );
                continue;
            }
        }

        log::info!(
            "Purchase {}: regenerating item '{}' (incomplete artifact set)",
            purchase.id,
            item.name
        );
        purchase.items[index].state = run_item(deps, &user_id, &item).await;
        regenerated += 1;
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
        "Purchase {} reprocessed: {} item(s) regenerated, status {}",
        purchase.id,
        regenerated,
        purchase.status.as_str()
    );
    Ok(())
}

/// Sweep every purchase (optionally filtered by status).
///
/// Per-purchase failures are logged and the sweep continues; only a
/// failure to enumerate the ledger propagates.
pub async fn reprocess_all(
    deps: &GenerationDeps,
    filter: Option<PurchaseStatus>,
) -> Result<(), LedgerError> {
    let purchases = deps.ledger.list(filter).await?;
    log::info!(
        "Reprocess sweep over {} purchase(s){}",
        purchases.len(),
        filter.map_or(String::new(), |s| format!(" with status {}", s.as_str()))
    );

    for mut purchase in purchases {
        if let Err(e) = reprocess_purchase(deps, &mut purchase).await {
            log::error!("Reprocessing purchase {} failed: {}", purchase.id, e);
        }
    }
    Ok(())
}
