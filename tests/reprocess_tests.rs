mod common;

use std::sync::Arc;

use lexigen_server::generation::orchestrator::generate_for_purchase;
use lexigen_server::generation::renderer::ArtifactFormat;
use lexigen_server::generation::{reprocess_all, reprocess_purchase};
use lexigen_server::purchases::{ItemState, LedgerStore, LineItem, Purchase, PurchaseStatus};

use common::{
    generation_deps, test_harness, test_harness_with, AlwaysFailingClient, FormatFailingRenderer,
    StubRenderer,
};

fn purchase_with(items: Vec<LineItem>) -> Purchase {
    let total = items.iter().map(|i| i.unit_price * i.quantity as i64).sum();
    Purchase::new_pending("cs_repro", "u1", "buyer@example.com", items, total, "eur")
}

#[tokio::test]
async fn test_incomplete_item_is_regenerated() {
    // First pass with a broken DOCX renderer leaves two slots empty.
    let broken = test_harness_with(
        Arc::new(lexigen_server::generation::StubCompletionClient),
        Arc::new(FormatFailingRenderer {
            fail_format: ArtifactFormat::Docx,
        }),
    );
    let mut purchase = purchase_with(vec![LineItem::new("Demanda A", "Civil", "España", 500, 1)]);
    broken.ledger.create(&purchase).await.unwrap();
    generate_for_purchase(&generation_deps(&broken), &mut purchase)
        .await
        .unwrap();

    let ItemState::Completed { artifacts, .. } = &purchase.items[0].state else {
        panic!("item should be completed");
    };
    assert!(!artifacts.is_full());

    // Reprocess with a healthy renderer over the same ledger and storage.
    let healthy = test_harness_with(
        Arc::new(lexigen_server::generation::StubCompletionClient),
        Arc::new(StubRenderer),
    );
    let mut deps = generation_deps(&healthy);
    deps.ledger = broken.ledger.clone();
    deps.storage = broken.storage.clone();

    reprocess_purchase(&deps, &mut purchase).await.unwrap();

    let ItemState::Completed { artifacts, .. } = &purchase.items[0].state else {
        panic!("item should be completed after reprocessing");
    };
    assert!(artifacts.is_full());
    assert_eq!(purchase.status, PurchaseStatus::Completed);

    let stored = broken
        .ledger
        .find_by_id(purchase.id)
        .await
        .unwrap()
        .unwrap();
    let ItemState::Completed { artifacts, .. } = &stored.items[0].state else {
        panic!("stored item should be completed");
    };
    assert!(artifacts.is_full());
}

#[tokio::test]
async fn test_complete_item_is_left_untouched() {
    let harness = test_harness();
    let deps = generation_deps(&harness);

    let mut purchase = purchase_with(vec![LineItem::new("Demanda A", "Civil", "España", 500, 1)]);
    harness.ledger.create(&purchase).await.unwrap();
    generate_for_purchase(&deps, &mut purchase).await.unwrap();

    let objects_before = harness.storage.object_count().await;
    let snapshot = serde_json::to_value(&purchase.items).unwrap();

    reprocess_purchase(&deps, &mut purchase).await.unwrap();

    // Nothing regenerated: same artifacts, no new objects.
    assert_eq!(serde_json::to_value(&purchase.items).unwrap(), snapshot);
    assert_eq!(harness.storage.object_count().await, objects_before);
}

#[tokio::test]
async fn test_failed_item_recovers_on_reprocess() {
    let broken = test_harness_with(Arc::new(AlwaysFailingClient), Arc::new(StubRenderer));
    let mut purchase = purchase_with(vec![LineItem::new("Demanda A", "Civil", "España", 500, 1)]);
    broken.ledger.create(&purchase).await.unwrap();
    generate_for_purchase(&generation_deps(&broken), &mut purchase)
        .await
        .unwrap();
    assert_eq!(purchase.status, PurchaseStatus::Failed);

    let healthy = test_harness();
    let mut deps = generation_deps(&healthy);
    deps.ledger = broken.ledger.clone();
    deps.storage = broken.storage.clone();

    reprocess_purchase(&deps, &mut purchase).await.unwrap();

    assert_eq!(purchase.status, PurchaseStatus::Completed);
    assert_eq!(purchase.documents_generated, 1);
    assert_eq!(purchase.documents_failed, 0);
    assert_eq!(broken.storage.object_count().await, 5);
}

#[tokio::test]
async fn test_status_filtered_sweep_only_touches_matching_purchases() {
    let broken = test_harness_with(Arc::new(AlwaysFailingClient), Arc::new(StubRenderer));
    let broken_deps = generation_deps(&broken);

    // One failed purchase, one completed.
    let mut failed = purchase_with(vec![LineItem::new("Demanda A", "Civil", "España", 500, 1)]);
    failed.external_transaction_id = "cs_failed".to_string();
    broken.ledger.create(&failed).await.unwrap();
    generate_for_purchase(&broken_deps, &mut failed).await.unwrap();
    assert_eq!(failed.status, PurchaseStatus::Failed);

    let healthy = test_harness();
    let mut deps = generation_deps(&healthy);
    deps.ledger = broken.ledger.clone();
    deps.storage = broken.storage.clone();

    let mut completed = purchase_with(vec![LineItem::new("Demanda B", "Penal", "España", 700, 1)]);
    completed.external_transaction_id = "cs_ok".to_string();
    deps.ledger.create(&completed).await.unwrap();
    generate_for_purchase(&deps, &mut completed).await.unwrap();
    assert_eq!(completed.status, PurchaseStatus::Completed);
    let objects_before = broken.storage.object_count().await;

    reprocess_all(&deps, Some(PurchaseStatus::Failed)).await.unwrap();

    let failed_after = deps.ledger.find_by_id(failed.id).await.unwrap().unwrap();
    assert_eq!(failed_after.status, PurchaseStatus::Completed);
    // Five new artifacts for the healed purchase, none for the other.
    assert_eq!(broken.storage.object_count().await, objects_before + 5);
}
