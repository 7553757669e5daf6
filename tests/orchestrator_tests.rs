mod common;

use std::sync::Arc;

use lexigen_server::generation::orchestrator::generate_for_purchase;
use lexigen_server::generation::renderer::ArtifactFormat;
use lexigen_server::purchases::{ItemState, LedgerStore, LineItem, Purchase, PurchaseStatus};

use common::{
    generation_deps, test_harness, test_harness_with, AlwaysFailingClient, FormatFailingRenderer,
    StubRenderer, VariantFailingClient,
};

fn purchase_with(items: Vec<LineItem>) -> Purchase {
    let total = items.iter().map(|i| i.unit_price * i.quantity as i64).sum();
    Purchase::new_pending("cs_orch", "u1", "buyer@example.com", items, total, "eur")
}

#[tokio::test]
async fn test_partial_failure_still_completes_the_purchase() {
    // All variants of "Demanda B" fail; A and C generate normally.
    let harness = test_harness_with(
        Arc::new(VariantFailingClient {
            fail_if_prompt_contains: "Demanda B",
        }),
        Arc::new(StubRenderer),
    );
    let deps = generation_deps(&harness);

    let mut purchase = purchase_with(vec![
        LineItem::new("Demanda A", "Civil", "España", 500, 1),
        LineItem::new("Demanda B", "Penal", "España", 700, 1),
        LineItem::new("Demanda C", "Laboral", "España", 900, 1),
    ]);
    harness.ledger.create(&purchase).await.unwrap();

    generate_for_purchase(&deps, &mut purchase).await.unwrap();

    assert_eq!(purchase.status, PurchaseStatus::Completed);
    assert_eq!(purchase.documents_generated, 2);
    assert_eq!(purchase.documents_failed, 1);
    assert!(purchase.items[0].state.is_completed());
    let ItemState::Failed { reason } = &purchase.items[1].state else {
        panic!("item B should have failed");
    };
    assert_eq!(reason, "no artifacts produced");
    assert!(purchase.items[2].state.is_completed());

    // The persisted snapshot matches the in-memory result.
    let stored = harness
        .ledger
        .find_by_id(purchase.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PurchaseStatus::Completed);
    assert_eq!(stored.documents_failed, 1);
}

#[tokio::test]
async fn test_every_item_failing_fails_the_purchase() {
    let harness = test_harness_with(Arc::new(AlwaysFailingClient), Arc::new(StubRenderer));
    let deps = generation_deps(&harness);

    let mut purchase = purchase_with(vec![
        LineItem::new("Demanda A", "Civil", "España", 500, 1),
        LineItem::new("Demanda B", "Penal", "España", 700, 1),
    ]);
    harness.ledger.create(&purchase).await.unwrap();

    generate_for_purchase(&deps, &mut purchase).await.unwrap();

    assert_eq!(purchase.status, PurchaseStatus::Failed);
    assert_eq!(purchase.documents_generated, 0);
    assert_eq!(purchase.documents_failed, 2);
    assert_eq!(harness.storage.object_count().await, 0);
}

#[tokio::test]
async fn test_representative_falls_back_when_study_material_fails() {
    // Study-material prompts ask for "material de estudio"; knock out only
    // that variant.
    let harness = test_harness_with(
        Arc::new(VariantFailingClient {
            fail_if_prompt_contains: "material de estudio",
        }),
        Arc::new(StubRenderer),
    );
    let deps = generation_deps(&harness);

    let mut purchase = purchase_with(vec![LineItem::new("Demanda A", "Civil", "España", 500, 1)]);
    harness.ledger.create(&purchase).await.unwrap();

    generate_for_purchase(&deps, &mut purchase).await.unwrap();

    assert_eq!(purchase.status, PurchaseStatus::Completed);
    let ItemState::Completed { artifacts, units } = &purchase.items[0].state else {
        panic!("item should be completed");
    };
    assert!(artifacts.study_material_pdf.is_none());
    assert!(artifacts.sample_pdf.is_some());
    // Representative document id follows the preference order down to the
    // sample PDF.
    assert_eq!(
        units[0].document_id.as_deref(),
        Some(artifacts.sample_pdf.as_ref().unwrap().artifact_id.as_str())
    );
    // Four artifacts persisted: template and sample in both formats.
    assert_eq!(harness.storage.object_count().await, 4);
}

#[tokio::test]
async fn test_quantity_fans_out_into_units() {
    let harness = test_harness();
    let deps = generation_deps(&harness);

    let mut purchase = purchase_with(vec![LineItem::new("Demanda A", "Civil", "España", 500, 3)]);
    harness.ledger.create(&purchase).await.unwrap();

    generate_for_purchase(&deps, &mut purchase).await.unwrap();

    let ItemState::Completed { units, .. } = &purchase.items[0].state else {
        panic!("item should be completed");
    };
    assert_eq!(units.len(), 3);
    assert!(units.iter().all(|u| u.artifacts.is_full()));
    assert_eq!(harness.storage.object_count().await, 15);

    // Each unit has its own representative document.
    let ids: Vec<_> = units.iter().filter_map(|u| u.document_id.clone()).collect();
    assert_eq!(ids.len(), 3);
    assert!(ids.iter().all(|id| !id.is_empty()));
}

#[tokio::test]
async fn test_docx_failure_leaves_slots_empty_but_item_completes() {
    let harness = test_harness_with(
        Arc::new(lexigen_server::generation::StubCompletionClient),
        Arc::new(FormatFailingRenderer {
            fail_format: ArtifactFormat::Docx,
        }),
    );
    let deps = generation_deps(&harness);

    let mut purchase = purchase_with(vec![LineItem::new("Demanda A", "Civil", "España", 500, 1)]);
    harness.ledger.create(&purchase).await.unwrap();

    generate_for_purchase(&deps, &mut purchase).await.unwrap();

    assert_eq!(purchase.status, PurchaseStatus::Completed);
    let ItemState::Completed { artifacts, .. } = &purchase.items[0].state else {
        panic!("item should be completed");
    };
    assert!(artifacts.template_pdf.is_some());
    assert!(artifacts.template_docx.is_none());
    assert!(artifacts.sample_docx.is_none());
    assert!(artifacts.study_material_pdf.is_some());
    assert_eq!(harness.storage.object_count().await, 3);
}
