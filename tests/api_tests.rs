mod common;

use actix_web::{test, web, App};

use lexigen_server::auth::jwt::generate_access_token;
use lexigen_server::purchases::{LedgerStore, LineItem, Purchase};
use lexigen_server::users::model::{Role, UserAccount};
use lexigen_server::{admin, documents};

use common::{generation_deps, test_harness, TestHarness};

fn account(id: &str, email: &str, role: Role) -> UserAccount {
    UserAccount {
        id: id.to_string(),
        email: email.to_string(),
        display_name: None,
        role,
        password_hash: None,
        refresh_token: None,
        created_at: None,
    }
}

/// Seed a fully generated purchase for `user_id` and return it.
async fn seed_purchase(harness: &TestHarness, user_id: &str, tx: &str) -> Purchase {
    let mut purchase = Purchase::new_pending(
        tx,
        user_id,
        "buyer@example.com",
        vec![LineItem::new("Demanda A", "Civil", "España", 500, 1)],
        500,
        "eur",
    );
    harness.ledger.create(&purchase).await.unwrap();
    lexigen_server::generation::orchestrator::generate_for_purchase(
        &generation_deps(harness),
        &mut purchase,
    )
    .await
    .unwrap();
    purchase
}

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(
            App::new().app_data(web::Data::new($state.clone())).service(
                web::scope("/api")
                    .configure(documents::handlers::config)
                    .configure(admin::handlers::config),
            ),
        )
        .await
    };
}

#[actix_web::test]
async fn test_purchase_listing_is_scoped_to_the_caller() {
    let harness = test_harness();
    harness.users.insert(account("u1", "a@example.com", Role::User));
    harness.users.insert(account("u2", "b@example.com", Role::User));
    seed_purchase(&harness, "u1", "cs_a").await;
    seed_purchase(&harness, "u2", "cs_b").await;

    let app = test_app!(harness.state);
    let token = generate_access_token("u1", "a@example.com").unwrap();

    let req = test::TestRequest::get()
        .uri("/api/purchases")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let purchases: Vec<Purchase> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(purchases.len(), 1);
    assert_eq!(purchases[0].external_transaction_id, "cs_a");

    // No token: 401.
    let req = test::TestRequest::get().uri("/api/purchases").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn test_artifact_listing_reissues_signed_urls() {
    let harness = test_harness();
    harness.users.insert(account("u1", "a@example.com", Role::User));
    let purchase = seed_purchase(&harness, "u1", "cs_a").await;

    let app = test_app!(harness.state);
    let token = generate_access_token("u1", "a@example.com").unwrap();

    let req = test::TestRequest::get()
        .uri(&format!("/api/purchases/{}/artifacts", purchase.id))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "completed");
    let links = body["items"][0]["units"][0]["links"].as_array().unwrap();
    assert_eq!(links.len(), 5);
    for link in links {
        let url = link["download_url"].as_str().unwrap();
        assert!(url.starts_with("http://storage.test/signed/"));
    }
}

#[actix_web::test]
async fn test_artifact_listing_rejects_other_users() {
    let harness = test_harness();
    harness.users.insert(account("u1", "a@example.com", Role::User));
    harness.users.insert(account("u2", "b@example.com", Role::User));
    harness.users.insert(account("adm", "x@example.com", Role::Admin));
    let purchase = seed_purchase(&harness, "u1", "cs_a").await;

    let app = test_app!(harness.state);
    let uri = format!("/api/purchases/{}/artifacts", purchase.id);

    let other = generate_access_token("u2", "b@example.com").unwrap();
    let req = test::TestRequest::get()
        .uri(&uri)
        .insert_header(("Authorization", format!("Bearer {other}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    // Admins can see any purchase.
    let admin_token = generate_access_token("adm", "x@example.com").unwrap();
    let req = test::TestRequest::get()
        .uri(&uri)
        .insert_header(("Authorization", format!("Bearer {admin_token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn test_document_download_serves_the_representative_artifact() {
    let harness = test_harness();
    harness.users.insert(account("u1", "a@example.com", Role::User));
    let purchase = seed_purchase(&harness, "u1", "cs_a").await;

    let document_id = match &purchase.items[0].state {
        lexigen_server::purchases::ItemState::Completed { units, .. } => {
            units[0].document_id.clone().unwrap()
        }
        _ => panic!("item should be completed"),
    };

    let app = test_app!(harness.state);
    let token = generate_access_token("u1", "a@example.com").unwrap();

    let req = test::TestRequest::get()
        .uri(&format!("/api/documents/{document_id}"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("Content-Type").unwrap(),
        "application/pdf"
    );
    let disposition = resp
        .headers()
        .get("Content-Disposition")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(disposition.contains("Demanda A.pdf"));
    let body = test::read_body(resp).await;
    assert!(body.starts_with(b"%PDF-stub"));

    // Unknown document id: 404.
    let token = generate_access_token("u1", "a@example.com").unwrap();
    let req = test::TestRequest::get()
        .uri("/api/documents/does-not-exist")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_admin_endpoints_require_the_admin_role() {
    let harness = test_harness();
    harness.users.insert(account("u1", "a@example.com", Role::User));
    harness.users.insert(account("adm", "x@example.com", Role::Admin));
    seed_purchase(&harness, "u1", "cs_a").await;

    let app = test_app!(harness.state);

    let user_token = generate_access_token("u1", "a@example.com").unwrap();
    let req = test::TestRequest::get()
        .uri("/api/admin/purchases")
        .insert_header(("Authorization", format!("Bearer {user_token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    let admin_token = generate_access_token("adm", "x@example.com").unwrap();
    let req = test::TestRequest::get()
        .uri("/api/admin/purchases?status=completed")
        .insert_header(("Authorization", format!("Bearer {admin_token}")))
        .to_request();
    let purchases: Vec<Purchase> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(purchases.len(), 1);

    // Sentinel-owner listing is how unclaimed purchases are found.
    let req = test::TestRequest::get()
        .uri("/api/admin/users/unknown/purchases")
        .insert_header(("Authorization", format!("Bearer {admin_token}")))
        .to_request();
    let purchases: Vec<Purchase> = test::call_and_read_body_json(&app, req).await;
    assert!(purchases.is_empty());
}

#[actix_web::test]
async fn test_admin_reprocess_endpoint_returns_the_updated_purchase() {
    let harness = test_harness();
    harness.users.insert(account("adm", "x@example.com", Role::Admin));
    let purchase = seed_purchase(&harness, "u1", "cs_a").await;

    let app = test_app!(harness.state);
    let admin_token = generate_access_token("adm", "x@example.com").unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/api/admin/purchases/{}/reprocess", purchase.id))
        .insert_header(("Authorization", format!("Bearer {admin_token}")))
        .to_request();
    let updated: Purchase = test::call_and_read_body_json(&app, req).await;
    assert_eq!(updated.id, purchase.id);
    assert_eq!(updated.documents_generated, 1);
}
