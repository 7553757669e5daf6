#![allow(dead_code)]

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;

use lexigen_server::checkout::stripe::StripeClient;
use lexigen_server::config::StripeConfig;
use lexigen_server::db::AppState;
use lexigen_server::generation::renderer::{ArtifactFormat, DocumentRenderer, RenderError, RenderRequest};
use lexigen_server::generation::{
    CompletionClient, ContentGenerator, GenerationDeps, GenerationError, RetryPolicy,
    StubCompletionClient,
};
use lexigen_server::purchases::MemoryLedgerStore;
use lexigen_server::storage::{ObjectStorage, StorageError};
use lexigen_server::users::directory::MemoryUserDirectory;

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test123secret456";

/// In-memory object storage for tests
pub struct MemoryObjectStorage {
    objects: tokio::sync::Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStorage {
    pub fn new() -> Self {
        Self {
            objects: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    pub async fn has_object(&self, path: &str) -> bool {
        self.objects.lock().await.contains_key(path)
    }

    pub async fn object_count(&self) -> usize {
        self.objects.lock().await.len()
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn persist(
        &self,
        path: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<(), StorageError> {
        self.objects
            .lock()
            .await
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn signed_url(&self, path: &str, ttl_secs: u64) -> Result<String, StorageError> {
        if !self.objects.lock().await.contains_key(path) {
            return Err(StorageError::NotFound(path.to_string()));
        }
        Ok(format!("http://storage.test/signed/{path}?ttl={ttl_secs}"))
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }
}

/// Renderer stub: returns small fixed payloads instead of spawning Typst
/// or Pandoc.
pub struct StubRenderer;

#[async_trait]
impl DocumentRenderer for StubRenderer {
    async fn render(
        &self,
        request: &RenderRequest,
        format: ArtifactFormat,
    ) -> Result<Vec<u8>, RenderError> {
        let tag = match format {
            ArtifactFormat::Pdf => "%PDF-stub",
            ArtifactFormat::Docx => "PK-docx-stub",
        };
        Ok(format!("{tag}:{}", request.title).into_bytes())
    }
}

/// Renderer stub that fails for one format, leaving those slots empty.
pub struct FormatFailingRenderer {
    pub fail_format: ArtifactFormat,
}

#[async_trait]
impl DocumentRenderer for FormatFailingRenderer {
    async fn render(
        &self,
        request: &RenderRequest,
        format: ArtifactFormat,
    ) -> Result<Vec<u8>, RenderError> {
        if format == self.fail_format {
            return Err(RenderError::ToolExit { tool: "stub", code: 1 });
        }
        StubRenderer.render(request, format).await
    }
}

/// Completion client that fails whenever the user prompt contains the
/// given substring, so single variants can be knocked out.
pub struct VariantFailingClient {
    pub fail_if_prompt_contains: &'static str,
}

#[async_trait]
impl CompletionClient for VariantFailingClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        if user.contains(self.fail_if_prompt_contains) {
            return Err(GenerationError::Provider(500));
        }
        StubCompletionClient.complete(system, user).await
    }
}

/// Completion client that always fails.
pub struct AlwaysFailingClient;

#[async_trait]
impl CompletionClient for AlwaysFailingClient {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Provider(503))
    }
}

pub struct TestHarness {
    pub state: AppState,
    pub ledger: Arc<MemoryLedgerStore>,
    pub users: Arc<MemoryUserDirectory>,
    pub storage: Arc<MemoryObjectStorage>,
}

/// AppState over in-memory stores, a stub completion client and a stub
/// renderer.
pub fn test_harness() -> TestHarness {
    test_harness_with(Arc::new(StubCompletionClient), Arc::new(StubRenderer))
}

pub fn test_harness_with(
    client: Arc<dyn CompletionClient>,
    renderer: Arc<dyn DocumentRenderer>,
) -> TestHarness {
    let ledger = Arc::new(MemoryLedgerStore::new());
    let users = Arc::new(MemoryUserDirectory::new());
    let storage = Arc::new(MemoryObjectStorage::new());

    let generator = Arc::new(ContentGenerator::new(
        client,
        RetryPolicy {
            max_attempts: 1,
            base_backoff: std::time::Duration::from_millis(1),
        },
    ));
    let stripe = Arc::new(StripeClient::new(
        StripeConfig {
            secret_key: "sk_test_xxx".to_string(),
            webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
            api_base: "http://stripe.test".to_string(),
        },
        reqwest::Client::new(),
    ));

    let state = AppState::with_components(
        ledger.clone(),
        users.clone(),
        storage.clone(),
        generator,
        renderer,
        stripe,
        reqwest::Client::new(),
    );

    TestHarness {
        state,
        ledger,
        users,
        storage,
    }
}

pub fn generation_deps(harness: &TestHarness) -> GenerationDeps {
    harness.state.generation.clone()
}

/// Sign a webhook payload the way the provider does.
pub fn sign_payload(payload: &[u8], secret: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    )
}

/// A paid one-time-payment checkout event with the given session id and
/// cart metadata.
pub fn checkout_event(session_id: &str, email: &str, items_json: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": session_id,
                "mode": "payment",
                "payment_status": "paid",
                "amount_total": 1500,
                "currency": "eur",
                "customer_email": email,
                "metadata": { "items": items_json }
            }
        }
    }))
    .unwrap()
}

pub const SINGLE_ITEM_CART: &str =
    r#"[{"name":"Demanda de divorcio","price":1500,"quantity":1,"area":"Civil","country":"España"}]"#;
