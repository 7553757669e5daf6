//! Database module - AppState and Postgres-backed stores.
//!
//! Split into submodules for separation of concerns:
//! - `purchase` - purchase ledger persistence (JSONB items)
//! - `users` - user directory persistence

pub mod purchase;
pub mod users;

use moka::future::Cache;
use sqlx::PgPool;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::checkout::stripe::StripeClient;
use crate::config::{CompletionConfig, StripeConfig, SupabaseConfig};
use crate::generation::{
    CliRenderEngine, ContentGenerator, DocumentRenderer, GenerationDeps, HttpCompletionClient,
    RetryPolicy, StubCompletionClient,
};
use crate::purchases::LedgerStore;
use crate::storage::{ObjectStorage, SupabaseStorage};
use crate::users::UserDirectory;

pub use purchase::PgLedgerStore;
pub use users::PgUserDirectory;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn LedgerStore>,
    pub users: Arc<dyn UserDirectory>,
    pub storage: Arc<dyn ObjectStorage>,
    pub stripe: Arc<StripeClient>,
    pub generation: GenerationDeps,
    /// Email -> resolved user id; webhook-time identity resolution hits
    /// this before the directory.
    pub email_cache: Cache<String, Option<String>>,
    pub http_client: reqwest::Client,
}

impl AppState {
    /// Production wiring: Postgres stores, Supabase storage, HTTP
    /// completion client, CLI renderers.
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let database_url = crate::config::database_url()?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(50)
            .min_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(900))
            .connect(&database_url)
            .await?;

        let http_client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(900))
            .user_agent("lexigen-server/0.3")
            .build()
            .expect("Failed to create reqwest client");

        let storage: Arc<dyn ObjectStorage> = Arc::new(SupabaseStorage::new(
            SupabaseConfig::from_env()?,
            http_client.clone(),
        ));
        let ledger: Arc<dyn LedgerStore> = Arc::new(PgLedgerStore::new(pool.clone()));
        let users: Arc<dyn UserDirectory> = Arc::new(PgUserDirectory::new(pool.clone()));
        let stripe = Arc::new(StripeClient::new(
            StripeConfig::from_env()?,
            http_client.clone(),
        ));

        let completion_config = CompletionConfig::from_env()?;
        let retry = RetryPolicy::new(completion_config.max_attempts);
        let mut generator = ContentGenerator::new(
            Arc::new(HttpCompletionClient::new(
                completion_config,
                http_client.clone(),
            )),
            retry,
        );
        // Fallback strategy is decided at wiring time, never at call time.
        if env::var("COMPLETION_STUB_FALLBACK").as_deref() == Ok("1") {
            log::warn!("Completion stub fallback enabled; failed generations will ship draft text");
            generator = generator.with_fallback(Arc::new(StubCompletionClient));
        }

        let renderer: Arc<dyn DocumentRenderer> = Arc::new(CliRenderEngine);

        Ok(Self::with_components(
            ledger,
            users,
            storage,
            Arc::new(generator),
            renderer,
            stripe,
            http_client,
        ))
    }

    /// Assemble an AppState from explicit collaborators. Tests use this
    /// with in-memory stores and stub clients.
    pub fn with_components(
        ledger: Arc<dyn LedgerStore>,
        users: Arc<dyn UserDirectory>,
        storage: Arc<dyn ObjectStorage>,
        generator: Arc<ContentGenerator>,
        renderer: Arc<dyn DocumentRenderer>,
        stripe: Arc<StripeClient>,
        http_client: reqwest::Client,
    ) -> Self {
        let email_cache = Cache::builder()
            .time_to_live(Duration::from_secs(10 * 60))
            .max_capacity(10_000)
            .build();

        let generation = GenerationDeps {
            generator,
            renderer,
            storage: storage.clone(),
            ledger: ledger.clone(),
        };

        Self {
            ledger,
            users,
            storage,
            stripe,
            generation,
            email_cache,
            http_client,
        }
    }

    /// Resolve a customer email to a directory user id, through the cache.
    pub async fn resolve_user_by_email(&self, email: &str) -> Option<String> {
        let key = email.to_ascii_lowercase();
        let users = self.users.clone();
        self.email_cache
            .get_with(key.clone(), async move {
                match users.find_by_email(&key).await {
                    Ok(account) => account.map(|a| a.id),
                    Err(e) => {
                        log::error!("User lookup for {} failed: {}", key, e);
                        None
                    }
                }
            })
            .await
    }
}

/// Standalone pool constructor for the CLI tools.
pub async fn connect_pool() -> Result<PgPool, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let database_url = crate::config::database_url()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&database_url)
        .await?;
    Ok(pool)
}
