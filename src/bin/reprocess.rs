//! Operator CLI: regenerate incomplete artifacts for one purchase, for
//! every purchase with a given status, or for the whole ledger.
//!
//! Usage:
//!   reprocess <purchase-uuid>
//!   reprocess --all
//!   reprocess --status <pending|completed|failed>

use std::sync::Arc;

use anyhow::{bail, Context};
use uuid::Uuid;

use lexigen_server::config::{CompletionConfig, SupabaseConfig};
use lexigen_server::db::{connect_pool, PgLedgerStore};
use lexigen_server::generation::{
    reprocess_all, reprocess_purchase, CliRenderEngine, ContentGenerator, GenerationDeps,
    HttpCompletionClient, RetryPolicy,
};
use lexigen_server::purchases::models::PurchaseStatus;
use lexigen_server::purchases::store::LedgerStore;
use lexigen_server::storage::SupabaseStorage;

enum Target {
    One(Uuid),
    All,
    Status(PurchaseStatus),
}

fn parse_args(args: &[String]) -> anyhow::Result<Target> {
    match args {
        [flag] if flag == "--all" => Ok(Target::All),
        [flag, status] if flag == "--status" => PurchaseStatus::parse(status)
            .map(Target::Status)
            .with_context(|| format!("unknown status '{status}'")),
        [id] => {
            let id = Uuid::parse_str(id).with_context(|| format!("'{id}' is not a UUID"))?;
            Ok(Target::One(id))
        }
        _ => bail!("usage: reprocess <purchase-uuid> | --all | --status <pending|completed|failed>"),
    }
}

fn build_deps(
    pool: sqlx::PgPool,
    http_client: reqwest::Client,
) -> anyhow::Result<GenerationDeps> {
    let storage = Arc::new(SupabaseStorage::new(
        SupabaseConfig::from_env().map_err(anyhow::Error::msg)?,
        http_client.clone(),
    ));
    let ledger = Arc::new(PgLedgerStore::new(pool));

    let completion_config = CompletionConfig::from_env().map_err(anyhow::Error::msg)?;
    let retry = RetryPolicy::new(completion_config.max_attempts);
    let generator = Arc::new(ContentGenerator::new(
        Arc::new(HttpCompletionClient::new(completion_config, http_client)),
        retry,
    ));

    Ok(GenerationDeps {
        generator,
        renderer: Arc::new(CliRenderEngine),
        storage,
        ledger,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let args: Vec<String> = std::env::args().skip(1).collect();
    let target = parse_args(&args)?;

    let pool = connect_pool()
        .await
        .map_err(|e| anyhow::anyhow!("database connection failed: {e}"))?;
    let http_client = reqwest::Client::builder()
        .user_agent("lexigen-reprocess/0.3")
        .build()
        .context("Failed to create HTTP client")?;
    let deps = build_deps(pool, http_client)?;

    match target {
        Target::One(id) => {
            let mut purchase = deps
                .ledger
                .find_by_id(id)
                .await
                .map_err(anyhow::Error::msg)?
                .with_context(|| format!("purchase {id} not found"))?;
            reprocess_purchase(&deps, &mut purchase).await?;
            println!(
                "Purchase {}: status {}, {} generated, {} failed",
                purchase.id,
                purchase.status.as_str(),
                purchase.documents_generated,
                purchase.documents_failed
            );
        }
        Target::All => reprocess_all(&deps, None).await?,
        Target::Status(status) => reprocess_all(&deps, Some(status)).await?,
    }

    Ok(())
}
