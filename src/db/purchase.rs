//! Postgres purchase ledger.
//!
//! Line items are stored as a JSONB array, matching the ledger's
//! "replace the whole items snapshot" update contract with a single
//! document-level atomic write. Runtime queries (no compile-time macros)
//! so builds never need a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::purchases::models::{LineItem, Purchase, PurchaseStatus};
use crate::purchases::store::{LedgerError, LedgerStore};

pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PurchaseRow {
    id: Uuid,
    external_transaction_id: String,
    user_id: String,
    customer_email: String,
    items: serde_json::Value,
    total_amount: i64,
    currency: String,
    status: String,
    documents_generated: i32,
    documents_failed: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PurchaseRow {
    fn into_purchase(self) -> Result<Purchase, LedgerError> {
        let items: Vec<LineItem> = serde_json::from_value(self.items)
            .map_err(|e| LedgerError::Backend(format!("corrupt items column: {e}")))?;
        let status = PurchaseStatus::parse(&self.status)
            .ok_or_else(|| LedgerError::Backend(format!("unknown status '{}'", self.status)))?;
        Ok(Purchase {
            id: self.id,
            external_transaction_id: self.external_transaction_id,
            user_id: self.user_id,
            customer_email: self.customer_email,
            items,
            total_amount: self.total_amount,
            currency: self.currency,
            status,
            documents_generated: self.documents_generated.max(0) as u32,
            documents_failed: self.documents_failed.max(0) as u32,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, external_transaction_id, user_id, customer_email, \
     items, total_amount, currency, status, documents_generated, documents_failed, \
     created_at, updated_at FROM purchases";

fn backend(e: sqlx::Error) -> LedgerError {
    LedgerError::Backend(e.to_string())
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn create(&self, purchase: &Purchase) -> Result<(), LedgerError> {
        let items = serde_json::to_value(&purchase.items)
            .map_err(|e| LedgerError::Backend(e.to_string()))?;
        let result = sqlx::query(
            "INSERT INTO purchases (id, external_transaction_id, user_id, customer_email, \
             items, total_amount, currency, status, documents_generated, documents_failed, \
             created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (external_transaction_id) DO NOTHING",
        )
        .bind(purchase.id)
        .bind(&purchase.external_transaction_id)
        .bind(&purchase.user_id)
        .bind(&purchase.customer_email)
        .bind(items)
        .bind(purchase.total_amount)
        .bind(&purchase.currency)
        .bind(purchase.status.as_str())
        .bind(purchase.documents_generated as i32)
        .bind(purchase.documents_failed as i32)
        .bind(purchase.created_at)
        .bind(purchase.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        // The unique index is the idempotency backstop under concurrent
        // duplicate deliveries; losing the race is reported, not swallowed.
        if result.rows_affected() == 0 {
            return Err(LedgerError::DuplicateTransaction(
                purchase.external_transaction_id.clone(),
            ));
        }
        Ok(())
    }

    async fn update_items(
        &self,
        id: Uuid,
        items: &[LineItem],
        status: PurchaseStatus,
        documents_generated: u32,
        documents_failed: u32,
    ) -> Result<(), LedgerError> {
        let items = serde_json::to_value(items).map_err(|e| LedgerError::Backend(e.to_string()))?;
        let result = sqlx::query(
            "UPDATE purchases SET items = $2, status = $3, documents_generated = $4, \
             documents_failed = $5, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(items)
        .bind(status.as_str())
        .bind(documents_generated as i32)
        .bind(documents_failed as i32)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(id));
        }
        Ok(())
    }

    async fn find_by_external_transaction_id(
        &self,
        external_transaction_id: &str,
    ) -> Result<Option<Purchase>, LedgerError> {
        let row: Option<PurchaseRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE external_transaction_id = $1"
        ))
        .bind(external_transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(PurchaseRow::into_purchase).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Purchase>, LedgerError> {
        let row: Option<PurchaseRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(PurchaseRow::into_purchase).transpose()
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Purchase>, LedgerError> {
        let rows: Vec<PurchaseRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE user_id = $1 ORDER BY created_at"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(PurchaseRow::into_purchase).collect()
    }

    async fn find_by_document_id(
        &self,
        document_id: &str,
    ) -> Result<Option<Purchase>, LedgerError> {
        let row: Option<PurchaseRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE jsonb_path_exists(items, \
             '$[*].units[*] ? (@.document_id == $did)', \
             jsonb_build_object('did', $1::text)) LIMIT 1"
        ))
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(PurchaseRow::into_purchase).transpose()
    }

    async fn list(&self, status: Option<PurchaseStatus>) -> Result<Vec<Purchase>, LedgerError> {
        let rows: Vec<PurchaseRow> = match status {
            Some(status) => sqlx::query_as(&format!(
                "{SELECT_COLUMNS} WHERE status = $1 ORDER BY created_at"
            ))
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?,
            None => sqlx::query_as(&format!("{SELECT_COLUMNS} ORDER BY created_at"))
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?,
        };
        rows.into_iter().map(PurchaseRow::into_purchase).collect()
    }
}
