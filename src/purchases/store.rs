//! `LedgerStore` - durable persistence seam for the purchase ledger.
//!
//! The Postgres implementation lives in `crate::db::purchase`; the
//! in-memory implementation here backs tests and local development.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use super::models::{LineItem, Purchase, PurchaseStatus};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("purchase {0} not found")]
    NotFound(Uuid),
    #[error("duplicate external transaction id {0}")]
    DuplicateTransaction(String),
    #[error("ledger backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// First durable side effect after signature verification. Fails on a
    /// duplicate external transaction id; callers are expected to have
    /// checked `find_by_external_transaction_id` first.
    async fn create(&self, purchase: &Purchase) -> Result<(), LedgerError>;

    /// Full-snapshot replacement of the items array and rollup fields.
    /// No partial patches; there is exactly one writer per entry.
    async fn update_items(
        &self,
        id: Uuid,
        items: &[LineItem],
        status: PurchaseStatus,
        documents_generated: u32,
        documents_failed: u32,
    ) -> Result<(), LedgerError>;

    async fn find_by_external_transaction_id(
        &self,
        external_transaction_id: &str,
    ) -> Result<Option<Purchase>, LedgerError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Purchase>, LedgerError>;

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Purchase>, LedgerError>;

    /// Resolve the purchase owning a unit with this representative
    /// document id. Read-side lookups never re-derive storage paths.
    async fn find_by_document_id(&self, document_id: &str)
        -> Result<Option<Purchase>, LedgerError>;

    async fn list(&self, status: Option<PurchaseStatus>) -> Result<Vec<Purchase>, LedgerError>;
}

/// In-memory ledger used by tests and local development.
#[derive(Default)]
pub struct MemoryLedgerStore {
    purchases: RwLock<HashMap<Uuid, Purchase>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.purchases.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn create(&self, purchase: &Purchase) -> Result<(), LedgerError> {
        let mut purchases = self.purchases.write();
        if purchases
            .values()
            .any(|p| p.external_transaction_id == purchase.external_transaction_id)
        {
            return Err(LedgerError::DuplicateTransaction(
                purchase.external_transaction_id.clone(),
            ));
        }
        purchases.insert(purchase.id, purchase.clone());
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
        let mut purchases = self.purchases.write();
        let purchase = purchases.get_mut(&id).ok_or(LedgerError::NotFound(id))?;
        purchase.items = items.to_vec();
        purchase.status = status;
        purchase.documents_generated = documents_generated;
        purchase.documents_failed = documents_failed;
        purchase.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn find_by_external_transaction_id(
        &self,
        external_transaction_id: &str,
    ) -> Result<Option<Purchase>, LedgerError> {
        Ok(self
            .purchases
            .read()
            .values()
            .find(|p| p.external_transaction_id == external_transaction_id)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Purchase>, LedgerError> {
        Ok(self.purchases.read().get(&id).cloned())
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Purchase>, LedgerError> {
        let mut purchases: Vec<Purchase> = self
            .purchases
            .read()
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        purchases.sort_by_key(|p| p.created_at);
        Ok(purchases)
    }

    async fn find_by_document_id(
        &self,
        document_id: &str,
    ) -> Result<Option<Purchase>, LedgerError> {
        Ok(self
            .purchases
            .read()
            .values()
            .find(|p| p.find_document(document_id).is_some())
            .cloned())
    }

    async fn list(&self, status: Option<PurchaseStatus>) -> Result<Vec<Purchase>, LedgerError> {
        let mut purchases: Vec<Purchase> = self
            .purchases
            .read()
            .values()
            .filter(|p| status.map_or(true, |s| p.status == s))
            .cloned()
            .collect();
        purchases.sort_by_key(|p| p.created_at);
        Ok(purchases)
    }
}
