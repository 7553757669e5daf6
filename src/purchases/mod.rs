//! Purchase ledger - the durable record of one checkout transaction.
//!
//! Split into:
//! - `models` - the ledger data model (purchases, line items, artifacts)
//! - `store` - the `LedgerStore` trait and the in-memory implementation

pub mod models;
pub mod store;

pub use models::{
    ArtifactKind, ArtifactRef, ArtifactSet, GeneratedUnit, ItemState, LineItem, Purchase,
    PurchaseStatus,
};
pub use store::{LedgerError, LedgerStore, MemoryLedgerStore};
