//! `UserDirectory` - account lookups behind a trait seam.
//!
//! The Postgres implementation lives in `crate::db::users`. The admin
//! capability is a role lookup through the directory; the env-var
//! bootstrap list exists only so a fresh deployment can designate its
//! first administrators before any role rows exist.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::model::{Role, UserAccount};

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("user directory backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, DirectoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<UserAccount>, DirectoryError>;

    async fn find_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<UserAccount>, DirectoryError>;

    async fn update_refresh_token(
        &self,
        id: &str,
        refresh_token: &str,
    ) -> Result<(), DirectoryError>;

    /// Capability check: role lookup first, bootstrap fallback second.
    async fn is_admin(&self, id: &str) -> Result<bool, DirectoryError> {
        if let Some(account) = self.find_by_id(id).await? {
            if account.role == Role::Admin {
                return Ok(true);
            }
        }
        Ok(bootstrap_admin_ids().iter().any(|b| b == id))
    }
}

/// Migration fallback: comma-separated uids in `ADMIN_BOOTSTRAP_IDS`.
fn bootstrap_admin_ids() -> Vec<String> {
    std::env::var("ADMIN_BOOTSTRAP_IDS")
        .map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// In-memory directory for tests and local development.
#[derive(Default)]
pub struct MemoryUserDirectory {
    accounts: RwLock<HashMap<String, UserAccount>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, account: UserAccount) {
        self.accounts.write().insert(account.id.clone(), account);
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, DirectoryError> {
        Ok(self
            .accounts
            .read()
            .values()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserAccount>, DirectoryError> {
        Ok(self.accounts.read().get(id).cloned())
    }

    async fn find_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<UserAccount>, DirectoryError> {
        Ok(self
            .accounts
            .read()
            .values()
            .find(|a| a.refresh_token.as_deref() == Some(refresh_token))
            .cloned())
    }

    async fn update_refresh_token(
        &self,
        id: &str,
        refresh_token: &str,
    ) -> Result<(), DirectoryError> {
        if let Some(account) = self.accounts.write().get_mut(id) {
            account.refresh_token = Some(refresh_token.to_string());
        }
        Ok(())
    }
}
