//! Postgres user directory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::users::directory::{DirectoryError, UserDirectory};
use crate::users::model::{Role, UserAccount};

pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    display_name: Option<String>,
    role: String,
    password_hash: Option<String>,
    refresh_token: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl UserRow {
    fn into_account(self) -> UserAccount {
        UserAccount {
            role: Role::parse(&self.role).unwrap_or(Role::User),
            id: self.id,
            email: self.email,
            display_name: self.display_name,
            password_hash: self.password_hash,
            refresh_token: self.refresh_token,
            created_at: self.created_at,
        }
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, email, display_name, role, password_hash, refresh_token, created_at FROM users";

fn backend(e: sqlx::Error) -> DirectoryError {
    DirectoryError::Backend(e.to_string())
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, DirectoryError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE LOWER(email) = LOWER($1)"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;
        Ok(row.map(UserRow::into_account))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserAccount>, DirectoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.map(UserRow::into_account))
    }

    async fn find_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<UserAccount>, DirectoryError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE refresh_token = $1"))
                .bind(refresh_token)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;
        Ok(row.map(UserRow::into_account))
    }

    async fn update_refresh_token(
        &self,
        id: &str,
        refresh_token: &str,
    ) -> Result<(), DirectoryError> {
        sqlx::query("UPDATE users SET refresh_token = $2 WHERE id = $1")
            .bind(id)
            .bind(refresh_token)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }
}
