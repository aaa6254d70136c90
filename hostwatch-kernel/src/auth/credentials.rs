//! Table `users` : lecture par nom et amorçage du compte admin.

use super::password::hash_password;
use super::AuthError;
use crate::models::User;
use crate::store::{Store, StoreError};
use sqlx::Row;

#[derive(Clone)]
pub struct CredentialStore {
    store: Store,
}

impl CredentialStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT id, username, password_hash FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(self.store.pool())
            .await?;

        row.map(|r| -> Result<User, StoreError> {
            Ok(User {
                id: r.try_get("id")?,
                username: r.try_get("username")?,
                password_hash: r.try_get("password_hash")?,
            })
        })
        .transpose()
    }

    /// Crée le compte s'il n'existe pas ; un compte existant n'est jamais modifié.
    /// Retourne `true` si une ligne a été insérée.
    pub async fn ensure_admin(&self, username: &str, password: &str) -> Result<bool, AuthError> {
        let hash = hash_password(password)?;
        let result = sqlx::query(
            "INSERT INTO users (username, password_hash) VALUES (?, ?) ON CONFLICT(username) DO NOTHING",
        )
        .bind(username)
        .bind(hash)
        .execute(self.store.pool())
        .await
        .map_err(StoreError::from)?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn count_users(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.store.pool())
            .await?;
        Ok(count)
    }
}
