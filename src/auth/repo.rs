use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::RwLock;
use uuid::Uuid;

use crate::auth::{password::DerivedCredential, repo_types::User};

/// Capability the auth handlers depend on. Backed by Postgres in production
/// and by an in-memory store in tests.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, user_id: Uuid) -> anyhow::Result<Option<User>>;
    async fn insert(&self, user: &User) -> anyhow::Result<()>;
    /// Overwrite a row's hash and salt together. Used by the legacy upgrade
    /// on the login path; last write wins if two logins race.
    async fn update_credential(
        &self,
        user_id: Uuid,
        credential: &DerivedCredential,
    ) -> anyhow::Result<()>;
}

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, name, email, role, password_hash, password_salt, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, user_id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, name, email, role, password_hash, password_salt, created_at
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert(&self, user: &User) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, name, email, role, password_hash, password_salt, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.user_id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(&user.password_hash)
        .bind(&user.password_salt)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_credential(
        &self,
        user_id: Uuid,
        credential: &DerivedCredential,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, password_salt = $3
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(&credential.hash)
        .bind(&credential.salt)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// In-memory store with the same uniqueness rule as the `users` table.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.read().expect("user store lock");
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, user_id: Uuid) -> anyhow::Result<Option<User>> {
        let users = self.users.read().expect("user store lock");
        Ok(users.iter().find(|u| u.user_id == user_id).cloned())
    }

    async fn insert(&self, user: &User) -> anyhow::Result<()> {
        let mut users = self.users.write().expect("user store lock");
        if users.iter().any(|u| u.email == user.email) {
            anyhow::bail!("duplicate email: {}", user.email);
        }
        users.push(user.clone());
        Ok(())
    }

    async fn update_credential(
        &self,
        user_id: Uuid,
        credential: &DerivedCredential,
    ) -> anyhow::Result<()> {
        let mut users = self.users.write().expect("user store lock");
        let user = users
            .iter_mut()
            .find(|u| u.user_id == user_id)
            .ok_or_else(|| anyhow::anyhow!("no such user: {user_id}"))?;
        user.password_hash = credential.hash.clone();
        user.password_salt = credential.salt.clone();
        Ok(())
    }
}
