//! Postgres-backed implementation of the registry store.
//!
//! # What this module is
//! Implements [`RegistryStore`] on Postgres via `sqlx`, giving the control plane a
//! durable record of the broker users it created and the callback subscriptions
//! it registered.
//!
//! # Data model
//! - `broker_users(username PK, password_hash, created_at)`
//! - `callback_subscriptions(subscription_id PK, callback_url, entities JSONB,
//!   start_time, end_time, frequency)`
//!
//! # Operational notes
//! - Migrations run at connect time via `sqlx::migrate!("./migrations")` so
//!   operations can assume the schema exists.
//! - Pool timeouts are explicit; a hung database surfaces as an error instead of
//!   a stuck saga.
//! - Database URLs may contain credentials; never log `pg.url`.
use super::{RegistryStore, StoreError, StoreResult};
use crate::config::PostgresConfig;
use crate::model::{BrokerUser, CallbackSubscription};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use std::time::Duration;

/// Durable registry store backed by Postgres.
///
/// # Errors
/// - Unique violations on insert surface as [`StoreError::Conflict`].
/// - Missing rows surface as [`StoreError::NotFound`].
/// - Everything else is [`StoreError::Unexpected`].
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

#[derive(Debug, Clone, FromRow)]
struct DbBrokerUser {
    username: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct DbCallback {
    subscription_id: String,
    callback_url: String,
    entities: Json<Vec<String>>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    frequency: DateTime<Utc>,
}

impl From<DbBrokerUser> for BrokerUser {
    fn from(row: DbBrokerUser) -> Self {
        BrokerUser {
            username: row.username,
            password_hash: row.password_hash,
            created_at: row.created_at,
        }
    }
}

impl From<DbCallback> for CallbackSubscription {
    fn from(row: DbCallback) -> Self {
        CallbackSubscription {
            subscription_id: row.subscription_id,
            callback_url: row.callback_url,
            entities: row.entities.0,
            start_time: row.start_time,
            end_time: row.end_time,
            frequency: row.frequency,
        }
    }
}

impl PostgresStore {
    /// Connect and apply migrations.
    ///
    /// # Errors
    /// - Invalid URL, connection, pool setup, or migration failures.
    pub async fn connect(pg: &PostgresConfig) -> StoreResult<Self> {
        Self::connect_internal(pg, true).await
    }

    /// Connect without touching the schema. Used by tests that migrate externally.
    pub async fn connect_without_migrations(pg: &PostgresConfig) -> StoreResult<Self> {
        Self::connect_internal(pg, false).await
    }

    async fn connect_internal(pg: &PostgresConfig, run_migrations: bool) -> StoreResult<Self> {
        let connect_options = PgConnectOptions::from_str(&pg.url)?;
        let connect = PgPoolOptions::new()
            .max_connections(pg.max_connections)
            .acquire_timeout(Duration::from_millis(pg.acquire_timeout_ms))
            .connect_with(connect_options);
        let pool = tokio::time::timeout(Duration::from_millis(pg.connect_timeout_ms), connect)
            .await
            .map_err(|_| anyhow::anyhow!("postgres connect timed out"))??;

        if run_migrations {
            sqlx::migrate!("./migrations").run(&pool).await?;
        }
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RegistryStore for PostgresStore {
    async fn get_broker_user(&self, username: &str) -> StoreResult<BrokerUser> {
        let row = sqlx::query_as::<_, DbBrokerUser>(
            r#"SELECT username, password_hash, created_at FROM broker_users WHERE username = $1"#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        row.map(BrokerUser::from)
            .ok_or_else(|| StoreError::NotFound("broker user".into()))
    }

    async fn insert_broker_user(&self, user: BrokerUser) -> StoreResult<()> {
        let result = sqlx::query(
            r#"INSERT INTO broker_users (username, password_hash, created_at) VALUES ($1, $2, $3)"#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await;
        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(StoreError::Conflict("broker user".into()))
            }
            Err(err) => Err(StoreError::Unexpected(err.into())),
        }
    }

    async fn update_broker_password(
        &self,
        username: &str,
        password_hash: &str,
    ) -> StoreResult<()> {
        let result =
            sqlx::query(r#"UPDATE broker_users SET password_hash = $2 WHERE username = $1"#)
                .bind(username)
                .bind(password_hash)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("broker user".into()));
        }
        Ok(())
    }

    async fn get_callback(&self, subscription_id: &str) -> StoreResult<CallbackSubscription> {
        let row = sqlx::query_as::<_, DbCallback>(
            r#"SELECT subscription_id, callback_url, entities, start_time, end_time, frequency
               FROM callback_subscriptions WHERE subscription_id = $1"#,
        )
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(CallbackSubscription::from)
            .ok_or_else(|| StoreError::NotFound("callback subscription".into()))
    }

    async fn insert_callback(&self, row: CallbackSubscription) -> StoreResult<()> {
        let result = sqlx::query(
            r#"INSERT INTO callback_subscriptions
                 (subscription_id, callback_url, entities, start_time, end_time, frequency)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(&row.subscription_id)
        .bind(&row.callback_url)
        .bind(Json(&row.entities))
        .bind(row.start_time)
        .bind(row.end_time)
        .bind(row.frequency)
        .execute(&self.pool)
        .await;
        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(StoreError::Conflict("callback subscription".into()))
            }
            Err(err) => Err(StoreError::Unexpected(err.into())),
        }
    }

    async fn update_callback_entities(
        &self,
        subscription_id: &str,
        entities: &[String],
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"UPDATE callback_subscriptions SET entities = $2 WHERE subscription_id = $1"#,
        )
        .bind(subscription_id)
        .bind(Json(entities))
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("callback subscription".into()));
        }
        Ok(())
    }

    async fn delete_callback(&self, subscription_id: &str) -> StoreResult<()> {
        let result = sqlx::query(r#"DELETE FROM callback_subscriptions WHERE subscription_id = $1"#)
            .bind(subscription_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("callback subscription".into()));
        }
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().map(|code| code == "23505").unwrap_or(false);
    }
    false
}
