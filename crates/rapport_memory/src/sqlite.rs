use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rapport_core::{RelationshipMetrics, RelationshipStore};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use std::path::Path;

/// SQLite-backed relationship records.
///
/// Only the fields the decision core reads or writes are persisted;
/// `last_farewell_at` is stored as unix seconds.
#[derive(Clone)]
pub struct SqliteRelationshipStore {
    pool: Pool<Sqlite>,
}

impl SqliteRelationshipStore {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display());
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&db_url)
            .await
            .context("Failed to connect to SQLite database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS relationships (
                sender_id TEXT PRIMARY KEY,
                relationship_level INTEGER NOT NULL DEFAULT 1,
                trust_level INTEGER NOT NULL DEFAULT 1,
                happiness_level INTEGER NOT NULL DEFAULT 5,
                last_farewell_at INTEGER,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create relationships table")?;
        Ok(())
    }
}

fn level(raw: i64) -> u8 {
    raw.clamp(0, u8::MAX as i64) as u8
}

#[async_trait]
impl RelationshipStore for SqliteRelationshipStore {
    async fn get_relationship(&self, sender_id: &str) -> Result<Option<RelationshipMetrics>> {
        let row = sqlx::query(
            "SELECT relationship_level, trust_level, happiness_level, last_farewell_at \
             FROM relationships WHERE sender_id = ?",
        )
        .bind(sender_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load relationship")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let farewell: Option<i64> = row.try_get("last_farewell_at")?;
        let metrics = RelationshipMetrics {
            relationship_level: level(row.try_get("relationship_level")?),
            trust_level: level(row.try_get("trust_level")?),
            happiness_level: level(row.try_get("happiness_level")?),
            last_farewell_at: farewell.and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        };
        Ok(Some(metrics.clamped()))
    }

    async fn put_relationship(&self, sender_id: &str, metrics: &RelationshipMetrics) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO relationships
                (sender_id, relationship_level, trust_level, happiness_level, last_farewell_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(sender_id) DO UPDATE SET
                relationship_level = excluded.relationship_level,
                trust_level = excluded.trust_level,
                happiness_level = excluded.happiness_level,
                last_farewell_at = excluded.last_farewell_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(sender_id)
        .bind(metrics.relationship_level as i64)
        .bind(metrics.trust_level as i64)
        .bind(metrics.happiness_level as i64)
        .bind(metrics.last_farewell_at.map(|t| t.timestamp()))
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to save relationship")?;
        Ok(())
    }

    async fn put_farewell_marker(&self, sender_id: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO relationships (sender_id, last_farewell_at, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(sender_id) DO UPDATE SET
                last_farewell_at = excluded.last_farewell_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(sender_id)
        .bind(at.timestamp())
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to save farewell marker")?;
        tracing::debug!("Farewell marker stored for {}", sender_id);
        Ok(())
    }
}
