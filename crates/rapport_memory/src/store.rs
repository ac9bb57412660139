use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rapport_core::{RelationshipMetrics, RelationshipStore};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local relationship store, used when no database is configured.
#[derive(Default)]
pub struct InMemoryRelationshipStore {
    records: RwLock<HashMap<String, RelationshipMetrics>>,
}

impl InMemoryRelationshipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = (String, RelationshipMetrics)>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().collect()),
        }
    }
}

#[async_trait]
impl RelationshipStore for InMemoryRelationshipStore {
    async fn get_relationship(&self, sender_id: &str) -> Result<Option<RelationshipMetrics>> {
        Ok(self.records.read().await.get(sender_id).cloned())
    }

    async fn put_relationship(&self, sender_id: &str, metrics: &RelationshipMetrics) -> Result<()> {
        self.records
            .write()
            .await
            .insert(sender_id.to_string(), metrics.clone());
        Ok(())
    }

    async fn put_farewell_marker(&self, sender_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut records = self.records.write().await;
        records
            .entry(sender_id.to_string())
            .or_default()
            .last_farewell_at = Some(at);
        Ok(())
    }
}
