//! Session-scoped store for suspended commands awaiting confirmation
//! or missing fields.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::command::{Command, Requirement};

/// A suspended command persisted across requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRecord {
    pub command: Command,
    pub requirements: Vec<Requirement>,
    pub requires_confirmation: bool,
    pub confirmation_message: String,
    /// Creation time of the original suspension; preserved across
    /// re-asks so the auto-resume heuristic stays stable.
    pub created_at: DateTime<Utc>,
}

/// Keyed store for pending commands, scoped per caller session. TTL
/// and cleanup are the implementation's responsibility.
#[async_trait]
pub trait PendingStore: Send + Sync {
    async fn get(&self, session: &str, token: &str) -> Option<PendingRecord>;

    async fn put(&self, session: &str, token: &str, record: PendingRecord);

    async fn remove(&self, session: &str, token: &str);

    /// The most recently created pending record for the session, used
    /// by the unprompted free-text resume heuristic.
    async fn latest(&self, session: &str) -> Option<(String, PendingRecord)>;
}

/// In-memory implementation of [`PendingStore`]. Concurrent resumes of
/// the same token serialize on the lock with last-write-wins.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPendingStore {
    inner: Arc<RwLock<HashMap<String, HashMap<String, PendingRecord>>>>,
}

impl InMemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PendingStore for InMemoryPendingStore {
    async fn get(&self, session: &str, token: &str) -> Option<PendingRecord> {
        let inner = self.inner.read().await;
        inner.get(session)?.get(token).cloned()
    }

    async fn put(&self, session: &str, token: &str, record: PendingRecord) {
        let mut inner = self.inner.write().await;
        inner
            .entry(session.to_string())
            .or_default()
            .insert(token.to_string(), record);
    }

    async fn remove(&self, session: &str, token: &str) {
        let mut inner = self.inner.write().await;
        if let Some(records) = inner.get_mut(session) {
            records.remove(token);
            if records.is_empty() {
                inner.remove(session);
            }
        }
    }

    async fn latest(&self, session: &str) -> Option<(String, PendingRecord)> {
        let inner = self.inner.read().await;
        inner
            .get(session)?
            .iter()
            .max_by_key(|(_, record)| record.created_at)
            .map(|(token, record)| (token.clone(), record.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Action;
    use crate::command::DataMap;

    fn record(created_at: DateTime<Utc>) -> PendingRecord {
        PendingRecord {
            command: Command {
                action: Action::DeletePurchase,
                data: DataMap::new(),
            },
            requirements: Vec::new(),
            requires_confirmation: true,
            confirmation_message: "Delete?".to_string(),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_latest_picks_most_recent_and_sessions_are_isolated() {
        let store = InMemoryPendingStore::new();
        let older = Utc::now() - chrono::Duration::seconds(60);
        let newer = Utc::now();

        store.put("session-a", "t1", record(older)).await;
        store.put("session-a", "t2", record(newer)).await;
        store.put("session-b", "t3", record(older)).await;

        let (token, _) = store.latest("session-a").await.unwrap();
        assert_eq!(token, "t2");

        store.remove("session-a", "t2").await;
        let (token, _) = store.latest("session-a").await.unwrap();
        assert_eq!(token, "t1");

        assert!(store.get("session-a", "t2").await.is_none());
        assert!(store.get("session-b", "t3").await.is_some());
    }
}
