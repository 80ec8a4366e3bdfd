use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

/// Persistence port for the scheduling cells.
///
/// The availability store and booking ledger serialize themselves to
/// JSON documents keyed by a stable name; any key-value backend (a
/// file, a database table, a browser storage bridge) can implement
/// this trait to give them durability. The core never assumes a
/// particular backend exists.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, key: &str, document: Value) -> Result<()>;
    async fn load(&self, key: &str) -> Result<Option<Value>>;
}

/// In-memory implementation used by the reference deployment and the
/// test suites. Process-lifetime only.
#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn save(&self, key: &str, document: Value) -> Result<()> {
        debug!("Saving snapshot document: {}", key);
        self.documents.write().await.insert(key.to_string(), document);
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Value>> {
        debug!("Loading snapshot document: {}", key);
        Ok(self.documents.read().await.get(key).cloned())
    }
}
