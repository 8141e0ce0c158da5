//! In-memory transfer store for testing and ephemeral use.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::TransferStore;
use sysbridge_types::{Result, TransferRecord};

/// In-memory store keyed by transfer id.
pub struct MemoryStore {
    records: Mutex<HashMap<String, TransferRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransferStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<TransferRecord>> {
        let records = self.records.lock().unwrap();
        Ok(records.get(id).cloned())
    }

    async fn upsert(&self, record: &TransferRecord) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysbridge_types::TransferStatus;

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let store = MemoryStore::new();
        let mut record = TransferRecord::seeded("t1");
        store.upsert(&record).await.unwrap();

        record.set_status(TransferStatus::BurnSys);
        store.upsert(&record).await.unwrap();

        let loaded = store.get("t1").await.unwrap().unwrap();
        assert_eq!(loaded.status, TransferStatus::BurnSys);
        assert!(store.get("missing").await.unwrap().is_none());
    }
}
