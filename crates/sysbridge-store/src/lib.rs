//! Persistence for transfer records.
//!
//! Defines the `TransferStore` trait all backends implement, a `MemoryStore`
//! for testing and ephemeral use, an HTTP `GatewayClient` for the remote
//! persistence gateway, and a `DualStore` pairing a local cache with the
//! remote gateway.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use sysbridge_types::{Result, TransferRecord};

pub mod gateway;
pub mod memory;

pub use gateway::GatewayClient;
pub use memory::MemoryStore;

/// A persistence backend for transfer records, keyed by transfer id.
#[async_trait]
pub trait TransferStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<TransferRecord>>;
    async fn upsert(&self, record: &TransferRecord) -> Result<()>;
}

/// Local cache paired with an optional remote gateway.
///
/// Loads prefer the remote record; saves await the local write and push the
/// remote upsert out of band so a slow or failing gateway never blocks a
/// state transition.
pub struct DualStore {
    local: Arc<dyn TransferStore>,
    remote: Option<Arc<dyn TransferStore>>,
}

impl DualStore {
    pub fn new(local: Arc<dyn TransferStore>, remote: Option<Arc<dyn TransferStore>>) -> Self {
        Self { local, remote }
    }

    /// Load precedence: remote record if present, else local cache.
    pub async fn load(&self, id: &str) -> Result<Option<TransferRecord>> {
        if let Some(remote) = &self.remote {
            match remote.get(id).await {
                Ok(Some(record)) => return Ok(Some(record)),
                Ok(None) => {}
                Err(err) => warn!(id, %err, "remote transfer load failed"),
            }
        }
        self.local.get(id).await
    }

    /// Load the record for `id`, seeding a fresh default when neither store
    /// has one.
    pub async fn load_or_seed(&self, id: &str) -> TransferRecord {
        match self.load(id).await {
            Ok(Some(record)) => record,
            Ok(None) => TransferRecord::seeded(id),
            Err(err) => {
                warn!(id, %err, "transfer load failed, seeding default");
                TransferRecord::seeded(id)
            }
        }
    }

    /// Persist the record: local write awaited, remote upsert spawned.
    ///
    /// The returned error covers the local write only; remote failures are
    /// reported through `tracing` by the spawned task.
    pub async fn save(&self, record: &TransferRecord) -> Result<()> {
        if let Some(remote) = &self.remote {
            let remote = Arc::clone(remote);
            let record = record.clone();
            tokio::spawn(async move {
                if let Err(err) = remote.upsert(&record).await {
                    warn!(id = %record.id, %err, "remote transfer upsert failed");
                }
            });
        }
        self.local.upsert(record).await
    }
}
