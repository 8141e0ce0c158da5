//! HTTP client for the persistence gateway.
//!
//! Endpoints:
//! - GET /transfer/{id}
//! - PATCH /transfer/{id}

use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use crate::TransferStore;
use sysbridge_types::{BridgeError, Result, TransferRecord};

/// Remote persistence gateway client.
pub struct GatewayClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl GatewayClient {
    pub fn new(base_url: &str, timeout_ms: Option<u64>) -> Self {
        let timeout_ms = timeout_ms.unwrap_or(10_000);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// Fetch a transfer record.
    ///
    /// GET /transfer/{id}; anything but a 200 reads as "not stored remotely".
    pub async fn fetch_transfer(&self, id: &str) -> Result<Option<TransferRecord>> {
        let url = format!("{}/transfer/{}", self.base_url, id);

        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BridgeError::Persistence(format!("gateway request failed: {}", e)))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            warn!(id, status = %resp.status(), "gateway returned non-success for transfer load");
            return Ok(None);
        }

        let record: TransferRecord = resp
            .json()
            .await
            .map_err(|e| BridgeError::Persistence(format!("failed to parse transfer: {}", e)))?;

        Ok(Some(record))
    }

    /// Upsert a transfer record.
    ///
    /// PATCH /transfer/{id} with the full record as the body.
    pub async fn upsert_transfer(&self, record: &TransferRecord) -> Result<()> {
        let url = format!("{}/transfer/{}", self.base_url, record.id);

        let resp = self
            .client
            .patch(&url)
            .json(record)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BridgeError::Persistence(format!("gateway request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(BridgeError::Persistence(format!(
                "gateway returned status {}",
                resp.status()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl TransferStore for GatewayClient {
    async fn get(&self, id: &str) -> Result<Option<TransferRecord>> {
        self.fetch_transfer(id).await
    }

    async fn upsert(&self, record: &TransferRecord) -> Result<()> {
        self.upsert_transfer(record).await
    }
}
