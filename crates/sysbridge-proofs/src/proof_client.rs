//! HTTP client for the SPV proof backend.
//!
//! Endpoint:
//! - GET /api/v2/getspvproof/{txid}

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::{ProofBackend, ProofFetch};
use sysbridge_types::{BridgeError, Result, SpvProof};

/// Proof backend response wrapper.
///
/// `result` holds the proof as a JSON-encoded string; an empty string means
/// the proof is not yet available.
#[derive(Debug, Clone, Deserialize)]
pub struct SpvProofEnvelope {
    #[serde(default)]
    pub result: String,
}

/// Blockbook-style proof backend client.
pub struct ProofClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl ProofClient {
    pub fn new(base_url: &str, timeout_ms: Option<u64>) -> Self {
        let timeout_ms = timeout_ms.unwrap_or(20_000);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    async fn fetch(&self, txid: &str) -> Result<ProofFetch> {
        let url = format!("{}/api/v2/getspvproof/{}", self.base_url, txid);

        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BridgeError::ProofBackend(format!("proof request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(BridgeError::ProofBackend(format!(
                "proof backend returned status {}",
                resp.status()
            )));
        }

        let envelope: SpvProofEnvelope = resp
            .json()
            .await
            .map_err(|e| BridgeError::ProofBackend(format!("failed to parse proof response: {}", e)))?;

        if envelope.result.is_empty() {
            return Ok(ProofFetch::Pending);
        }

        let proof: SpvProof = serde_json::from_str(&envelope.result)
            .map_err(|e| BridgeError::ProofBackend(format!("failed to parse proof: {}", e)))?;

        Ok(ProofFetch::Ready(proof))
    }
}

#[async_trait]
impl ProofBackend for ProofClient {
    async fn fetch_spv_proof(&self, txid: &str) -> Result<ProofFetch> {
        self.fetch(txid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_is_the_pending_sentinel() {
        let envelope: SpvProofEnvelope = serde_json::from_str(r#"{"result": ""}"#).unwrap();
        assert!(envelope.result.is_empty());

        let envelope: SpvProofEnvelope = serde_json::from_str("{}").unwrap();
        assert!(envelope.result.is_empty());
    }

    #[test]
    fn proof_payload_parses_from_the_result_string() {
        let inner = r#"{
            "transaction": "0200aabb",
            "index": 3,
            "siblings": ["aa", "bb", "cc"],
            "header": "00e0ff7f",
            "nevm_blockhash": "1234abcd"
        }"#;
        let proof: SpvProof = serde_json::from_str(inner).unwrap();
        assert_eq!(proof.index, 3);
        assert_eq!(proof.siblings.len(), 3);
        assert_eq!(proof.nevm_blockhash, "1234abcd");
    }
}
