//! Relay contract submission.
//!
//! - Build `relayTx` calldata from an SPV proof and merkle branch
//! - Submit through the NEVM wallet
//! - Classify the benign "might still be mined" race

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sysbridge_types::{Hex, Result};

pub mod relay_client;

pub use relay_client::RelayClient;

/// A proof submission for the relay contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRequest {
    /// NEVM block the UTXO block is anchored to.
    pub block_number: u64,
    /// Raw transaction bytes, 0x-prefixed.
    pub tx_bytes: Hex,
    /// Position of the transaction within its block.
    pub tx_index: u32,
    /// Merkle sibling path, each entry 0x-prefixed.
    pub merkle_siblings: Vec<Hex>,
    /// Serialized UTXO block header, 0x-prefixed.
    pub block_header: Hex,
    /// Submitting NEVM account.
    pub from: Hex,
    /// Gas limit for the submission.
    pub gas: u64,
    /// Fee cap as a decimal wei string.
    pub max_fee_per_gas: String,
}

/// Capability trait over the relay contract.
///
/// Resolves with the broadcast transaction hash once the submission is
/// accepted by the mempool; full confirmation is a separate concern.
#[async_trait]
pub trait RelayAdapter: Send + Sync {
    async fn relay_tx(&self, request: &RelayRequest) -> Result<Hex>;
}

/// Whether a relay error message belongs to the benign race class where the
/// submission actually landed despite the client-visible error.
pub fn is_benign_relay_race(message: &str) -> bool {
    message.contains("might still be mined")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn benign_race_classification() {
        assert!(is_benign_relay_race(
            "Transaction was not mined within 50 blocks, but it might still be mined"
        ));
        assert!(!is_benign_relay_race("execution reverted"));
        assert!(!is_benign_relay_race("insufficient funds for gas"));
    }
}
