//! SPV proof retrieval and merkle branch construction.
//!
//! - `ProofBackend`: capability trait over the indexing backend
//! - `ProofClient`: Blockbook-style HTTP implementation
//! - `merkle`: bitcoin-style merkle branch builder for relay submissions

use async_trait::async_trait;

use sysbridge_types::{Result, SpvProof};

pub mod merkle;
pub mod proof_client;

pub use merkle::{build_merkle_branch, verify_merkle_branch, MerkleBranch};
pub use proof_client::ProofClient;

/// Outcome of an SPV proof fetch.
///
/// `Pending` is the empty-result sentinel: the chain has not buried the
/// transaction deep enough for the indexer to prove it yet. It is a
/// recoverable condition, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofFetch {
    Pending,
    Ready(SpvProof),
}

/// Capability trait over the SPV proof backend.
#[async_trait]
pub trait ProofBackend: Send + Sync {
    async fn fetch_spv_proof(&self, txid: &str) -> Result<ProofFetch>;
}
