//! Wallet capability interfaces for both sides of the bridge.
//!
//! Wallet cryptography and key management stay behind these traits; the
//! protocol driver only sees signable payloads going in and broadcast txids
//! coming out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use sysbridge_types::{Hex, Result};

pub mod builders;
pub mod discovery;

pub use builders::{freeze_burn_request, AllocationTxBuilder, UtxoTxBuilder};
pub use discovery::{detect_wallet, DiscoveryConfig, WalletAvailability, WalletProbe};

/// Which chain a transaction lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Utxo,
    Nevm,
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chain::Utxo => f.write_str("utxo"),
            Chain::Nevm => f.write_str("nevm"),
        }
    }
}

/// Result of a signed-and-broadcast transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResult {
    /// The broadcast transaction id.
    pub tx: Hex,
}

/// The kind of UTXO-chain transaction a builder produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UtxoTxKind {
    /// Burn native SYS into a SYSX allocation.
    BurnToAllocation,
    /// Burn a SYSX allocation, either toward NEVM or back to SYS.
    AllocationBurn,
    /// Mint a SYSX allocation from a proven NEVM freeze-burn.
    AllocationMint,
}

/// A signable UTXO-chain transaction payload.
///
/// The wallet funds, signs, and broadcasts this; a wallet that cannot fund
/// it fails with `BridgeError::InsufficientFunds`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignableTx {
    pub kind: UtxoTxKind,
    pub amount_satoshis: u64,
    pub asset_guid: String,
    pub change_address: String,
    pub xpub: String,
    pub fee_rate: u64,
    pub rbf: bool,
    /// 0x-stripped NEVM destination, for burns toward NEVM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nevm_address: Option<String>,
    /// NEVM freeze-burn txid, for mints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nevm_txid: Option<Hex>,
}

/// A contract call to submit through the NEVM wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NevmCallRequest {
    pub to: Hex,
    pub from: Hex,
    pub method: String,
    pub params: Value,
    pub gas: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<String>,
}

/// UTXO-side wallet: sign and broadcast allocation transactions.
#[async_trait]
pub trait UtxoWallet: Send + Sync {
    async fn send_transaction(&self, tx: &SignableTx) -> Result<BroadcastResult>;
}

/// NEVM-side wallet plus the chain queries the protocol needs.
#[async_trait]
pub trait NevmWallet: Send + Sync {
    async fn send_transaction(&self, call: &NevmCallRequest) -> Result<BroadcastResult>;

    /// Number of the block with the given hash.
    async fn block_number(&self, block_hash: &str) -> Result<u64>;

    /// Current gas price as a decimal wei string.
    async fn gas_price(&self) -> Result<String>;
}

/// Confirmation lookups on either chain.
///
/// `Ok(None)` means the confirmation depth has not been reached yet; the
/// caller reschedules. `poll_interval_ms` and `required_confirmations`
/// override the implementation's defaults when set.
#[async_trait]
pub trait ConfirmationTracker: Send + Sync {
    async fn confirm_transaction(
        &self,
        chain: Chain,
        tx_hash: &str,
        poll_interval_ms: Option<u64>,
        required_confirmations: Option<u32>,
    ) -> Result<Option<Value>>;
}

/// Ask the wallet to switch its active network.
#[async_trait]
pub trait NetworkSwitcher: Send + Sync {
    /// Resolves with the address active on the requested chain.
    async fn switch_network(&self, chain: Chain) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_names_match_the_wire() {
        assert_eq!(Chain::Utxo.to_string(), "utxo");
        assert_eq!(Chain::Nevm.to_string(), "nevm");
        assert_eq!(serde_json::to_string(&Chain::Nevm).unwrap(), "\"nevm\"");
    }

    #[test]
    fn signable_tx_omits_absent_options() {
        let tx = SignableTx {
            kind: UtxoTxKind::BurnToAllocation,
            amount_satoshis: 100,
            asset_guid: "123456".into(),
            change_address: "sys1q".into(),
            xpub: "zpub".into(),
            fee_rate: 10,
            rbf: true,
            nevm_address: None,
            nevm_txid: None,
        };
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["kind"], "burn-to-allocation");
        assert!(value.get("nevm_address").is_none());
        assert!(value.get("nevm_txid").is_none());
    }
}
