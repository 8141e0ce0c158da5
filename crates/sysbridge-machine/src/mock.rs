//! Scriptable mock adapters for testing and ephemeral use.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::executor::BridgeAdapters;
use sysbridge_proofs::{ProofBackend, ProofFetch};
use sysbridge_relay::{RelayAdapter, RelayRequest};
use sysbridge_store::TransferStore;
use sysbridge_types::{
    BridgeError, Hex, Result, SpvProof, TransferRecord,
};
use sysbridge_wallet::{
    AllocationTxBuilder, BroadcastResult, Chain, ConfirmationTracker, NetworkSwitcher,
    NevmCallRequest, NevmWallet, SignableTx, UtxoWallet,
};

/// UTXO wallet that records payloads and hands out sequential txids.
#[derive(Default)]
pub struct MockUtxoWallet {
    pub sent: Mutex<Vec<SignableTx>>,
    counter: AtomicU32,
}

#[async_trait]
impl UtxoWallet for MockUtxoWallet {
    async fn send_transaction(&self, tx: &SignableTx) -> Result<BroadcastResult> {
        self.sent.lock().unwrap().push(tx.clone());
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(BroadcastResult {
            tx: format!("utxo-tx-{}", n),
        })
    }
}

/// NEVM wallet with fixed chain answers.
#[derive(Default)]
pub struct MockNevmWallet {
    pub sent: Mutex<Vec<NevmCallRequest>>,
    counter: AtomicU32,
}

#[async_trait]
impl NevmWallet for MockNevmWallet {
    async fn send_transaction(&self, call: &NevmCallRequest) -> Result<BroadcastResult> {
        self.sent.lock().unwrap().push(call.clone());
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(BroadcastResult {
            tx: format!("0xnevm-tx-{}", n),
        })
    }

    async fn block_number(&self, _block_hash: &str) -> Result<u64> {
        Ok(4242)
    }

    async fn gas_price(&self) -> Result<String> {
        Ok("10000000000".to_string())
    }
}

/// Confirmation tracker whose confirmed set is managed by the test.
#[derive(Default)]
pub struct MockConfirmations {
    confirmed: Mutex<HashSet<String>>,
    pub calls: Mutex<Vec<(Chain, String, Option<u64>, Option<u32>)>>,
}

impl MockConfirmations {
    /// Mark a transaction as confirmed.
    pub fn confirm(&self, tx_hash: &str) {
        self.confirmed.lock().unwrap().insert(tx_hash.to_string());
    }
}

#[async_trait]
impl ConfirmationTracker for MockConfirmations {
    async fn confirm_transaction(
        &self,
        chain: Chain,
        tx_hash: &str,
        poll_interval_ms: Option<u64>,
        required_confirmations: Option<u32>,
    ) -> Result<Option<Value>> {
        self.calls.lock().unwrap().push((
            chain,
            tx_hash.to_string(),
            poll_interval_ms,
            required_confirmations,
        ));
        if self.confirmed.lock().unwrap().contains(tx_hash) {
            Ok(Some(json!({ "txid": tx_hash, "confirmations": 2 })))
        } else {
            Ok(None)
        }
    }
}

/// Proof backend that stays pending until the test flips it.
pub struct MockProofBackend {
    state: Mutex<ProofFetch>,
}

impl Default for MockProofBackend {
    fn default() -> Self {
        Self {
            state: Mutex::new(ProofFetch::Pending),
        }
    }
}

impl MockProofBackend {
    pub fn set_ready(&self, proof: SpvProof) {
        *self.state.lock().unwrap() = ProofFetch::Ready(proof);
    }
}

#[async_trait]
impl ProofBackend for MockProofBackend {
    async fn fetch_spv_proof(&self, _txid: &str) -> Result<ProofFetch> {
        Ok(self.state.lock().unwrap().clone())
    }
}

/// Relay that records requests and can be scripted to fail.
#[derive(Default)]
pub struct MockRelay {
    pub requests: Mutex<Vec<RelayRequest>>,
    failure: Mutex<Option<String>>,
}

impl MockRelay {
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl RelayAdapter for MockRelay {
    async fn relay_tx(&self, request: &RelayRequest) -> Result<Hex> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(BridgeError::Relay(message));
        }
        Ok("0xrelayhash".to_string())
    }
}

/// Switcher handing out a fixed address per chain.
#[derive(Default)]
pub struct MockSwitcher;

#[async_trait]
impl NetworkSwitcher for MockSwitcher {
    async fn switch_network(&self, chain: Chain) -> Result<String> {
        Ok(match chain {
            Chain::Nevm => "0xswitched-nevm".to_string(),
            Chain::Utxo => "sys1qswitched".to_string(),
        })
    }
}

/// Store whose writes always fail, for persistence-isolation tests.
pub struct FailingStore;

#[async_trait]
impl TransferStore for FailingStore {
    async fn get(&self, _id: &str) -> Result<Option<TransferRecord>> {
        Ok(None)
    }

    async fn upsert(&self, _record: &TransferRecord) -> Result<()> {
        Err(BridgeError::Persistence("disk on fire".into()))
    }
}

/// The full mock adapter set, one knob per capability.
pub struct MockBridge {
    pub utxo_wallet: Arc<MockUtxoWallet>,
    pub nevm_wallet: Arc<MockNevmWallet>,
    pub confirmations: Arc<MockConfirmations>,
    pub proofs: Arc<MockProofBackend>,
    pub relay: Arc<MockRelay>,
    pub switcher: Arc<MockSwitcher>,
}

impl MockBridge {
    pub fn new() -> Self {
        Self {
            utxo_wallet: Arc::new(MockUtxoWallet::default()),
            nevm_wallet: Arc::new(MockNevmWallet::default()),
            confirmations: Arc::new(MockConfirmations::default()),
            proofs: Arc::new(MockProofBackend::default()),
            relay: Arc::new(MockRelay::default()),
            switcher: Arc::new(MockSwitcher),
        }
    }

    pub fn adapters(&self, with_switcher: bool) -> BridgeAdapters {
        BridgeAdapters {
            utxo_wallet: self.utxo_wallet.clone(),
            nevm_wallet: self.nevm_wallet.clone(),
            tx_builder: Arc::new(AllocationTxBuilder::new()),
            confirmations: self.confirmations.clone(),
            proofs: self.proofs.clone(),
            relay: self.relay.clone(),
            switcher: with_switcher
                .then(|| self.switcher.clone() as Arc<dyn NetworkSwitcher>),
        }
    }
}

impl Default for MockBridge {
    fn default() -> Self {
        Self::new()
    }
}
