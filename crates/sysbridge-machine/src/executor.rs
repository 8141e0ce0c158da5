//! The state machine executor: one external side effect per status.
//!
//! Safe to re-invoke on an identical record: action steps that already have
//! their log entry return success without re-submitting, so a retry or
//! reload after partial completion never double-spends.

use serde_json::{json, Value};
use std::sync::Arc;

use sysbridge_proofs::{ProofBackend, ProofFetch};
use sysbridge_relay::{is_benign_relay_race, RelayAdapter, RelayRequest};
use sysbridge_types::{
    constants, ensure_0x, strip_0x, truncate_decimals, BridgeError, Result, SpvProof,
    TransferRecord, TransferStatus, TransferType,
};
use sysbridge_wallet::{
    Chain, ConfirmationTracker, NetworkSwitcher, NevmWallet, UtxoTxBuilder, UtxoWallet,
};

/// Outcome of one executor invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step finished; the caller advances to the next catalog entry.
    Success,
    /// External state is not observable yet; the caller reschedules.
    NotReady,
    /// The step finished and the transfer is terminal, bypassing the normal
    /// one-step advance.
    Completed,
}

/// Executor tuning.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub required_confirmations: u32,
    pub poll_interval_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            required_confirmations: 1,
            poll_interval_ms: 1_000,
        }
    }
}

/// Every capability the executor drives.
#[derive(Clone)]
pub struct BridgeAdapters {
    pub utxo_wallet: Arc<dyn UtxoWallet>,
    pub nevm_wallet: Arc<dyn NevmWallet>,
    pub tx_builder: Arc<dyn UtxoTxBuilder>,
    pub confirmations: Arc<dyn ConfirmationTracker>,
    pub proofs: Arc<dyn ProofBackend>,
    pub relay: Arc<dyn RelayAdapter>,
    pub switcher: Option<Arc<dyn NetworkSwitcher>>,
}

/// Performs the side effect for a record's current status.
pub struct StepExecutor {
    adapters: BridgeAdapters,
    config: ExecutorConfig,
}

impl StepExecutor {
    pub fn new(adapters: BridgeAdapters, config: ExecutorConfig) -> Self {
        Self { adapters, config }
    }

    /// Run the side effect for `record.status`.
    ///
    /// Action steps append exactly one log entry on success; confirmation
    /// steps append none. Statuses with no side effect succeed untouched.
    pub async fn execute(&self, record: &mut TransferRecord) -> Result<StepOutcome> {
        match record.status {
            TransferStatus::BurnSys => self.burn_sys(record).await,
            TransferStatus::ConfirmBurnSys => {
                // The follow-up burn chains off this one under RBF, so a
                // zero-depth lookup is enough.
                self.confirm(record, TransferStatus::BurnSys, Chain::Utxo, Some(0), Some(0))
                    .await
            }
            TransferStatus::BurnSysx => self.burn_sysx(record).await,
            TransferStatus::ConfirmBurnSysx => {
                self.confirm(record, TransferStatus::BurnSysx, Chain::Utxo, None, None)
                    .await
            }
            TransferStatus::GenerateProofs => self.generate_proofs(record).await,
            TransferStatus::SubmitProofs => self.submit_proofs(record).await,
            TransferStatus::FreezeBurnSys => self.freeze_burn_sys(record).await,
            TransferStatus::ConfirmFreezeBurnSys => {
                self.confirm(record, TransferStatus::FreezeBurnSys, Chain::Nevm, None, None)
                    .await
            }
            TransferStatus::MintSysx => self.mint_sysx(record).await,
            TransferStatus::ConfirmMintSysx => {
                self.confirm(record, TransferStatus::MintSysx, Chain::Utxo, None, None)
                    .await
            }
            TransferStatus::Switch => self.switch(record).await,
            TransferStatus::Finalizing => self.finalize(record).await,
            TransferStatus::Initialize | TransferStatus::Completed | TransferStatus::Error => {
                Ok(StepOutcome::Success)
            }
        }
    }

    fn utxo_identity(&self, record: &TransferRecord) -> Result<(String, String)> {
        let xpub = record
            .utxo_xpub
            .clone()
            .ok_or_else(|| BridgeError::Validation("utxo xpub".into()))?;
        let address = record
            .utxo_address
            .clone()
            .ok_or_else(|| BridgeError::Validation("utxo address".into()))?;
        Ok((xpub, address))
    }

    fn nevm_identity(&self, record: &TransferRecord) -> Result<String> {
        record
            .nevm_address
            .clone()
            .ok_or_else(|| BridgeError::Validation("nevm address".into()))
    }

    fn logged_tx(&self, record: &TransferRecord, status: TransferStatus) -> Result<String> {
        record
            .latest_log_data(status)
            .and_then(|data| data.get("tx"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| BridgeError::MissingLogEntry {
                id: record.id.clone(),
                status: status.as_str().into(),
            })
    }

    async fn burn_sys(&self, record: &mut TransferRecord) -> Result<StepOutcome> {
        if record.latest_log(TransferStatus::BurnSys).is_some() {
            return Ok(StepOutcome::Success);
        }
        let (xpub, address) = self.utxo_identity(record)?;
        let amount = truncate_decimals(&record.amount, 6)?;
        let tx = self
            .adapters
            .tx_builder
            .burn_sys_to_sysx(&amount, &xpub, &address)
            .await?;
        let broadcast = self.adapters.utxo_wallet.send_transaction(&tx).await?;
        record.push_log(
            TransferStatus::BurnSys,
            "Burning SYS to SYSX",
            json!({ "tx": broadcast.tx }),
        );
        Ok(StepOutcome::Success)
    }

    async fn burn_sysx(&self, record: &mut TransferRecord) -> Result<StepOutcome> {
        if record.latest_log(TransferStatus::BurnSysx).is_some() {
            return Ok(StepOutcome::Success);
        }
        let (xpub, address) = self.utxo_identity(record)?;
        let (nevm_address, message) = match record.transfer_type {
            TransferType::SysToNevm => {
                let nevm = self.nevm_identity(record)?;
                (Some(strip_0x(&nevm).to_string()), "Burning SYSX to NEVM")
            }
            TransferType::NevmToSys => (None, "Burning SYSX to SYS"),
        };
        let tx = self
            .adapters
            .tx_builder
            .burn_sysx(
                &record.amount,
                constants::SYSX_ASSET_GUID,
                &address,
                &xpub,
                nevm_address.as_deref(),
            )
            .await?;
        let broadcast = self.adapters.utxo_wallet.send_transaction(&tx).await?;
        record.push_log(TransferStatus::BurnSysx, message, json!({ "tx": broadcast.tx }));
        Ok(StepOutcome::Success)
    }

    async fn freeze_burn_sys(&self, record: &mut TransferRecord) -> Result<StepOutcome> {
        if record.latest_log(TransferStatus::FreezeBurnSys).is_some() {
            return Ok(StepOutcome::Success);
        }
        let from = self.nevm_identity(record)?;
        let utxo_address = record
            .utxo_address
            .clone()
            .ok_or_else(|| BridgeError::Validation("utxo address".into()))?;
        let mut call = sysbridge_wallet::freeze_burn_request(&record.amount, &from, &utxo_address)?;
        call.max_fee_per_gas = Some(self.adapters.nevm_wallet.gas_price().await?);
        let broadcast = self.adapters.nevm_wallet.send_transaction(&call).await?;
        record.push_log(
            TransferStatus::FreezeBurnSys,
            "Freezing and burning SYS on NEVM",
            json!({ "tx": broadcast.tx }),
        );
        Ok(StepOutcome::Success)
    }

    async fn mint_sysx(&self, record: &mut TransferRecord) -> Result<StepOutcome> {
        if record.latest_log(TransferStatus::MintSysx).is_some() {
            return Ok(StepOutcome::Success);
        }
        let (xpub, address) = self.utxo_identity(record)?;
        let nevm_txid = self.logged_tx(record, TransferStatus::FreezeBurnSys)?;
        let tx = self
            .adapters
            .tx_builder
            .mint_sysx(&record.amount, &address, &xpub, &nevm_txid)
            .await?;
        let broadcast = self.adapters.utxo_wallet.send_transaction(&tx).await?;
        record.push_log(
            TransferStatus::MintSysx,
            "Minting SYSX from NEVM burn",
            json!({ "tx": broadcast.tx }),
        );
        Ok(StepOutcome::Success)
    }

    async fn confirm(
        &self,
        record: &mut TransferRecord,
        producer: TransferStatus,
        chain: Chain,
        poll_interval_ms: Option<u64>,
        required_confirmations: Option<u32>,
    ) -> Result<StepOutcome> {
        let tx = self.logged_tx(record, producer)?;
        let receipt = self
            .adapters
            .confirmations
            .confirm_transaction(
                chain,
                &tx,
                poll_interval_ms.or(Some(self.config.poll_interval_ms)),
                required_confirmations.or(Some(self.config.required_confirmations)),
            )
            .await?;
        // Confirmation is not separately logged.
        match receipt {
            Some(_) => Ok(StepOutcome::Success),
            None => Ok(StepOutcome::NotReady),
        }
    }

    async fn generate_proofs(&self, record: &mut TransferRecord) -> Result<StepOutcome> {
        if record.latest_log(TransferStatus::GenerateProofs).is_some() {
            return Ok(StepOutcome::Success);
        }
        let tx = self.logged_tx(record, TransferStatus::BurnSysx)?;
        match self.adapters.proofs.fetch_spv_proof(&tx).await? {
            ProofFetch::Pending => Ok(StepOutcome::NotReady),
            ProofFetch::Ready(proof) => {
                record.push_log(
                    TransferStatus::GenerateProofs,
                    "Proofs ready",
                    json!({ "results": proof }),
                );
                Ok(StepOutcome::Success)
            }
        }
    }

    async fn submit_proofs(&self, record: &mut TransferRecord) -> Result<StepOutcome> {
        if record.latest_log(TransferStatus::SubmitProofs).is_some() {
            return Ok(StepOutcome::Success);
        }
        let results = record
            .latest_log_data(TransferStatus::GenerateProofs)
            .and_then(|data| data.get("results"))
            .cloned()
            .ok_or_else(|| BridgeError::MissingLogEntry {
                id: record.id.clone(),
                status: TransferStatus::GenerateProofs.as_str().into(),
            })?;
        let proof: SpvProof = serde_json::from_value(results)
            .map_err(|e| BridgeError::Other(format!("corrupt proof log: {}", e)))?;

        let from = self.nevm_identity(record)?;
        let block_number = self
            .adapters
            .nevm_wallet
            .block_number(&ensure_0x(&proof.nevm_blockhash))
            .await?;
        let branch = sysbridge_proofs::build_merkle_branch(&proof.siblings, proof.index as usize)?;
        let max_fee_per_gas = self.adapters.nevm_wallet.gas_price().await?;

        let request = RelayRequest {
            block_number,
            tx_bytes: ensure_0x(&proof.transaction),
            tx_index: proof.index,
            merkle_siblings: branch.siblings.iter().map(|s| ensure_0x(s)).collect(),
            block_header: ensure_0x(&proof.header),
            from,
            gas: constants::RELAY_GAS_LIMIT,
            max_fee_per_gas,
        };

        match self.adapters.relay.relay_tx(&request).await {
            Ok(hash) => {
                record.push_log(
                    TransferStatus::SubmitProofs,
                    "Transaction hash",
                    json!({ "hash": hash }),
                );
                Ok(StepOutcome::Success)
            }
            Err(err) => {
                let message = match &err {
                    BridgeError::Relay(inner) => inner.clone(),
                    other => other.to_string(),
                };
                if is_benign_relay_race(&message) {
                    // The submission landed despite the client-visible error.
                    return Ok(StepOutcome::Completed);
                }
                record.push_log(
                    TransferStatus::Error,
                    message.clone(),
                    json!({ "error": message }),
                );
                Err(BridgeError::Relay(message))
            }
        }
    }

    async fn finalize(&self, record: &mut TransferRecord) -> Result<StepOutcome> {
        if record.latest_log(TransferStatus::Finalizing).is_some() {
            return Ok(StepOutcome::Success);
        }
        let (chain, hash) = match record.transfer_type {
            TransferType::SysToNevm => {
                let hash = record
                    .latest_log_data(TransferStatus::SubmitProofs)
                    .and_then(|data| data.get("hash"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| BridgeError::MissingLogEntry {
                        id: record.id.clone(),
                        status: TransferStatus::SubmitProofs.as_str().into(),
                    })?;
                (Chain::Nevm, hash)
            }
            TransferType::NevmToSys => {
                (Chain::Utxo, self.logged_tx(record, TransferStatus::BurnSysx)?)
            }
        };
        let receipt = self
            .adapters
            .confirmations
            .confirm_transaction(
                chain,
                &hash,
                Some(self.config.poll_interval_ms),
                Some(self.config.required_confirmations),
            )
            .await?;
        match receipt {
            Some(receipt) => {
                record.push_log(
                    TransferStatus::Finalizing,
                    "Transaction receipt",
                    json!({ "receipt": receipt }),
                );
                Ok(StepOutcome::Success)
            }
            None => Ok(StepOutcome::NotReady),
        }
    }

    async fn switch(&self, record: &mut TransferRecord) -> Result<StepOutcome> {
        if record.latest_log(TransferStatus::Switch).is_some() {
            return Ok(StepOutcome::Success);
        }
        let Some(switcher) = &self.adapters.switcher else {
            return Ok(StepOutcome::Success);
        };
        let chain = match record.transfer_type {
            TransferType::SysToNevm => Chain::Nevm,
            TransferType::NevmToSys => Chain::Utxo,
        };
        let address = switcher.switch_network(chain).await?;
        record.push_log(TransferStatus::Switch, "Address", json!({ "address": address }));
        Ok(StepOutcome::Success)
    }
}
