//! Transfer orchestration: owns one record, drives status transitions,
//! mediates persistence and retry.
//!
//! The orchestrator takes `&mut self` for every driving call, so exactly one
//! executor invocation can be in flight per transfer; sharing one across
//! tasks requires an external mutex, which serializes invocations the same
//! way.

use serde_json::json;
use tracing::warn;

use sysbridge_steps::TransferStateMachine;
use sysbridge_store::DualStore;
use sysbridge_types::{
    to_satoshis, BridgeError, Result, TransferRecord, TransferStatus, TransferType,
};

pub mod executor;
pub mod mock;

pub use executor::{BridgeAdapters, ExecutorConfig, StepExecutor, StepOutcome};

/// Observability events emitted while driving a transfer.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    StatusChanged {
        id: String,
        from: TransferStatus,
        to: TransferStatus,
    },
    LogAppended {
        id: String,
        status: TransferStatus,
    },
    StepFailed {
        id: String,
        status: TransferStatus,
        message: String,
    },
    PersistenceFailed {
        id: String,
        message: String,
    },
}

/// Callback type for transfer events.
pub type TransferEventHandler = Box<dyn Fn(TransferEvent) + Send + Sync>;

/// Orchestrator tuning.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Insert the network-switch step and allow starting with only the
    /// source-side wallet bound.
    pub insert_switch: bool,
    pub executor: ExecutorConfig,
}

/// Owns exactly one transfer record and drives it to `completed`.
pub struct TransferOrchestrator {
    record: TransferRecord,
    machine: TransferStateMachine,
    executor: StepExecutor,
    store: DualStore,
    config: OrchestratorConfig,
    on_event: Option<TransferEventHandler>,
    /// Last status side effects ran for; guards against duplicate on-chain
    /// submissions from incidental re-entry.
    last_effects_status: Option<TransferStatus>,
    current_error: Option<BridgeError>,
}

impl TransferOrchestrator {
    /// Load the record for `id` (remote, else local cache, else a fresh
    /// seed) and wire up the executor.
    pub async fn load(
        id: &str,
        adapters: BridgeAdapters,
        store: DualStore,
        config: OrchestratorConfig,
        on_event: Option<TransferEventHandler>,
    ) -> Result<Self> {
        let record = store.load_or_seed(id).await;
        let machine = TransferStateMachine::new(record.transfer_type, config.insert_switch)?;
        let executor = StepExecutor::new(adapters, config.executor.clone());
        Ok(Self {
            record,
            machine,
            executor,
            store,
            config,
            on_event,
            last_effects_status: None,
            current_error: None,
        })
    }

    pub fn record(&self) -> &TransferRecord {
        &self.record
    }

    /// The error the current step last failed with, if any.
    pub fn current_error(&self) -> Option<&BridgeError> {
        self.current_error.as_ref()
    }

    /// The ordered step ids for this transfer's direction.
    pub fn steps(&self) -> &[TransferStatus] {
        self.machine.steps()
    }

    /// Validate inputs, bind the amount, log the opening entry, and enter
    /// the first action step. Fails fast with no mutation when a required
    /// address is missing.
    pub async fn start(&mut self, amount: &str) -> Result<()> {
        to_satoshis(amount)?;

        let utxo_bound = self.record.utxo_address.is_some() && self.record.utxo_xpub.is_some();
        let nevm_bound = self.record.nevm_address.is_some();
        if self.config.insert_switch {
            // Switch-assisted flow: the destination side gets bound at the
            // switch step, but the source side must exist up front.
            let source_bound = match self.record.transfer_type {
                TransferType::SysToNevm => utxo_bound,
                TransferType::NevmToSys => nevm_bound,
            };
            if !source_bound {
                return Err(BridgeError::Validation("source wallet address".into()));
            }
        } else {
            if !utxo_bound {
                return Err(BridgeError::Validation("utxo address and xpub".into()));
            }
            if !nevm_bound {
                return Err(BridgeError::Validation("nevm address".into()));
            }
        }

        self.record.set_amount(amount);
        self.record.push_log(
            TransferStatus::Initialize,
            format!("Starting {} transfer", self.record.transfer_type),
            json!({
                "amount": amount,
                "type": self.record.transfer_type,
                "utxoAddress": self.record.utxo_address.clone(),
                "nevmAddress": self.record.nevm_address.clone(),
            }),
        );
        self.emit(TransferEvent::LogAppended {
            id: self.record.id.clone(),
            status: TransferStatus::Initialize,
        });

        self.transition(self.machine.first_step()).await;
        self.drive().await;
        Ok(())
    }

    /// Rebind the direction and rebuild the transition table.
    pub async fn set_transfer_type(&mut self, transfer_type: TransferType) -> Result<()> {
        self.machine = TransferStateMachine::new(transfer_type, self.config.insert_switch)?;
        self.record.set_type(transfer_type);
        self.persist().await;
        Ok(())
    }

    /// Rebind the UTXO identity, e.g. after a wallet network switch.
    pub async fn set_utxo(&mut self, xpub: &str, address: &str) {
        self.record.bind_utxo(xpub, address);
        self.persist().await;
    }

    /// Rebind the NEVM identity.
    pub async fn set_nevm(&mut self, address: &str) {
        self.record.bind_nevm(address);
        self.persist().await;
    }

    /// Re-run the executor for the unchanged current status.
    pub async fn retry_current_step(&mut self) {
        self.current_error = None;
        self.last_effects_status = None;
        self.drive().await;
    }

    /// Run any pending side effect; the entry point for scheduled re-checks
    /// of confirmation and proof polling.
    pub async fn tick(&mut self) {
        self.drive().await;
    }

    /// Manual recovery: fall back to the status the last log entry was
    /// reached from.
    pub async fn revert_to_previous_status(&mut self) {
        let previous = self
            .record
            .logs
            .last()
            .and_then(|log| log.payload.previous_status);
        let Some(previous) = previous else {
            return;
        };
        self.current_error = None;
        self.last_effects_status = None;
        self.transition(previous).await;
        self.drive().await;
    }

    /// Administratively advance past the current step without running its
    /// side effect (e.g. after a manual network switch). A no-op on
    /// `completed`.
    pub async fn proceed_next_step(&mut self) -> Result<()> {
        if self.record.status == TransferStatus::Completed {
            return Ok(());
        }
        let next = self.machine.next_after(self.record.status)?;
        self.last_effects_status = Some(self.record.status);
        self.transition(next).await;
        self.drive().await;
        Ok(())
    }

    /// Run side effects until the transfer parks: NotReady, a step failure,
    /// or an idle status. Each status is executed at most once per change.
    async fn drive(&mut self) {
        loop {
            let status = self.record.status;
            if status.is_idle() {
                break;
            }
            if self.last_effects_status == Some(status) {
                break;
            }
            self.last_effects_status = Some(status);
            self.current_error = None;

            let logs_before = self.record.logs.len();
            let outcome = self.executor.execute(&mut self.record).await;

            let appended: Vec<TransferStatus> = self.record.logs[logs_before..]
                .iter()
                .map(|log| log.status)
                .collect();
            for log_status in appended {
                self.emit(TransferEvent::LogAppended {
                    id: self.record.id.clone(),
                    status: log_status,
                });
            }

            match outcome {
                Ok(StepOutcome::Success) => {
                    self.persist().await;
                    match self.machine.next_after(status) {
                        Ok(next) => self.transition(next).await,
                        Err(err) => {
                            self.fail(status, err);
                            break;
                        }
                    }
                }
                Ok(StepOutcome::NotReady) => {
                    // Nothing irreversible happened; let the next tick
                    // re-run this status.
                    self.last_effects_status = None;
                    break;
                }
                Ok(StepOutcome::Completed) => {
                    self.transition(TransferStatus::Completed).await;
                    break;
                }
                Err(err) => {
                    self.persist().await;
                    self.fail(status, err);
                    break;
                }
            }
        }
    }

    async fn transition(&mut self, next: TransferStatus) {
        let from = self.record.status;
        if from == next {
            return;
        }
        self.record.set_status(next);
        self.emit(TransferEvent::StatusChanged {
            id: self.record.id.clone(),
            from,
            to: next,
        });
        self.persist().await;
    }

    /// Persist the record; failures are reported, never propagated, and the
    /// in-memory record is left untouched.
    async fn persist(&self) {
        if self.record.status == TransferStatus::Initialize {
            return;
        }
        if let Err(err) = self.store.save(&self.record).await {
            warn!(id = %self.record.id, %err, "transfer persist failed");
            self.emit(TransferEvent::PersistenceFailed {
                id: self.record.id.clone(),
                message: err.to_string(),
            });
        }
    }

    fn fail(&mut self, status: TransferStatus, err: BridgeError) {
        warn!(id = %self.record.id, %status, %err, "transfer step failed");
        self.emit(TransferEvent::StepFailed {
            id: self.record.id.clone(),
            status,
            message: err.to_string(),
        });
        self.current_error = Some(err);
    }

    fn emit(&self, event: TransferEvent) {
        if let Some(handler) = &self.on_event {
            handler(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{FailingStore, MockBridge};
    use std::sync::{Arc, Mutex};
    use sysbridge_store::{MemoryStore, TransferStore};
    use sysbridge_types::SpvProof;

    fn dual_store() -> (Arc<MemoryStore>, DualStore) {
        let local = Arc::new(MemoryStore::new());
        (local.clone(), DualStore::new(local, None))
    }

    fn event_sink() -> (Arc<Mutex<Vec<TransferEvent>>>, TransferEventHandler) {
        let events: Arc<Mutex<Vec<TransferEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let handler: TransferEventHandler =
            Box::new(move |event| sink.lock().unwrap().push(event));
        (events, handler)
    }

    fn proof_for(txid: &str) -> SpvProof {
        SpvProof {
            transaction: format!("0200{}", txid.len()),
            index: 0,
            siblings: vec!["ab".repeat(32)],
            header: "00e0ff7f".into(),
            nevm_blockhash: "1234abcd".into(),
        }
    }

    async fn bound_orchestrator(
        bridge: &MockBridge,
        store: DualStore,
        config: OrchestratorConfig,
    ) -> TransferOrchestrator {
        let mut orchestrator = TransferOrchestrator::load(
            "t1",
            bridge.adapters(config.insert_switch),
            store,
            config,
            None,
        )
        .await
        .unwrap();
        orchestrator.set_utxo("zpub1", "sys1qaddr").await;
        orchestrator.set_nevm("0xFeedFace").await;
        orchestrator
    }

    #[tokio::test]
    async fn start_fails_fast_without_addresses() {
        let bridge = MockBridge::new();
        let (_, store) = dual_store();
        let mut orchestrator = TransferOrchestrator::load(
            "t1",
            bridge.adapters(false),
            store,
            OrchestratorConfig::default(),
            None,
        )
        .await
        .unwrap();

        let err = orchestrator.start("1.5").await.unwrap_err();
        assert!(matches!(err, BridgeError::Validation(_)));
        assert_eq!(orchestrator.record().status, TransferStatus::Initialize);
        assert!(orchestrator.record().logs.is_empty());
        assert!(bridge.utxo_wallet.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sys_to_nevm_transfer_runs_to_completion() {
        let bridge = MockBridge::new();
        let (local, store) = dual_store();
        let mut orchestrator =
            bound_orchestrator(&bridge, store, OrchestratorConfig::default()).await;

        orchestrator.start("1.5").await.unwrap();
        // burn-sys broadcast, now waiting on its confirmation.
        assert_eq!(orchestrator.record().status, TransferStatus::ConfirmBurnSys);
        assert!(orchestrator.current_error().is_none());

        bridge.confirmations.confirm("utxo-tx-1");
        orchestrator.tick().await;
        // burn-sysx broadcast, waiting again.
        assert_eq!(orchestrator.record().status, TransferStatus::ConfirmBurnSysx);

        bridge.confirmations.confirm("utxo-tx-2");
        orchestrator.tick().await;
        // Proof not indexed yet.
        assert_eq!(orchestrator.record().status, TransferStatus::GenerateProofs);

        bridge.proofs.set_ready(proof_for("utxo-tx-2"));
        orchestrator.tick().await;
        // Proofs logged and submitted; waiting for the relay receipt.
        assert_eq!(orchestrator.record().status, TransferStatus::Finalizing);
        assert_eq!(bridge.relay.requests.lock().unwrap().len(), 1);

        bridge.confirmations.confirm("0xrelayhash");
        orchestrator.tick().await;
        assert_eq!(orchestrator.record().status, TransferStatus::Completed);
        assert!(orchestrator.current_error().is_none());

        // Two burns total, and the persisted copy is terminal too.
        assert_eq!(bridge.utxo_wallet.sent.lock().unwrap().len(), 2);
        let stored = local.get("t1").await.unwrap().unwrap();
        assert_eq!(stored.status, TransferStatus::Completed);
        assert!(stored.latest_log(TransferStatus::Finalizing).is_some());
    }

    #[tokio::test]
    async fn nevm_to_sys_transfer_runs_to_completion() {
        let bridge = MockBridge::new();
        let (_, store) = dual_store();
        let mut orchestrator =
            bound_orchestrator(&bridge, store, OrchestratorConfig::default()).await;
        orchestrator
            .set_transfer_type(TransferType::NevmToSys)
            .await
            .unwrap();

        orchestrator.start("2").await.unwrap();
        assert_eq!(
            orchestrator.record().status,
            TransferStatus::ConfirmFreezeBurnSys
        );
        {
            let sent = bridge.nevm_wallet.sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].method, "freezeBurnERC20");
        }

        bridge.confirmations.confirm("0xnevm-tx-1");
        orchestrator.tick().await;
        // Mint broadcast on the UTXO side, referencing the freeze-burn.
        assert_eq!(orchestrator.record().status, TransferStatus::ConfirmMintSysx);
        {
            let sent = bridge.utxo_wallet.sent.lock().unwrap();
            assert_eq!(sent[0].nevm_txid.as_deref(), Some("0xnevm-tx-1"));
        }

        bridge.confirmations.confirm("utxo-tx-1");
        orchestrator.tick().await;
        // SYSX unwrapped back to SYS.
        assert_eq!(orchestrator.record().status, TransferStatus::ConfirmBurnSysx);

        // Finalizing waits on the burn-sysx txid on the UTXO chain; once it
        // confirms, the same drive runs through to completion.
        bridge.confirmations.confirm("utxo-tx-2");
        orchestrator.tick().await;
        assert_eq!(orchestrator.record().status, TransferStatus::Completed);
        assert!(orchestrator
            .record()
            .latest_log(TransferStatus::Finalizing)
            .is_some());
    }

    #[tokio::test]
    async fn finalizing_advances_to_completed_and_stays_there() {
        let bridge = MockBridge::new();
        let (_, store) = dual_store();
        let mut orchestrator =
            bound_orchestrator(&bridge, store, OrchestratorConfig::default()).await;

        orchestrator.record.push_log(
            TransferStatus::SubmitProofs,
            "Transaction hash",
            json!({"hash": "0xrelayhash"}),
        );
        orchestrator.record.set_status(TransferStatus::Finalizing);
        bridge.confirmations.confirm("0xrelayhash");

        orchestrator.tick().await;
        assert_eq!(orchestrator.record().status, TransferStatus::Completed);

        // proceed_next_step on completed is a no-op.
        orchestrator.proceed_next_step().await.unwrap();
        assert_eq!(orchestrator.record().status, TransferStatus::Completed);
    }

    #[tokio::test]
    async fn benign_relay_race_completes_without_an_error() {
        let bridge = MockBridge::new();
        bridge
            .relay
            .fail_with("Transaction was not mined within 50 blocks, but it might still be mined");
        let (_, store) = dual_store();
        let mut orchestrator =
            bound_orchestrator(&bridge, store, OrchestratorConfig::default()).await;

        orchestrator.record.push_log(
            TransferStatus::GenerateProofs,
            "Proofs ready",
            json!({"results": proof_for("abc")}),
        );
        orchestrator.record.set_status(TransferStatus::SubmitProofs);

        orchestrator.tick().await;
        assert_eq!(orchestrator.record().status, TransferStatus::Completed);
        assert!(orchestrator.current_error().is_none());
    }

    #[tokio::test]
    async fn failed_steps_surface_and_do_not_rerun_until_retried() {
        let bridge = MockBridge::new();
        bridge.relay.fail_with("execution reverted");
        let (_, store) = dual_store();
        let mut orchestrator =
            bound_orchestrator(&bridge, store, OrchestratorConfig::default()).await;

        orchestrator.record.push_log(
            TransferStatus::GenerateProofs,
            "Proofs ready",
            json!({"results": proof_for("abc")}),
        );
        orchestrator.record.set_status(TransferStatus::SubmitProofs);

        orchestrator.tick().await;
        assert_eq!(orchestrator.record().status, TransferStatus::SubmitProofs);
        assert!(matches!(
            orchestrator.current_error(),
            Some(BridgeError::Relay(_))
        ));
        assert_eq!(bridge.relay.requests.lock().unwrap().len(), 1);

        // Incidental re-entry must not resubmit.
        orchestrator.tick().await;
        assert_eq!(bridge.relay.requests.lock().unwrap().len(), 1);

        // An explicit retry does.
        orchestrator.retry_current_step().await;
        assert_eq!(bridge.relay.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn revert_returns_to_the_logged_previous_status() {
        let bridge = MockBridge::new();
        let (_, store) = dual_store();
        let mut orchestrator =
            bound_orchestrator(&bridge, store, OrchestratorConfig::default()).await;

        orchestrator.record.set_status(TransferStatus::BurnSys);
        orchestrator.record.push_log(
            TransferStatus::BurnSys,
            "Burning SYS to SYSX",
            json!({"tx": "abc"}),
        );

        orchestrator.revert_to_previous_status().await;
        assert_eq!(orchestrator.record().status, TransferStatus::Initialize);
    }

    #[tokio::test]
    async fn proceed_next_step_skips_the_current_side_effect() {
        let bridge = MockBridge::new();
        let (_, store) = dual_store();
        let config = OrchestratorConfig {
            insert_switch: true,
            ..Default::default()
        };
        let mut orchestrator = bound_orchestrator(&bridge, store, config).await;

        orchestrator.record.push_log(
            TransferStatus::GenerateProofs,
            "Proofs ready",
            json!({"results": proof_for("abc")}),
        );
        orchestrator.record.set_status(TransferStatus::Switch);

        // The switch happened out of band; skip straight to submit-proofs,
        // which then runs its own side effect.
        orchestrator.proceed_next_step().await.unwrap();
        assert!(orchestrator.record().latest_log(TransferStatus::Switch).is_none());
        assert_eq!(bridge.relay.requests.lock().unwrap().len(), 1);
        assert_eq!(orchestrator.record().status, TransferStatus::Finalizing);
    }

    #[tokio::test]
    async fn persistence_failures_never_block_completion() {
        let bridge = MockBridge::new();
        let (events, handler) = event_sink();
        let store = DualStore::new(Arc::new(FailingStore), None);
        let mut orchestrator = TransferOrchestrator::load(
            "t1",
            bridge.adapters(false),
            store,
            OrchestratorConfig::default(),
            Some(handler),
        )
        .await
        .unwrap();
        orchestrator.set_utxo("zpub1", "sys1qaddr").await;
        orchestrator.set_nevm("0xFeedFace").await;

        orchestrator.start("1").await.unwrap();
        bridge.confirmations.confirm("utxo-tx-1");
        orchestrator.tick().await;
        bridge.confirmations.confirm("utxo-tx-2");
        orchestrator.tick().await;
        bridge.proofs.set_ready(proof_for("utxo-tx-2"));
        orchestrator.tick().await;
        bridge.confirmations.confirm("0xrelayhash");
        orchestrator.tick().await;

        assert_eq!(orchestrator.record().status, TransferStatus::Completed);
        assert!(orchestrator.current_error().is_none());
        assert!(events
            .lock()
            .unwrap()
            .iter()
            .any(|event| matches!(event, TransferEvent::PersistenceFailed { .. })));
    }

    #[tokio::test]
    async fn events_trace_the_transfer_lifecycle() {
        let bridge = MockBridge::new();
        let (events, handler) = event_sink();
        let (_, store) = dual_store();
        let mut orchestrator = TransferOrchestrator::load(
            "t1",
            bridge.adapters(false),
            store,
            OrchestratorConfig::default(),
            Some(handler),
        )
        .await
        .unwrap();
        orchestrator.set_utxo("zpub1", "sys1qaddr").await;
        orchestrator.set_nevm("0xFeedFace").await;

        orchestrator.start("1").await.unwrap();

        let events = events.lock().unwrap();
        assert!(events.contains(&TransferEvent::StatusChanged {
            id: "t1".into(),
            from: TransferStatus::Initialize,
            to: TransferStatus::BurnSys,
        }));
        assert!(events.contains(&TransferEvent::LogAppended {
            id: "t1".into(),
            status: TransferStatus::BurnSys,
        }));
    }

    #[tokio::test]
    async fn reload_resumes_from_persisted_state() {
        let bridge = MockBridge::new();
        let local = Arc::new(MemoryStore::new());

        {
            let store = DualStore::new(local.clone(), None);
            let mut orchestrator =
                bound_orchestrator(&bridge, store, OrchestratorConfig::default()).await;
            orchestrator.start("1").await.unwrap();
            assert_eq!(orchestrator.record().status, TransferStatus::ConfirmBurnSys);
        }

        // A fresh orchestrator picks the record up where it parked; the
        // already-logged burn is not re-broadcast.
        let store = DualStore::new(local.clone(), None);
        let mut orchestrator = TransferOrchestrator::load(
            "t1",
            bridge.adapters(false),
            store,
            OrchestratorConfig::default(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(orchestrator.record().status, TransferStatus::ConfirmBurnSys);

        bridge.confirmations.confirm("utxo-tx-1");
        orchestrator.tick().await;
        assert_eq!(orchestrator.record().status, TransferStatus::ConfirmBurnSysx);
        assert_eq!(bridge.utxo_wallet.sent.lock().unwrap().len(), 2);
    }
}
