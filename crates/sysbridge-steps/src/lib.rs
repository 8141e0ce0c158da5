//! Step catalog and transition table for bridge transfers.
//!
//! - `step_catalog`: pure mapping `(direction, insert_switch)` -> ordered steps
//! - `TransferStateMachine`: the catalog validated into a closed transition
//!   table, used to advance a transfer and to locate the current step

use serde::Serialize;
use sysbridge_types::{BridgeError, Result, TransferStatus, TransferType};

/// One protocol step, with a presentation label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub id: TransferStatus,
    pub label: &'static str,
}

impl Step {
    const fn new(id: TransferStatus, label: &'static str) -> Self {
        Self { id, label }
    }
}

const SYS_TO_NEVM_STEPS: &[Step] = &[
    Step::new(TransferStatus::BurnSys, "Burn SYS"),
    Step::new(TransferStatus::ConfirmBurnSys, "Confirm burn SYS"),
    Step::new(TransferStatus::BurnSysx, "Burn SYSX"),
    Step::new(TransferStatus::ConfirmBurnSysx, "Confirm burn SYSX"),
    Step::new(TransferStatus::GenerateProofs, "Generate proofs"),
    Step::new(TransferStatus::SubmitProofs, "Submit proofs"),
    Step::new(TransferStatus::Finalizing, "Finalizing"),
];

const NEVM_TO_SYS_STEPS: &[Step] = &[
    Step::new(TransferStatus::FreezeBurnSys, "Freeze and burn SYS"),
    Step::new(TransferStatus::ConfirmFreezeBurnSys, "Confirm freeze and burn"),
    Step::new(TransferStatus::MintSysx, "Mint SYSX"),
    Step::new(TransferStatus::ConfirmMintSysx, "Confirm mint SYSX"),
    Step::new(TransferStatus::BurnSysx, "Burn SYSX"),
    Step::new(TransferStatus::ConfirmBurnSysx, "Confirm burn SYSX"),
    Step::new(TransferStatus::Finalizing, "Finalizing"),
];

const SWITCH_STEP: Step = Step::new(TransferStatus::Switch, "Switch network");

/// The step the optional network switch is spliced in front of: the first
/// step that needs the destination-side wallet.
fn switch_anchor(transfer_type: TransferType) -> TransferStatus {
    match transfer_type {
        TransferType::SysToNevm => TransferStatus::SubmitProofs,
        TransferType::NevmToSys => TransferStatus::MintSysx,
    }
}

/// Ordered list of protocol steps for a transfer direction.
///
/// Pure and deterministic: identical inputs always yield identical ordering.
pub fn step_catalog(transfer_type: TransferType, insert_switch: bool) -> Vec<Step> {
    let base = match transfer_type {
        TransferType::SysToNevm => SYS_TO_NEVM_STEPS,
        TransferType::NevmToSys => NEVM_TO_SYS_STEPS,
    };

    let mut steps = Vec::with_capacity(base.len() + 1);
    let anchor = switch_anchor(transfer_type);
    for step in base {
        if insert_switch && step.id == anchor {
            steps.push(SWITCH_STEP.clone());
        }
        steps.push(step.clone());
    }
    steps
}

/// A validated, closed transition table for one transfer direction.
///
/// Construction rejects duplicate step ids, so a malformed catalog is caught
/// up front instead of silently falling through at dispatch time.
#[derive(Debug, Clone)]
pub struct TransferStateMachine {
    transfer_type: TransferType,
    order: Vec<TransferStatus>,
}

impl TransferStateMachine {
    pub fn new(transfer_type: TransferType, insert_switch: bool) -> Result<Self> {
        let order: Vec<TransferStatus> = step_catalog(transfer_type, insert_switch)
            .into_iter()
            .map(|step| step.id)
            .collect();

        for (i, status) in order.iter().enumerate() {
            if order[i + 1..].contains(status) {
                return Err(BridgeError::Other(format!(
                    "duplicate step id in {} catalog: {}",
                    transfer_type, status
                )));
            }
        }

        Ok(Self {
            transfer_type,
            order,
        })
    }

    pub fn transfer_type(&self) -> TransferType {
        self.transfer_type
    }

    pub fn steps(&self) -> &[TransferStatus] {
        &self.order
    }

    /// The direction-specific first action step after `start`.
    pub fn first_step(&self) -> TransferStatus {
        self.order[0]
    }

    /// Position of a status within the catalog.
    pub fn position(&self, status: TransferStatus) -> Option<usize> {
        self.order.iter().position(|s| *s == status)
    }

    pub fn contains(&self, status: TransferStatus) -> bool {
        self.position(status).is_some()
    }

    /// The status a successful step advances to.
    ///
    /// `finalizing` is terminal-adjacent: it always yields `completed`,
    /// regardless of catalog position. `initialize` enters the catalog at its
    /// first step; `completed` stays put.
    pub fn next_after(&self, status: TransferStatus) -> Result<TransferStatus> {
        match status {
            TransferStatus::Finalizing => Ok(TransferStatus::Completed),
            TransferStatus::Completed => Ok(TransferStatus::Completed),
            TransferStatus::Initialize => Ok(self.first_step()),
            _ => {
                let position = self.position(status).ok_or_else(|| {
                    BridgeError::UnknownStatus(format!(
                        "{} is not part of the {} catalog",
                        status, self.transfer_type
                    ))
                })?;
                match self.order.get(position + 1) {
                    Some(next) => Ok(*next),
                    None => Ok(TransferStatus::Completed),
                }
            }
        }
    }
}
