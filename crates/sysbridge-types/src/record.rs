//! The persisted transfer entity and its wire model.
//!
//! Field names follow the persistence gateway's JSON contract
//! (`type`, `utxoAddress`, `nevmAddress`, `createdAt`, `previousStatus`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::{constants, now_millis, BridgeError};

/// Transfer direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferType {
    #[serde(rename = "sys-to-nevm")]
    SysToNevm,
    #[serde(rename = "nevm-to-sys")]
    NevmToSys,
}

impl TransferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferType::SysToNevm => "sys-to-nevm",
            TransferType::NevmToSys => "nevm-to-sys",
        }
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferType {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sys-to-nevm" => Ok(TransferType::SysToNevm),
            "nevm-to-sys" => Ok(TransferType::NevmToSys),
            other => Err(BridgeError::Other(format!("unknown transfer type: {}", other))),
        }
    }
}

/// Closed set of protocol step ids.
///
/// A record's status is always `initialize`, `completed`, or a member of the
/// step catalog for its direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferStatus {
    Initialize,
    BurnSys,
    ConfirmBurnSys,
    BurnSysx,
    ConfirmBurnSysx,
    GenerateProofs,
    SubmitProofs,
    FreezeBurnSys,
    ConfirmFreezeBurnSys,
    MintSysx,
    ConfirmMintSysx,
    Switch,
    Finalizing,
    Completed,
    Error,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Initialize => "initialize",
            TransferStatus::BurnSys => "burn-sys",
            TransferStatus::ConfirmBurnSys => "confirm-burn-sys",
            TransferStatus::BurnSysx => "burn-sysx",
            TransferStatus::ConfirmBurnSysx => "confirm-burn-sysx",
            TransferStatus::GenerateProofs => "generate-proofs",
            TransferStatus::SubmitProofs => "submit-proofs",
            TransferStatus::FreezeBurnSys => "freeze-burn-sys",
            TransferStatus::ConfirmFreezeBurnSys => "confirm-freeze-burn-sys",
            TransferStatus::MintSysx => "mint-sysx",
            TransferStatus::ConfirmMintSysx => "confirm-mint-sysx",
            TransferStatus::Switch => "switch",
            TransferStatus::Finalizing => "finalizing",
            TransferStatus::Completed => "completed",
            TransferStatus::Error => "error",
        }
    }

    /// Statuses that never trigger side effects.
    pub fn is_idle(&self) -> bool {
        matches!(
            self,
            TransferStatus::Initialize | TransferStatus::Completed | TransferStatus::Error
        )
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferStatus {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initialize" => Ok(TransferStatus::Initialize),
            "burn-sys" => Ok(TransferStatus::BurnSys),
            "confirm-burn-sys" => Ok(TransferStatus::ConfirmBurnSys),
            "burn-sysx" => Ok(TransferStatus::BurnSysx),
            "confirm-burn-sysx" => Ok(TransferStatus::ConfirmBurnSysx),
            "generate-proofs" => Ok(TransferStatus::GenerateProofs),
            "submit-proofs" => Ok(TransferStatus::SubmitProofs),
            "freeze-burn-sys" => Ok(TransferStatus::FreezeBurnSys),
            "confirm-freeze-burn-sys" => Ok(TransferStatus::ConfirmFreezeBurnSys),
            "mint-sysx" => Ok(TransferStatus::MintSysx),
            "confirm-mint-sysx" => Ok(TransferStatus::ConfirmMintSysx),
            "switch" => Ok(TransferStatus::Switch),
            "finalizing" => Ok(TransferStatus::Finalizing),
            "completed" => Ok(TransferStatus::Completed),
            "error" => Ok(TransferStatus::Error),
            other => Err(BridgeError::UnknownStatus(other.into())),
        }
    }
}

/// Structured payload attached to a log entry.
///
/// `data` carries step outputs consumed by later steps (e.g. `{"tx": ...}`);
/// `previous_status` records the status the transfer came from, for the
/// manual recovery path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogPayload {
    pub data: Value,
    #[serde(
        rename = "previousStatus",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub previous_status: Option<TransferStatus>,
}

/// One append-only protocol log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub status: TransferStatus,
    pub message: String,
    pub payload: LogPayload,
    pub timestamp: u64,
}

impl LogEntry {
    pub fn new(
        status: TransferStatus,
        message: impl Into<String>,
        data: Value,
        previous_status: Option<TransferStatus>,
    ) -> Self {
        Self {
            status,
            message: message.into(),
            payload: LogPayload {
                data,
                previous_status,
            },
            timestamp: now_millis(),
        }
    }
}

/// SPV inclusion proof as delivered by the proof backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpvProof {
    /// Raw transaction bytes, unprefixed hex.
    pub transaction: String,
    /// Position of the transaction within its block.
    pub index: u32,
    /// Transaction hashes of the containing block, in block order.
    pub siblings: Vec<String>,
    /// Serialized block header, unprefixed hex.
    pub header: String,
    /// Hash of the NEVM block the UTXO block is anchored to.
    pub nevm_blockhash: String,
}

/// The persisted entity representing one transfer's progress.
///
/// Never deleted; mutated only through the methods below, reaching the
/// terminal `completed` status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub transfer_type: TransferType,
    pub status: TransferStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<TransferStatus>,
    pub amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utxo_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utxo_xpub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nevm_address: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    pub created_at: u64,
}

fn default_version() -> String {
    constants::PROTOCOL_VERSION.to_string()
}

impl TransferRecord {
    /// A freshly seeded record at `initialize`.
    pub fn seeded(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            transfer_type: TransferType::SysToNevm,
            status: TransferStatus::Initialize,
            previous_status: None,
            amount: "0".to_string(),
            utxo_address: None,
            utxo_xpub: None,
            nevm_address: None,
            version: default_version(),
            logs: Vec::new(),
            created_at: now_millis(),
        }
    }

    /// Move to a new status, remembering where we came from.
    pub fn set_status(&mut self, status: TransferStatus) {
        if self.status != status {
            self.previous_status = Some(self.status);
        }
        self.status = status;
    }

    pub fn set_type(&mut self, transfer_type: TransferType) {
        self.transfer_type = transfer_type;
    }

    pub fn set_amount(&mut self, amount: impl Into<String>) {
        self.amount = amount.into();
    }

    pub fn bind_utxo(&mut self, xpub: impl Into<String>, address: impl Into<String>) {
        self.utxo_xpub = Some(xpub.into());
        self.utxo_address = Some(address.into());
    }

    pub fn bind_nevm(&mut self, address: impl Into<String>) {
        self.nevm_address = Some(address.into());
    }

    /// Append a log entry stamped with the current previous-status.
    pub fn push_log(&mut self, status: TransferStatus, message: impl Into<String>, data: Value) {
        self.logs
            .push(LogEntry::new(status, message, data, self.previous_status));
    }

    /// Most recent log entry for the given status (logs scanned backward).
    pub fn latest_log(&self, status: TransferStatus) -> Option<&LogEntry> {
        self.logs.iter().rev().find(|log| log.status == status)
    }

    /// Most recent log payload data for the given status.
    pub fn latest_log_data(&self, status: TransferStatus) -> Option<&Value> {
        self.latest_log(status).map(|log| &log.payload.data)
    }
}
