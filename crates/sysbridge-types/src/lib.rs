use thiserror::Error;

pub mod record;

pub use record::{
    LogEntry, LogPayload, SpvProof, TransferRecord, TransferStatus, TransferType,
};

/// 0x-prefixed hex string (e.g. "0x1234...").
pub type Hex = String;

/// Bridge SDK error types.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("missing required input: {0}")]
    Validation(String),

    #[error("could not create transaction, not enough funds?")]
    InsufficientFunds,

    #[error("malformed transaction request: {0}")]
    MalformedRequest(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("unknown transfer status: {0}")]
    UnknownStatus(String),

    #[error("no `{status}` log entry recorded for transfer {id}")]
    MissingLogEntry { id: String, status: String },

    #[error("wallet error: {0}")]
    Wallet(String),

    #[error("proof backend error: {0}")]
    ProofBackend(String),

    #[error("relay error: {0}")]
    Relay(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Chain-level constants shared across the workspace.
pub mod constants {
    /// Asset guid of SYSX, the wrapped SYS allocation on the UTXO chain.
    pub const SYSX_ASSET_GUID: &str = "123456";

    /// The SPV relay contract on NEVM.
    pub const RELAY_CONTRACT_ADDRESS: &str = "0xD822557aC2F2b77A1988617308e4A29A89Cb95A6";

    /// The ERC20Manager contract holding frozen SYS on NEVM.
    pub const ERC20_MANAGER_CONTRACT_ADDRESS: &str =
        "0xA738a563F9ecb55e0b2245D1e9E380f0fE455ea1";

    /// Default Blockbook indexer endpoint.
    pub const BLOCKBOOK_API_URL: &str = "https://blockbook.elint.services";

    /// Fee rate (satoshis per byte) for UTXO burn/mint transactions.
    pub const DEFAULT_FEE_RATE: u64 = 10;

    /// Gas limit for relay contract submissions.
    pub const RELAY_GAS_LIMIT: u64 = 400_000;

    /// Single versioned protocol contract tag stamped on new records.
    pub const PROTOCOL_VERSION: &str = "v3";

    /// Satoshis per whole SYS.
    pub const SATOSHIS_PER_SYS: u64 = 100_000_000;
}

/// Current unix time in milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Strip a leading "0x" prefix, if present.
pub fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

/// Add a "0x" prefix, if absent.
pub fn ensure_0x(s: &str) -> Hex {
    if s.starts_with("0x") {
        s.to_string()
    } else {
        format!("0x{}", s)
    }
}

/// Parse a decimal amount string (e.g. "1.25") into satoshis.
///
/// At most 8 fractional digits are accepted.
pub fn to_satoshis(amount: &str) -> Result<u64> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(BridgeError::InvalidAmount("empty amount".into()));
    }

    let (whole, fraction) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };

    if fraction.len() > 8 {
        return Err(BridgeError::InvalidAmount(format!(
            "more than 8 decimal places: {}",
            amount
        )));
    }
    if whole.is_empty() && fraction.is_empty() {
        return Err(BridgeError::InvalidAmount(amount.into()));
    }
    if !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(BridgeError::InvalidAmount(amount.into()));
    }

    let whole_val: u64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| BridgeError::InvalidAmount(amount.into()))?
    };

    let mut fraction_val: u64 = if fraction.is_empty() {
        0
    } else {
        fraction
            .parse()
            .map_err(|_| BridgeError::InvalidAmount(amount.into()))?
    };
    fraction_val *= 10u64.pow(8 - fraction.len() as u32);

    whole_val
        .checked_mul(constants::SATOSHIS_PER_SYS)
        .and_then(|v| v.checked_add(fraction_val))
        .ok_or_else(|| BridgeError::InvalidAmount(format!("amount overflow: {}", amount)))
}

/// Truncate a decimal amount string to at most `dp` fractional digits.
pub fn truncate_decimals(amount: &str, dp: usize) -> Result<String> {
    // Validate through the satoshi parser first.
    to_satoshis(amount)?;
    let amount = amount.trim();
    Ok(match amount.split_once('.') {
        Some((whole, fraction)) if fraction.len() > dp => {
            if dp == 0 {
                whole.to_string()
            } else {
                format!("{}.{}", whole, &fraction[..dp])
            }
        }
        _ => amount.to_string(),
    })
}
