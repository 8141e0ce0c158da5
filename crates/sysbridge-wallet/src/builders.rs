//! Burn and mint transaction builders.
//!
//! Builders assemble signable payloads from amount and addresses; the wallet
//! funds and signs them. A builder that can tell no payload is fundable
//! fails with `BridgeError::InsufficientFunds`.

use async_trait::async_trait;
use serde_json::json;

use crate::{NevmCallRequest, SignableTx, UtxoTxKind};
use sysbridge_types::{constants, to_satoshis, BridgeError, Result};

/// Gas limit for ERC20Manager freeze-burn calls.
const FREEZE_BURN_GAS_LIMIT: u64 = 400_000;

/// Builder capability for UTXO-chain transactions.
#[async_trait]
pub trait UtxoTxBuilder: Send + Sync {
    /// Burn native SYS into a SYSX allocation held by the same account.
    async fn burn_sys_to_sysx(
        &self,
        amount: &str,
        xpub: &str,
        sys_address: &str,
    ) -> Result<SignableTx>;

    /// Burn a SYSX allocation. With `nevm_address` (0x-stripped) the burn
    /// moves value toward NEVM; without it the allocation unwraps back to
    /// native SYS.
    async fn burn_sysx(
        &self,
        amount: &str,
        asset_guid: &str,
        sys_address: &str,
        xpub: &str,
        nevm_address: Option<&str>,
    ) -> Result<SignableTx>;

    /// Mint a SYSX allocation from a proven NEVM freeze-burn transaction.
    async fn mint_sysx(
        &self,
        amount: &str,
        sys_address: &str,
        xpub: &str,
        nevm_txid: &str,
    ) -> Result<SignableTx>;
}

/// Default allocation transaction builder.
pub struct AllocationTxBuilder {
    fee_rate: u64,
}

impl AllocationTxBuilder {
    pub fn new() -> Self {
        Self {
            fee_rate: constants::DEFAULT_FEE_RATE,
        }
    }

    pub fn with_fee_rate(fee_rate: u64) -> Self {
        Self { fee_rate }
    }

    fn burnable_satoshis(&self, amount: &str) -> Result<u64> {
        let satoshis = to_satoshis(amount)?;
        if satoshis == 0 {
            return Err(BridgeError::InsufficientFunds);
        }
        Ok(satoshis)
    }
}

impl Default for AllocationTxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UtxoTxBuilder for AllocationTxBuilder {
    async fn burn_sys_to_sysx(
        &self,
        amount: &str,
        xpub: &str,
        sys_address: &str,
    ) -> Result<SignableTx> {
        Ok(SignableTx {
            kind: UtxoTxKind::BurnToAllocation,
            amount_satoshis: self.burnable_satoshis(amount)?,
            asset_guid: constants::SYSX_ASSET_GUID.to_string(),
            change_address: sys_address.to_string(),
            xpub: xpub.to_string(),
            fee_rate: self.fee_rate,
            rbf: true,
            nevm_address: None,
            nevm_txid: None,
        })
    }

    async fn burn_sysx(
        &self,
        amount: &str,
        asset_guid: &str,
        sys_address: &str,
        xpub: &str,
        nevm_address: Option<&str>,
    ) -> Result<SignableTx> {
        Ok(SignableTx {
            kind: UtxoTxKind::AllocationBurn,
            amount_satoshis: self.burnable_satoshis(amount)?,
            asset_guid: asset_guid.to_string(),
            change_address: sys_address.to_string(),
            xpub: xpub.to_string(),
            fee_rate: self.fee_rate,
            rbf: true,
            nevm_address: nevm_address.map(str::to_string),
            nevm_txid: None,
        })
    }

    async fn mint_sysx(
        &self,
        amount: &str,
        sys_address: &str,
        xpub: &str,
        nevm_txid: &str,
    ) -> Result<SignableTx> {
        Ok(SignableTx {
            kind: UtxoTxKind::AllocationMint,
            amount_satoshis: self.burnable_satoshis(amount)?,
            asset_guid: constants::SYSX_ASSET_GUID.to_string(),
            change_address: sys_address.to_string(),
            xpub: xpub.to_string(),
            fee_rate: self.fee_rate,
            rbf: true,
            nevm_address: None,
            nevm_txid: Some(nevm_txid.to_string()),
        })
    }
}

/// Encode an ERC20Manager freeze-burn call moving value toward the UTXO
/// chain.
pub fn freeze_burn_request(
    amount: &str,
    nevm_from: &str,
    utxo_address: &str,
) -> Result<NevmCallRequest> {
    let satoshis = to_satoshis(amount)?;
    if satoshis == 0 {
        return Err(BridgeError::InsufficientFunds);
    }

    Ok(NevmCallRequest {
        to: constants::ERC20_MANAGER_CONTRACT_ADDRESS.to_string(),
        from: nevm_from.to_string(),
        method: "freezeBurnERC20".to_string(),
        params: json!([
            satoshis.to_string(),
            constants::SYSX_ASSET_GUID,
            utxo_address,
        ]),
        gas: FREEZE_BURN_GAS_LIMIT,
        max_fee_per_gas: None,
    })
}
