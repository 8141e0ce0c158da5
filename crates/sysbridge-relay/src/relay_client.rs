//! Relay contract client.
//!
//! Encodes `relayTx(blockNumber, txBytes, txIndex, merkleSiblings,
//! blockHeader)` and submits it through the NEVM wallet capability.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use crate::{RelayAdapter, RelayRequest};
use sysbridge_types::{constants, Hex, Result};
use sysbridge_wallet::{NevmCallRequest, NevmWallet};

/// Client for the on-chain SPV relay contract.
pub struct RelayClient {
    contract_address: Hex,
    wallet: Arc<dyn NevmWallet>,
}

impl RelayClient {
    pub fn new(contract_address: &str, wallet: Arc<dyn NevmWallet>) -> Self {
        Self {
            contract_address: contract_address.to_string(),
            wallet,
        }
    }

    /// Client bound to the well-known relay contract.
    pub fn mainnet(wallet: Arc<dyn NevmWallet>) -> Self {
        Self::new(constants::RELAY_CONTRACT_ADDRESS, wallet)
    }

    fn encode(&self, request: &RelayRequest) -> NevmCallRequest {
        NevmCallRequest {
            to: self.contract_address.clone(),
            from: request.from.clone(),
            method: "relayTx".to_string(),
            params: json!([
                request.block_number,
                request.tx_bytes,
                request.tx_index,
                request.merkle_siblings,
                request.block_header,
            ]),
            gas: request.gas,
            max_fee_per_gas: Some(request.max_fee_per_gas.clone()),
        }
    }
}

#[async_trait]
impl RelayAdapter for RelayClient {
    async fn relay_tx(&self, request: &RelayRequest) -> Result<Hex> {
        let call = self.encode(request);
        let broadcast = self.wallet.send_transaction(&call).await?;
        Ok(broadcast.tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use sysbridge_types::BridgeError;
    use sysbridge_wallet::BroadcastResult;

    struct CapturingWallet {
        calls: Mutex<Vec<NevmCallRequest>>,
    }

    #[async_trait]
    impl NevmWallet for CapturingWallet {
        async fn send_transaction(&self, call: &NevmCallRequest) -> Result<BroadcastResult> {
            self.calls.lock().unwrap().push(call.clone());
            Ok(BroadcastResult {
                tx: "0xrelayhash".into(),
            })
        }

        async fn block_number(&self, _block_hash: &str) -> Result<u64> {
            Err(BridgeError::Other("not used".into()))
        }

        async fn gas_price(&self) -> Result<String> {
            Err(BridgeError::Other("not used".into()))
        }
    }

    #[tokio::test]
    async fn encodes_and_submits_the_relay_call() {
        let wallet = Arc::new(CapturingWallet {
            calls: Mutex::new(Vec::new()),
        });
        let client = RelayClient::mainnet(wallet.clone());

        let request = RelayRequest {
            block_number: 123,
            tx_bytes: "0x0200".into(),
            tx_index: 2,
            merkle_siblings: vec!["0xaa".into(), "0xbb".into()],
            block_header: "0x00e0".into(),
            from: "0xfeed".into(),
            gas: 400_000,
            max_fee_per_gas: "10000000000".into(),
        };

        let hash = client.relay_tx(&request).await.unwrap();
        assert_eq!(hash, "0xrelayhash");

        let calls = wallet.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.to, constants::RELAY_CONTRACT_ADDRESS);
        assert_eq!(call.method, "relayTx");
        assert_eq!(call.params[0], 123);
        assert_eq!(call.params[3][1], "0xbb");
        assert_eq!(call.gas, 400_000);
        assert_eq!(call.max_fee_per_gas.as_deref(), Some("10000000000"));
    }
}
