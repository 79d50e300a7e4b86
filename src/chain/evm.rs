use std::sync::{Mutex, PoisonError};

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::chain::{
    ChainClient, ChainError, ProviderEvent, ProviderHandle, ReadCall, TxParams, TxReceipt,
    WriteCall,
};
use crate::config::MigratorConfig;

// ── Contract interfaces ────────────────────────────────────────────

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
    }
}

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IMigrator {
        function migrate(uint256 amount) external;
    }
}

// ── Live client ────────────────────────────────────────────────────

/// JSON-RPC client signing with a local private key.
///
/// A local key never switches accounts, so the only provider event it emits
/// is the `Disconnect` sent by [`EvmChainClient::disconnect`].
pub struct EvmChainClient {
    rpc_url: Url,
    chain_id: u64,
    signer: PrivateKeySigner,
    events: Mutex<Option<mpsc::UnboundedSender<ProviderEvent>>>,
}

impl EvmChainClient {
    pub fn new(config: &MigratorConfig, private_key: &str) -> Result<Self, ChainError> {
        let rpc_url: Url = config
            .rpc_url
            .parse()
            .map_err(|e| ChainError::Transport(format!("invalid RPC URL {}: {e}", config.rpc_url)))?;
        let signer: PrivateKeySigner = private_key
            .trim()
            .trim_start_matches("0x")
            .parse()
            .map_err(|e| ChainError::Transport(format!("invalid private key: {e}")))?;

        Ok(EvmChainClient {
            rpc_url,
            chain_id: config.chain_id,
            signer,
            events: Mutex::new(None),
        })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// End the connection; subscribers see a `Disconnect` event.
    pub fn disconnect(&self) {
        let sender = self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = sender {
            let _ = tx.send(ProviderEvent::Disconnect);
        }
    }

    fn read_provider(&self) -> impl Provider + Clone {
        ProviderBuilder::new().connect_http(self.rpc_url.clone())
    }

    fn signer_provider(&self) -> impl Provider + Clone {
        let wallet = EthereumWallet::from(self.signer.clone());
        ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(self.rpc_url.clone())
    }
}

#[async_trait]
impl ChainClient for EvmChainClient {
    async fn connect(&self) -> Result<ProviderHandle, ChainError> {
        let actual = self
            .read_provider()
            .get_chain_id()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        if actual != self.chain_id {
            return Err(ChainError::WrongChain {
                expected: self.chain_id,
                actual,
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        info!(chain_id = actual, url = %self.rpc_url, "rpc reachable");
        Ok(ProviderHandle::new(true, rx))
    }

    async fn accounts(&self) -> Result<Vec<Address>, ChainError> {
        Ok(vec![self.signer.address()])
    }

    async fn read(&self, call: ReadCall) -> Result<U256, ChainError> {
        let provider = self.read_provider();
        let result = match call {
            ReadCall::BalanceOf { token, owner } => {
                IERC20::new(token, &provider).balanceOf(owner).call().await
            }
            ReadCall::Allowance {
                token,
                owner,
                spender,
            } => {
                IERC20::new(token, &provider)
                    .allowance(owner, spender)
                    .call()
                    .await
            }
        };
        result.map_err(|e| ChainError::CallFailed {
            method: call.method(),
            reason: e.to_string(),
        })
    }

    async fn write(&self, call: WriteCall, params: TxParams) -> Result<TxReceipt, ChainError> {
        let provider = self.signer_provider();
        debug!(method = call.method(), contract = %call.contract(), gas = params.gas, "sending tx");

        let pending = match call {
            WriteCall::Approve {
                token,
                spender,
                amount,
            } => {
                IERC20::new(token, &provider)
                    .approve(spender, amount)
                    .from(params.from)
                    .gas(params.gas)
                    .gas_price(params.gas_price)
                    .send()
                    .await
            }
            WriteCall::Migrate { migrator, amount } => {
                IMigrator::new(migrator, &provider)
                    .migrate(amount)
                    .from(params.from)
                    .gas(params.gas)
                    .gas_price(params.gas_price)
                    .send()
                    .await
            }
        }
        .map_err(|e| ChainError::Rejected(e.to_string()))?;

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        if !receipt.status() {
            return Err(ChainError::Reverted {
                tx_hash: receipt.transaction_hash,
            });
        }

        Ok(TxReceipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
        })
    }
}

/// Format an address for display (shortened).
pub fn short_addr(addr: &Address) -> String {
    let s = format!("{addr}");
    if s.len() > 10 {
        format!("{}...{}", &s[..6], &s[s.len() - 4..])
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // First anvil dev key.
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_client_derives_signer_address() {
        let client = EvmChainClient::new(&MigratorConfig::default(), DEV_KEY).unwrap();
        assert_eq!(
            format!("{:?}", client.address()),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_rejects_bad_key() {
        let err = EvmChainClient::new(&MigratorConfig::default(), "not-a-key").err();
        assert!(matches!(err, Some(ChainError::Transport(_))));
    }

    #[test]
    fn test_short_addr() {
        let short = short_addr(&Address::repeat_byte(0xab));
        assert_eq!(short.len(), 13);
        assert!(short.starts_with("0x"));
        assert_eq!(&short[6..9], "...");
    }

    #[tokio::test]
    async fn test_disconnect_without_connection_is_noop() {
        let client = EvmChainClient::new(&MigratorConfig::default(), DEV_KEY).unwrap();
        client.disconnect();
    }
}
