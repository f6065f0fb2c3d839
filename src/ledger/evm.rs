use super::{FeeOracle, LedgerClient, LedgerConnector, SigningClient};
use crate::error::{ConfigError, LedgerError};
use crate::types::{GasOverrides, TxHandle};
use alloy::network::{EthereumWallet, ReceiptResponse};
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use alloy::transports::{RpcError, TransportError, TransportErrorKind};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

alloy::sol! {
    #[sol(rpc)]
    interface IERC20 {
        function transfer(address to, uint256 amount) external returns (bool);
        function decimals() external view returns (uint8);
    }
}

/// Creates wallet-backed ERC-20 clients for one account.
pub struct EvmConnector {
    signer: PrivateKeySigner,
    token: Address,
    confirmation_timeout: Duration,
}

impl EvmConnector {
    pub fn new(
        private_key: &str,
        token_address: &str,
        confirmation_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let signer = private_key
            .trim_start_matches("0x")
            .parse::<PrivateKeySigner>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "private_keys",
                reason: e.to_string(),
            })?;
        let token = token_address
            .parse::<Address>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "token_addresses",
                reason: format!("{}: {}", token_address, e),
            })?;

        Ok(Self {
            signer,
            token,
            confirmation_timeout,
        })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }
}

impl LedgerConnector for EvmConnector {
    fn connect(&self, endpoint: &str) -> Result<Arc<dyn LedgerClient>, LedgerError> {
        let url = endpoint
            .parse::<Url>()
            .map_err(|e| LedgerError::other(format!("Invalid RPC url {}: {}", endpoint, e)))?;

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(self.signer.clone()))
            .connect_http(url)
            .erased();

        info!(
            "Wallet {} connected to {} for token {}",
            self.signer.address(),
            endpoint,
            self.token
        );

        Ok(Arc::new(EvmClient {
            contract: IERC20::new(self.token, provider.clone()),
            provider,
            confirmation_timeout: self.confirmation_timeout,
        }))
    }
}

struct EvmClient {
    provider: DynProvider,
    contract: IERC20::IERC20Instance<DynProvider>,
    confirmation_timeout: Duration,
}

#[async_trait]
impl SigningClient for EvmClient {
    async fn transfer(
        &self,
        recipient: &str,
        amount: u128,
        overrides: GasOverrides,
    ) -> Result<TxHandle, LedgerError> {
        let to = recipient
            .parse::<Address>()
            .map_err(|e| LedgerError::other(format!("Invalid recipient address {}: {}", recipient, e)))?;

        let mut call = self.contract.transfer(to, U256::from(amount));
        if let Some(gas_limit) = overrides.gas_limit {
            call = call.gas(gas_limit);
        }
        if let Some(gas_price) = overrides.gas_price {
            call = call.gas_price(gas_price);
        }

        debug!("Submitting transfer of {} base units to {}", amount, to);
        let pending = call.send().await.map_err(contract_error)?;

        Ok(TxHandle {
            hash: format!("{:#x}", pending.tx_hash()),
        })
    }

    async fn wait_for_confirmations(
        &self,
        tx: &TxHandle,
        confirmations: u64,
    ) -> Result<(), LedgerError> {
        let hash = tx
            .hash
            .parse::<TxHash>()
            .map_err(|e| LedgerError::other(format!("Invalid transaction hash {}: {}", tx.hash, e)))?;

        let end_time = Instant::now() + self.confirmation_timeout;
        while Instant::now() < end_time {
            match self.provider.get_transaction_receipt(hash).await {
                Ok(Some(receipt)) => {
                    if !receipt.status() {
                        return Err(LedgerError::other(format!(
                            "Transaction {} reverted",
                            tx.hash
                        )));
                    }
                    if let Some(mined_in) = receipt.block_number {
                        let head = self
                            .provider
                            .get_block_number()
                            .await
                            .map_err(transport_error)?;
                        if head + 1 >= mined_in + confirmations {
                            return Ok(());
                        }
                    }
                    sleep(Duration::from_millis(1000)).await;
                }
                Ok(None) => {
                    sleep(Duration::from_millis(1000)).await;
                }
                Err(e) => {
                    let err = transport_error(e);
                    if err.is_rate_limited() {
                        return Err(err);
                    }
                    warn!("Error checking receipt for {}: {}", tx.hash, err);
                    sleep(Duration::from_millis(2000)).await;
                }
            }
        }

        Err(LedgerError::other(format!(
            "Timeout while confirming transaction {}",
            tx.hash
        )))
    }

    async fn decimals(&self) -> Result<u8, LedgerError> {
        self.contract.decimals().call().await.map_err(contract_error)
    }
}

#[async_trait]
impl FeeOracle for EvmClient {
    async fn gas_price(&self) -> Result<u128, LedgerError> {
        self.provider.get_gas_price().await.map_err(transport_error)
    }
}

fn transport_error(err: TransportError) -> LedgerError {
    let status = match &err {
        RpcError::Transport(TransportErrorKind::HttpError(http)) => Some(http.status),
        _ => None,
    };
    LedgerError::new(status, err.to_string())
}

fn contract_error(err: alloy::contract::Error) -> LedgerError {
    match err {
        alloy::contract::Error::TransportError(e) => transport_error(e),
        other => LedgerError::other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Anvil's first dev account.
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_connector_parses_key_and_token() {
        let connector = EvmConnector::new(
            DEV_KEY,
            "0x7eaa67f8d365bbe27d6278fdc2ba24a1aa71c8e5",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            format!("{:#x}", connector.address()),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_connector_rejects_bad_token_address() {
        let err = EvmConnector::new(DEV_KEY, "not-an-address", Duration::from_secs(5))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "token_addresses",
                ..
            }
        ));
    }

    #[test]
    fn test_http_status_extracted_from_transport_error() {
        let err = TransportErrorKind::http_error(429, "Too Many Requests".to_string());
        let ledger = transport_error(err);
        assert_eq!(ledger.status, Some(429));
        assert!(ledger.is_rate_limited());
    }

    #[tokio::test]
    async fn test_connect_builds_client_without_network() {
        let connector = EvmConnector::new(
            DEV_KEY,
            "0x7eaa67f8d365bbe27d6278fdc2ba24a1aa71c8e5",
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(connector.connect("http://127.0.0.1:8545").is_ok());
        assert!(connector.connect("not a url").is_err());
    }
}
