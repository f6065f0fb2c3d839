//! Collaborator seams between the dispatch engine and a concrete ledger network.

mod evm;

pub use evm::EvmConnector;

use crate::error::LedgerError;
use crate::types::{GasOverrides, TxHandle};
use async_trait::async_trait;
use std::sync::Arc;

/// Signs and submits token transfers for one account.
#[async_trait]
pub trait SigningClient: Send + Sync {
    /// Submit a transfer of `amount` base units to `recipient`.
    async fn transfer(
        &self,
        recipient: &str,
        amount: u128,
        overrides: GasOverrides,
    ) -> Result<TxHandle, LedgerError>;

    /// Resolve once the transaction is buried under `confirmations` blocks.
    async fn wait_for_confirmations(
        &self,
        tx: &TxHandle,
        confirmations: u64,
    ) -> Result<(), LedgerError>;

    async fn decimals(&self) -> Result<u8, LedgerError>;
}

#[async_trait]
pub trait FeeOracle: Send + Sync {
    /// Current network gas price in wei.
    async fn gas_price(&self) -> Result<u128, LedgerError>;
}

pub trait LedgerClient: SigningClient + FeeOracle {}

impl<T: SigningClient + FeeOracle> LedgerClient for T {}

/// Builds a client bound to a single endpoint.
pub trait LedgerConnector: Send + Sync {
    fn connect(&self, endpoint: &str) -> Result<Arc<dyn LedgerClient>, LedgerError>;
}
