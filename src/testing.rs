//! Scripted collaborators shared by the unit tests.

use crate::error::LedgerError;
use crate::ledger::{FeeOracle, LedgerClient, LedgerConnector, SigningClient};
use crate::notify::NotificationSink;
use crate::rpc::{EndpointRotator, RateLimitedCaller};
use crate::types::{GasOverrides, TxHandle};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Ledger client whose transfer outcomes are queued up front.
/// An empty queue means every transfer succeeds.
#[derive(Default)]
pub struct ScriptedClient {
    pub transfer_results: Mutex<VecDeque<Result<(), LedgerError>>>,
    pub transfers: Mutex<Vec<(String, u128, GasOverrides)>>,
    pub decimals_failures: Mutex<VecDeque<LedgerError>>,
    pub gas_price: u128,
    pub decimals: u8,
}

impl ScriptedClient {
    pub fn new(gas_price: u128) -> Self {
        Self {
            gas_price,
            decimals: 18,
            ..Self::default()
        }
    }

    pub fn push_results(&self, results: impl IntoIterator<Item = Result<(), LedgerError>>) {
        self.transfer_results.lock().unwrap().extend(results);
    }

    /// Failures returned by the next `decimals()` calls before it succeeds.
    pub fn push_decimals_failures(&self, failures: impl IntoIterator<Item = LedgerError>) {
        self.decimals_failures.lock().unwrap().extend(failures);
    }

    pub fn transfers(&self) -> Vec<(String, u128, GasOverrides)> {
        self.transfers.lock().unwrap().clone()
    }
}

#[async_trait]
impl SigningClient for ScriptedClient {
    async fn transfer(
        &self,
        recipient: &str,
        amount: u128,
        overrides: GasOverrides,
    ) -> Result<TxHandle, LedgerError> {
        let mut transfers = self.transfers.lock().unwrap();
        transfers.push((recipient.to_string(), amount, overrides));
        let index = transfers.len();
        drop(transfers);

        match self.transfer_results.lock().unwrap().pop_front() {
            Some(Err(err)) => Err(err),
            _ => Ok(TxHandle {
                hash: format!("0x{:064x}", index),
            }),
        }
    }

    async fn wait_for_confirmations(
        &self,
        _tx: &TxHandle,
        _confirmations: u64,
    ) -> Result<(), LedgerError> {
        Ok(())
    }

    async fn decimals(&self) -> Result<u8, LedgerError> {
        if let Some(err) = self.decimals_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.decimals)
    }
}

#[async_trait]
impl FeeOracle for ScriptedClient {
    async fn gas_price(&self) -> Result<u128, LedgerError> {
        Ok(self.gas_price)
    }
}

/// Hands out the same scripted client for every endpoint.
pub struct ScriptedConnector {
    pub client: Arc<ScriptedClient>,
    pub endpoints: Mutex<Vec<String>>,
}

impl ScriptedConnector {
    pub fn new(client: Arc<ScriptedClient>) -> Self {
        Self {
            client,
            endpoints: Mutex::new(Vec::new()),
        }
    }
}

impl LedgerConnector for ScriptedConnector {
    fn connect(&self, endpoint: &str) -> Result<Arc<dyn LedgerClient>, LedgerError> {
        self.endpoints.lock().unwrap().push(endpoint.to_string());
        Ok(self.client.clone())
    }
}

pub fn scripted_caller(client: Arc<ScriptedClient>) -> RateLimitedCaller {
    let rotator = EndpointRotator::new(vec![
        "https://primary".to_string(),
        "https://secondary".to_string(),
    ])
    .unwrap();
    RateLimitedCaller::new(
        rotator,
        Arc::new(ScriptedConnector::new(client)),
        Duration::from_secs(30),
    )
    .unwrap()
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

pub fn underpriced() -> LedgerError {
    LedgerError::other("replacement transaction underpriced")
}
