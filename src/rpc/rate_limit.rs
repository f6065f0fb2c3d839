use super::EndpointRotator;
use crate::error::LedgerError;
use crate::ledger::{LedgerClient, LedgerConnector};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

struct ActiveConnection {
    rotator: EndpointRotator,
    client: Arc<dyn LedgerClient>,
}

/// Runs ledger operations against the active endpoint, rotating away from
/// endpoints that report rate limits. Never retries on its own.
pub struct RateLimitedCaller {
    connector: Arc<dyn LedgerConnector>,
    active: Mutex<ActiveConnection>,
    cool_down: Duration,
}

impl RateLimitedCaller {
    pub fn new(
        rotator: EndpointRotator,
        connector: Arc<dyn LedgerConnector>,
        cool_down: Duration,
    ) -> Result<Self, LedgerError> {
        let client = connector.connect(rotator.current())?;
        info!("RPC provider initialized: {}", rotator.current());
        Ok(Self {
            connector,
            active: Mutex::new(ActiveConnection { rotator, client }),
            cool_down,
        })
    }

    fn active(&self) -> MutexGuard<'_, ActiveConnection> {
        // The guarded state is replaced wholesale, so a poisoned lock still holds a usable value.
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn current_endpoint(&self) -> String {
        self.active().rotator.current().to_string()
    }

    pub fn client(&self) -> Arc<dyn LedgerClient> {
        self.active().client.clone()
    }

    /// Rebuild the client for the rotator's current endpoint.
    pub fn rebuild_connection(&self) -> Result<(), LedgerError> {
        let mut active = self.active();
        let endpoint = active.rotator.current().to_string();
        active.client = self.connector.connect(&endpoint)?;
        info!("Ledger client updated to: {}", endpoint);
        Ok(())
    }

    fn rotate(&self) -> String {
        let mut active = self.active();
        let endpoint = active.rotator.rotate().to_string();
        info!("Rotated. New RPC provider: {}", endpoint);
        endpoint
    }

    /// Run `operation` once. A rate-limited failure rotates the endpoint,
    /// rebuilds the client and waits out the cool-down before it is returned.
    pub async fn call<T, F, Fut>(&self, operation: F) -> Result<T, LedgerError>
    where
        F: FnOnce(Arc<dyn LedgerClient>) -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let (endpoint, client) = {
            let active = self.active();
            (active.rotator.current().to_string(), active.client.clone())
        };

        match operation(client).await {
            Ok(value) => Ok(value),
            Err(err) if err.is_rate_limited() => {
                error!("RPC rate limit detected at: {}", endpoint);
                self.rotate();
                if let Err(e) = self.rebuild_connection() {
                    error!("Failed to rebuild ledger client: {}", e);
                }
                warn!(
                    "Waiting {} seconds before retrying...",
                    self.cool_down.as_secs()
                );
                sleep(self.cool_down).await;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{FeeOracle, SigningClient};
    use crate::types::{GasOverrides, TxHandle};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Client that only reports which endpoint it was built for.
    struct EndpointClient {
        endpoint: String,
    }

    #[async_trait]
    impl SigningClient for EndpointClient {
        async fn transfer(
            &self,
            _recipient: &str,
            _amount: u128,
            _overrides: GasOverrides,
        ) -> Result<TxHandle, LedgerError> {
            Ok(TxHandle {
                hash: self.endpoint.clone(),
            })
        }

        async fn wait_for_confirmations(
            &self,
            _tx: &TxHandle,
            _confirmations: u64,
        ) -> Result<(), LedgerError> {
            Ok(())
        }

        async fn decimals(&self) -> Result<u8, LedgerError> {
            Ok(18)
        }
    }

    #[async_trait]
    impl FeeOracle for EndpointClient {
        async fn gas_price(&self) -> Result<u128, LedgerError> {
            Ok(1)
        }
    }

    #[derive(Default)]
    struct CountingConnector {
        connects: AtomicUsize,
    }

    impl LedgerConnector for CountingConnector {
        fn connect(&self, endpoint: &str) -> Result<Arc<dyn LedgerClient>, LedgerError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(EndpointClient {
                endpoint: endpoint.to_string(),
            }))
        }
    }

    fn caller(connector: Arc<CountingConnector>) -> RateLimitedCaller {
        let rotator = EndpointRotator::new(vec![
            "https://primary".to_string(),
            "https://secondary".to_string(),
        ])
        .unwrap();
        RateLimitedCaller::new(rotator, connector, Duration::from_secs(30)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_passes_through_without_rotation() {
        let connector = Arc::new(CountingConnector::default());
        let caller = caller(connector.clone());

        let value = caller.call(|_| async { Ok::<_, LedgerError>(7) }).await;

        assert_eq!(value, Ok(7));
        assert_eq!(caller.current_endpoint(), "https://primary");
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_429_rotates_once_and_waits_cool_down() {
        let connector = Arc::new(CountingConnector::default());
        let caller = caller(connector.clone());
        let started = tokio::time::Instant::now();

        let result: Result<(), _> = caller
            .call(|_| async { Err(LedgerError::new(Some(429), "Too Many Requests")) })
            .await;

        assert_eq!(result.unwrap_err().status, Some(429));
        assert_eq!(caller.current_endpoint(), "https://secondary");
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_secs(30));

        let hash = caller
            .call(|client| async move {
                client
                    .transfer("0xabc", 1, GasOverrides::default())
                    .await
            })
            .await
            .unwrap()
            .hash;
        assert_eq!(hash, "https://secondary");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_message_without_status_rotates() {
        let caller = caller(Arc::new(CountingConnector::default()));

        let _ = caller
            .call(|_| async { Err::<(), _>(LedgerError::other("daily rate limit reached")) })
            .await;

        assert_eq!(caller.current_endpoint(), "https://secondary");
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_do_not_rotate_or_wait() {
        let connector = Arc::new(CountingConnector::default());
        let caller = caller(connector.clone());
        let started = tokio::time::Instant::now();

        let result = caller
            .call(|_| async { Err::<(), _>(LedgerError::other("nonce too low")) })
            .await;

        assert_eq!(result.unwrap_err().message, "nonce too low");
        assert_eq!(caller.current_endpoint(), "https://primary");
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
