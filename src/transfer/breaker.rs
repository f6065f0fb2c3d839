use crate::error::TransferError;
use crate::notify::NotificationSink;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, calls pass through.
    Closed,
    /// Calls fail immediately.
    Open,
    /// Probing recovery, calls pass through.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub cool_down: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 2,
            cool_down: Duration::from_secs(15),
        }
    }
}

/// Guards the transfer operation of one account.
///
/// Failures are counted cumulatively and only reset when a half-open probe
/// period closes the circuit again. A failure while half-open therefore
/// reopens the circuit as soon as the shared count is back at the threshold.
/// The open to half-open transition is evaluated lazily on the next call.
pub struct CircuitBreaker {
    label: String,
    config: CircuitBreakerConfig,
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
    notifier: Arc<dyn NotificationSink>,
}

impl CircuitBreaker {
    pub fn new(
        label: impl Into<String>,
        config: CircuitBreakerConfig,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let label = label.into();
        info!("[{}] Circuit breaker initialized in state {}", label, CircuitState::Closed);
        Self {
            label,
            config,
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            opened_at: None,
            notifier,
        }
    }

    /// State as of the last call; an elapsed cool-down is not reflected until the next call.
    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub async fn call<T, F, Fut>(&mut self, operation: F) -> Result<T, TransferError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, TransferError>>,
    {
        self.refresh().await;
        if self.state == CircuitState::Open {
            return Err(TransferError::CircuitOpen);
        }

        match operation().await {
            Ok(value) => {
                self.on_success().await;
                Ok(value)
            }
            Err(err) => {
                self.on_failure().await;
                Err(err)
            }
        }
    }

    async fn refresh(&mut self) {
        let Some(opened_at) = self.opened_at else {
            return;
        };
        if self.state == CircuitState::Open && opened_at.elapsed() >= self.config.cool_down {
            self.state = CircuitState::HalfOpen;
            self.success_count = 0;
            self.opened_at = None;
            info!("[{}] Circuit breaker: transitioning to HALF_OPEN, retrying...", self.label);
            self.notifier
                .notify(&format!(
                    "ℹ️ [{}] Circuit breaker switching to HALF_OPEN, retrying...",
                    self.label
                ))
                .await;
        }
    }

    async fn on_success(&mut self) {
        if self.state != CircuitState::HalfOpen {
            return;
        }
        self.success_count += 1;
        if self.success_count >= self.config.success_threshold {
            self.state = CircuitState::Closed;
            self.failure_count = 0;
            self.success_count = 0;
            info!("[{}] Circuit breaker: transitioning to CLOSED", self.label);
            self.notifier
                .notify(&format!("✅ [{}] Circuit breaker CLOSED again.", self.label))
                .await;
        }
    }

    async fn on_failure(&mut self) {
        self.failure_count += 1;
        warn!("[{}] Circuit breaker: failure count is {}", self.label, self.failure_count);
        if self.failure_count >= self.config.failure_threshold {
            self.state = CircuitState::Open;
            self.success_count = 0;
            self.opened_at = Some(Instant::now());
            error!(
                "[{}] Circuit breaker: transitioning to OPEN for {}ms",
                self.label,
                self.config.cool_down.as_millis()
            );
            self.notifier
                .notify(&format!(
                    "⚠️ [{}] Circuit breaker OPEN after {} failures.",
                    self.label, self.failure_count
                ))
                .await;
        }
    }
}
