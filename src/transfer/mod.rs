//! Resilience stack around a single token transfer.

mod breaker;
mod gas_bump;
mod retry;

pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use gas_bump::{GasBumpingTransferExecutor, bumped_gas_price};
pub use retry::ExponentialRetrier;
