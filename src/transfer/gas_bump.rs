use crate::error::TransferError;
use crate::rpc::RateLimitedCaller;
use crate::types::{GasOverrides, TokenKind, TransferAttempt, TxHandle};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Scales `gas_price` by `bump` truncated to two decimal places.
pub fn bumped_gas_price(gas_price: u128, bump: f64) -> u128 {
    // Nudge before flooring so 1.15 * 100 lands on 115, not 114.
    let percent = (bump * 100.0 + 1e-9).floor() as u128;
    gas_price.saturating_mul(percent) / 100
}

/// Submits a transfer, bidding a higher gas price each time the node reports
/// an underpriced replacement.
#[derive(Debug, Clone)]
pub struct GasBumpingTransferExecutor {
    token: TokenKind,
    max_attempts: u32,
    bump_factor: f64,
    bump_delay: Duration,
}

impl GasBumpingTransferExecutor {
    pub fn new(token: TokenKind, max_attempts: u32, bump_factor: f64, bump_delay: Duration) -> Self {
        Self {
            token,
            max_attempts,
            bump_factor,
            bump_delay,
        }
    }

    pub async fn execute(
        &self,
        caller: &RateLimitedCaller,
        recipient: &str,
        amount: u128,
    ) -> Result<TxHandle, TransferError> {
        let mut bump = 1.0_f64;

        for attempt in 0..self.max_attempts {
            let record = TransferAttempt {
                recipient,
                amount,
                attempt,
                gas_multiplier: bump,
            };
            let overrides = self.overrides_for(caller, &record).await?;

            let result = caller
                .call(|client| async move { client.transfer(recipient, amount, overrides).await })
                .await;

            match result {
                Ok(handle) => return Ok(handle),
                Err(err) if err.is_underpriced_replacement() => {
                    bump *= self.bump_factor;
                    warn!(
                        "Replacement transaction underpriced. Raising multiplier to {:.2} (attempt {}).",
                        bump,
                        attempt + 1
                    );
                    sleep(self.bump_delay).await;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(TransferError::Exhausted {
            attempts: self.max_attempts,
        })
    }

    async fn overrides_for(
        &self,
        caller: &RateLimitedCaller,
        record: &TransferAttempt<'_>,
    ) -> Result<GasOverrides, TransferError> {
        let mut overrides = self.token.base_overrides();
        if record.attempt == 0 {
            return Ok(overrides);
        }

        let network_price = caller
            .call(|client| async move { client.gas_price().await })
            .await?;
        let gas_price = bumped_gas_price(network_price, record.gas_multiplier);
        info!(
            "Attempt {}: using bumped gas price {:.3} gwei for {}",
            record.attempt + 1,
            gas_price as f64 / 1e9,
            record.recipient
        );
        overrides.gas_price = Some(gas_price);
        Ok(overrides)
    }
}
