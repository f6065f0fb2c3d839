use crate::config::{AccountConfig, ResilienceConfig, ScheduleConfig};
use crate::error::{ScheduleError, TransferError};
use crate::notify::NotificationSink;
use crate::recipients::{RecipientFiles, RecipientLedger, RecipientStore};
use crate::rpc::RateLimitedCaller;
use crate::schedule::{DayPlan, SessionScheduler, format_countdown};
use crate::transfer::{
    CircuitBreaker, CircuitBreakerConfig, ExponentialRetrier, GasBumpingTransferExecutor,
};
use crate::types::{
    BatchTally, DayOutcome, DaySummary, SessionName, SessionSummary, TokenKind, TransferResult,
    TransferStatus, TxHandle,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Settings shared by every account.
#[derive(Debug, Clone, Default)]
pub struct WorkerSettings {
    pub resilience: ResilienceConfig,
    pub schedule: ScheduleConfig,
    pub explorer_tx_url: Option<String>,
}

/// Drives one account's day-over-day distribution loop.
pub struct AccountWorker {
    config: AccountConfig,
    caller: RateLimitedCaller,
    executor: GasBumpingTransferExecutor,
    retrier: ExponentialRetrier,
    breaker: CircuitBreaker,
    scheduler: SessionScheduler,
    store: Arc<dyn RecipientStore>,
    notifier: Arc<dyn NotificationSink>,
    files: RecipientFiles,
    confirmations: u64,
    explorer_tx_url: Option<String>,
    day_retry_delay: Duration,
    rng: StdRng,
}

impl AccountWorker {
    pub fn new(
        config: AccountConfig,
        caller: RateLimitedCaller,
        files: RecipientFiles,
        settings: &WorkerSettings,
        store: Arc<dyn RecipientStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let resilience = &settings.resilience;
        let executor = GasBumpingTransferExecutor::new(
            config.token_kind,
            resilience.gas_bump_attempts,
            resilience.gas_bump_factor,
            Duration::from_secs(resilience.gas_bump_delay_secs),
        );
        let retrier = ExponentialRetrier::new(
            resilience.retry_attempts,
            Duration::from_millis(resilience.retry_initial_delay_ms),
        );
        let breaker = CircuitBreaker::new(
            config.tag.clone(),
            CircuitBreakerConfig {
                failure_threshold: resilience.breaker_failure_threshold,
                success_threshold: resilience.breaker_success_threshold,
                cool_down: Duration::from_secs(resilience.breaker_cool_down_secs),
            },
            notifier.clone(),
        );

        Self {
            executor,
            retrier,
            breaker,
            scheduler: SessionScheduler::new(&settings.schedule),
            store,
            notifier,
            files,
            confirmations: resilience.confirmations,
            explorer_tx_url: settings.explorer_tx_url.clone(),
            day_retry_delay: Duration::from_secs(settings.schedule.day_retry_delay_secs),
            rng: StdRng::from_entropy(),
            config,
            caller,
        }
    }

    #[cfg(test)]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn tag(&self) -> &str {
        &self.config.tag
    }

    /// Run day after day until the process is terminated.
    pub async fn run(mut self) {
        let mut day = 1;
        loop {
            info!("Starting distribution for {} on Day {}", self.config.tag, day);
            if day > 1 {
                self.wait_for_day_start(day).await;
            }
            self.run_day_to_completion(day).await;
            info!("Finished distribution for {} on Day {}", self.config.tag, day);
            day += 1;
        }
    }

    /// Repeat `day` until it runs, waiting `day_retry_delay` after each failure.
    async fn run_day_to_completion(&mut self, day: u32) -> DaySummary {
        loop {
            match self.run_day(day).await {
                Ok(summary) => return summary,
                Err(e) => {
                    error!("[{}] Day {} failed: {:#}", self.config.tag, day, e);
                    self.notifier
                        .notify(&format!(
                            "❌ *{}* Day {} failed: {}. Retrying in {}s.",
                            self.config.tag,
                            day,
                            e,
                            self.day_retry_delay.as_secs()
                        ))
                        .await;
                    sleep(self.day_retry_delay).await;
                }
            }
        }
    }

    async fn wait_for_day_start(&mut self, day: u32) {
        let now = Utc::now();
        let start = self.scheduler.next_day_start(now, &mut self.rng);
        let wait = (start - now).to_std().unwrap_or(Duration::ZERO);
        if !wait.is_zero() {
            info!(
                "[{}] Waiting for Day {} to start (session 1 at {}) in {}",
                self.config.tag,
                day,
                start.format("%H:%M UTC"),
                format_countdown(wait)
            );
            sleep(wait).await;
        }
    }

    /// Run one day's plan. Errors are only returned for failures before any transfer was attempted.
    pub async fn run_day(&mut self, day: u32) -> Result<DaySummary> {
        let decimals = self.resolve_decimals().await?;
        let mut ledger =
            RecipientLedger::load(self.store.as_ref(), self.files.clone(), &mut self.rng)?;
        info!(
            "[{}] {} eligible recipients for Day {}",
            self.config.tag,
            ledger.remaining(),
            day
        );

        let quota = self.scheduler.daily_quota(
            &mut self.rng,
            self.config.min_tx_per_day,
            self.config.max_tx_per_day,
        );
        info!("Total TX today for {}: {}", self.config.tag, quota);

        let plan = match self.scheduler.plan_day(day, quota, &mut self.rng) {
            Ok(plan) => plan,
            Err(err) => {
                error!("[{}] {}", self.config.tag, err);
                self.notifier
                    .notify(&format!(
                        "⚠️ *{}* Day {} skipped: {}",
                        self.config.tag, day, err
                    ))
                    .await;
                let ScheduleError::InsufficientQuota { quota, required } = err;
                return Ok(DaySummary {
                    day,
                    outcome: DayOutcome::Aborted { quota, required },
                });
            }
        };

        let tally = match plan {
            DayPlan::Single { quota } => {
                info!("🚀 {} - Day {}: processing TX directly", self.config.tag, day);
                self.run_batch(&mut ledger, quota, decimals).await
            }
            DayPlan::Sessions(sessions) => {
                info!(
                    "TX distribution per session for {}: {:?}",
                    self.config.tag,
                    sessions.quotas()
                );
                let mut tally = BatchTally::planned(sessions.total());
                for (index, (name, session_quota)) in sessions.sessions().enumerate() {
                    if index > 0 {
                        self.wait_between_sessions(name).await;
                    }
                    let summary = self
                        .run_session(&mut ledger, name, session_quota, decimals)
                        .await;
                    tally.absorb(&summary.tally);
                }
                tally
            }
        };

        self.report_day(day, &tally).await;
        self.notifier
            .notify(&format!("🚀 *{}* finished Day {}", self.config.tag, day))
            .await;

        Ok(DaySummary {
            day,
            outcome: DayOutcome::Completed(tally),
        })
    }

    async fn resolve_decimals(&self) -> Result<u8> {
        match self.config.token_kind {
            TokenKind::FixedGas { .. } => {
                info!(
                    "[{}] Fixed-gas token detected, using default decimals = {}",
                    self.config.tag,
                    TokenKind::FIXED_GAS_DECIMALS
                );
                Ok(TokenKind::FIXED_GAS_DECIMALS)
            }
            TokenKind::Standard => {
                let decimals = self
                    .caller
                    .call(|client| async move { client.decimals().await })
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to fetch token decimals: {}", e))?;
                Ok(decimals)
            }
        }
    }

    async fn wait_between_sessions(&mut self, next: SessionName) {
        let gap = self.scheduler.session_gap(&mut self.rng);
        let message = format!(
            "Pause before {} session for {}: {}",
            next,
            self.config.tag,
            format_countdown(gap)
        );
        info!("{}", message);
        self.notifier.notify(&message).await;
        sleep(gap).await;
    }

    async fn run_session(
        &mut self,
        ledger: &mut RecipientLedger,
        name: SessionName,
        quota: u32,
        decimals: u8,
    ) -> SessionSummary {
        let started_at = Utc::now();
        info!(
            "🚀 Starting {} session for {} at {}",
            name,
            self.config.tag,
            started_at.to_rfc3339()
        );

        let tally = self.run_batch(ledger, quota, decimals).await;
        let summary = SessionSummary {
            name,
            tally,
            started_at,
            finished_at: Utc::now(),
        };
        self.report_session(&summary).await;
        summary
    }

    async fn run_batch(
        &mut self,
        ledger: &mut RecipientLedger,
        quota: u32,
        decimals: u8,
    ) -> BatchTally {
        let mut tally = BatchTally::planned(quota);
        for index in 1..=quota {
            if ledger.next().is_none() {
                warn!(
                    "[{}] No recipients left, {} planned TX skipped",
                    self.config.tag,
                    quota - index + 1
                );
                break;
            }
            let result = self.transfer_next(ledger, index, decimals).await;
            tally.record(&result);
        }
        tally
    }

    async fn transfer_next(
        &mut self,
        ledger: &mut RecipientLedger,
        index: u32,
        decimals: u8,
    ) -> TransferResult {
        let recipient = ledger.next().unwrap_or_default().to_string();
        let amount = self.draw_amount();
        let delay = self.draw_delay();

        info!(
            "📤 [{}] TX #{} → {} | amount {:.2} TOKEN | delay {}s",
            self.config.tag,
            index,
            short_address(&recipient),
            amount,
            delay.as_secs()
        );
        sleep(delay).await;

        let status = match self.send(&recipient, amount, decimals).await {
            Ok(handle) => {
                info!(
                    "🔗 [{}] TX SUCCESS | {} | {:.2} TOKEN",
                    self.config.tag,
                    self.tx_link(&handle),
                    amount
                );
                if let Err(e) = ledger.mark_sent(self.store.as_ref()) {
                    error!("[{}] Failed to persist sent record: {:#}", self.config.tag, e);
                }
                self.notifier
                    .notify(&format!(
                        "📤 *TX SUCCESS - {}*\nTX #: {}\nTo: `{}`\nAmount: `{:.2} TOKEN`\n✔ [TX Link]({})",
                        self.config.tag,
                        index,
                        recipient,
                        amount,
                        self.tx_link(&handle)
                    ))
                    .await;
                TransferStatus::Success(handle)
            }
            Err(err) => {
                warn!("[{}] TX FAILED | {}", self.config.tag, err);
                if let Err(e) = ledger.mark_failed(self.store.as_ref()) {
                    error!("[{}] Failed to persist pending record: {:#}", self.config.tag, e);
                }
                TransferStatus::Failed(err.to_string())
            }
        };

        TransferResult {
            recipient,
            amount,
            status,
        }
    }

    /// One guarded transfer: breaker around the retried gas-bumping submission
    /// plus the confirmation wait. Confirmation failures are not retried.
    async fn send(
        &mut self,
        recipient: &str,
        amount: f64,
        decimals: u8,
    ) -> Result<TxHandle, TransferError> {
        let base_units = to_base_units(amount, decimals)?;
        let caller = &self.caller;
        let executor = &self.executor;
        let retrier = &self.retrier;
        let confirmations = self.confirmations;

        self.breaker
            .call(|| async move {
                let handle = retrier
                    .retry(|| executor.execute(caller, recipient, base_units))
                    .await?;
                let pending = &handle;
                caller
                    .call(|client| async move {
                        client.wait_for_confirmations(pending, confirmations).await
                    })
                    .await?;
                Ok(handle)
            })
            .await
    }

    fn draw_amount(&mut self) -> f64 {
        let span = self.config.max_token - self.config.min_token;
        let raw = self.config.min_token + self.rng.r#gen::<f64>() * span;
        (raw * 100.0).round() / 100.0
    }

    fn draw_delay(&mut self) -> Duration {
        let min = self.config.min_delay_secs;
        let max = self.config.max_delay_secs.max(min);
        Duration::from_secs(self.rng.gen_range(min..=max))
    }

    fn tx_link(&self, handle: &TxHandle) -> String {
        match &self.explorer_tx_url {
            Some(base) => format!("{}{}", base, handle.hash),
            None => handle.hash.clone(),
        }
    }

    async fn report_session(&self, summary: &SessionSummary) {
        let tally = &summary.tally;
        info!("Session Summary for {} - {}", summary.name, self.config.tag);
        info!(
            "Total TX: {} | Success: {} | Failed: {} | Skipped: {} | Tokens: {:.2}",
            tally.planned,
            tally.succeeded,
            tally.failed,
            tally.skipped(),
            tally.tokens
        );
        self.notifier
            .notify(&format!(
                "🚀 *{} Distribution*\n⏰ Session: {}\n🔗 Total TX: {}\n✔ Success: {}\n✖ Failed: {}\n💰 Total Tokens: {:.2} TOKEN\n⏰ Time: `{} - {}`",
                self.config.tag,
                summary.name,
                tally.planned,
                tally.succeeded,
                tally.failed,
                tally.tokens,
                utc_clock(summary.started_at),
                utc_clock(summary.finished_at)
            ))
            .await;
    }

    async fn report_day(&self, day: u32, tally: &BatchTally) {
        info!("Daily Summary for {} - Day {}", self.config.tag, day);
        info!(
            "Total TX: {} | Success: {} | Failed: {} | Skipped: {} | Tokens: {:.2}",
            tally.planned,
            tally.succeeded,
            tally.failed,
            tally.skipped(),
            tally.tokens
        );
        self.notifier
            .notify(&format!(
                "🔗 *{}* finished TX on Day {}\nTotal TX: *{}*\n✔ Success: *{}*\n✖ Failed: *{}*\n💰 Total Token Transferred: *{:.2} TOKEN*",
                self.config.tag,
                day,
                tally.planned,
                tally.succeeded,
                tally.failed,
                tally.tokens
            ))
            .await;
    }
}

/// Convert a two-decimal token amount into base units.
pub fn to_base_units(amount: f64, decimals: u8) -> Result<u128, TransferError> {
    let invalid = || TransferError::Amount { amount, decimals };
    if !amount.is_finite() || amount < 0.0 {
        return Err(invalid());
    }
    let cents = (amount * 100.0).round() as u128;
    let scale = 10u128.checked_pow(decimals as u32).ok_or_else(invalid)?;
    Ok(cents.checked_mul(scale).ok_or_else(invalid)? / 100)
}

fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn utc_clock(at: DateTime<Utc>) -> String {
    at.format("%H:%M UTC").to_string()
}
