use chrono::{DateTime, Utc};
use std::fmt;

/// Transfer policy resolved once from the token address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Standard,
    /// Tokens that need an explicit gas limit and report no usable `decimals()`.
    FixedGas { gas_limit: u64 },
}

impl TokenKind {
    pub const FIXED_GAS_DECIMALS: u8 = 18;

    pub fn base_overrides(&self) -> GasOverrides {
        match self {
            TokenKind::Standard => GasOverrides::default(),
            TokenKind::FixedGas { gas_limit } => GasOverrides {
                gas_limit: Some(*gas_limit),
                gas_price: None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GasOverrides {
    pub gas_limit: Option<u64>,
    /// Legacy gas price in wei.
    pub gas_price: Option<u128>,
}

/// Handle to a submitted transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxHandle {
    pub hash: String,
}

/// One submission of a transfer within the gas bump loop.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferAttempt<'a> {
    pub recipient: &'a str,
    pub amount: u128,
    pub attempt: u32,
    pub gas_multiplier: f64,
}

#[derive(Debug)]
pub struct TransferResult {
    pub recipient: String,
    pub amount: f64,
    pub status: TransferStatus,
}

#[derive(Debug)]
pub enum TransferStatus {
    Success(TxHandle),
    Failed(String),
}

impl TransferResult {
    pub fn is_success(&self) -> bool {
        matches!(self.status, TransferStatus::Success(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionName {
    Morning,
    Afternoon,
    Evening,
}

impl SessionName {
    pub const ALL: [SessionName; 3] = [
        SessionName::Morning,
        SessionName::Afternoon,
        SessionName::Evening,
    ];
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionName::Morning => "Morning",
            SessionName::Afternoon => "Afternoon",
            SessionName::Evening => "Evening",
        };
        f.write_str(name)
    }
}

/// Counters for one contiguous batch of transfers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchTally {
    pub planned: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub tokens: f64,
}

impl BatchTally {
    pub fn planned(planned: u32) -> Self {
        Self {
            planned,
            ..Self::default()
        }
    }

    pub fn record(&mut self, result: &TransferResult) {
        if result.is_success() {
            self.succeeded += 1;
            self.tokens += result.amount;
        } else {
            self.failed += 1;
        }
    }

    /// Slots never attempted because the recipient queue ran dry.
    pub fn skipped(&self) -> u32 {
        self.planned
            .saturating_sub(self.succeeded)
            .saturating_sub(self.failed)
    }

    pub fn absorb(&mut self, other: &BatchTally) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.tokens += other.tokens;
    }
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub name: SessionName,
    pub tally: BatchTally,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DayOutcome {
    Completed(BatchTally),
    /// Quota too small to cover every session floor; nothing was sent.
    Aborted { quota: u32, required: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DaySummary {
    pub day: u32,
    pub outcome: DayOutcome,
}
