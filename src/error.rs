use thiserror::Error;

/// Fatal problems detected while turning the YAML file into account configs.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("at least one RPC endpoint is required")]
    NoEndpoints,

    #[error("number of {field} ({found}) does not match the number of accounts ({expected})")]
    CountMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("invalid range for {field}: min {min} is greater than max {max}")]
    InvalidRange {
        field: &'static str,
        min: String,
        max: String,
    },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// A single failed round trip to a ledger endpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}", describe(.status, .message))]
pub struct LedgerError {
    pub status: Option<u16>,
    pub message: String,
}

impl LedgerError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == Some(429) || self.message.to_lowercase().contains("rate limit")
    }

    pub fn is_underpriced_replacement(&self) -> bool {
        self.message
            .to_lowercase()
            .contains("replacement transaction underpriced")
    }
}

fn describe(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("HTTP {}: {}", status, message),
        None => message.to_string(),
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TransferError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("transfer failed after {attempts} attempts with gas fee bump")]
    Exhausted { attempts: u32 },

    #[error("circuit breaker is OPEN, requests are blocked temporarily")]
    CircuitOpen,

    #[error("cannot convert {amount} tokens with {decimals} decimals to base units")]
    Amount { amount: f64, decimals: u8 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("total TX today ({quota}) is less than the required minimum ({required})")]
    InsufficientQuota { quota: u32, required: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_429_is_rate_limited() {
        assert!(LedgerError::new(Some(429), "Too Many Requests").is_rate_limited());
    }

    #[test]
    fn test_rate_limit_message_is_case_insensitive() {
        assert!(LedgerError::other("Rate Limit exceeded for key").is_rate_limited());
        assert!(!LedgerError::new(Some(500), "internal error").is_rate_limited());
    }

    #[test]
    fn test_underpriced_replacement_detection() {
        let err = LedgerError::other("server returned an error response: Replacement transaction underpriced");
        assert!(err.is_underpriced_replacement());
        assert!(!err.is_rate_limited());
        assert!(!LedgerError::other("nonce too low").is_underpriced_replacement());
    }

    #[test]
    fn test_display_includes_status() {
        assert_eq!(
            LedgerError::new(Some(429), "slow down").to_string(),
            "HTTP 429: slow down"
        );
        assert_eq!(LedgerError::other("boom").to_string(), "boom");
    }
}
