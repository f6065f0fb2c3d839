use crate::error::ConfigError;
use crate::types::TokenKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_FIXED_GAS_TOKEN: &str = "0x7eaa67f8d365bbe27d6278fdc2ba24a1aa71c8e5";

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    pub rpc_endpoints: Vec<String>,
    pub private_keys: Vec<String>,
    pub token_addresses: Vec<String>,
    pub delays: Vec<DelayRange>,

    pub min_token: f64,
    pub max_token: f64,
    pub min_tx_per_day: u32,
    pub max_tx_per_day: u32,

    #[serde(default = "default_recipients_file")]
    pub recipients_file: PathBuf,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_fixed_gas_tokens")]
    pub fixed_gas_tokens: Vec<String>,
    #[serde(default = "default_fixed_gas_limit")]
    pub fixed_gas_limit: u64,

    #[serde(default)]
    pub explorer_tx_url: Option<String>,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,

    #[serde(default)]
    pub resilience: ResilienceConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_secs: u64,
    pub max_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub rate_limit_cool_down_secs: u64,
    pub gas_bump_attempts: u32,
    pub gas_bump_factor: f64,
    pub gas_bump_delay_secs: u64,
    pub retry_attempts: u32,
    pub retry_initial_delay_ms: u64,
    pub breaker_failure_threshold: u32,
    pub breaker_success_threshold: u32,
    pub breaker_cool_down_secs: u64,
    pub confirmations: u64,
    pub confirmation_timeout_secs: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            rate_limit_cool_down_secs: 30,
            gas_bump_attempts: 5,
            gas_bump_factor: 1.15,
            gas_bump_delay_secs: 2,
            retry_attempts: 5,
            retry_initial_delay_ms: 1000,
            breaker_failure_threshold: 3,
            breaker_success_threshold: 2,
            breaker_cool_down_secs: 15,
            confirmations: 2,
            confirmation_timeout_secs: 120,
        }
    }
}

impl ResilienceConfig {
    pub fn rate_limit_cool_down(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cool_down_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub min_tx_per_session: u32,
    pub min_session_gap_secs: u64,
    pub max_session_gap_secs: u64,
    /// First UTC hour in which session one may start.
    pub day_start_hour: u32,
    /// Width of the start window in hours.
    pub day_start_window_hours: u32,
    pub day_retry_delay_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            min_tx_per_session: 40,
            min_session_gap_secs: 2 * 60 * 60,
            max_session_gap_secs: 4 * 60 * 60,
            day_start_hour: 6,
            day_start_window_hours: 4,
            day_retry_delay_secs: 60,
        }
    }
}

fn default_recipients_file() -> PathBuf {
    PathBuf::from("list address.txt")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_fixed_gas_tokens() -> Vec<String> {
    vec![DEFAULT_FIXED_GAS_TOKEN.to_string()]
}

fn default_fixed_gas_limit() -> u64 {
    100_000
}

/// Immutable per-account settings, one per spawned worker.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    pub tag: String,
    pub private_key: String,
    pub token_address: String,
    pub token_kind: TokenKind,
    pub min_token: f64,
    pub max_token: f64,
    pub min_delay_secs: u64,
    pub max_delay_secs: u64,
    pub min_tx_per_day: u32,
    pub max_tx_per_day: u32,
}

impl AccountConfig {
    /// Tag with whitespace replaced, used in per-account file names.
    pub fn file_tag(&self) -> String {
        self.tag.split_whitespace().collect::<Vec<_>>().join("_")
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).context("Failed to open config file")?;
        let config: Config =
            serde_yaml::from_reader(file).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Endpoints in configured order with duplicates and blanks removed.
    pub fn endpoints(&self) -> Result<Vec<String>, ConfigError> {
        let mut endpoints: Vec<String> = Vec::new();
        for endpoint in &self.rpc_endpoints {
            let endpoint = endpoint.trim();
            if !endpoint.is_empty() && !endpoints.iter().any(|e| e == endpoint) {
                endpoints.push(endpoint.to_string());
            }
        }
        if endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        Ok(endpoints)
    }

    pub fn token_kind(&self, token_address: &str) -> TokenKind {
        let address = token_address.to_lowercase();
        if self
            .fixed_gas_tokens
            .iter()
            .any(|token| token.to_lowercase() == address)
        {
            TokenKind::FixedGas {
                gas_limit: self.fixed_gas_limit,
            }
        } else {
            TokenKind::Standard
        }
    }

    pub fn accounts(&self) -> Result<Vec<AccountConfig>, ConfigError> {
        let expected = self.private_keys.len();
        if expected == 0 {
            return Err(ConfigError::InvalidValue {
                field: "private_keys",
                reason: "at least one account is required".to_string(),
            });
        }
        if self.token_addresses.len() != expected {
            return Err(ConfigError::CountMismatch {
                field: "token_addresses",
                expected,
                found: self.token_addresses.len(),
            });
        }
        if self.delays.len() != expected {
            return Err(ConfigError::CountMismatch {
                field: "delays",
                expected,
                found: self.delays.len(),
            });
        }
        if self.min_token.is_nan() || self.min_token <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "min_token",
                reason: "must be positive".to_string(),
            });
        }
        check_range("token amount", self.min_token, self.max_token)?;
        check_range("tx per day", self.min_tx_per_day, self.max_tx_per_day)?;
        check_range(
            "session gap",
            self.schedule.min_session_gap_secs,
            self.schedule.max_session_gap_secs,
        )?;
        if self.schedule.day_start_hour + self.schedule.day_start_window_hours > 24
            || self.schedule.day_start_window_hours == 0
        {
            return Err(ConfigError::InvalidValue {
                field: "schedule.day_start_window_hours",
                reason: "start window must be non-empty and end by midnight UTC".to_string(),
            });
        }

        self.private_keys
            .iter()
            .zip(&self.token_addresses)
            .zip(&self.delays)
            .enumerate()
            .map(|(i, ((key, token), delay))| {
                check_range("delay", delay.min_secs, delay.max_secs)?;
                Ok(AccountConfig {
                    tag: format!("Account {}", i + 1),
                    private_key: key.trim().to_string(),
                    token_address: token.trim().to_string(),
                    token_kind: self.token_kind(token.trim()),
                    min_token: self.min_token,
                    max_token: self.max_token,
                    min_delay_secs: delay.min_secs,
                    max_delay_secs: delay.max_secs,
                    min_tx_per_day: self.min_tx_per_day,
                    max_tx_per_day: self.max_tx_per_day,
                })
            })
            .collect()
    }
}

fn check_range<T: PartialOrd + ToString>(field: &'static str, min: T, max: T) -> Result<(), ConfigError> {
    if min > max {
        return Err(ConfigError::InvalidRange {
            field,
            min: min.to_string(),
            max: max.to_string(),
        });
    }
    Ok(())
}

pub const SAMPLE_CONFIG: &str = r#"# Ledger RPC endpoints, rotated when one reports a rate limit
rpc_endpoints:
  - "https://tea-sepolia.g.alchemy.com/public"
  - "https://assam-rpc.tea.xyz"

# One entry per account; the three lists must have the same length
private_keys:
  - "0xYOUR_PRIVATE_KEY"
token_addresses:
  - "0xYOUR_TOKEN_CONTRACT"
delays:
  - { min_secs: 30, max_secs: 120 }

# Global transfer parameters
min_token: 1.0
max_token: 5.0
min_tx_per_day: 150
max_tx_per_day: 200

recipients_file: "list address.txt"
data_dir: "."
explorer_tx_url: "https://sepolia.tea.xyz/tx/"

# Optional Telegram notifications
# telegram:
#   bot_token: "YOUR_BOT_TOKEN"
#   chat_id: "YOUR_CHAT_ID"
"#;
