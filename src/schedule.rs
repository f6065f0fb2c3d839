use crate::config::ScheduleConfig;
use crate::error::ScheduleError;
use crate::types::SessionName;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use rand::Rng;
use std::time::Duration;

/// Per-session transaction quotas for one multi-session day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPlan {
    quotas: [u32; 3],
}

impl SessionPlan {
    pub fn quotas(&self) -> [u32; 3] {
        self.quotas
    }

    pub fn total(&self) -> u32 {
        self.quotas.iter().sum()
    }

    pub fn sessions(&self) -> impl Iterator<Item = (SessionName, u32)> + '_ {
        SessionName::ALL.into_iter().zip(self.quotas)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayPlan {
    /// First day: one undivided batch.
    Single { quota: u32 },
    Sessions(SessionPlan),
}

impl DayPlan {
    pub fn quota(&self) -> u32 {
        match self {
            DayPlan::Single { quota } => *quota,
            DayPlan::Sessions(plan) => plan.total(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionScheduler {
    min_per_session: u32,
    min_gap: Duration,
    max_gap: Duration,
    start_hour: u32,
    window_hours: u32,
}

impl Default for SessionScheduler {
    fn default() -> Self {
        Self::new(&ScheduleConfig::default())
    }
}

impl SessionScheduler {
    pub fn new(config: &ScheduleConfig) -> Self {
        Self {
            min_per_session: config.min_tx_per_session,
            min_gap: Duration::from_secs(config.min_session_gap_secs),
            max_gap: Duration::from_secs(config.max_session_gap_secs),
            start_hour: config.day_start_hour,
            window_hours: config.day_start_window_hours.max(1),
        }
    }

    /// Transactions to attempt today, uniform in `[min, max]`.
    pub fn daily_quota<R: Rng + ?Sized>(&self, rng: &mut R, min: u32, max: u32) -> u32 {
        rng.gen_range(min..=max.max(min))
    }

    /// Split `quota` into three floor-respecting sessions using the cut points `r1`, `r2` in [0, 1).
    pub fn split(&self, quota: u32, r1: f64, r2: f64) -> Result<SessionPlan, ScheduleError> {
        let floor = self.min_per_session;
        let required = floor.saturating_mul(3);
        if quota < required {
            return Err(ScheduleError::InsufficientQuota { quota, required });
        }

        let available = quota - required;
        let (x, y) = if r1 <= r2 { (r1, r2) } else { (r2, r1) };
        let first = floor + share(x, available);
        let second = floor + share(y - x, available);
        let third = quota - first - second;

        Ok(SessionPlan {
            quotas: [first, second, third],
        })
    }

    pub fn plan_day<R: Rng + ?Sized>(
        &self,
        day: u32,
        quota: u32,
        rng: &mut R,
    ) -> Result<DayPlan, ScheduleError> {
        if day <= 1 {
            return Ok(DayPlan::Single { quota });
        }
        let r1: f64 = rng.r#gen();
        let r2: f64 = rng.r#gen();
        self.split(quota, r1, r2).map(DayPlan::Sessions)
    }

    /// Wait between consecutive sessions.
    pub fn session_gap<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let min = self.min_gap.as_secs();
        let max = self.max_gap.as_secs().max(min);
        Duration::from_secs(rng.gen_range(min..=max))
    }

    /// Next start for the first session: a random minute inside the UTC start
    /// window, today if that moment is still ahead, otherwise tomorrow.
    pub fn next_day_start<R: Rng + ?Sized>(&self, now: DateTime<Utc>, rng: &mut R) -> DateTime<Utc> {
        let hour = self.start_hour + rng.gen_range(0..self.window_hours);
        let minute = rng.gen_range(0..60);

        let today = now
            .date_naive()
            .and_hms_opt(hour.min(23), minute, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .unwrap_or(now);
        if today > now {
            today
        } else {
            today + ChronoDuration::days(1)
        }
    }
}

fn share(fraction: f64, available: u32) -> u32 {
    // Nudge before flooring so 0.6 - 0.2 of 30 gives 12, not 11.
    let raw = (fraction * available as f64 + 1e-9).floor();
    (raw.max(0.0) as u32).min(available)
}

pub fn format_countdown(wait: Duration) -> String {
    let total = wait.as_secs();
    format!("{}h {}m {}s", total / 3600, (total % 3600) / 60, total % 60)
}
