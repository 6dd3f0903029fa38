//! Exponential backoff with jitter for polling the ledger.

use rand::Rng;
use std::time::Duration;

use crate::config::DispatchConfig;

/// Delay before poll `attempt` (1-based). Attempt 0 polls immediately.
///
/// Doubles from `base_ms`, capped at `max_ms`, plus up to 10% jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u64.saturating_pow(attempt - 1);
    let capped = base_ms.saturating_mul(factor).min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}

/// Bounded polling schedule for transaction effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub attempts: u32,
    pub base_ms: u64,
    pub max_ms: u64,
}

impl PollSchedule {
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            attempts: config.effects_poll_attempts,
            base_ms: config.effects_poll_base_ms,
            max_ms: config.effects_poll_max_ms,
        }
    }

    /// Delay to wait before `attempt`; `None` once the schedule is exhausted.
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.attempts {
            return None;
        }
        Some(calculate_backoff(attempt, self.base_ms, self.max_ms))
    }
}
