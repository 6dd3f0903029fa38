//! Interest extrapolation between backend refreshes.

use serde::{Deserialize, Serialize};

use crate::blockchain::types::ObjectId;

/// 365 days.
pub const SECONDS_PER_YEAR: f64 = 31_536_000.0;

/// Per-second accrual for `pool_size` base units at `annual_rate` (a fraction).
///
/// Negative or non-finite rates accrue nothing.
pub fn rate_per_sec(pool_size: u64, annual_rate: f64) -> f64 {
    if !annual_rate.is_finite() || annual_rate <= 0.0 {
        return 0.0;
    }
    pool_size as f64 * annual_rate / SECONDS_PER_YEAR
}

/// Persisted state of one room's estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldEstimate {
    pub room_id: ObjectId,
    /// Last authoritative yield reported by the backend.
    pub baseline: f64,
    /// When `baseline` was observed (Unix ms).
    pub baseline_at_ms: u64,
    pub rate_per_sec: f64,
    /// Value currently shown. Never decreases.
    pub displayed: f64,
}

/// Running estimator for one room.
#[derive(Debug, Clone)]
pub struct LiveYield {
    estimate: YieldEstimate,
    last_tick_ms: u64,
}

impl LiveYield {
    pub fn new(room_id: ObjectId, authoritative: u64, rate_per_sec: f64, now_ms: u64) -> Self {
        Self::seeded(room_id, None, authoritative, rate_per_sec, now_ms)
    }

    /// Start from the larger of a persisted display value and the backend's figure.
    pub fn seeded(
        room_id: ObjectId,
        persisted: Option<f64>,
        authoritative: u64,
        rate_per_sec: f64,
        now_ms: u64,
    ) -> Self {
        let baseline = authoritative as f64;
        let displayed = persisted
            .filter(|v| v.is_finite())
            .map(|v| v.max(baseline))
            .unwrap_or(baseline);
        Self {
            estimate: YieldEstimate {
                room_id,
                baseline,
                baseline_at_ms: now_ms,
                rate_per_sec: sanitize_rate(rate_per_sec),
                displayed,
            },
            last_tick_ms: now_ms,
        }
    }

    pub fn room_id(&self) -> ObjectId {
        self.estimate.room_id
    }

    pub fn displayed(&self) -> f64 {
        self.estimate.displayed
    }

    /// Displayed value in whole base units.
    pub fn displayed_units(&self) -> u64 {
        self.estimate.displayed.floor() as u64
    }

    pub fn estimate(&self) -> &YieldEstimate {
        &self.estimate
    }

    /// Advance by `rate_per_sec * elapsed` since the previous tick.
    ///
    /// A clock that moved backwards accrues nothing.
    pub fn tick(&mut self, now_ms: u64) -> f64 {
        let elapsed_ms = now_ms.saturating_sub(self.last_tick_ms);
        if elapsed_ms > 0 {
            self.estimate.displayed += self.estimate.rate_per_sec * elapsed_ms as f64 / 1000.0;
            self.last_tick_ms = now_ms;
        }
        self.estimate.displayed
    }

    /// Take a fresh authoritative figure. Snaps the display up if it lags.
    pub fn observe_authoritative(&mut self, value: u64, now_ms: u64) {
        let value = value as f64;
        self.estimate.baseline = value;
        self.estimate.baseline_at_ms = now_ms;
        if value > self.estimate.displayed {
            self.estimate.displayed = value;
        }
    }

    /// Change the accrual rate, e.g. after the pool grew.
    pub fn set_rate(&mut self, rate_per_sec: f64) {
        self.estimate.rate_per_sec = sanitize_rate(rate_per_sec);
    }
}

fn sanitize_rate(rate: f64) -> f64 {
    if rate.is_finite() && rate > 0.0 {
        rate
    } else {
        0.0
    }
}
