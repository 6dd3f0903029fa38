//! Timer-driven accrual for one room.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::config::LiveYieldConfig;
use crate::lifecycle::timer::spawn_interval_until;
use crate::lifecycle::{spawn_interval, Clock, Tick, TickControl, TimerHandle};
use crate::live_yield::estimator::LiveYield;
use crate::live_yield::store::YieldStore;

/// Estimator shared between the ticker and readers (UI, CLI).
pub type SharedEstimator = Arc<Mutex<LiveYield>>;

fn lock(estimator: &SharedEstimator) -> MutexGuard<'_, LiveYield> {
    estimator.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct YieldTicker {
    estimator: SharedEstimator,
    store: YieldStore,
    clock: Arc<dyn Clock>,
    persist_every: u32,
    ticks: u32,
}

impl YieldTicker {
    fn persist(&self) {
        self.store.record(&lock(&self.estimator));
        if let Err(e) = self.store.save_to_file() {
            tracing::warn!(error = %e, "Failed to persist live-yield estimates");
        }
    }
}

impl Tick for YieldTicker {
    fn tick(&mut self) -> TickControl {
        let now = self.clock.now_ms();
        lock(&self.estimator).tick(now);

        self.ticks = self.ticks.wrapping_add(1);
        if self.persist_every > 0 && self.ticks % self.persist_every == 0 {
            self.persist();
        }
        TickControl::Continue
    }

    fn stopped(&mut self) {
        self.persist();
        tracing::debug!(room_id = %lock(&self.estimator).room_id(), "Live-yield ticker stopped");
    }
}

/// Drive `estimator` every `config.tick_ms`, persisting to `store` every
/// `config.persist_every_ticks` ticks and once more on stop.
///
/// When `shutdown` is given the ticker also stops on that broadcast.
pub fn spawn_ticker(
    estimator: SharedEstimator,
    store: YieldStore,
    clock: Arc<dyn Clock>,
    config: &LiveYieldConfig,
    shutdown: Option<broadcast::Receiver<()>>,
) -> TimerHandle {
    let period = Duration::from_millis(config.tick_ms.max(1));
    let work = YieldTicker {
        estimator,
        store,
        clock,
        persist_every: config.persist_every_ticks,
        ticks: 0,
    };
    match shutdown {
        Some(rx) => spawn_interval_until(period, rx, work),
        None => spawn_interval(period, work),
    }
}
