//! Live-yield display.
//!
//! # Data Flow
//! ```text
//! Room (pool size, expected return, realized yield)
//!     → YieldStore::estimator (seed = max(persisted, authoritative))
//!     → spawn_ticker → LiveYield::tick every tick_ms
//!     → YieldStore (persisted every N ticks and on stop)
//! Backend refresh → LiveYield::observe_authoritative (snap upward only)
//! ```
//!
//! # Design Decisions
//! - Display only; the number is never used for settlement
//! - The displayed value never decreases, even when a refresh reports less
//! - Accrual is linear in elapsed wall-clock time, not in tick count

pub mod estimator;
pub mod store;
pub mod ticker;

pub use estimator::{rate_per_sec, LiveYield, YieldEstimate, SECONDS_PER_YEAR};
pub use store::YieldStore;
pub use ticker::{spawn_ticker, SharedEstimator};
