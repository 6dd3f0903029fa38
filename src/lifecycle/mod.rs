//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Time (clock.rs):
//!     SystemClock in production, ManualClock in tests
//!
//! Timers (timer.rs):
//!     spawn_interval → TimerHandle (one per timer) → cancel / drop stops it
//!
//! Shutdown (shutdown.rs):
//!     Ctrl-C or caller → broadcast → every timer and watcher exits its loop
//! ```
//!
//! # Design Decisions
//! - Each timer has exactly one owner; dropping the handle cancels it
//! - Tick callbacks are synchronous; they run on the timer's own task
//! - Expiry and accrual math read time through `Clock`, never directly

pub mod clock;
pub mod shutdown;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use shutdown::Shutdown;
pub use timer::{spawn_interval, Tick, TickControl, TimerHandle};
