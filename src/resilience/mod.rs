//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Wallet path submitted a transaction:
//!     → backoff.rs (PollSchedule from [dispatch] config)
//!     → poll ledger for created objects until found or attempts exhausted
//! ```
//!
//! # Design Decisions
//! - Only reads are repeated; a submission is never retried
//! - The schedule is bounded so a slow indexer degrades to a warning

pub mod backoff;

pub use backoff::{calculate_backoff, PollSchedule};
