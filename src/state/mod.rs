//! Explicit application state.
//!
//! # Data Flow
//! ```text
//! event (login, refresh, action outcome, yield tick)
//!     → Action
//!     → reduce(&AppState, Action) -> AppState   (pure)
//!     → Store swaps in the new snapshot         (ArcSwap)
//!     → readers take cheap Arc snapshots
//! ```
//!
//! # Design Decisions
//! - One state value instead of scattered mutable globals
//! - Reducers are pure so every transition is unit-testable
//! - Readers never block writers

pub mod reducer;
pub mod store;

pub use reducer::{reduce, Action, AppState, Identity};
pub use store::Store;
