//! MoneyRace client core.
//!
//! Key derivation, session storage, transaction building and submission for
//! the MoneyRace group-savings product, plus a display-only live-yield
//! estimator.

// Foundations
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

// Chain and backend access
pub mod api;
pub mod blockchain;
pub mod session;

// Product logic
pub mod dispatch;
pub mod live_yield;
pub mod rooms;
pub mod state;

pub mod app;

pub use app::{LiveYieldHandle, MoneyRace};
pub use config::schema::ClientConfig;
pub use error::{CoreError, CoreResult, ErrorKind};
pub use lifecycle::Shutdown;
