//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → handed to each subsystem by value or reference
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ApiConfig, ChainConfig, ClientConfig, DispatchConfig, LiveYieldConfig, LogFormat,
    ObservabilityConfig, SessionBackend, SessionConfig,
};
pub use validation::{validate_config, ValidationError};
