//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client core.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the MoneyRace client core.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend HTTP API settings.
    pub api: ApiConfig,

    /// Ledger RPC and contract coordinates.
    pub chain: ChainConfig,

    /// Session and key derivation settings.
    pub session: SessionConfig,

    /// Live-yield estimator settings.
    pub live_yield: LiveYieldConfig,

    /// Transaction dispatch settings.
    pub dispatch: DispatchConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Backend HTTP API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the backend (e.g., "http://localhost:3001").
    pub base_url: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001".to_string(),
            timeout_secs: 15,
        }
    }
}

/// Ledger and contract configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Published package id of the savings contract.
    pub package_id: String,

    /// Move module name inside the package.
    pub module: String,

    /// Fully-qualified stablecoin type used as the room's coin type argument.
    pub usdc_type: String,

    /// Shared clock object id.
    pub clock_id: String,

    /// Gas budget attached to built transactions (MIST).
    pub gas_budget: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://fullnode.testnet.sui.io:443".to_string(),
            failover_urls: Vec::new(),
            rpc_timeout_secs: 10,
            package_id: String::new(),
            module: "money_race".to_string(),
            usdc_type: String::new(),
            clock_id: "0x6".to_string(),
            gas_budget: 50_000_000,
        }
    }
}

/// Where session records are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionBackend {
    /// Process-lifetime storage, gone when the process exits.
    Memory,
    /// JSON file on disk, for the operator CLI.
    File,
}

/// Session store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session lifetime in seconds.
    pub ttl_secs: u64,

    /// Salt mixed into the identity subject before hashing to a seed.
    pub derivation_salt: String,

    /// Storage backend.
    pub backend: SessionBackend,

    /// Path of the session file when `backend = "file"`.
    pub storage_path: Option<String>,

    /// How often the expiry watcher checks the session, in seconds.
    pub expiry_check_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 3600,
            derivation_salt: crate::blockchain::keypair::DEFAULT_DERIVATION_SALT.to_string(),
            backend: SessionBackend::Memory,
            storage_path: None,
            expiry_check_secs: 30,
        }
    }
}

/// Live-yield estimator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LiveYieldConfig {
    /// Tick interval in milliseconds.
    pub tick_ms: u64,

    /// Persist the running values every N ticks.
    pub persist_every_ticks: u32,

    /// JSON file holding per-room running values.
    pub persistence_path: Option<String>,
}

impl Default for LiveYieldConfig {
    fn default() -> Self {
        Self {
            tick_ms: 250,
            persist_every_ticks: 20,
            persistence_path: None,
        }
    }
}

/// Dispatcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Attempts made to read created objects after a wallet submission.
    pub effects_poll_attempts: u32,

    /// Base delay for exponential backoff between attempts in milliseconds.
    pub effects_poll_base_ms: u64,

    /// Maximum delay between attempts in milliseconds.
    pub effects_poll_max_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            effects_poll_attempts: 5,
            effects_poll_base_ms: 300,
            effects_poll_max_ms: 3000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9100".to_string(),
        }
    }
}
