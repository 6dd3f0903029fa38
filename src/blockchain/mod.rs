//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Identity subject (OAuth `sub` claim)
//!     → keypair.rs (salted hash → seed → Ed25519 keypair → address)
//!     → transaction.rs (build unsigned join/deposit/claim transactions)
//!     → client.rs (ledger queries: effects, balances, coins)
//! ```
//!
//! # Security Constraints
//! - Never log secret keys, passwords or signatures
//! - All RPC calls have configurable timeouts
//! - Transaction builders are pure and never touch the network

pub mod client;
pub mod keypair;
pub mod transaction;
pub mod types;

pub use client::{CoinInfo, LedgerClient};
pub use keypair::DerivedKeypair;
pub use transaction::{TxBuildError, TxBuilder, UnsignedTransaction};
pub use types::{Address, BlockchainError, BlockchainResult, CreatedObject, ObjectId, TxDigest};
