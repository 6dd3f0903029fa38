//! Session subsystem: derived key material and auth state with expiry.
//!
//! # Data Flow
//! ```text
//! OAuth id token
//!     → claims.rs (extract `sub`, `email`)
//!     → store.rs login(subject) → reload if valid, else derive + save
//!     → storage.rs (session-scoped key/value: memory or JSON file)
//! ```
//!
//! # Security Constraints
//! - Storage is session-scoped by default; nothing outlives the process
//! - A record whose re-derived address disagrees with the stored one is
//!   discarded as corrupt
//! - Expired records are removed on read and never resurrected

pub mod claims;
pub mod record;
pub mod storage;
pub mod store;

use thiserror::Error;

use crate::blockchain::types::BlockchainError;

pub use claims::{parse_id_token, IdTokenClaims};
pub use record::{AuthSession, KeypairRecord, LoginMethod};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
pub use store::{SessionStore, AUTH_KEY, KEYPAIR_KEY};

/// Errors raised by the session subsystem.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session record exists.
    #[error("No active session")]
    NotFound,

    /// The session expired at the given time (Unix ms).
    #[error("Session expired at {expired_at}")]
    Expired { expired_at: u64 },

    /// TTL or extension of zero.
    #[error("Session lifetime must be greater than zero")]
    InvalidTtl,

    /// Underlying storage failed.
    #[error("Session storage error: {0}")]
    Storage(String),

    /// Storage file I/O failed.
    #[error("Session storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Key derivation or encoding failed.
    #[error(transparent)]
    Key(#[from] BlockchainError),

    /// An identity token could not be parsed.
    #[error("Invalid identity token: {0}")]
    InvalidToken(String),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
