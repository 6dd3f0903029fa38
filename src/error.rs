//! Crate-wide error classification.
//!
//! Every subsystem keeps its own error enum; this module maps each of them onto
//! the four kinds a caller reacts to differently. Partial success is not an
//! error: it is an [`ExecutionResult`](crate::dispatch::ExecutionResult) with a
//! warning.

use thiserror::Error;

use crate::api::ApiError;
use crate::blockchain::transaction::TxBuildError;
use crate::blockchain::types::BlockchainError;
use crate::config::ConfigError;
use crate::dispatch::DispatchError;
use crate::rooms::RoomError;
use crate::session::SessionError;

/// How the caller should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input; show the message, nothing to retry.
    Validation,
    /// Transport failure; the user may try again.
    Network,
    /// Not enough funds for the action.
    InsufficientBalance,
    /// Session invalid; clear it and re-authenticate.
    Session,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Network => "network",
            ErrorKind::InsufficientBalance => "insufficient_balance",
            ErrorKind::Session => "session",
        }
    }

    /// Whether the local session must be cleared.
    pub fn clears_session(&self) -> bool {
        matches!(self, ErrorKind::Session)
    }
}

impl BlockchainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlockchainError::Rpc(_) | BlockchainError::Timeout(_) | BlockchainError::NotFound(_) => {
                ErrorKind::Network
            }
            BlockchainError::InvalidIdentifier { .. }
            | BlockchainError::InvalidTypeTag(_)
            | BlockchainError::Key(_)
            | BlockchainError::Serialization(_) => ErrorKind::Validation,
        }
    }
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::InvalidTtl | SessionError::InvalidToken(_) => ErrorKind::Validation,
            _ => ErrorKind::Session,
        }
    }
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Network(_) | ApiError::Decode(_) => ErrorKind::Network,
            ApiError::Status { status: 401 | 403, .. } => ErrorKind::Session,
            ApiError::Status { status, .. } if *status >= 500 => ErrorKind::Network,
            ApiError::Status { .. } | ApiError::InvalidRequest(_) => ErrorKind::Validation,
        }
    }
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::WalletNotConnected | DispatchError::SenderMismatch { .. } => {
                ErrorKind::Session
            }
            DispatchError::Session(e) => e.kind(),
            DispatchError::Relay(e) => e.kind(),
            DispatchError::Wallet(_) => ErrorKind::Network,
            DispatchError::UserRejected | DispatchError::Build(_) | DispatchError::Rejected(_) => {
                ErrorKind::Validation
            }
        }
    }
}

/// Any error surfaced by the client core.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Blockchain(#[from] BlockchainError),

    #[error(transparent)]
    Build(#[from] TxBuildError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Room(#[from] RoomError),

    /// Local persistence failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Config(_) | CoreError::Build(_) | CoreError::Io(_) => ErrorKind::Validation,
            CoreError::Blockchain(e) => e.kind(),
            CoreError::Session(e) => e.kind(),
            CoreError::Api(e) => e.kind(),
            CoreError::Dispatch(e) => e.kind(),
            CoreError::Room(e) => e.kind(),
        }
    }

    /// Human-readable text, shown once.
    pub fn user_message(&self) -> String {
        match self {
            CoreError::Dispatch(e) => e.user_message(),
            CoreError::Room(e) => e.user_message(),
            CoreError::Api(ApiError::Status { message, .. }) if self.kind() == ErrorKind::Validation => {
                message.clone()
            }
            other => match other.kind() {
                ErrorKind::Session => "Your session has expired. Please sign in again.".to_string(),
                ErrorKind::Network => {
                    "Could not reach the network. Check your connection and try again.".to_string()
                }
                ErrorKind::InsufficientBalance => "Insufficient balance.".to_string(),
                ErrorKind::Validation => other.to_string(),
            },
        }
    }
}

/// Result type for the crate's top-level operations.
pub type CoreResult<T> = Result<T, CoreError>;
