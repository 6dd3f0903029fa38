//! Room participation.
//!
//! # Data Flow
//! ```text
//! Room (normalized by api) + signed-in user
//!     → period.rs (schedule position, consistency score)
//!     → actions.rs: in-flight guard → balance pre-check → coin selection
//!         → TxBuilder → Dispatcher → ExecutionResult (+ position id on join)
//! ```

pub mod actions;
pub mod period;

use thiserror::Error;

use crate::blockchain::transaction::TxBuildError;
use crate::blockchain::types::{BlockchainError, ObjectId, TxDigest};
use crate::dispatch::DispatchError;
use crate::error::ErrorKind;

pub use actions::{CoinReader, JoinOutcome, RoomActions, POSITION_TYPE};
pub use period::{
    consistency_score, current_period, is_claimable, period_status, periods_opened,
    time_remaining_ms, PeriodStatus,
};

/// Errors raised by room actions.
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Insufficient balance: need {required}, have {available}")]
    InsufficientBalance { required: u64, available: u64 },

    /// Enough funds in total, but no single coin covers the amount.
    #[error("No single coin covers {required} (largest is {largest})")]
    CoinsFragmented { required: u64, largest: u64 },

    #[error("Room {0} has no vault")]
    MissingVault(ObjectId),

    /// The account has no position in the room.
    #[error("No position in room {0}")]
    NoPosition(ObjectId),

    #[error("This room requires a password")]
    PasswordRequired,

    #[error("Incorrect room password")]
    WrongPassword,

    /// Another action for the same room is being submitted.
    #[error("A {action} for room {room_id} is already in progress")]
    InProgress {
        room_id: ObjectId,
        action: &'static str,
    },

    #[error(transparent)]
    Ledger(#[from] BlockchainError),

    #[error(transparent)]
    Build(#[from] TxBuildError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Executed on the ledger but aborted.
    #[error("Transaction {digest} aborted: {reason}")]
    Aborted { digest: TxDigest, reason: String },
}

impl RoomError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RoomError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            RoomError::CoinsFragmented { .. }
            | RoomError::MissingVault(_)
            | RoomError::NoPosition(_)
            | RoomError::PasswordRequired
            | RoomError::WrongPassword
            | RoomError::InProgress { .. }
            | RoomError::Build(_)
            | RoomError::Aborted { .. } => ErrorKind::Validation,
            RoomError::Ledger(e) => e.kind(),
            RoomError::Dispatch(e) => e.kind(),
        }
    }

    /// Text shown to the user once.
    pub fn user_message(&self) -> String {
        match self {
            RoomError::InsufficientBalance { required, available } => format!(
                "Insufficient USDC balance: this needs {} but you have {}.",
                format_usdc(*required),
                format_usdc(*available)
            ),
            RoomError::CoinsFragmented { .. } => {
                "Your USDC is split across several coins. Merge them in your wallet and try again."
                    .to_string()
            }
            RoomError::MissingVault(_) => "This room is not ready yet.".to_string(),
            RoomError::NoPosition(_) => "You have not joined this room yet.".to_string(),
            RoomError::PasswordRequired => "Enter the room password to join.".to_string(),
            RoomError::WrongPassword => "That password is not correct.".to_string(),
            RoomError::InProgress { .. } => "Please wait for the current transaction to finish.".to_string(),
            RoomError::Ledger(_) => {
                "Could not reach the network. Check your connection and try again.".to_string()
            }
            RoomError::Build(e) => format!("Could not prepare the transaction: {}", e),
            RoomError::Dispatch(e) => e.user_message(),
            RoomError::Aborted { reason, .. } => format!("Transaction failed: {}", reason),
        }
    }
}

/// Result type for room actions.
pub type RoomResult<T> = Result<T, RoomError>;

/// Six-decimal stablecoin base units as a display string.
pub fn format_usdc(units: u64) -> String {
    format!("{}.{:02} USDC", units / 1_000_000, (units % 1_000_000) / 10_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_usdc() {
        assert_eq!(format_usdc(10_000_000), "10.00 USDC");
        assert_eq!(format_usdc(1_234_567), "1.23 USDC");
        assert_eq!(format_usdc(0), "0.00 USDC");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            RoomError::InsufficientBalance { required: 1, available: 0 }.kind(),
            ErrorKind::InsufficientBalance
        );
        assert_eq!(RoomError::WrongPassword.kind(), ErrorKind::Validation);
        assert_eq!(
            RoomError::Ledger(BlockchainError::Timeout(5)).kind(),
            ErrorKind::Network
        );
    }
}
