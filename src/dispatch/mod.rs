//! Sponsored-execution dispatch.
//!
//! # Data Flow
//! ```text
//! UnsignedTransaction + LoginMethod
//!     ├─ Wallet  → ConnectedWallet::sign_and_execute → digest
//!     │            → LedgerReader::created_objects (polled with backoff)
//!     │            → ExecutionResult (warning if effects unavailable)
//!     └─ Zklogin → session keypair signs locally
//!                  → SponsorRelay::execute_sponsored { tx_bytes, signature, sender }
//!                  → ExecutionResult (relay response is terminal)
//! ```
//!
//! # Design Decisions
//! - One result type for both paths
//! - Submissions are never retried; only the effects read is polled
//! - A confirmed digest whose effects cannot be read is still a success

pub mod dispatcher;
pub mod traits;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::ApiError;
use crate::blockchain::transaction::TxBuildError;
use crate::blockchain::types::{Address, CreatedObject, TxDigest};
use crate::session::SessionError;

pub use dispatcher::Dispatcher;
pub use traits::{ConnectedWallet, LedgerReader, SponsorRelay};

/// Outcome of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// `false` when the ledger executed the transaction but it aborted.
    pub success: bool,
    pub digest: TxDigest,
    /// Objects created by the transaction, when known.
    pub effects: Vec<CreatedObject>,
    /// Set on partial success, e.g. effects could not be fetched.
    pub warning: Option<String>,
}

impl ExecutionResult {
    /// First created object whose type is `module::name`.
    pub fn created(&self, module: &str, name: &str) -> Option<&CreatedObject> {
        self.effects.iter().find(|o| o.is_type(module, name))
    }
}

/// Errors raised while submitting a transaction.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Wallet path requested but no wallet is connected.
    #[error("No wallet connected")]
    WalletNotConnected,

    /// The user declined to sign in the wallet.
    #[error("Transaction rejected in wallet")]
    UserRejected,

    /// The wallet failed to sign or submit.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// The transaction sender is not the signing account.
    #[error("Sender {sender} does not match signer {signer}")]
    SenderMismatch { sender: Address, signer: Address },

    /// No valid session keypair to sign with.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The transaction could not be encoded.
    #[error(transparent)]
    Build(#[from] TxBuildError),

    /// The relay could not be reached or answered with an error status.
    #[error("Sponsor relay error: {0}")]
    Relay(#[from] ApiError),

    /// The relay refused to sponsor or submit the transaction.
    #[error("Sponsored execution failed: {0}")]
    Rejected(String),
}

impl DispatchError {
    /// Text shown to the user once.
    pub fn user_message(&self) -> String {
        match self {
            DispatchError::WalletNotConnected => "Connect a wallet to continue.".to_string(),
            DispatchError::UserRejected => "You rejected the transaction.".to_string(),
            DispatchError::Wallet(msg) => format!("Wallet failed to submit the transaction: {}", msg),
            DispatchError::SenderMismatch { .. } => {
                "This transaction belongs to a different account. Please sign in again.".to_string()
            }
            DispatchError::Session(_) => "Your session has expired. Please sign in again.".to_string(),
            DispatchError::Build(e) => format!("Could not prepare the transaction: {}", e),
            DispatchError::Relay(_) => {
                "Could not reach the transaction service. Check your connection and try again.".to_string()
            }
            DispatchError::Rejected(msg) => format!("Transaction failed: {}", msg),
        }
    }
}

/// Result type for dispatch.
pub type DispatchResult<T> = Result<T, DispatchError>;
