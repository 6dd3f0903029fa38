//! Backend HTTP API subsystem.
//!
//! # Data Flow
//! ```text
//! ApiClient (client.rs)
//!     → reqwest JSON call with x-request-id + bearer token
//!     → raw serde_json::Value
//!     → normalize.rs (one typed shape, whatever the field naming)
//!     → types.rs (Room, Participant, HistoryEntry, ...)
//! ```
//!
//! # Design Decisions
//! - Field-name variants are resolved here and nowhere else
//! - Numbers may arrive as JSON strings; both are accepted
//! - No retries: a failed call surfaces once to the caller

pub mod client;
pub mod normalize;
pub mod types;

use thiserror::Error;

pub use client::ApiClient;
pub use types::{
    AuthResponse, CreateRoomRequest, HistoryEntry, HistoryKind, Participant, RelayResponse,
    Room, RoomStatus, SponsoredRequest, UserInfo,
};

/// Errors raised by backend calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body did not have the expected shape.
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// The request could not be formed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

/// Result type for backend calls.
pub type ApiResult<T> = Result<T, ApiError>;
