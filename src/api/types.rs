//! Typed shapes of backend data after normalization.

use serde::{Deserialize, Serialize};

use crate::blockchain::types::{Address, CreatedObject, ObjectId, TxDigest};

/// Lifecycle state of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    /// Accepting participants, first period not started.
    Pending,
    /// Periods are running.
    Active,
    /// All periods elapsed; claims are open.
    Ended,
    Unknown,
}

impl RoomStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "pending" | "open" | "waiting" => RoomStatus::Pending,
            "active" | "running" | "ongoing" => RoomStatus::Active,
            "ended" | "finished" | "completed" | "closed" => RoomStatus::Ended,
            _ => RoomStatus::Unknown,
        }
    }
}

/// A saving room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: ObjectId,
    pub name: String,
    /// Per-period deposit target in stablecoin base units.
    pub deposit_amount: u64,
    pub total_periods: u32,
    pub period_length_ms: u64,
    /// Start of period 0 (Unix ms), when known.
    pub start_time_ms: Option<u64>,
    pub strategy_id: u8,
    pub is_private: bool,
    /// Hex SHA-256 of the room password, private rooms only.
    pub password_hash: Option<String>,
    pub vault_id: Option<ObjectId>,
    pub total_deposited: u64,
    /// Yield realized so far, as last reported by the backend.
    pub realized_yield: u64,
    /// Expected annual return in percent (e.g. `4.5`).
    pub expected_return_pct: f64,
    pub participant_count: u32,
    pub status: RoomStatus,
}

impl Room {
    /// Expected annual return as a fraction (`4.5%` → `0.045`).
    pub fn annual_rate(&self) -> f64 {
        self.expected_return_pct / 100.0
    }
}

/// A room participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub address: Address,
    pub position_id: Option<ObjectId>,
    pub total_deposited: u64,
    pub deposits_made: u32,
    pub claimed: bool,
}

/// Kind of room history event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Join,
    Deposit,
    Claim,
    Other,
}

/// One entry of a room's activity history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub kind: HistoryKind,
    pub address: Option<Address>,
    pub amount: u64,
    pub period: Option<u32>,
    pub timestamp_ms: Option<u64>,
    pub digest: Option<TxDigest>,
}

/// Authenticated user as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub address: Address,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Result of a login call.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserInfo,
}

impl std::fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthResponse")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Request to create a room. The password travels as its hash.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub deposit_amount: u64,
    pub total_periods: u32,
    pub period_length_ms: u64,
    pub strategy_id: u8,
    pub is_private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

/// A locally signed transaction forwarded to the sponsor relay.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsoredRequest {
    /// Base64 BCS transaction bytes.
    pub tx_bytes: String,
    /// Base64 serialized user signature.
    pub signature: String,
    pub sender: Address,
}

impl std::fmt::Debug for SponsoredRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SponsoredRequest")
            .field("sender", &self.sender)
            .field("tx_bytes_len", &self.tx_bytes.len())
            .finish_non_exhaustive()
    }
}

/// The relay's verdict on a sponsored submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayResponse {
    pub success: bool,
    pub digest: Option<TxDigest>,
    pub created_objects: Vec<CreatedObject>,
    pub error: Option<String>,
}
