//! Persisted session records.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::blockchain::types::Address;

/// How the user authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginMethod {
    /// A connected wallet signs and submits on its own.
    Wallet,
    /// OAuth identity with a locally derived key; gas is sponsored.
    Zklogin,
}

impl LoginMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginMethod::Wallet => "wallet",
            LoginMethod::Zklogin => "zklogin",
        }
    }
}

/// Derived key material for one identity subject.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct KeypairRecord {
    /// bech32 `suiprivkey...` encoding of the seed.
    pub secret_key: String,
    /// Hex-encoded Ed25519 public key.
    pub public_key: String,
    pub address: Address,
    /// Unix milliseconds.
    pub created_at: u64,
    /// Unix milliseconds; the record is invalid from this instant on.
    pub expires_at: u64,
    /// Identity subject that owns the key.
    pub subject: String,
}

impl KeypairRecord {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }
}

impl Drop for KeypairRecord {
    fn drop(&mut self) {
        self.secret_key.zeroize();
    }
}

impl std::fmt::Debug for KeypairRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeypairRecord")
            .field("address", &self.address)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Authenticated user session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AuthSession {
    pub method: LoginMethod,
    pub address: Address,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Backend bearer token.
    #[serde(default)]
    pub token: Option<String>,
    pub created_at: u64,
    pub expires_at: u64,
}

impl AuthSession {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("method", &self.method)
            .field("address", &self.address)
            .field("email", &self.email)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
