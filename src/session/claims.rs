//! OAuth id-token claim extraction.
//!
//! The token signature is not checked here; the backend verifies it during
//! login. Only the claims needed to derive the keypair are read.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;

use crate::session::{SessionError, SessionResult};

/// Claims read from an OAuth id token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdTokenClaims {
    /// Stable subject identifier of the user at the issuer.
    pub sub: String,
    pub iss: Option<String>,
    pub email: Option<String>,
    /// Expiry, Unix seconds.
    pub exp: Option<u64>,
}

/// Decode the payload segment of a compact JWT.
pub fn parse_id_token(token: &str) -> SessionResult<IdTokenClaims> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => {
            return Err(SessionError::InvalidToken(
                "expected three dot-separated segments".to_string(),
            ))
        }
    };

    // Some issuers pad the segment; the no-pad engine rejects '='.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| SessionError::InvalidToken(format!("payload is not base64url: {}", e)))?;
    let claims: IdTokenClaims = serde_json::from_slice(&bytes)
        .map_err(|e| SessionError::InvalidToken(format!("payload is not valid claims: {}", e)))?;

    if claims.sub.trim().is_empty() {
        return Err(SessionError::InvalidToken("empty subject".to_string()));
    }
    Ok(claims)
}
