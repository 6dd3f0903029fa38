//! Backend HTTP client.
//!
//! # Responsibilities
//! - Authenticate (zkLogin id token or wallet address) and carry the bearer token
//! - Room listing, creation, lookup, history and participants
//! - Test-stablecoin mint and balance
//! - Forward locally signed transactions to the sponsor relay
//!
//! Every request is tagged with a fresh `x-request-id` so backend logs can be
//! correlated with client logs.

use arc_swap::ArcSwapOption;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::api::normalize;
use crate::api::types::{
    AuthResponse, CreateRoomRequest, HistoryEntry, Participant, RelayResponse, Room,
    SponsoredRequest,
};
use crate::api::{ApiError, ApiResult};
use crate::blockchain::transaction::hash_password;
use crate::blockchain::types::{Address, ObjectId, TxDigest};
use crate::config::ApiConfig;
use crate::observability::metrics;

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Client for the MoneyRace backend.
///
/// Clones share the bearer token, so a token set after login is seen by every
/// holder (the dispatcher's relay included).
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Arc<ArcSwapOption<String>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> ApiResult<Self> {
        let parsed: url::Url = config.base_url.parse().map_err(|e| {
            ApiError::InvalidRequest(format!("Invalid API base URL '{}': {}", config.base_url, e))
        })?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            token: Arc::new(ArcSwapOption::empty()),
        })
    }

    /// Attach a bearer token to subsequent requests.
    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.set_token(Some(token.into()));
        self
    }

    /// Replace or clear the bearer token for this client and its clones.
    pub fn set_token(&self, token: Option<String>) {
        self.token.store(token.map(Arc::new));
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.load().is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        endpoint: &'static str,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> ApiResult<Value> {
        let request_id = Uuid::new_v4();
        let url = format!("{}{}", self.base_url, path);

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(REQUEST_ID_HEADER, request_id.to_string());
        if let Some(token) = self.token.load_full() {
            request = request.bearer_auth(token.as_str());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(%request_id, %method, endpoint, "Backend request");

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                metrics::record_api_request(endpoint, 0);
                tracing::warn!(%request_id, endpoint, error = %e, "Backend unreachable");
                return Err(e.into());
            }
        };

        let status = response.status();
        metrics::record_api_request(endpoint, status.as_u16());

        let text = response.text().await?;
        if !status.is_success() {
            let message = normalize::error_message(&text);
            tracing::warn!(%request_id, endpoint, status = status.as_u16(), %message, "Backend error");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Exchange an OAuth id token for a backend session.
    pub async fn login_zklogin(&self, id_token: &str) -> ApiResult<AuthResponse> {
        let body = json!({ "id_token": id_token });
        let value = self.send("auth_zklogin", Method::POST, "/auth/zklogin", Some(&body)).await?;
        normalize::auth(&value)
    }

    /// Register a connected wallet address with the backend.
    pub async fn login_wallet(&self, address: &Address) -> ApiResult<AuthResponse> {
        let body = json!({ "address": address });
        let value = self.send("auth_wallet", Method::POST, "/auth/wallet", Some(&body)).await?;
        normalize::auth(&value)
    }

    pub async fn list_rooms(&self) -> ApiResult<Vec<Room>> {
        let value = self.send("rooms_list", Method::GET, "/rooms", None).await?;
        normalize::rooms(&value)
    }

    /// Create a room. A password, if any, is hashed before it leaves the client.
    pub async fn create_room(&self, request: &CreateRoomRequest) -> ApiResult<Room> {
        if request.is_private && request.password_hash.is_none() {
            return Err(ApiError::InvalidRequest(
                "private room requires a password".to_string(),
            ));
        }
        let body = serde_json::to_value(request).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        let value = self.send("rooms_create", Method::POST, "/rooms", Some(&body)).await?;
        normalize::room(normalize::unwrap_envelope(&value, &["room", "data"]))
    }

    pub async fn get_room(&self, room_id: &ObjectId) -> ApiResult<Room> {
        let path = format!("/rooms/{}", room_id);
        let value = self.send("rooms_get", Method::GET, &path, None).await?;
        normalize::room(normalize::unwrap_envelope(&value, &["room", "data"]))
    }

    pub async fn room_history(&self, room_id: &ObjectId) -> ApiResult<Vec<HistoryEntry>> {
        let path = format!("/rooms/{}/history", room_id);
        let value = self.send("rooms_history", Method::GET, &path, None).await?;
        normalize::history(&value)
    }

    pub async fn room_participants(&self, room_id: &ObjectId) -> ApiResult<Vec<Participant>> {
        let path = format!("/rooms/{}/participants", room_id);
        let value = self.send("rooms_participants", Method::GET, &path, None).await?;
        normalize::participants(&value)
    }

    /// Look up a private room by its password. Only the hash is sent.
    pub async fn find_room_by_password(&self, password: &str) -> ApiResult<Room> {
        if password.is_empty() {
            return Err(ApiError::InvalidRequest("password must not be empty".to_string()));
        }
        let body = json!({ "password_hash": hex::encode(hash_password(password)) });
        let value = self
            .send("rooms_find_by_password", Method::POST, "/rooms/find-by-password", Some(&body))
            .await?;
        normalize::room(normalize::unwrap_envelope(&value, &["room", "data"]))
    }

    /// Mint test stablecoin to `address`.
    pub async fn mint_usdc(&self, address: &Address, amount: u64) -> ApiResult<TxDigest> {
        if amount == 0 {
            return Err(ApiError::InvalidRequest("amount must be positive".to_string()));
        }
        let body = json!({ "address": address, "amount": amount.to_string() });
        let value = self.send("usdc_mint", Method::POST, "/usdc/mint", Some(&body)).await?;
        normalize::digest(&value)
    }

    pub async fn usdc_balance(&self, address: &Address) -> ApiResult<u64> {
        let path = format!("/usdc/balance/{}", address);
        let value = self.send("usdc_balance", Method::GET, &path, None).await?;
        normalize::balance(&value)
    }

    /// Forward a signed transaction to the sponsor relay.
    ///
    /// A relay-level failure (`success: false`) is returned as a response, not
    /// an error; only transport and status failures are `Err`.
    pub async fn execute_sponsored(&self, request: &SponsoredRequest) -> ApiResult<RelayResponse> {
        let body = serde_json::to_value(request).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        let value = self
            .send("sponsor_execute", Method::POST, "/sponsor/execute", Some(&body))
            .await?;
        normalize::relay_response(&value)
    }
}
