//! Shared mock backend for integration tests.
//!
//! One axum server plays the MoneyRace backend (REST), the sponsor relay and
//! the ledger JSON-RPC endpoint (`POST /rpc`). Every request is recorded so
//! tests can assert on what the client actually sent.

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use moneyrace_core::config::ClientConfig;

pub const PACKAGE_ID: &str = "0xabc";
pub const USDC_TYPE: &str = "0xabc::usdc::USDC";
pub const POSITION_ID: &str = "0x99";

/// Everything the mock saw, plus knobs to change its behavior.
#[derive(Default)]
pub struct MockState {
    pub rooms: Mutex<Vec<Value>>,
    pub participants: Mutex<Vec<Value>>,
    /// `(coin object id, balance)` returned by `suix_getCoins`.
    pub coins: Mutex<Vec<(String, u64)>>,
    pub request_ids: Mutex<Vec<String>>,
    pub bearer_tokens: Mutex<Vec<Option<String>>>,
    pub relay_requests: Mutex<Vec<Value>>,
    pub find_requests: Mutex<Vec<Value>>,
    pub rpc_methods: Mutex<Vec<String>>,
    /// The relay answers `success: false` without a digest.
    pub relay_fails: AtomicBool,
    /// `sui_getTransactionBlock` reports "not found" this many times first.
    pub unindexed_polls: AtomicU32,
    /// `/rooms/{id}/participants` answers 401.
    pub participants_unauthorized: AtomicBool,
    /// `/auth/zklogin` answers 401.
    pub zklogin_rejected: AtomicBool,
}

impl MockState {
    pub fn relay_count(&self) -> usize {
        self.relay_requests.lock().unwrap().len()
    }

    pub fn rpc_count(&self, method: &str) -> usize {
        self.rpc_methods.lock().unwrap().iter().filter(|m| *m == method).count()
    }
}

type Shared = Arc<MockState>;

fn record(state: &MockState, headers: &HeaderMap) {
    if let Some(id) = headers.get("x-request-id").and_then(|v| v.to_str().ok()) {
        state.request_ids.lock().unwrap().push(id.to_string());
    }
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);
    state.bearer_tokens.lock().unwrap().push(token);
}

fn position_change() -> Value {
    json!({
        "type": "created",
        "objectId": POSITION_ID,
        "objectType": format!("{}::money_race::PlayerPosition", PACKAGE_ID),
    })
}

async fn auth_zklogin(
    State(s): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    record(&s, &headers);
    assert!(body.get("id_token").is_some());
    if s.zklogin_rejected.load(Ordering::SeqCst) {
        return Err((StatusCode::UNAUTHORIZED, Json(json!({ "message": "Invalid id token" }))));
    }
    Ok(Json(json!({ "token": "tok-zk", "user": { "address": "0x1234", "email": "backend@example.com" } })))
}

async fn auth_wallet(State(s): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    record(&s, &headers);
    Json(json!({ "accessToken": "tok-wallet", "user": { "suiAddress": body["address"] } }))
}

async fn list_rooms(State(s): State<Shared>, headers: HeaderMap) -> Json<Value> {
    record(&s, &headers);
    Json(json!({ "data": *s.rooms.lock().unwrap() }))
}

fn same_id(a: &Value, b: &str) -> bool {
    let a = a.as_str().unwrap_or_default().trim_start_matches("0x").trim_start_matches('0');
    a == b.trim_start_matches("0x").trim_start_matches('0')
}

async fn get_room(
    State(s): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    record(&s, &headers);
    s.rooms
        .lock()
        .unwrap()
        .iter()
        .find(|r| same_id(&r["id"], &id))
        .cloned()
        .map(|r| Json(json!({ "room": r })))
        .ok_or((StatusCode::NOT_FOUND, Json(json!({ "message": "Room not found" }))))
}

async fn participants(
    State(s): State<Shared>,
    headers: HeaderMap,
    Path(_id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    record(&s, &headers);
    if s.participants_unauthorized.load(Ordering::SeqCst) {
        return Err((StatusCode::UNAUTHORIZED, Json(json!({ "message": "Token expired" }))));
    }
    Ok(Json(json!({ "participants": *s.participants.lock().unwrap() })))
}

async fn history(State(s): State<Shared>, headers: HeaderMap, Path(_id): Path<String>) -> Json<Value> {
    record(&s, &headers);
    Json(json!([{ "type": "join", "address": "0x1234", "amount": "10000000", "digest": "D0" }]))
}

async fn find_by_password(
    State(s): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    record(&s, &headers);
    s.find_requests.lock().unwrap().push(body.clone());
    let hash = body["password_hash"].as_str().unwrap_or_default().to_string();
    s.rooms
        .lock()
        .unwrap()
        .iter()
        .find(|r| r["passwordHash"].as_str() == Some(hash.as_str()))
        .cloned()
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, Json(json!({ "error": "No room with that password" }))))
}

async fn balance(State(s): State<Shared>, headers: HeaderMap, Path(_address): Path<String>) -> Json<Value> {
    record(&s, &headers);
    let total: u64 = s.coins.lock().unwrap().iter().map(|(_, b)| *b).sum();
    Json(json!({ "balance": total.to_string() }))
}

async fn mint(State(s): State<Shared>, headers: HeaderMap, Json(_body): Json<Value>) -> Json<Value> {
    record(&s, &headers);
    Json(json!({ "digest": "MINT_DIGEST" }))
}

async fn sponsor_execute(State(s): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    record(&s, &headers);
    s.relay_requests.lock().unwrap().push(body);
    if s.relay_fails.load(Ordering::SeqCst) {
        return Json(json!({ "success": false, "error": "Sponsor gas pool exhausted" }));
    }
    Json(json!({
        "success": true,
        "digest": "RELAY_DIGEST",
        "objectChanges": [position_change()],
    }))
}

async fn rpc(State(s): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let method = body["method"].as_str().unwrap_or_default().to_string();
    s.rpc_methods.lock().unwrap().push(method.clone());
    let result = match method.as_str() {
        "suix_getCoins" => {
            let data: Vec<Value> = s
                .coins
                .lock()
                .unwrap()
                .iter()
                .map(|(id, b)| json!({ "coinObjectId": id, "balance": b.to_string() }))
                .collect();
            json!({ "data": data, "hasNextPage": false })
        }
        "suix_getBalance" => {
            let total: u64 = s.coins.lock().unwrap().iter().map(|(_, b)| *b).sum();
            json!({ "coinType": USDC_TYPE, "totalBalance": total.to_string() })
        }
        "sui_getTransactionBlock" => {
            let pending = s.unindexed_polls.load(Ordering::SeqCst);
            if pending > 0 {
                s.unindexed_polls.store(pending - 1, Ordering::SeqCst);
                return Json(json!({
                    "jsonrpc": "2.0", "id": 1,
                    "error": { "code": -32602, "message": "Could not find the referenced transaction" }
                }));
            }
            json!({ "digest": body["params"][0], "objectChanges": [position_change()] })
        }
        "sui_getLatestCheckpointSequenceNumber" => json!("1000"),
        _ => {
            return Json(json!({
                "jsonrpc": "2.0", "id": 1,
                "error": { "code": -32601, "message": "Method not found" }
            }))
        }
    };
    Json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
}

/// Start the mock on an ephemeral port.
pub async fn start_mock(state: Shared) -> SocketAddr {
    let app = Router::new()
        .route("/auth/zklogin", post(auth_zklogin))
        .route("/auth/wallet", post(auth_wallet))
        .route("/rooms", get(list_rooms))
        .route("/rooms/find-by-password", post(find_by_password))
        .route("/rooms/{id}", get(get_room))
        .route("/rooms/{id}/participants", get(participants))
        .route("/rooms/{id}/history", get(history))
        .route("/usdc/balance/{address}", get(balance))
        .route("/usdc/mint", post(mint))
        .route("/sponsor/execute", post(sponsor_execute))
        .route("/rpc", post(rpc))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Client config pointed at the mock.
pub fn config_for(addr: SocketAddr) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.api.base_url = format!("http://{}", addr);
    config.api.timeout_secs = 5;
    config.chain.rpc_url = format!("http://{}/rpc", addr);
    config.chain.rpc_timeout_secs = 5;
    config.chain.package_id = PACKAGE_ID.to_string();
    config.chain.usdc_type = USDC_TYPE.to_string();
    config.dispatch.effects_poll_attempts = 5;
    config.dispatch.effects_poll_base_ms = 10;
    config.dispatch.effects_poll_max_ms = 20;
    config.live_yield.tick_ms = 10;
    config
}

/// A room as the backend would send it (camelCase, numbers as strings).
pub fn room_json(id: &str, private_password: Option<&str>) -> Value {
    let mut room = json!({
        "id": id,
        "name": format!("Room {}", id),
        "depositAmount": "10000000",
        "totalPeriods": 4,
        "periodLengthMs": "604800000",
        "startTime": 0,
        "strategyId": 1,
        "vaultId": "0x2",
        "totalDeposit": "40000000",
        "realizedYield": "1000",
        "expectedReturn": "5",
        "participantCount": 4,
        "status": "active",
    });
    if let Some(pw) = private_password {
        room["isPrivate"] = json!(true);
        room["passwordHash"] = json!(hex::encode(moneyrace_core::blockchain::transaction::hash_password(pw)));
    }
    room
}

/// An unsigned id token carrying `sub`.
pub fn id_token(sub: &str) -> String {
    format!(
        "{}.{}.sig",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(json!({ "sub": sub, "email": "user@example.com", "iss": "https://accounts.google.com" }).to_string()),
    )
}
