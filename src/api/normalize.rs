//! Normalization of backend JSON into typed shapes.
//!
//! The backend is inconsistent about naming (`expectedReturn`, `expected_return`,
//! `return_pct`) and about number encoding (numbers or numeric strings). Every
//! variant is resolved here.

use serde_json::{Map, Value};
use std::str::FromStr;

use crate::api::types::{
    AuthResponse, HistoryEntry, HistoryKind, Participant, RelayResponse, Room, RoomStatus,
    UserInfo,
};
use crate::api::{ApiError, ApiResult};
use crate::blockchain::types::{Address, CreatedObject, ObjectId, TxDigest};

fn as_object<'a>(value: &'a Value, what: &str) -> ApiResult<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| ApiError::Decode(format!("{} is not an object", what)))
}

/// First non-null value among `keys`.
fn pick<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn to_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    }
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_u64().map(|v| v != 0),
        Value::String(s) => match s.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn u64_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    pick(obj, keys).and_then(to_u64)
}

/// Missing is `0`; a value that does not fit `u32` is a decode error.
fn u32_field(obj: &Map<String, Value>, keys: &[&str]) -> ApiResult<u32> {
    match u64_field(obj, keys) {
        Some(v) => u32::try_from(v)
            .map_err(|_| ApiError::Decode(format!("{} out of range: {}", keys[0], v))),
        None => Ok(0),
    }
}

fn str_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    pick(obj, keys).and_then(to_string)
}

fn object_id_field(obj: &Map<String, Value>, keys: &[&str]) -> ApiResult<Option<ObjectId>> {
    match str_field(obj, keys) {
        Some(raw) => ObjectId::from_str(&raw)
            .map(Some)
            .map_err(|e| ApiError::Decode(e.to_string())),
        None => Ok(None),
    }
}

fn address_field(obj: &Map<String, Value>, keys: &[&str]) -> ApiResult<Option<Address>> {
    match str_field(obj, keys) {
        Some(raw) => Address::from_str(&raw)
            .map(Some)
            .map_err(|e| ApiError::Decode(e.to_string())),
        None => Ok(None),
    }
}

/// Unwrap `{ "data": ... }` / `{ "room": ... }` envelopes.
pub fn unwrap_envelope<'a>(value: &'a Value, keys: &[&str]) -> &'a Value {
    if let Some(obj) = value.as_object() {
        if let Some(inner) = pick(obj, keys) {
            return inner;
        }
    }
    value
}

/// Normalize one room.
pub fn room(value: &Value) -> ApiResult<Room> {
    let obj = as_object(value, "room")?;

    let id = object_id_field(obj, &["id", "roomId", "room_id", "objectId"])?
        .ok_or_else(|| ApiError::Decode("room without id".to_string()))?;

    let strategy_id = match pick(obj, &["strategyId", "strategy_id", "strategy"]) {
        Some(v) => to_u64(v).unwrap_or(0).min(u8::MAX as u64) as u8,
        None => 0,
    };

    let password_hash = str_field(obj, &["passwordHash", "password_hash"]);
    let is_private = pick(obj, &["isPrivate", "is_private", "private"])
        .and_then(to_bool)
        .unwrap_or(password_hash.is_some());

    let expected_return_pct = pick(
        obj,
        &["expectedReturn", "expected_return", "return_pct", "returnPct", "apy"],
    )
    .and_then(to_f64)
    .unwrap_or(0.0);

    let status = str_field(obj, &["status", "state"])
        .map(|s| RoomStatus::parse(&s))
        .unwrap_or(RoomStatus::Unknown);

    Ok(Room {
        id,
        name: str_field(obj, &["name", "title"]).unwrap_or_default(),
        deposit_amount: u64_field(obj, &["depositAmount", "deposit_amount", "weeklyTarget"])
            .unwrap_or(0),
        total_periods: u32_field(obj, &["totalPeriods", "total_periods", "totalWeeks", "duration"])?,
        period_length_ms: u64_field(obj, &["periodLengthMs", "period_length_ms", "periodMs"])
            .unwrap_or(0),
        start_time_ms: u64_field(obj, &["startTime", "start_time", "startTimeMs", "start_time_ms"]),
        strategy_id,
        is_private,
        password_hash,
        vault_id: object_id_field(obj, &["vaultId", "vault_id"])?,
        total_deposited: u64_field(obj, &["totalDeposited", "totalDeposit", "total_deposited"])
            .unwrap_or(0),
        realized_yield: u64_field(obj, &["realizedYield", "realized_yield"]).unwrap_or(0),
        expected_return_pct,
        participant_count: u32_field(
            obj,
            &["participantCount", "participant_count", "playerCount", "participants_count"],
        )?,
        status,
    })
}

/// Normalize a room list, accepting a bare array or an envelope.
pub fn rooms(value: &Value) -> ApiResult<Vec<Room>> {
    let list = unwrap_envelope(value, &["rooms", "data", "items"]);
    list.as_array()
        .ok_or_else(|| ApiError::Decode("room list is not an array".to_string()))?
        .iter()
        .map(room)
        .collect()
}

/// Normalize one participant.
pub fn participant(value: &Value) -> ApiResult<Participant> {
    let obj = as_object(value, "participant")?;
    let address = address_field(obj, &["address", "player", "user", "owner"])?
        .ok_or_else(|| ApiError::Decode("participant without address".to_string()))?;
    Ok(Participant {
        address,
        position_id: object_id_field(obj, &["positionId", "position_id", "playerPositionId"])?,
        total_deposited: u64_field(obj, &["totalDeposited", "total_deposited", "deposited"])
            .unwrap_or(0),
        deposits_made: u32_field(obj, &["depositsMade", "deposits_made", "depositCount"])?,
        claimed: pick(obj, &["claimed", "hasClaimed", "has_claimed"])
            .and_then(to_bool)
            .unwrap_or(false),
    })
}

pub fn participants(value: &Value) -> ApiResult<Vec<Participant>> {
    let list = unwrap_envelope(value, &["participants", "players", "data"]);
    list.as_array()
        .ok_or_else(|| ApiError::Decode("participant list is not an array".to_string()))?
        .iter()
        .map(participant)
        .collect()
}

fn history_kind(raw: &str) -> HistoryKind {
    match raw.to_ascii_lowercase().as_str() {
        "join" | "joined" | "join_room" => HistoryKind::Join,
        "deposit" | "deposited" => HistoryKind::Deposit,
        "claim" | "claimed" | "claim_all" => HistoryKind::Claim,
        _ => HistoryKind::Other,
    }
}

/// Normalize one history entry.
pub fn history_entry(value: &Value) -> ApiResult<HistoryEntry> {
    let obj = as_object(value, "history entry")?;
    Ok(HistoryEntry {
        kind: str_field(obj, &["type", "kind", "action", "event"])
            .map(|s| history_kind(&s))
            .unwrap_or(HistoryKind::Other),
        address: address_field(obj, &["address", "player", "user"])?,
        amount: u64_field(obj, &["amount", "value"]).unwrap_or(0),
        period: u64_field(obj, &["period", "week", "periodIndex"]).and_then(|p| u32::try_from(p).ok()),
        timestamp_ms: u64_field(obj, &["timestamp", "timestampMs", "timestamp_ms", "time"]),
        digest: str_field(obj, &["digest", "txDigest", "tx_digest"]).map(TxDigest),
    })
}

pub fn history(value: &Value) -> ApiResult<Vec<HistoryEntry>> {
    let list = unwrap_envelope(value, &["history", "events", "data"]);
    list.as_array()
        .ok_or_else(|| ApiError::Decode("history is not an array".to_string()))?
        .iter()
        .map(history_entry)
        .collect()
}

/// Normalize a login response.
pub fn auth(value: &Value) -> ApiResult<AuthResponse> {
    let obj = as_object(value, "auth response")?;
    let token = str_field(obj, &["token", "accessToken", "access_token"])
        .ok_or_else(|| ApiError::Decode("auth response without token".to_string()))?;
    let user_value = pick(obj, &["user"]).unwrap_or(value);
    let user_obj = as_object(user_value, "user")?;
    let address = address_field(user_obj, &["address", "suiAddress", "sui_address", "walletAddress"])?
        .ok_or_else(|| ApiError::Decode("user without address".to_string()))?;
    Ok(AuthResponse {
        token,
        user: UserInfo {
            address,
            email: str_field(user_obj, &["email"]),
            name: str_field(user_obj, &["name", "displayName"]),
        },
    })
}

/// Normalize a stablecoin balance response (`{ "balance": "123" }` or a bare number).
pub fn balance(value: &Value) -> ApiResult<u64> {
    let inner = unwrap_envelope(value, &["balance", "totalBalance", "total_balance", "amount"]);
    to_u64(inner).ok_or_else(|| ApiError::Decode("balance is not a number".to_string()))
}

/// Digest out of `{ "digest": ... }` shaped responses.
pub fn digest(value: &Value) -> ApiResult<TxDigest> {
    let obj = as_object(value, "response")?;
    str_field(obj, &["digest", "txDigest", "tx_digest"])
        .map(TxDigest)
        .ok_or_else(|| ApiError::Decode("response without digest".to_string()))
}

/// Normalize the sponsor relay's response.
pub fn relay_response(value: &Value) -> ApiResult<RelayResponse> {
    let obj = as_object(value, "relay response")?;
    let digest = str_field(obj, &["digest", "txDigest", "tx_digest"]).map(TxDigest);

    let mut created_objects = Vec::new();
    if let Some(Value::Array(items)) = pick(obj, &["createdObjects", "created_objects", "objectChanges"]) {
        for item in items {
            let Some(item_obj) = item.as_object() else { continue };
            if let Some(kind) = str_field(item_obj, &["type"]) {
                if kind != "created" {
                    continue;
                }
            }
            if let Some(object_id) = object_id_field(item_obj, &["objectId", "object_id", "id"])? {
                created_objects.push(CreatedObject {
                    object_id,
                    object_type: str_field(item_obj, &["objectType", "object_type"]),
                });
            }
        }
    }

    let error = str_field(obj, &["error", "message"]);
    let success = pick(obj, &["success", "ok"])
        .and_then(to_bool)
        .unwrap_or(digest.is_some() && error.is_none());

    Ok(RelayResponse {
        success,
        digest,
        created_objects,
        error,
    })
}

/// Extract a human-readable message from an error body.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.as_object()
                .and_then(|obj| str_field(obj, &["message", "error", "detail"]))
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}
