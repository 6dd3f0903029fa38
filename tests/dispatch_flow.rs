//! End-to-end flows against the mock backend, relay and ledger.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use moneyrace_core::blockchain::keypair::{verify_transaction_signature, DerivedKeypair};
use moneyrace_core::blockchain::transaction::{hash_password, UnsignedTransaction};
use moneyrace_core::blockchain::types::{Address, ObjectId, TxDigest};
use moneyrace_core::dispatch::{ConnectedWallet, DispatchResult};
use moneyrace_core::lifecycle::SystemClock;
use moneyrace_core::session::{LoginMethod, MemoryStorage, SessionStore};
use moneyrace_core::{ErrorKind, MoneyRace};

mod common;
use common::{config_for, id_token, room_json, start_mock, MockState, POSITION_ID};

const SALT: &str = "moneyrace.zklogin.v1";

async fn setup() -> (Arc<MockState>, MoneyRace) {
    let state = Arc::new(MockState::default());
    state.rooms.lock().unwrap().push(room_json("0x1", None));
    state.rooms.lock().unwrap().push(room_json("0x3", Some("mypassword")));
    state
        .coins
        .lock()
        .unwrap()
        .extend([("0xc1".to_string(), 4_000_000), ("0xc2".to_string(), 50_000_000)]);

    let addr = start_mock(state.clone()).await;
    let session = SessionStore::new(Arc::new(MemoryStorage::new()), Arc::new(SystemClock), SALT);
    let core = MoneyRace::with_session(config_for(addr), session, Arc::new(SystemClock)).unwrap();
    (state, core)
}

fn id(s: &str) -> ObjectId {
    ObjectId::from_str(s).unwrap()
}

#[tokio::test]
async fn test_zklogin_join_goes_through_relay() {
    let (mock, core) = setup().await;

    let identity = core.login_zklogin(&id_token("sub-abc123")).await.unwrap();
    let expected = DerivedKeypair::from_subject("sub-abc123", SALT).unwrap();
    assert_eq!(identity.method, LoginMethod::Zklogin);
    assert_eq!(identity.address, expected.address());
    assert!(core.api().is_authenticated());

    core.refresh_rooms().await.unwrap();
    assert_eq!(core.state().rooms.len(), 2);

    let result = core.join_room(&id("0x1"), None).await.unwrap();
    assert!(result.success);
    assert_eq!(result.digest, TxDigest::from("RELAY_DIGEST"));
    assert_eq!(core.state().positions.get(&id("0x1")), Some(&id(POSITION_ID)));
    assert!(core.state().pending.is_empty());

    let relayed = mock.relay_requests.lock().unwrap()[0].clone();
    assert_eq!(relayed["sender"].as_str().unwrap(), expected.address().to_string());
    let tx_bytes = STANDARD.decode(relayed["tx_bytes"].as_str().unwrap()).unwrap();
    assert!(verify_transaction_signature(
        &expected.address(),
        &tx_bytes,
        relayed["signature"].as_str().unwrap()
    ));

    // The wallet path was not used, so the ledger was only asked for coins.
    assert_eq!(mock.rpc_count("sui_getTransactionBlock"), 0);
    assert_eq!(mock.rpc_count("suix_getCoins"), 1);

    // Every backend call carried a distinct request id and, after login, the token.
    let ids = mock.request_ids.lock().unwrap().clone();
    assert_eq!(ids.len(), ids.iter().collect::<HashSet<_>>().len());
    assert!(ids.iter().all(|i| uuid::Uuid::parse_str(i).is_ok()));
    let tokens = mock.bearer_tokens.lock().unwrap().clone();
    assert_eq!(tokens[0], None);
    assert!(tokens[1..].iter().all(|t| t.as_deref() == Some("tok-zk")));
}

#[tokio::test]
async fn test_private_join_embeds_only_the_password_hash() {
    let (mock, core) = setup().await;
    core.login_zklogin(&id_token("sub-abc123")).await.unwrap();

    let room = core.api().find_room_by_password("mypassword").await.unwrap();
    assert_eq!(room.id, id("0x3"));
    let sent = mock.find_requests.lock().unwrap()[0].to_string();
    assert!(!sent.contains("mypassword"));

    core.join_room(&id("0x3"), Some("mypassword")).await.unwrap();
    let relayed = mock.relay_requests.lock().unwrap()[0].clone();
    let tx_bytes = STANDARD.decode(relayed["tx_bytes"].as_str().unwrap()).unwrap();
    let tx: UnsignedTransaction = bcs::from_bytes(&tx_bytes).unwrap();

    let digest = hash_password("mypassword");
    assert!(tx_bytes.windows(32).any(|w| w == digest));
    assert!(!tx_bytes.windows(10).any(|w| w == b"mypassword"));
    assert_eq!(tx.move_calls().next().unwrap().function, "join_room");
}

#[tokio::test]
async fn test_wrong_password_never_reaches_relay() {
    let (mock, core) = setup().await;
    core.login_zklogin(&id_token("sub-abc123")).await.unwrap();

    let err = core.join_room(&id("0x3"), Some("guess")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(mock.relay_count(), 0);
    assert_eq!(core.state().error.as_deref(), Some("That password is not correct."));
}

#[tokio::test]
async fn test_insufficient_balance_is_classified() {
    let (mock, core) = setup().await;
    mock.coins.lock().unwrap().clear();
    mock.coins.lock().unwrap().push(("0xc1".to_string(), 1_000_000));
    core.login_zklogin(&id_token("sub-abc123")).await.unwrap();

    let err = core.join_room(&id("0x1"), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
    assert!(err.user_message().contains("10.00 USDC"));
    assert_eq!(mock.relay_count(), 0);
    // Not a session problem: still signed in.
    assert!(core.state().identity.is_some());
}

#[tokio::test]
async fn test_relay_failure_is_reported_once() {
    let (mock, core) = setup().await;
    mock.relay_fails.store(true, Ordering::SeqCst);
    core.login_zklogin(&id_token("sub-abc123")).await.unwrap();

    let err = core.join_room(&id("0x1"), None).await.unwrap_err();
    assert!(err.user_message().contains("Sponsor gas pool exhausted"));
    assert_eq!(mock.relay_count(), 1);
    assert!(core.state().pending.is_empty());
}

#[tokio::test]
async fn test_deposit_looks_up_position_from_participants() {
    let (mock, core) = setup().await;
    let identity = core.login_zklogin(&id_token("sub-abc123")).await.unwrap();
    mock.participants.lock().unwrap().push(serde_json::json!({
        "address": identity.address.to_string(),
        "positionId": POSITION_ID,
        "depositsMade": 1,
    }));

    let result = core.deposit(&id("0x1")).await.unwrap();
    assert!(result.success);
    assert_eq!(core.state().positions.get(&id("0x1")), Some(&id(POSITION_ID)));

    let relayed = mock.relay_requests.lock().unwrap()[0].clone();
    let tx_bytes = STANDARD.decode(relayed["tx_bytes"].as_str().unwrap()).unwrap();
    let tx: UnsignedTransaction = bcs::from_bytes(&tx_bytes).unwrap();
    assert_eq!(tx.move_calls().next().unwrap().function, "deposit");
}

#[tokio::test]
async fn test_unauthorized_position_lookup_signs_out() {
    let (mock, core) = setup().await;
    core.login_zklogin(&id_token("sub-abc123")).await.unwrap();
    mock.participants_unauthorized.store(true, Ordering::SeqCst);

    let err = core.deposit(&id("0x1")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Session);

    let state = core.state();
    assert!(state.identity.is_none());
    assert!(state.error.is_some());
    assert!(state.pending.is_empty());
    assert!(core.session().load().unwrap().is_none());
    assert!(core.session().load_auth().unwrap().is_none());
    assert!(!core.api().is_authenticated());
    assert_eq!(mock.relay_count(), 0);
}

#[tokio::test]
async fn test_missing_position_is_reported_in_state() {
    let (mock, core) = setup().await;
    core.login_zklogin(&id_token("sub-abc123")).await.unwrap();

    let err = core.claim(&id("0x1")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let state = core.state();
    assert!(state.error.is_some());
    assert!(state.identity.is_some());
    assert_eq!(mock.relay_count(), 0);
}

#[tokio::test]
async fn test_rejected_id_token_leaves_no_key() {
    let (mock, core) = setup().await;
    mock.zklogin_rejected.store(true, Ordering::SeqCst);

    assert!(core.login_zklogin(&id_token("sub-abc123")).await.is_err());
    assert!(core.session().load().unwrap().is_none());
    assert!(core.session().is_expired().unwrap());
    assert!(core.state().identity.is_none());
}

struct TestWallet {
    address: Address,
}

#[async_trait]
impl ConnectedWallet for TestWallet {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_and_execute(&self, tx: &UnsignedTransaction) -> DispatchResult<TxDigest> {
        assert_eq!(tx.sender, self.address);
        Ok(TxDigest::from("WALLET_DIGEST"))
    }
}

#[tokio::test]
async fn test_wallet_path_polls_ledger_for_effects() {
    let (mock, core) = setup().await;
    mock.unindexed_polls.store(2, Ordering::SeqCst);
    let wallet_address = Address::from_str("0xfeed").unwrap();
    let core = core.with_wallet(Arc::new(TestWallet { address: wallet_address }));

    let identity = core.login_wallet().await.unwrap();
    assert_eq!(identity.method, LoginMethod::Wallet);
    assert_eq!(identity.address, wallet_address);

    let result = core.join_room(&id("0x1"), None).await.unwrap();
    assert_eq!(result.digest, TxDigest::from("WALLET_DIGEST"));
    assert!(result.warning.is_none());
    assert_eq!(core.state().positions.get(&id("0x1")), Some(&id(POSITION_ID)));
    assert_eq!(mock.rpc_count("sui_getTransactionBlock"), 3);
    assert_eq!(mock.relay_count(), 0);
}

#[tokio::test]
async fn test_wallet_path_unindexed_effects_is_partial_success() {
    let (mock, core) = setup().await;
    mock.unindexed_polls.store(100, Ordering::SeqCst);
    let wallet_address = Address::from_str("0xfeed").unwrap();
    let core = core.with_wallet(Arc::new(TestWallet { address: wallet_address }));
    core.login_wallet().await.unwrap();

    let result = core.join_room(&id("0x1"), None).await.unwrap();
    assert!(result.success);
    assert!(result.warning.is_some());
    assert!(core.state().notice.is_some());
    assert!(core.state().positions.get(&id("0x1")).is_none());
}

#[tokio::test]
async fn test_logout_and_restore() {
    let (_mock, core) = setup().await;
    let identity = core.login_zklogin(&id_token("sub-abc123")).await.unwrap();

    core.logout().unwrap();
    assert!(core.state().identity.is_none());
    assert!(!core.api().is_authenticated());
    assert!(core.restore().unwrap().is_none());

    core.login_zklogin(&id_token("sub-abc123")).await.unwrap();
    let restored = core.restore().unwrap().unwrap();
    assert_eq!(restored.address, identity.address);
}

#[tokio::test]
async fn test_live_yield_display_is_monotonic_and_published() {
    let (_mock, core) = setup().await;
    let handle = core.start_live_yield(&id("0x1")).await.unwrap();

    let first = handle.displayed();
    assert!(first >= 1000.0);
    tokio::time::sleep(Duration::from_millis(120)).await;
    let second = handle.displayed();
    assert!(second > first);

    let published = core.state().live_yield.get(&id("0x1")).copied().unwrap();
    assert!(published >= first);

    // A lower backend figure never pulls the display down.
    let mut stale = core.api().get_room(&id("0x1")).await.unwrap();
    stale.realized_yield = 0;
    core.observe_yield(&handle.estimator, &stale);
    assert!(handle.displayed() >= second);

    handle.stop().await;
}

#[tokio::test]
async fn test_backend_reads() {
    let (_mock, core) = setup().await;
    let api = core.api();
    let addr = Address::from_str("0x1234").unwrap();

    assert_eq!(api.usdc_balance(&addr).await.unwrap(), 54_000_000);
    assert_eq!(api.mint_usdc(&addr, 1).await.unwrap(), TxDigest::from("MINT_DIGEST"));
    assert_eq!(api.room_history(&id("0x1")).await.unwrap().len(), 1);

    let err = api.get_room(&id("0x77")).await.unwrap_err();
    assert!(err.to_string().contains("Room not found"));
}
