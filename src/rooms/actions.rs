//! Room actions: pre-check, build, dispatch.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::api::types::Room;
use crate::blockchain::client::{select_coin, CoinInfo, LedgerClient};
use crate::blockchain::transaction::{
    hash_password, ClaimParams, DepositParams, JoinRoomParams, TxBuilder, UnsignedTransaction,
};
use crate::blockchain::types::{Address, BlockchainResult, ObjectId};
use crate::dispatch::{Dispatcher, ExecutionResult};
use crate::rooms::{RoomError, RoomResult};
use crate::session::LoginMethod;

/// Move struct name of the per-participant position object.
pub const POSITION_TYPE: &str = "PlayerPosition";

/// Read access to an owner's coin objects.
#[async_trait]
pub trait CoinReader: Send + Sync {
    async fn coins(&self, owner: &Address, coin_type: &str) -> BlockchainResult<Vec<CoinInfo>>;
}

#[async_trait]
impl CoinReader for LedgerClient {
    async fn coins(&self, owner: &Address, coin_type: &str) -> BlockchainResult<Vec<CoinInfo>> {
        self.get_coins(owner, coin_type).await
    }
}

/// Outcome of joining a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub execution: ExecutionResult,
    /// The new position object, when the effects reported it.
    pub position_id: Option<ObjectId>,
}

/// Marks a room busy until dropped.
struct InFlight<'a> {
    map: &'a DashMap<ObjectId, &'static str>,
    room: ObjectId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.room);
    }
}

/// Join, deposit and claim for the signed-in user.
#[derive(Clone)]
pub struct RoomActions {
    builder: TxBuilder,
    coins: Arc<dyn CoinReader>,
    dispatcher: Dispatcher,
    in_flight: Arc<DashMap<ObjectId, &'static str>>,
}

impl RoomActions {
    pub fn new(builder: TxBuilder, coins: Arc<dyn CoinReader>, dispatcher: Dispatcher) -> Self {
        Self {
            builder,
            coins,
            dispatcher,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Same actions submitted through another dispatcher.
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Whether an action for `room_id` is currently being submitted.
    pub fn is_in_flight(&self, room_id: &ObjectId) -> bool {
        self.in_flight.contains_key(room_id)
    }

    fn begin(&self, room_id: ObjectId, action: &'static str) -> RoomResult<InFlight<'_>> {
        match self.in_flight.entry(room_id) {
            Entry::Occupied(busy) => Err(RoomError::InProgress {
                room_id,
                action: busy.get(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(action);
                Ok(InFlight {
                    map: &self.in_flight,
                    room: room_id,
                })
            }
        }
    }

    /// A single coin covering `amount`, after checking the total balance.
    async fn payment_coin(&self, owner: &Address, amount: u64) -> RoomResult<ObjectId> {
        let coin_type = self.builder.contract().coin_type.to_string();
        let coins = self.coins.coins(owner, &coin_type).await?;
        let available = coins.iter().fold(0u64, |acc, c| acc.saturating_add(c.balance));
        if available < amount {
            return Err(RoomError::InsufficientBalance {
                required: amount,
                available,
            });
        }
        select_coin(&coins, amount)
            .map(|c| c.coin_object_id)
            .ok_or_else(|| RoomError::CoinsFragmented {
                required: amount,
                largest: coins.iter().map(|c| c.balance).max().unwrap_or(0),
            })
    }

    async fn submit(
        &self,
        method: LoginMethod,
        tx: &UnsignedTransaction,
    ) -> RoomResult<ExecutionResult> {
        let result = self.dispatcher.execute(method, tx).await?;
        if !result.success {
            return Err(RoomError::Aborted {
                digest: result.digest,
                reason: result
                    .warning
                    .unwrap_or_else(|| "transaction aborted".to_string()),
            });
        }
        Ok(result)
    }

    /// Join `room` with its first deposit.
    ///
    /// Private rooms need the password; it is checked against the room's
    /// stored hash before anything is submitted.
    pub async fn join(
        &self,
        method: LoginMethod,
        sender: Address,
        room: &Room,
        password: Option<&str>,
    ) -> RoomResult<JoinOutcome> {
        let vault_id = room.vault_id.ok_or(RoomError::MissingVault(room.id))?;
        let password = match (room.is_private, password) {
            (true, None) | (true, Some("")) => return Err(RoomError::PasswordRequired),
            (true, Some(pw)) => {
                if let Some(expected) = &room.password_hash {
                    if !hex::encode(hash_password(pw)).eq_ignore_ascii_case(expected) {
                        return Err(RoomError::WrongPassword);
                    }
                }
                Some(pw.to_string())
            }
            (false, _) => None,
        };

        let _guard = self.begin(room.id, "join")?;
        let payment_coin = self.payment_coin(&sender, room.deposit_amount).await?;
        let tx = self.builder.join_room(&JoinRoomParams {
            sender,
            room_id: room.id,
            vault_id,
            payment_coin,
            deposit_amount: room.deposit_amount,
            password,
        })?;

        let execution = self.submit(method, &tx).await?;
        let position_id = execution
            .created(&self.builder.contract().module, POSITION_TYPE)
            .map(|o| o.object_id);
        if position_id.is_none() {
            tracing::warn!(room_id = %room.id, digest = %execution.digest, "Joined but position id not reported");
        }
        tracing::info!(room_id = %room.id, digest = %execution.digest, "Joined room");

        Ok(JoinOutcome {
            execution,
            position_id,
        })
    }

    /// Deposit the room's per-period amount.
    pub async fn deposit(
        &self,
        method: LoginMethod,
        sender: Address,
        room: &Room,
        position_id: ObjectId,
    ) -> RoomResult<ExecutionResult> {
        let vault_id = room.vault_id.ok_or(RoomError::MissingVault(room.id))?;
        let _guard = self.begin(room.id, "deposit")?;
        let payment_coin = self.payment_coin(&sender, room.deposit_amount).await?;
        let tx = self.builder.deposit(&DepositParams {
            sender,
            room_id: room.id,
            vault_id,
            position_id,
            payment_coin,
            amount: room.deposit_amount,
        })?;
        let result = self.submit(method, &tx).await?;
        tracing::info!(room_id = %room.id, digest = %result.digest, "Deposited");
        Ok(result)
    }

    /// Claim principal plus yield share.
    pub async fn claim(
        &self,
        method: LoginMethod,
        sender: Address,
        room: &Room,
        position_id: ObjectId,
    ) -> RoomResult<ExecutionResult> {
        let vault_id = room.vault_id.ok_or(RoomError::MissingVault(room.id))?;
        let _guard = self.begin(room.id, "claim")?;
        let tx = self.builder.claim(&ClaimParams {
            sender,
            room_id: room.id,
            vault_id,
            position_id,
        })?;
        let result = self.submit(method, &tx).await?;
        tracing::info!(room_id = %room.id, digest = %result.digest, "Claimed");
        Ok(result)
    }
}

impl std::fmt::Debug for RoomActions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomActions")
            .field("contract", self.builder.contract())
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::RoomStatus;
    use crate::api::{ApiResult, RelayResponse, SponsoredRequest};
    use crate::blockchain::types::{CreatedObject, TxDigest};
    use crate::config::{ChainConfig, DispatchConfig};
    use crate::dispatch::{LedgerReader, SponsorRelay};
    use crate::lifecycle::ManualClock;
    use crate::error::ErrorKind;
    use crate::session::{MemoryStorage, SessionStore};
    use std::str::FromStr;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct Wallet(Vec<u64>);

    #[async_trait]
    impl CoinReader for Wallet {
        async fn coins(&self, _owner: &Address, _coin_type: &str) -> BlockchainResult<Vec<CoinInfo>> {
            Ok(self
                .0
                .iter()
                .enumerate()
                .map(|(i, b)| CoinInfo {
                    coin_object_id: ObjectId::from_bytes([100 + i as u8; 32]),
                    balance: *b,
                })
                .collect())
        }
    }

    struct NoLedger;

    #[async_trait]
    impl LedgerReader for NoLedger {
        async fn created_objects(&self, digest: &TxDigest) -> BlockchainResult<Vec<CreatedObject>> {
            Err(crate::blockchain::types::BlockchainError::NotFound(digest.to_string()))
        }
    }

    #[derive(Default)]
    struct Relay {
        calls: AtomicU32,
        abort: bool,
    }

    #[async_trait]
    impl SponsorRelay for Relay {
        async fn execute_sponsored(&self, _request: &SponsoredRequest) -> ApiResult<RelayResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(RelayResponse {
                success: !self.abort,
                digest: Some(TxDigest::from("D")),
                created_objects: vec![CreatedObject {
                    object_id: ObjectId::from_str("0x99").unwrap(),
                    object_type: Some("0xabc::money_race::PlayerPosition".to_string()),
                }],
                error: self.abort.then(|| "MoveAbort: room full".to_string()),
            })
        }
    }

    fn setup(balances: Vec<u64>, relay: Arc<Relay>) -> (RoomActions, Address) {
        let chain = ChainConfig {
            package_id: "0xabc".to_string(),
            usdc_type: "0xabc::usdc::USDC".to_string(),
            ..ChainConfig::default()
        };
        let session = SessionStore::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(ManualClock::new(1_000)),
            "salt",
        );
        let sender = session
            .login("sub-abc123", Duration::from_secs(3600))
            .unwrap()
            .address();
        let dispatcher = Dispatcher::new(Arc::new(NoLedger), relay, session, &DispatchConfig::default());
        let actions = RoomActions::new(
            TxBuilder::from_config(&chain).unwrap(),
            Arc::new(Wallet(balances)),
            dispatcher,
        );
        (actions, sender)
    }

    fn room(private: bool) -> Room {
        Room {
            id: ObjectId::from_str("0x1").unwrap(),
            name: "r".to_string(),
            deposit_amount: 10,
            total_periods: 4,
            period_length_ms: 1000,
            start_time_ms: None,
            strategy_id: 0,
            is_private: private,
            password_hash: private.then(|| hex::encode(hash_password("mypassword"))),
            vault_id: Some(ObjectId::from_str("0x2").unwrap()),
            total_deposited: 0,
            realized_yield: 0,
            expected_return_pct: 4.0,
            participant_count: 0,
            status: RoomStatus::Pending,
        }
    }

    #[tokio::test]
    async fn test_join_extracts_position() {
        let (actions, sender) = setup(vec![5, 12, 50], Arc::new(Relay::default()));
        let outcome = actions
            .join(LoginMethod::Zklogin, sender, &room(false), None)
            .await
            .unwrap();
        assert_eq!(outcome.position_id, Some(ObjectId::from_str("0x99").unwrap()));
        assert!(!actions.is_in_flight(&room(false).id));
    }

    #[tokio::test]
    async fn test_insufficient_balance_before_submission() {
        let relay = Arc::new(Relay::default());
        let (actions, sender) = setup(vec![3, 4], relay.clone());
        let err = actions
            .deposit(LoginMethod::Zklogin, sender, &room(false), ObjectId::from_str("0x99").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::InsufficientBalance { required: 10, available: 7 }));
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
        assert_eq!(relay.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fragmented_coins() {
        let (actions, sender) = setup(vec![6, 6], Arc::new(Relay::default()));
        let err = actions
            .join(LoginMethod::Zklogin, sender, &room(false), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::CoinsFragmented { required: 10, largest: 6 }));
    }

    #[tokio::test]
    async fn test_private_room_password_checks() {
        let (actions, sender) = setup(vec![100], Arc::new(Relay::default()));
        let private = room(true);
        assert!(matches!(
            actions.join(LoginMethod::Zklogin, sender, &private, None).await,
            Err(RoomError::PasswordRequired)
        ));
        assert!(matches!(
            actions.join(LoginMethod::Zklogin, sender, &private, Some("wrong")).await,
            Err(RoomError::WrongPassword)
        ));
        assert!(actions
            .join(LoginMethod::Zklogin, sender, &private, Some("mypassword"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_action_rejected_while_in_flight() {
        let relay = Arc::new(Relay::default());
        let (actions, sender) = setup(vec![100], relay.clone());
        let r = room(false);
        let position = ObjectId::from_str("0x99").unwrap();

        let (first, second) = tokio::join!(
            actions.claim(LoginMethod::Zklogin, sender, &r, position),
            actions.claim(LoginMethod::Zklogin, sender, &r, position),
        );
        assert!(first.is_ok());
        assert!(matches!(second, Err(RoomError::InProgress { action: "claim", .. })));
        assert_eq!(relay.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_aborted_transaction_is_error() {
        let relay = Arc::new(Relay {
            abort: true,
            ..Relay::default()
        });
        let (actions, sender) = setup(vec![100], relay);
        let err = actions
            .claim(LoginMethod::Zklogin, sender, &room(false), ObjectId::from_str("0x99").unwrap())
            .await
            .unwrap_err();
        assert!(err.user_message().contains("room full"));
    }
}
