//! The client core assembled from configuration.
//!
//! [`MoneyRace`] owns one instance of every subsystem and keeps the
//! [`state::Store`](crate::state::Store) in step with what they report.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::api::types::Room;
use crate::api::ApiClient;
use crate::blockchain::client::LedgerClient;
use crate::blockchain::transaction::TxBuilder;
use crate::blockchain::types::{Address, ObjectId};
use crate::config::ClientConfig;
use crate::dispatch::{ConnectedWallet, DispatchError, Dispatcher, ExecutionResult};
use crate::error::{CoreError, CoreResult};
use crate::lifecycle::{Clock, SystemClock, TimerHandle};
use crate::live_yield::{rate_per_sec, spawn_ticker, SharedEstimator, YieldStore};
use crate::rooms::{RoomActions, RoomError};
use crate::session::{parse_id_token, AuthSession, LoginMethod, SessionError, SessionStore};
use crate::state::{Action, AppState, Identity, Store};

/// Handle to a running live-yield display for one room.
///
/// Dropping it stops both the ticker and the state publisher.
pub struct LiveYieldHandle {
    pub estimator: SharedEstimator,
    ticker: TimerHandle,
    publisher: TimerHandle,
}

impl LiveYieldHandle {
    pub fn displayed(&self) -> f64 {
        self.estimator
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .displayed()
    }

    /// Stop ticking; the final value is persisted before this returns.
    pub async fn stop(self) {
        self.publisher.stop().await;
        self.ticker.stop().await;
    }
}

/// The MoneyRace client core.
pub struct MoneyRace {
    config: ClientConfig,
    api: ApiClient,
    session: SessionStore,
    dispatcher: Dispatcher,
    rooms: RoomActions,
    wallet: Option<Arc<dyn ConnectedWallet>>,
    yields: YieldStore,
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
}

impl MoneyRace {
    /// Wire every subsystem from `config` using the system clock.
    pub fn from_config(config: ClientConfig) -> CoreResult<Self> {
        let session = SessionStore::from_config(&config.session)?;
        Self::with_session(config, session, Arc::new(SystemClock))
    }

    /// Like [`from_config`](Self::from_config) with an explicit session store and clock.
    pub fn with_session(
        config: ClientConfig,
        session: SessionStore,
        clock: Arc<dyn Clock>,
    ) -> CoreResult<Self> {
        let api = ApiClient::new(&config.api)?;
        let ledger = Arc::new(LedgerClient::new(&config.chain)?);
        let builder = TxBuilder::from_config(&config.chain)?;
        let dispatcher = Dispatcher::new(
            ledger.clone(),
            Arc::new(api.clone()),
            session.clone(),
            &config.dispatch,
        );
        let rooms = RoomActions::new(builder, ledger, dispatcher.clone());
        let yields = match &config.live_yield.persistence_path {
            Some(path) => YieldStore::load_from_file(path)?,
            None => YieldStore::new(None),
        };

        tracing::info!(
            api = %api.base_url(),
            rpc = %config.chain.rpc_url,
            package = %config.chain.package_id,
            "Client core initialized"
        );

        Ok(Self {
            config,
            api,
            session,
            dispatcher,
            rooms,
            wallet: None,
            yields,
            store: Arc::new(Store::default()),
            clock,
        })
    }

    /// Attach a connected wallet for wallet sign-in and the wallet path.
    pub fn with_wallet(mut self, wallet: Arc<dyn ConnectedWallet>) -> Self {
        self.dispatcher = self.dispatcher.clone().with_wallet(wallet.clone());
        self.rooms = self.rooms.with_dispatcher(self.dispatcher.clone());
        self.wallet = Some(wallet);
        self
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn state(&self) -> Arc<AppState> {
        self.store.snapshot()
    }

    pub fn store(&self) -> Arc<Store> {
        self.store.clone()
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.config.session.ttl_secs)
    }

    fn sign_in(&self, auth: AuthSession) -> CoreResult<Identity> {
        self.session.save_auth(&auth)?;
        if let Some(token) = auth.token.clone() {
            self.api.set_token(Some(token));
        }
        let identity = Identity {
            method: auth.method,
            address: auth.address,
            email: auth.email.clone(),
        };
        self.store.dispatch(Action::SignedIn(identity.clone()));
        tracing::info!(method = auth.method.as_str(), address = %auth.address, "Signed in");
        Ok(identity)
    }

    /// Sign in with an OAuth id token.
    ///
    /// The backend issues the API token first. The signing key is then derived
    /// locally from the token's subject, or reloaded if a live session for that
    /// subject exists. A rejected token leaves no key behind.
    pub async fn login_zklogin(&self, id_token: &str) -> CoreResult<Identity> {
        let claims = parse_id_token(id_token)?;
        let response = self.api.login_zklogin(id_token).await?;
        let keypair = self.session.login(&claims.sub, self.ttl())?;
        if response.user.address != keypair.address() {
            tracing::debug!(
                local = %keypair.address(),
                backend = %response.user.address,
                "Backend reports a different address; signing with the local key"
            );
        }

        let now = self.clock.now_ms();
        let expires_at = self
            .session
            .expires_at()?
            .unwrap_or_else(|| now.saturating_add(self.ttl().as_millis() as u64));
        self.sign_in(AuthSession {
            method: LoginMethod::Zklogin,
            address: keypair.address(),
            subject: Some(claims.sub),
            email: claims.email.or(response.user.email),
            token: Some(response.token),
            created_at: now,
            expires_at,
        })
    }

    /// Sign in with the connected wallet.
    pub async fn login_wallet(&self) -> CoreResult<Identity> {
        let wallet = self.wallet.as_ref().ok_or(DispatchError::WalletNotConnected)?;
        let address = wallet.address();
        let response = self.api.login_wallet(&address).await?;

        let now = self.clock.now_ms();
        self.sign_in(AuthSession {
            method: LoginMethod::Wallet,
            address,
            subject: None,
            email: response.user.email,
            token: Some(response.token),
            created_at: now,
            expires_at: now.saturating_add(self.ttl().as_millis() as u64),
        })
    }

    /// Resume a stored session, if one is still valid.
    pub fn restore(&self) -> CoreResult<Option<Identity>> {
        let Some(auth) = self.session.load_auth()? else {
            return Ok(None);
        };
        if auth.method == LoginMethod::Zklogin {
            let live = self.session.load()?;
            if live.map(|kp| kp.address()) != Some(auth.address) {
                self.session.clear()?;
                return Ok(None);
            }
        }
        self.sign_in(auth).map(Some)
    }

    /// Forget the session and the API token.
    pub fn logout(&self) -> CoreResult<()> {
        self.session.clear()?;
        self.api.set_token(None);
        self.store.dispatch(Action::SignedOut);
        Ok(())
    }

    /// Reload the room list.
    pub async fn refresh_rooms(&self) -> CoreResult<Vec<Room>> {
        let rooms = self.api.list_rooms().await?;
        self.store.dispatch(Action::RoomsLoaded(rooms.clone()));
        Ok(rooms)
    }

    async fn room(&self, room_id: &ObjectId) -> CoreResult<Room> {
        if let Some(room) = self.store.snapshot().rooms.get(room_id) {
            return Ok(room.clone());
        }
        let room = self.api.get_room(room_id).await?;
        self.store.dispatch(Action::RoomUpdated(room.clone()));
        Ok(room)
    }

    fn identity(&self) -> CoreResult<Identity> {
        self.store
            .snapshot()
            .identity
            .clone()
            .ok_or(CoreError::Session(SessionError::NotFound))
    }

    /// The user's position in a room, from state or the participant list.
    async fn position(&self, room_id: &ObjectId, owner: &Address) -> CoreResult<ObjectId> {
        if let Some(position) = self.store.snapshot().positions.get(room_id) {
            return Ok(*position);
        }
        let participants = self.api.room_participants(room_id).await?;
        let position = participants
            .into_iter()
            .find(|p| &p.address == owner)
            .and_then(|p| p.position_id)
            .ok_or(RoomError::NoPosition(*room_id))?;
        self.store.dispatch(Action::PositionKnown {
            room_id: *room_id,
            position_id: position,
        });
        Ok(position)
    }

    /// Record a failed room action in state; session failures sign out.
    fn fail(&self, room_id: ObjectId, err: CoreError) -> CoreError {
        let clears_session = err.kind().clears_session();
        if clears_session {
            if let Err(clear_err) = self.session.clear() {
                tracing::warn!(error = %clear_err, "Failed to clear session");
            }
            self.api.set_token(None);
        }
        self.store.dispatch(Action::ActionFailed {
            room_id,
            message: err.user_message(),
            clears_session,
        });
        err
    }

    /// Record the outcome of a room action in state.
    fn settle<T>(&self, room_id: ObjectId, outcome: Result<T, RoomError>) -> CoreResult<T>
    where
        T: AsWarning,
    {
        match outcome {
            Ok(value) => {
                self.store.dispatch(Action::ActionSucceeded {
                    room_id,
                    warning: value.warning(),
                });
                Ok(value)
            }
            Err(e) => Err(self.fail(room_id, e.into())),
        }
    }

    /// Room and position lookups that precede a deposit or claim.
    async fn prepare(&self, room_id: &ObjectId) -> CoreResult<(Identity, Room, ObjectId)> {
        let identity = self.identity()?;
        let prepared = async {
            let room = self.room(room_id).await?;
            let position = self.position(&room.id, &identity.address).await?;
            Ok::<_, CoreError>((room, position))
        }
        .await;
        let (room, position) = prepared.map_err(|e| self.fail(*room_id, e))?;
        Ok((identity, room, position))
    }

    /// Join a room, recording the new position.
    pub async fn join_room(&self, room_id: &ObjectId, password: Option<&str>) -> CoreResult<ExecutionResult> {
        let identity = self.identity()?;
        let room = self
            .room(room_id)
            .await
            .map_err(|e| self.fail(*room_id, e))?;
        self.store.dispatch(Action::ActionStarted(room.id));
        let outcome = self.rooms.join(identity.method, identity.address, &room, password).await;
        let outcome = self.settle(room.id, outcome)?;
        if let Some(position_id) = outcome.position_id {
            self.store.dispatch(Action::PositionKnown {
                room_id: room.id,
                position_id,
            });
        }
        Ok(outcome.execution)
    }

    /// Make this period's deposit.
    pub async fn deposit(&self, room_id: &ObjectId) -> CoreResult<ExecutionResult> {
        let (identity, room, position) = self.prepare(room_id).await?;
        self.store.dispatch(Action::ActionStarted(room.id));
        let outcome = self.rooms.deposit(identity.method, identity.address, &room, position).await;
        self.settle(room.id, outcome)
    }

    /// Claim principal and yield.
    pub async fn claim(&self, room_id: &ObjectId) -> CoreResult<ExecutionResult> {
        let (identity, room, position) = self.prepare(room_id).await?;
        self.store.dispatch(Action::ActionStarted(room.id));
        let outcome = self.rooms.claim(identity.method, identity.address, &room, position).await;
        self.settle(room.id, outcome)
    }

    /// Start the live-yield display for a room.
    ///
    /// Each tick also publishes the displayed value into state.
    pub async fn start_live_yield(&self, room_id: &ObjectId) -> CoreResult<LiveYieldHandle> {
        let room = self
            .room(room_id)
            .await
            .map_err(|e| self.fail(*room_id, e))?;
        let rate = rate_per_sec(room.total_deposited, room.annual_rate());
        let estimator: SharedEstimator = Arc::new(Mutex::new(self.yields.estimator(
            room.id,
            room.realized_yield,
            rate,
            self.clock.now_ms(),
        )));

        let ticker = spawn_ticker(
            estimator.clone(),
            self.yields.clone(),
            self.clock.clone(),
            &self.config.live_yield,
            None,
        );
        let publisher = self.publish_live_yield(estimator.clone());
        tracing::info!(room_id = %room.id, rate_per_sec = rate, "Live yield started");

        Ok(LiveYieldHandle {
            estimator,
            ticker,
            publisher,
        })
    }

    fn publish_live_yield(&self, estimator: SharedEstimator) -> TimerHandle {
        let store = self.store.clone();
        let period = Duration::from_millis(self.config.live_yield.tick_ms.max(1));
        crate::lifecycle::spawn_interval(period, move || {
            let (room_id, displayed) = {
                let guard = estimator.lock().unwrap_or_else(|p| p.into_inner());
                (guard.room_id(), guard.displayed())
            };
            store.dispatch(Action::LiveYieldUpdated { room_id, displayed });
            crate::lifecycle::TickControl::Continue
        })
    }

    /// Feed a fresh backend figure into a running display.
    pub fn observe_yield(&self, estimator: &SharedEstimator, room: &Room) {
        let mut guard = estimator.lock().unwrap_or_else(|p| p.into_inner());
        guard.observe_authoritative(room.realized_yield, self.clock.now_ms());
        guard.set_rate(rate_per_sec(room.total_deposited, room.annual_rate()));
    }

    /// Watch for session expiry; on expiry the session is cleared and state signs out.
    pub fn watch_session(&self) -> TimerHandle {
        let store = self.store.clone();
        let api = self.api.clone();
        self.session.watch_expiry(
            Duration::from_secs(self.config.session.expiry_check_secs.max(1)),
            move || {
                api.set_token(None);
                store.dispatch(Action::SignedOut);
            },
        )
    }
}

/// Partial-success warning carried by an action outcome.
trait AsWarning {
    fn warning(&self) -> Option<String>;
}

impl AsWarning for ExecutionResult {
    fn warning(&self) -> Option<String> {
        self.warning.clone()
    }
}

impl AsWarning for crate::rooms::JoinOutcome {
    fn warning(&self) -> Option<String> {
        self.execution.warning.clone()
    }
}
