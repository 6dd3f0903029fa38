//! Session store for derived keypairs and auth sessions.

use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::keypair::DerivedKeypair;
use crate::config::{SessionBackend, SessionConfig};
use crate::lifecycle::{spawn_interval, Clock, SystemClock, TickControl, TimerHandle};
use crate::observability::metrics;
use crate::session::record::{AuthSession, KeypairRecord};
use crate::session::storage::{FileStorage, MemoryStorage, SessionStorage};
use crate::session::{SessionError, SessionResult};

/// Storage key of the keypair record.
pub const KEYPAIR_KEY: &str = "moneyrace.keypair";

/// Storage key of the auth session record.
pub const AUTH_KEY: &str = "moneyrace.auth";

/// Persists derived key material with an absolute expiry.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    clock: Arc<dyn Clock>,
    salt: String,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SessionStorage>, clock: Arc<dyn Clock>, salt: impl Into<String>) -> Self {
        Self {
            storage,
            clock,
            salt: salt.into(),
        }
    }

    /// Build a store with the configured backend and the system clock.
    pub fn from_config(config: &SessionConfig) -> SessionResult<Self> {
        let storage: Arc<dyn SessionStorage> = match config.backend {
            SessionBackend::Memory => Arc::new(MemoryStorage::new()),
            SessionBackend::File => {
                let path = config.storage_path.as_ref().ok_or_else(|| {
                    SessionError::Storage("storage_path is required for file backend".to_string())
                })?;
                Arc::new(FileStorage::new(path))
            }
        };
        Ok(Self::new(storage, Arc::new(SystemClock), config.derivation_salt.clone()))
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Salt used for key derivation.
    pub fn salt(&self) -> &str {
        &self.salt
    }

    fn read_record(&self) -> SessionResult<Option<KeypairRecord>> {
        let Some(raw) = self.storage.get(KEYPAIR_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str::<KeypairRecord>(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unparsable keypair record");
                metrics::record_session_event("corrupt");
                self.storage.remove(KEYPAIR_KEY)?;
                Ok(None)
            }
        }
    }

    fn write_record(&self, record: &KeypairRecord) -> SessionResult<()> {
        let raw = serde_json::to_string(record).map_err(|e| SessionError::Storage(e.to_string()))?;
        self.storage.set(KEYPAIR_KEY, raw)
    }

    fn discard(&self, event: &'static str) -> SessionResult<()> {
        metrics::record_session_event(event);
        self.storage.remove(KEYPAIR_KEY)
    }

    /// Persist a keypair for `subject`, valid for `ttl` from now.
    ///
    /// Returns the expiry in Unix milliseconds.
    pub fn save(&self, keypair: &DerivedKeypair, subject: &str, ttl: Duration) -> SessionResult<u64> {
        if ttl.is_zero() {
            return Err(SessionError::InvalidTtl);
        }
        let now = self.now_ms();
        let expires_at = now.saturating_add(ttl.as_millis() as u64);
        let record = KeypairRecord {
            secret_key: keypair.encode_secret()?.to_string(),
            public_key: keypair.public_key_hex(),
            address: keypair.address(),
            created_at: now,
            expires_at,
            subject: subject.to_string(),
        };
        self.write_record(&record)?;
        metrics::record_session_event("created");
        tracing::info!(address = %keypair.address(), expires_at, "Session keypair saved");
        Ok(expires_at)
    }

    /// Load the stored keypair if it is present, unexpired and consistent.
    ///
    /// Expired or corrupt records are removed and `None` is returned.
    pub fn load(&self) -> SessionResult<Option<DerivedKeypair>> {
        Ok(self.load_with_record()?.map(|(kp, _)| kp))
    }

    fn load_with_record(&self) -> SessionResult<Option<(DerivedKeypair, KeypairRecord)>> {
        let Some(record) = self.read_record()? else {
            return Ok(None);
        };

        if record.is_expired(self.now_ms()) {
            tracing::info!(address = %record.address, "Session expired, clearing");
            self.discard("expired")?;
            return Ok(None);
        }

        let keypair = match DerivedKeypair::from_secret(&record.secret_key) {
            Ok(kp) => kp,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding keypair record with unreadable secret");
                self.discard("corrupt")?;
                return Ok(None);
            }
        };

        if keypair.address() != record.address || keypair.public_key_hex() != record.public_key {
            tracing::warn!(
                stored = %record.address,
                derived = %keypair.address(),
                "Keypair record does not match its secret, discarding"
            );
            self.discard("mismatch")?;
            return Ok(None);
        }

        Ok(Some((keypair, record)))
    }

    /// Like [`load`](Self::load), also discarding a record owned by another subject.
    pub fn load_for_subject(&self, subject: &str) -> SessionResult<Option<DerivedKeypair>> {
        let Some((keypair, record)) = self.load_with_record()? else {
            return Ok(None);
        };
        if record.subject != subject {
            tracing::info!("Stored session belongs to another identity, discarding");
            self.discard("subject_changed")?;
            return Ok(None);
        }
        Ok(Some(keypair))
    }

    /// Reload the subject's keypair if still valid, otherwise derive and save it.
    pub fn login(&self, subject: &str, ttl: Duration) -> SessionResult<DerivedKeypair> {
        if let Some(keypair) = self.load_for_subject(subject)? {
            metrics::record_session_event("restored");
            tracing::debug!(address = %keypair.address(), "Session restored");
            return Ok(keypair);
        }
        let keypair = DerivedKeypair::from_subject(subject, &self.salt)?;
        self.save(&keypair, subject, ttl)?;
        Ok(keypair)
    }

    /// `true` when there is no live keypair record.
    pub fn is_expired(&self) -> SessionResult<bool> {
        match self.read_record()? {
            Some(record) => Ok(record.is_expired(self.now_ms())),
            None => Ok(true),
        }
    }

    /// Expiry of the stored record, if any (Unix ms).
    pub fn expires_at(&self) -> SessionResult<Option<u64>> {
        Ok(self.read_record()?.map(|r| r.expires_at))
    }

    /// Subject owning the stored record, if any.
    pub fn subject(&self) -> SessionResult<Option<String>> {
        Ok(self.read_record()?.map(|r| r.subject.clone()))
    }

    /// Extend a live session to `now + extension`.
    ///
    /// The new expiry is always strictly later than the old one. An expired
    /// session is removed and reported, never revived.
    pub fn refresh(&self, extension: Duration) -> SessionResult<u64> {
        if extension.is_zero() {
            return Err(SessionError::InvalidTtl);
        }
        let Some(mut record) = self.read_record()? else {
            return Err(SessionError::NotFound);
        };
        let now = self.now_ms();
        if record.is_expired(now) {
            let expired_at = record.expires_at;
            self.discard("expired")?;
            return Err(SessionError::Expired { expired_at });
        }

        let extended = now.saturating_add(extension.as_millis() as u64);
        record.expires_at = extended.max(record.expires_at.saturating_add(1));
        self.write_record(&record)?;

        if let Some(mut auth) = self.read_auth()? {
            if !auth.is_expired(now) && auth.address == record.address {
                auth.expires_at = record.expires_at;
                self.write_auth(&auth)?;
            }
        }

        metrics::record_session_event("refreshed");
        tracing::debug!(expires_at = record.expires_at, "Session refreshed");
        Ok(record.expires_at)
    }

    /// Remove keypair and auth records.
    pub fn clear(&self) -> SessionResult<()> {
        self.storage.remove(KEYPAIR_KEY)?;
        self.storage.remove(AUTH_KEY)?;
        metrics::record_session_event("cleared");
        tracing::info!("Session cleared");
        Ok(())
    }

    fn read_auth(&self) -> SessionResult<Option<AuthSession>> {
        let Some(raw) = self.storage.get(AUTH_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(auth) => Ok(Some(auth)),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unparsable auth record");
                self.storage.remove(AUTH_KEY)?;
                Ok(None)
            }
        }
    }

    fn write_auth(&self, auth: &AuthSession) -> SessionResult<()> {
        let raw = serde_json::to_string(auth).map_err(|e| SessionError::Storage(e.to_string()))?;
        self.storage.set(AUTH_KEY, raw)
    }

    /// Persist the auth session.
    pub fn save_auth(&self, auth: &AuthSession) -> SessionResult<()> {
        self.write_auth(auth)
    }

    /// Load the auth session, removing it when expired.
    pub fn load_auth(&self) -> SessionResult<Option<AuthSession>> {
        let Some(auth) = self.read_auth()? else {
            return Ok(None);
        };
        if auth.is_expired(self.now_ms()) {
            self.storage.remove(AUTH_KEY)?;
            metrics::record_session_event("auth_expired");
            return Ok(None);
        }
        Ok(Some(auth))
    }

    pub fn clear_auth(&self) -> SessionResult<()> {
        self.storage.remove(AUTH_KEY)
    }

    /// Check the session every `every` and call `on_expired` once when it lapses.
    ///
    /// The records are cleared before the callback runs, forcing re-authentication.
    pub fn watch_expiry<F>(&self, every: Duration, mut on_expired: F) -> TimerHandle
    where
        F: FnMut() + Send + 'static,
    {
        let store = self.clone();
        spawn_interval(every, move || match store.is_expired() {
            Ok(false) => TickControl::Continue,
            Ok(true) => {
                if let Err(e) = store.clear() {
                    tracing::warn!(error = %e, "Failed to clear expired session");
                }
                on_expired();
                TickControl::Stop
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session expiry check failed");
                TickControl::Continue
            }
        })
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}
