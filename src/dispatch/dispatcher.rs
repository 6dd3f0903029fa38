//! The dispatcher routing a transaction through the wallet or the relay.

use std::sync::Arc;

use crate::api::SponsoredRequest;
use crate::blockchain::transaction::UnsignedTransaction;
use crate::blockchain::types::{BlockchainError, CreatedObject, TxDigest};
use crate::config::DispatchConfig;
use crate::dispatch::traits::{ConnectedWallet, LedgerReader, SponsorRelay};
use crate::dispatch::{DispatchError, DispatchResult, ExecutionResult};
use crate::observability::metrics;
use crate::resilience::PollSchedule;
use crate::session::{LoginMethod, SessionError, SessionStore};

/// Submits built transactions on behalf of the signed-in user.
#[derive(Clone)]
pub struct Dispatcher {
    ledger: Arc<dyn LedgerReader>,
    relay: Arc<dyn SponsorRelay>,
    wallet: Option<Arc<dyn ConnectedWallet>>,
    session: SessionStore,
    schedule: PollSchedule,
}

impl Dispatcher {
    pub fn new(
        ledger: Arc<dyn LedgerReader>,
        relay: Arc<dyn SponsorRelay>,
        session: SessionStore,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            ledger,
            relay,
            wallet: None,
            session,
            schedule: PollSchedule::from_config(config),
        }
    }

    /// Attach the connected wallet used by the wallet path.
    pub fn with_wallet(mut self, wallet: Arc<dyn ConnectedWallet>) -> Self {
        self.wallet = Some(wallet);
        self
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Submit `tx` through the path that matches how the user signed in.
    pub async fn execute(
        &self,
        method: LoginMethod,
        tx: &UnsignedTransaction,
    ) -> DispatchResult<ExecutionResult> {
        let path = method.as_str();
        let outcome = match method {
            LoginMethod::Wallet => self.execute_with_wallet(tx).await,
            LoginMethod::Zklogin => self.execute_sponsored(tx).await,
        };

        let label = match &outcome {
            Ok(r) if !r.success => "aborted",
            Ok(r) if r.warning.is_some() => "partial",
            Ok(_) => "success",
            Err(_) => "failed",
        };
        metrics::record_tx_submission(path, label);

        match &outcome {
            Ok(r) => tracing::info!(
                path,
                digest = %r.digest,
                success = r.success,
                created = r.effects.len(),
                warning = r.warning.as_deref().unwrap_or(""),
                "Transaction dispatched"
            ),
            Err(e) => tracing::warn!(path, error = %e, "Transaction dispatch failed"),
        }
        outcome
    }

    async fn execute_with_wallet(&self, tx: &UnsignedTransaction) -> DispatchResult<ExecutionResult> {
        let wallet = self.wallet.as_ref().ok_or(DispatchError::WalletNotConnected)?;
        let signer = wallet.address();
        if signer != tx.sender {
            return Err(DispatchError::SenderMismatch {
                sender: tx.sender,
                signer,
            });
        }

        let digest = wallet.sign_and_execute(tx).await?;

        Ok(match self.fetch_effects(&digest).await {
            Ok(effects) => ExecutionResult {
                success: true,
                digest,
                effects,
                warning: None,
            },
            Err(e) => {
                tracing::warn!(digest = %digest, error = %e, "Effects unavailable after wallet submission");
                ExecutionResult {
                    success: true,
                    digest,
                    effects: Vec::new(),
                    warning: Some(format!(
                        "Transaction succeeded but its results could not be loaded yet: {}",
                        e
                    )),
                }
            }
        })
    }

    /// Poll the ledger for created objects until the schedule runs out.
    async fn fetch_effects(&self, digest: &TxDigest) -> Result<Vec<CreatedObject>, BlockchainError> {
        let mut attempt = 0;
        let mut last_error = BlockchainError::NotFound(digest.to_string());

        while let Some(delay) = self.schedule.delay_before(attempt) {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match self.ledger.created_objects(digest).await {
                Ok(objects) => return Ok(objects),
                Err(e) => {
                    tracing::debug!(digest = %digest, attempt, error = %e, "Effects not yet available");
                    last_error = e;
                }
            }
            attempt += 1;
        }

        Err(last_error)
    }

    async fn execute_sponsored(&self, tx: &UnsignedTransaction) -> DispatchResult<ExecutionResult> {
        let keypair = self
            .session
            .load()?
            .ok_or(DispatchError::Session(SessionError::NotFound))?;
        let signer = keypair.address();
        if signer != tx.sender {
            return Err(DispatchError::SenderMismatch {
                sender: tx.sender,
                signer,
            });
        }

        let tx_bytes = tx.to_bytes()?;
        let request = SponsoredRequest {
            signature: keypair.sign_transaction(&tx_bytes),
            tx_bytes: tx.to_base64()?,
            sender: signer,
        };

        let response = self.relay.execute_sponsored(&request).await?;

        match (response.success, response.digest) {
            (true, Some(digest)) => Ok(ExecutionResult {
                success: true,
                digest,
                effects: response.created_objects,
                warning: None,
            }),
            (true, None) => Err(DispatchError::Rejected(
                "relay reported success without a transaction digest".to_string(),
            )),
            (false, Some(digest)) => Ok(ExecutionResult {
                success: false,
                digest,
                effects: Vec::new(),
                warning: response.error,
            }),
            (false, None) => Err(DispatchError::Rejected(
                response
                    .error
                    .unwrap_or_else(|| "relay declined the transaction".to_string()),
            )),
        }
    }
}
