//! Seams between the dispatcher and its collaborators.

use async_trait::async_trait;

use crate::api::{ApiClient, ApiResult, RelayResponse, SponsoredRequest};
use crate::blockchain::client::LedgerClient;
use crate::blockchain::transaction::UnsignedTransaction;
use crate::blockchain::types::{Address, BlockchainResult, CreatedObject, TxDigest};
use crate::dispatch::DispatchResult;

/// A browser or hardware wallet that signs and submits on its own.
#[async_trait]
pub trait ConnectedWallet: Send + Sync {
    /// Account the wallet signs for.
    fn address(&self) -> Address;

    /// Sign and submit; returns the digest once the ledger accepted it.
    async fn sign_and_execute(&self, tx: &UnsignedTransaction) -> DispatchResult<TxDigest>;
}

/// Read access to transaction effects.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    async fn created_objects(&self, digest: &TxDigest) -> BlockchainResult<Vec<CreatedObject>>;
}

/// The backend's sponsored execution endpoint.
#[async_trait]
pub trait SponsorRelay: Send + Sync {
    async fn execute_sponsored(&self, request: &SponsoredRequest) -> ApiResult<RelayResponse>;
}

#[async_trait]
impl LedgerReader for LedgerClient {
    async fn created_objects(&self, digest: &TxDigest) -> BlockchainResult<Vec<CreatedObject>> {
        self.get_created_objects(digest).await
    }
}

#[async_trait]
impl SponsorRelay for ApiClient {
    async fn execute_sponsored(&self, request: &SponsoredRequest) -> ApiResult<RelayResponse> {
        ApiClient::execute_sponsored(self, request).await
    }
}
