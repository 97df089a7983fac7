//! Chain connection boundary

use async_trait::async_trait;
use cosign_errors::Result;
use cosign_types::{
    ApprovalEvent, CallEnvelope, CallHash, ChainId, ExtrinsicRef, OperationKey, OperationSeed,
    PendingOperation,
};
use tokio::sync::mpsc;

/// An approval event addressed to one operation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingEvent {
    pub key: OperationKey,
    pub event: ApprovalEvent,
    /// Present on initiating events, used to open an untracked operation
    pub seed: Option<OperationSeed>,
}

impl IncomingEvent {
    pub fn new(key: OperationKey, event: ApprovalEvent) -> Self {
        Self {
            key,
            event,
            seed: None,
        }
    }

    pub fn initiating(key: OperationKey, event: ApprovalEvent, seed: OperationSeed) -> Self {
        Self {
            key,
            event,
            seed: Some(seed),
        }
    }
}

/// RPC or light-client connection to the chains
///
/// Signing happens behind this trait: `broadcast` signs the wrapped call as
/// the envelope's submitter. Timeouts and retries belong to implementations
/// and surface as errors.
#[async_trait]
pub trait ChainConnection: Send + Sync {
    /// On-chain state of a multisig operation, if it exists
    async fn read_pending_operation(
        &self,
        chain_id: &ChainId,
        call_hash: &CallHash,
    ) -> Result<Option<PendingOperation>>;

    /// Approval events for the given operations, including replays of history
    async fn subscribe_approval_events(
        &self,
        chain_id: &ChainId,
        call_hashes: &[CallHash],
    ) -> Result<mpsc::Receiver<IncomingEvent>>;

    /// Sign and submit `envelope.wrapped_call`; resolves once included
    async fn broadcast(&self, chain_id: &ChainId, envelope: &CallEnvelope) -> Result<ExtrinsicRef>;
}
