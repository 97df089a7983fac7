//! Approval coordination
//!
//! The coordinator turns approval events into store mutations and drives local
//! submissions. Every state change, remote or local, goes through
//! [`ApprovalCoordinator::handle`], so broadcast failures follow the same path
//! as chain events: they arrive as `ErrorSigned` / `ErrorRejected` approvals
//! and move the operation to `Error`.
//!
//! A local reject only cancels the operation once its `cancel_as_multi` has
//! been included on chain.

use crate::chain::{ChainConnection, IncomingEvent};
use crate::wrapper::{innermost_multisig, CallWrapper};
use cosign_errors::{Error, Result};
use cosign_store::MultisigOperationStore;
use cosign_telemetry::metrics::{self, SUBMISSIONS_IN_FLIGHT};
use cosign_types::{
    AccountId, ApprovalEvent, ApprovalKind, CallData, CallEnvelope, CallHash, ChainId,
    CoordinatorConfig, ExtrinsicRef, OperationKey, OperationSeed, OperationStatus, PendingOperation, WrapperContext,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Status an event moves a `Signing` operation to, if any
pub fn transition_for(event: &ApprovalEvent, depositor: &AccountId) -> Option<OperationStatus> {
    match event.kind {
        ApprovalKind::Signed if event.executed => Some(OperationStatus::Executed),
        ApprovalKind::Rejected if &event.signatory == depositor => {
            Some(OperationStatus::Cancelled)
        }
        ApprovalKind::ErrorSigned | ApprovalKind::ErrorRejected => Some(OperationStatus::Error),
        ApprovalKind::Signed | ApprovalKind::Rejected => None,
    }
}

pub struct ApprovalCoordinator {
    store: Arc<MultisigOperationStore>,
    chain: Arc<dyn ChainConnection>,
    wrapper: CallWrapper,
    in_flight: Mutex<HashSet<OperationKey>>,
}

/// Clears an operation's in-flight flag on drop
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<OperationKey>>,
    key: OperationKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap_or_else(PoisonError::into_inner);
        set.remove(&self.key);
        SUBMISSIONS_IN_FLIGHT.dec();
    }
}

impl ApprovalCoordinator {
    pub fn new(
        store: Arc<MultisigOperationStore>,
        chain: Arc<dyn ChainConnection>,
        wrapper: CallWrapper,
    ) -> Self {
        Self {
            store,
            chain,
            wrapper,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &Arc<MultisigOperationStore> {
        &self.store
    }

    pub fn wrapper(&self) -> &CallWrapper {
        &self.wrapper
    }

    /// Apply one event
    ///
    /// Untracked operations are opened from the event's seed; without a seed
    /// the event fails with `UnknownOperation`.
    pub fn handle(&self, incoming: IncomingEvent) -> Result<PendingOperation> {
        let IncomingEvent { key, event, seed } = incoming;
        match self.store.get(&key)? {
            Some(operation) => {
                let next = transition_for(&event, &operation.depositor);
                self.store.commit_event(&key, event, next)
            }
            None => match seed {
                Some(seed) => {
                    let next = transition_for(&event, &seed.depositor);
                    self.store.open_with_event(&key, seed, event, next)
                }
                None => Err(Error::UnknownOperation(key.to_string())),
            },
        }
    }

    /// Apply events in arrival order until every sender is dropped
    pub async fn run(&self, mut events: mpsc::Receiver<IncomingEvent>) {
        while let Some(incoming) = events.recv().await {
            let key = incoming.key.clone();
            match self.handle(incoming) {
                Ok(operation) => debug!(
                    operation = %key,
                    status = %operation.status,
                    signed = operation.count_distinct_signed(),
                    "event applied"
                ),
                Err(e) if e.is_io() => error!(operation = %key, error = %e, "failed to apply event"),
                Err(e) => warn!(operation = %key, error = %e, "event rejected"),
            }
        }
        info!("approval event channel closed");
    }

    /// Run the dispatch loop on the tokio runtime
    pub fn spawn(self: Arc<Self>, events: mpsc::Receiver<IncomingEvent>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(events).await })
    }

    /// Spawn the dispatch loop behind a channel sized by `config`
    pub fn start(
        self: Arc<Self>,
        config: &CoordinatorConfig,
    ) -> (mpsc::Sender<IncomingEvent>, JoinHandle<()>) {
        let (events, receiver) = mpsc::channel(config.event_channel_capacity.max(1));
        debug!(capacity = events.max_capacity(), "starting approval dispatch loop");
        (events, self.spawn(receiver))
    }

    /// Forward chain events for `call_hashes` into `sink`
    pub async fn watch(
        &self,
        chain_id: &ChainId,
        call_hashes: &[CallHash],
        sink: mpsc::Sender<IncomingEvent>,
    ) -> Result<JoinHandle<()>> {
        let mut events = self
            .chain
            .subscribe_approval_events(chain_id, call_hashes)
            .await?;
        let chain = chain_id.clone();
        info!(chain = %chain, operations = call_hashes.len(), "watching approval events");

        Ok(tokio::spawn(async move {
            while let Some(incoming) = events.recv().await {
                if sink.send(incoming).await.is_err() {
                    break;
                }
            }
            debug!(chain = %chain, "approval subscription ended");
        }))
    }

    /// Submit a new multisig call as the innermost multisig layer's signer
    ///
    /// The signer becomes the depositor. If another signatory already opened
    /// the operation and its timepoint is known, this approves it instead.
    pub async fn initiate(
        &self,
        chain_id: ChainId,
        core_call: CallData,
        stack: &[WrapperContext],
    ) -> Result<PendingOperation> {
        let Some(WrapperContext::Multisig { descriptor, signer }) = innermost_multisig(stack)
        else {
            return Err(Error::UnresolvedWrapperContext(
                "wrapper stack has no multisig layer".to_string(),
            ));
        };

        let envelope =
            self.wrapper
                .wrap(&chain_id, core_call.clone(), stack, Some(self.store.as_ref()))?;
        let key = OperationKey::new(chain_id, envelope.call_hash);
        if let Some(existing) = self.store.get(&key)? {
            if existing.is_terminal() {
                return Err(Error::TerminalOperation(key.to_string()));
            }
        }
        let seed = OperationSeed::new(descriptor.clone(), signer.clone()).with_call_data(core_call);

        let _guard = self.begin(&key)?;
        match self.submit("initiate", &key, &envelope).await {
            Ok(extrinsic) => self.handle(IncomingEvent::initiating(
                key,
                ApprovalEvent::signed(signer.clone()).with_extrinsic(extrinsic),
                seed,
            )),
            Err(e) => {
                self.record_failure(IncomingEvent::initiating(
                    key,
                    ApprovalEvent::error_signed(signer.clone(), e.to_string()),
                    seed,
                ));
                Err(e)
            }
        }
    }

    /// Approve a tracked operation as the innermost multisig layer's signer
    ///
    /// Returns the operation unchanged if the signer already approved it.
    pub async fn approve(
        &self,
        key: &OperationKey,
        stack: &[WrapperContext],
    ) -> Result<PendingOperation> {
        let operation = self.tracked(key)?;
        let Some(WrapperContext::Multisig { descriptor, signer }) = innermost_multisig(stack)
        else {
            return Err(Error::UnresolvedWrapperContext(
                "wrapper stack has no multisig layer".to_string(),
            ));
        };
        if !descriptor.is_equivalent(&operation.descriptor) {
            return Err(Error::UnresolvedWrapperContext(format!(
                "wrapper multisig does not match operation {key}"
            )));
        }
        if !operation.descriptor.is_member(signer) {
            return Err(Error::NotASignatory(signer.to_hex()));
        }
        if operation.has_signed(signer) {
            debug!(operation = %key, signatory = %signer, "already approved");
            return Ok(operation);
        }
        let core_call = operation.call_data.clone().ok_or_else(|| {
            Error::UnresolvedWrapperContext(format!("call data of {key} is unknown"))
        })?;
        if operation.timepoint.is_none() {
            return Err(Error::MissingTimepoint(key.to_string()));
        }
        let action = if operation.remaining_approvals() <= 1 {
            "approve_final"
        } else {
            "approve"
        };

        let _guard = self.begin(key)?;
        let envelope =
            self.wrapper
                .wrap(&key.chain_id, core_call, stack, Some(self.store.as_ref()))?;
        match self.submit(action, key, &envelope).await {
            Ok(extrinsic) => self.handle(IncomingEvent::new(
                key.clone(),
                ApprovalEvent::signed(signer.clone()).with_extrinsic(extrinsic),
            )),
            Err(e) => {
                self.record_failure(IncomingEvent::new(
                    key.clone(),
                    ApprovalEvent::error_signed(signer.clone(), e.to_string()),
                ));
                Err(e)
            }
        }
    }

    /// Cancel an operation as its depositor
    ///
    /// Layers outside the innermost multisig wrap the `cancel_as_multi` call.
    /// The operation becomes `Cancelled` only after the broadcast succeeds.
    pub async fn reject(
        &self,
        key: &OperationKey,
        stack: &[WrapperContext],
    ) -> Result<PendingOperation> {
        let operation = self.tracked(key)?;
        let Some(position) = stack
            .iter()
            .position(|layer| matches!(layer, WrapperContext::Multisig { .. }))
        else {
            return Err(Error::UnresolvedWrapperContext(
                "wrapper stack has no multisig layer".to_string(),
            ));
        };
        let multisig = &stack[position];
        let WrapperContext::Multisig { descriptor, signer } = multisig else {
            return Err(Error::UnresolvedWrapperContext(
                "wrapper stack has no multisig layer".to_string(),
            ));
        };
        if !descriptor.is_equivalent(&operation.descriptor) {
            return Err(Error::UnresolvedWrapperContext(format!(
                "wrapper multisig does not match operation {key}"
            )));
        }
        if signer != &operation.depositor {
            return Err(Error::NotDepositor(signer.to_hex()));
        }
        let timepoint = operation
            .timepoint
            .ok_or_else(|| Error::MissingTimepoint(key.to_string()))?;

        let _guard = self.begin(key)?;
        let envelope = self.wrapper.wrap_cancel(
            &key.chain_id,
            &key.call_hash,
            multisig,
            timepoint,
            &stack[position + 1..],
        )?;
        match self.submit("reject", key, &envelope).await {
            Ok(extrinsic) => self.handle(IncomingEvent::new(
                key.clone(),
                ApprovalEvent::rejected(signer.clone()).with_extrinsic(extrinsic),
            )),
            Err(e) => {
                self.record_failure(IncomingEvent::new(
                    key.clone(),
                    ApprovalEvent::error_rejected(signer.clone(), e.to_string()),
                ));
                Err(e)
            }
        }
    }

    /// Merge the chain's view of an operation into the store
    ///
    /// Returns the local operation, or `None` if neither side knows it.
    pub async fn sync_operation(&self, key: &OperationKey) -> Result<Option<PendingOperation>> {
        let remote = self
            .chain
            .read_pending_operation(&key.chain_id, &key.call_hash)
            .await?;
        let Some(remote) = remote else {
            return self.store.get(key);
        };

        if self.store.get(key)?.is_none() {
            self.store.open_or_get(
                key.chain_id.clone(),
                key.call_hash,
                remote.descriptor.clone(),
                remote.depositor.clone(),
            )?;
        }
        if let Some(call) = remote.call_data {
            self.store.attach_call_data(key, call)?;
        }
        if let Some(timepoint) = remote.timepoint {
            self.store.record_timepoint(key, timepoint)?;
        }
        for event in remote.approvals {
            self.handle(IncomingEvent::new(key.clone(), event))?;
        }
        self.store.get(key)
    }

    fn tracked(&self, key: &OperationKey) -> Result<PendingOperation> {
        let operation = self
            .store
            .get(key)?
            .ok_or_else(|| Error::UnknownOperation(key.to_string()))?;
        if operation.is_terminal() {
            return Err(Error::TerminalOperation(key.to_string()));
        }
        Ok(operation)
    }

    fn begin(&self, key: &OperationKey) -> Result<InFlightGuard<'_>> {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(key.clone()) {
            return Err(Error::OperationInFlight(key.to_string()));
        }
        SUBMISSIONS_IN_FLIGHT.inc();
        Ok(InFlightGuard {
            set: &self.in_flight,
            key: key.clone(),
        })
    }

    async fn submit(
        &self,
        action: &str,
        key: &OperationKey,
        envelope: &CallEnvelope,
    ) -> Result<ExtrinsicRef> {
        let started = Instant::now();
        let result = self.chain.broadcast(&key.chain_id, envelope).await;
        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(extrinsic) => {
                metrics::record_broadcast(action, "included", elapsed);
                info!(
                    operation = %key,
                    action,
                    timepoint = %extrinsic.timepoint,
                    "broadcast included"
                );
            }
            Err(e) => {
                metrics::record_broadcast(action, "failed", elapsed);
                warn!(operation = %key, action, error = %e, "broadcast failed");
            }
        }
        result
    }

    /// Record a failed submission; the broadcast error is what the caller sees
    fn record_failure(&self, incoming: IncomingEvent) {
        let key = incoming.key.clone();
        if let Err(e) = self.handle(incoming) {
            error!(operation = %key, error = %e, "failed to record broadcast failure");
        }
    }
}
