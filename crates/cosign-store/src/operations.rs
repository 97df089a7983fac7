//! Registry of pending multisig operations
//!
//! All mutations are serialised through one lock over the operation map.
//! A mutation is computed on a copy of the entry, written through to the
//! persistence collaborator, and only then committed to memory and announced
//! to observers. A failed write leaves the in-memory entry untouched.

use crate::persistence::{KvPersistence, OperationPersistence};
use chrono::Utc;
use cosign_errors::{Error, Result};
use cosign_telemetry::metrics;
use cosign_types::{
    AccountId, ApprovalEvent, ApprovalKind, CallData, CallHash, ChainId, MultisigDescriptor,
    OperationFilter, OperationKey, OperationSeed, OperationStatus, PendingOperation, Timepoint,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

/// Receives the full operation after every committed mutation
///
/// Called while the store lock is held; implementations must not call back
/// into the store.
pub trait OperationObserver: Send + Sync {
    fn on_operation_changed(&self, operation: &PendingOperation);
}

/// Distinct signatories with a `Signed` approval
pub fn count_distinct_signed(operation: &PendingOperation) -> usize {
    operation.count_distinct_signed()
}

/// `count_distinct_signed(operation) >= threshold`
pub fn is_threshold_met(operation: &PendingOperation) -> bool {
    operation.is_threshold_met()
}

/// In-memory registry of pending operations with write-through persistence
pub struct MultisigOperationStore {
    operations: Mutex<HashMap<OperationKey, PendingOperation>>,
    persistence: Arc<dyn OperationPersistence>,
    observers: RwLock<Vec<Arc<dyn OperationObserver>>>,
}

impl MultisigOperationStore {
    pub fn new(persistence: Arc<dyn OperationPersistence>) -> Self {
        Self {
            operations: Mutex::new(HashMap::new()),
            persistence,
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Store backed by an in-memory key-value store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(KvPersistence::in_memory()))
    }

    /// Register an observer for committed mutations
    pub fn subscribe(&self, observer: Arc<dyn OperationObserver>) -> Result<()> {
        let mut observers = self
            .observers
            .write()
            .map_err(|e| Error::Persistence(format!("Failed to lock observers: {e}")))?;
        observers.push(observer);
        Ok(())
    }

    /// Load all persisted operations; returns how many were loaded
    ///
    /// Entries already present in memory are kept.
    pub fn hydrate(&self) -> Result<usize> {
        let stored = self
            .persistence
            .read_all_operations(&OperationFilter::all())?;
        let mut operations = self.lock()?;
        let mut loaded = 0;
        for operation in stored {
            let key = operation.key();
            if !operations.contains_key(&key) {
                operations.insert(key, operation);
                loaded += 1;
            }
        }
        info!(loaded, "hydrated operation store");
        Ok(loaded)
    }

    /// Return the operation for the key, creating a `Signing` entry if needed
    ///
    /// An existing entry is returned unchanged.
    pub fn open_or_get(
        &self,
        chain_id: ChainId,
        call_hash: CallHash,
        descriptor: MultisigDescriptor,
        depositor: AccountId,
    ) -> Result<PendingOperation> {
        let key = OperationKey::new(chain_id, call_hash);
        let mut operations = self.lock()?;
        if let Some(existing) = operations.get(&key) {
            return Ok(existing.clone());
        }

        let operation = new_operation(&key, OperationSeed::new(descriptor, depositor))?;
        let committed = self.commit(&mut operations, operation)?;
        self.on_opened(&committed);
        Ok(committed)
    }

    /// Append an event to an existing operation
    ///
    /// Fails with `UnknownOperation` when the key is not tracked; terminal
    /// operations are returned unchanged.
    pub fn apply_event(
        &self,
        chain_id: ChainId,
        call_hash: CallHash,
        event: ApprovalEvent,
    ) -> Result<PendingOperation> {
        self.commit_event(&OperationKey::new(chain_id, call_hash), event, None)
    }

    /// Append an event and optionally move to a terminal status, atomically
    pub fn commit_event(
        &self,
        key: &OperationKey,
        event: ApprovalEvent,
        next_status: Option<OperationStatus>,
    ) -> Result<PendingOperation> {
        let mut operations = self.lock()?;
        let current = operations
            .get(key)
            .ok_or_else(|| Error::UnknownOperation(key.to_string()))?
            .clone();

        let mut next = current.clone();
        if !apply_to(&mut next, event, next_status)? {
            return Ok(current);
        }
        let committed = self.commit(&mut operations, next)?;
        self.on_transition(&current, &committed);
        Ok(committed)
    }

    /// Initiating path: open the operation from `seed` if needed and apply
    /// its first event in the same mutation
    pub fn open_with_event(
        &self,
        key: &OperationKey,
        seed: OperationSeed,
        event: ApprovalEvent,
        next_status: Option<OperationStatus>,
    ) -> Result<PendingOperation> {
        let mut operations = self.lock()?;
        let (current, created) = match operations.get(key) {
            Some(existing) => (existing.clone(), false),
            None => (new_operation(key, seed.clone())?, true),
        };

        let mut next = current.clone();
        let mut changed = created;
        if !created {
            changed |= merge_seed(&mut next, &seed)?;
        }
        if next.timepoint.is_none() && !next.is_terminal() {
            if let Some(extrinsic) = &event.extrinsic {
                next.timepoint = Some(extrinsic.timepoint);
                changed = true;
            }
        }
        changed |= apply_to(&mut next, event, next_status)?;

        if !changed {
            return Ok(current);
        }
        let committed = self.commit(&mut operations, next)?;
        if created {
            self.on_opened(&committed);
        }
        self.on_transition(&current, &committed);
        Ok(committed)
    }

    /// Record the on-chain creation timepoint
    pub fn record_timepoint(
        &self,
        key: &OperationKey,
        timepoint: Timepoint,
    ) -> Result<PendingOperation> {
        self.mutate(key, |operation| {
            if operation.is_terminal() || operation.timepoint == Some(timepoint) {
                return Ok(false);
            }
            if let Some(previous) = operation.timepoint {
                warn!(
                    operation = %key,
                    %previous,
                    %timepoint,
                    "replacing known timepoint with the chain's"
                );
            }
            operation.timepoint = Some(timepoint);
            Ok(true)
        })
    }

    /// Supply the core call of an operation known only by hash
    pub fn attach_call_data(&self, key: &OperationKey, call: CallData) -> Result<PendingOperation> {
        self.mutate(key, |operation| {
            let actual = cosign_crypto::call_hash(&call);
            if actual != operation.call_hash {
                return Err(Error::CallDataMismatch(format!(
                    "expected {}, got {actual}",
                    operation.call_hash
                )));
            }
            if operation.call_data.as_ref() == Some(&call) {
                return Ok(false);
            }
            operation.call_data = Some(call);
            Ok(true)
        })
    }

    pub fn get(&self, key: &OperationKey) -> Result<Option<PendingOperation>> {
        Ok(self.lock()?.get(key).cloned())
    }

    /// Operations matching `filter`, oldest first
    pub fn list(&self, filter: &OperationFilter) -> Result<Vec<PendingOperation>> {
        let operations = self.lock()?;
        let mut matching: Vec<PendingOperation> = operations
            .values()
            .filter(|op| filter.matches(op))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.key().cmp(&b.key()))
        });
        Ok(matching)
    }

    /// Known creation timepoint of an operation, if any
    pub fn timepoint(&self, key: &OperationKey) -> Result<Option<Timepoint>> {
        Ok(self.lock()?.get(key).and_then(|op| op.timepoint))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn mutate<F>(&self, key: &OperationKey, f: F) -> Result<PendingOperation>
    where
        F: FnOnce(&mut PendingOperation) -> Result<bool>,
    {
        let mut operations = self.lock()?;
        let current = operations
            .get(key)
            .ok_or_else(|| Error::UnknownOperation(key.to_string()))?
            .clone();
        let mut next = current.clone();
        if !f(&mut next)? {
            return Ok(current);
        }
        self.commit(&mut operations, next)
    }

    /// Persist, then replace the in-memory entry and notify observers
    fn commit(
        &self,
        operations: &mut MutexGuard<'_, HashMap<OperationKey, PendingOperation>>,
        mut operation: PendingOperation,
    ) -> Result<PendingOperation> {
        operation.updated_at = Utc::now();
        if let Err(e) = self.persistence.upsert_operation(&operation) {
            warn!(operation = %operation.key(), error = %e, "persistence failed, mutation discarded");
            metrics::PERSISTENCE_FAILURES.inc();
            return Err(e.into());
        }
        operations.insert(operation.key(), operation.clone());
        self.notify(&operation);
        Ok(operation)
    }

    fn notify(&self, operation: &PendingOperation) {
        match self.observers.read() {
            Ok(observers) => {
                for observer in observers.iter() {
                    observer.on_operation_changed(operation);
                }
            }
            Err(e) => warn!(error = %e, "observer list poisoned, notification skipped"),
        }
    }

    fn on_opened(&self, operation: &PendingOperation) {
        metrics::OPERATIONS_OPENED.inc();
        debug!(
            operation = %operation.key(),
            threshold = operation.descriptor.threshold,
            depositor = %operation.depositor,
            "opened operation"
        );
    }

    fn on_transition(&self, before: &PendingOperation, after: &PendingOperation) {
        if let Some(event) = after.approvals.last() {
            if after.approvals.len() > before.approvals.len() {
                metrics::record_event_applied(event.kind.as_str());
            }
        }
        if before.status != after.status {
            metrics::record_transition(after.status.as_str());
            info!(
                operation = %after.key(),
                from = %before.status,
                to = %after.status,
                signed = after.count_distinct_signed(),
                threshold = after.descriptor.threshold,
                "operation status changed"
            );
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<OperationKey, PendingOperation>>> {
        self.operations
            .lock()
            .map_err(|e| Error::Persistence(format!("Failed to lock operations: {e}")))
    }
}

fn new_operation(key: &OperationKey, seed: OperationSeed) -> Result<PendingOperation> {
    seed.descriptor.validate()?;
    if !seed.descriptor.is_member(&seed.depositor) {
        return Err(Error::NotASignatory(seed.depositor.to_hex()));
    }
    if let Some(call) = &seed.call_data {
        check_call_data(key, call)?;
    }
    Ok(PendingOperation::from_seed(key.clone(), seed))
}

/// Fill in call data and timepoint that the stored entry lacks
fn merge_seed(operation: &mut PendingOperation, seed: &OperationSeed) -> Result<bool> {
    if operation.is_terminal() {
        return Ok(false);
    }
    let mut changed = false;
    if operation.call_data.is_none() {
        if let Some(call) = &seed.call_data {
            check_call_data(&operation.key(), call)?;
            operation.call_data = Some(call.clone());
            changed = true;
        }
    }
    if operation.timepoint.is_none() && seed.timepoint.is_some() {
        operation.timepoint = seed.timepoint;
        changed = true;
    }
    Ok(changed)
}

fn check_call_data(key: &OperationKey, call: &CallData) -> Result<()> {
    let actual = cosign_crypto::call_hash(call);
    if actual != key.call_hash {
        return Err(Error::CallDataMismatch(format!(
            "expected {}, got {actual}",
            key.call_hash
        )));
    }
    Ok(())
}

/// Apply one event to a copy of an operation; `Ok(false)` means no change
fn apply_to(
    operation: &mut PendingOperation,
    event: ApprovalEvent,
    next_status: Option<OperationStatus>,
) -> Result<bool> {
    let key = operation.key();
    if operation.is_terminal() {
        warn!(
            operation = %key,
            status = %operation.status,
            signatory = %event.signatory,
            kind = event.kind.as_str(),
            "ignoring event for terminal operation"
        );
        return Ok(false);
    }
    if !operation.descriptor.is_member(&event.signatory) {
        return Err(Error::NotASignatory(event.signatory.to_hex()));
    }
    let executing = next_status == Some(OperationStatus::Executed);
    if let Some(existing) = operation
        .approvals
        .iter_mut()
        .find(|existing| existing.is_same_occurrence(&event))
    {
        // the chain's execution report for an approval already recorded locally
        if executing && event.executed && !existing.executed {
            existing.executed = true;
            operation.status = OperationStatus::Executed;
            return Ok(true);
        }
        if existing.extrinsic.is_none() && event.extrinsic.is_some() {
            existing.extrinsic = event.extrinsic;
            return Ok(true);
        }
        debug!(
            operation = %key,
            signatory = %event.signatory,
            "duplicate event ignored"
        );
        return Ok(false);
    }

    if event.kind == ApprovalKind::Signed
        && !executing
        && !operation.has_signed(&event.signatory)
        && operation.is_threshold_met()
    {
        warn!(
            operation = %key,
            signatory = %event.signatory,
            "threshold already met, extra approval ignored"
        );
        return Ok(false);
    }

    operation.approvals.push(event);
    if let Some(status) = next_status.filter(OperationStatus::is_terminal) {
        operation.status = status;
    }
    Ok(true)
}
