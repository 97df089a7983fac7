//! Pending multisig operations and their approval events

use crate::call::{CallData, CallHash, ExtrinsicRef, Timepoint};
use crate::descriptor::MultisigDescriptor;
use crate::identity::AccountId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Chain identifier (genesis hash or configured chain name)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(String);

impl ChainId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChainId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Unique key of a pending operation
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationKey {
    pub chain_id: ChainId,
    pub call_hash: CallHash,
}

impl OperationKey {
    pub fn new(chain_id: ChainId, call_hash: CallHash) -> Self {
        Self {
            chain_id,
            call_hash,
        }
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chain_id, self.call_hash)
    }
}

/// Lifecycle status; every state except `Signing` is terminal
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    #[default]
    Signing,
    Executed,
    Cancelled,
    Error,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationStatus::Signing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Signing => "signing",
            OperationStatus::Executed => "executed",
            OperationStatus::Cancelled => "cancelled",
            OperationStatus::Error => "error",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalKind {
    Signed,
    Rejected,
    ErrorSigned,
    ErrorRejected,
}

impl ApprovalKind {
    pub fn is_error(&self) -> bool {
        matches!(self, ApprovalKind::ErrorSigned | ApprovalKind::ErrorRejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalKind::Signed => "signed",
            ApprovalKind::Rejected => "rejected",
            ApprovalKind::ErrorSigned => "error_signed",
            ApprovalKind::ErrorRejected => "error_rejected",
        }
    }
}

/// A signatory's approval, rejection, or failed submission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalEvent {
    pub signatory: AccountId,
    pub kind: ApprovalKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extrinsic: Option<ExtrinsicRef>,
    pub timestamp: DateTime<Utc>,
    /// Set when the chain reports that this approval dispatched the call
    #[serde(default)]
    pub executed: bool,
    /// Failure reason for `ErrorSigned` / `ErrorRejected`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ApprovalEvent {
    pub fn new(signatory: AccountId, kind: ApprovalKind) -> Self {
        Self {
            signatory,
            kind,
            extrinsic: None,
            timestamp: Utc::now(),
            executed: false,
            reason: None,
        }
    }

    pub fn signed(signatory: AccountId) -> Self {
        Self::new(signatory, ApprovalKind::Signed)
    }

    pub fn rejected(signatory: AccountId) -> Self {
        Self::new(signatory, ApprovalKind::Rejected)
    }

    pub fn error_signed(signatory: AccountId, reason: impl Into<String>) -> Self {
        Self::new(signatory, ApprovalKind::ErrorSigned).with_reason(reason)
    }

    pub fn error_rejected(signatory: AccountId, reason: impl Into<String>) -> Self {
        Self::new(signatory, ApprovalKind::ErrorRejected).with_reason(reason)
    }

    pub fn with_extrinsic(mut self, extrinsic: ExtrinsicRef) -> Self {
        self.extrinsic = Some(extrinsic);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Mark as the approval that dispatched the call
    pub fn executed(mut self) -> Self {
        self.executed = true;
        self
    }

    /// Whether both events describe the same on-chain (or local) occurrence
    ///
    /// Two extrinsic references must be equal. When either side lacks one, as
    /// with approver lists read from chain storage, `(signatory, kind)` decides.
    pub fn is_same_occurrence(&self, other: &ApprovalEvent) -> bool {
        if self.signatory != other.signatory {
            return false;
        }
        match (&self.extrinsic, &other.extrinsic) {
            (Some(a), Some(b)) => a == b,
            _ => self.kind == other.kind,
        }
    }
}

/// Everything needed to open an operation that is not yet tracked
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSeed {
    pub descriptor: MultisigDescriptor,
    pub depositor: AccountId,
    #[serde(default)]
    pub call_data: Option<CallData>,
    #[serde(default)]
    pub timepoint: Option<Timepoint>,
}

impl OperationSeed {
    pub fn new(descriptor: MultisigDescriptor, depositor: AccountId) -> Self {
        Self {
            descriptor,
            depositor,
            call_data: None,
            timepoint: None,
        }
    }

    pub fn with_call_data(mut self, call_data: CallData) -> Self {
        self.call_data = Some(call_data);
        self
    }

    pub fn with_timepoint(mut self, timepoint: Timepoint) -> Self {
        self.timepoint = Some(timepoint);
        self
    }
}

/// A multisig operation accumulating approvals
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub chain_id: ChainId,
    pub call_hash: CallHash,
    pub descriptor: MultisigDescriptor,
    pub depositor: AccountId,
    #[serde(default)]
    pub call_data: Option<CallData>,
    pub status: OperationStatus,
    pub approvals: Vec<ApprovalEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub timepoint: Option<Timepoint>,
}

impl PendingOperation {
    /// New operation in `Signing` with no approvals
    pub fn new(key: OperationKey, descriptor: MultisigDescriptor, depositor: AccountId) -> Self {
        let now = Utc::now();
        Self {
            chain_id: key.chain_id,
            call_hash: key.call_hash,
            descriptor,
            depositor,
            call_data: None,
            status: OperationStatus::Signing,
            approvals: Vec::new(),
            created_at: now,
            updated_at: now,
            timepoint: None,
        }
    }

    pub fn from_seed(key: OperationKey, seed: OperationSeed) -> Self {
        let mut operation = Self::new(key, seed.descriptor, seed.depositor);
        operation.call_data = seed.call_data;
        operation.timepoint = seed.timepoint;
        operation
    }

    pub fn key(&self) -> OperationKey {
        OperationKey::new(self.chain_id.clone(), self.call_hash)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Distinct signatories with a `Signed` approval
    pub fn distinct_signers(&self) -> BTreeSet<&AccountId> {
        self.approvals
            .iter()
            .filter(|event| event.kind == ApprovalKind::Signed)
            .map(|event| &event.signatory)
            .collect()
    }

    pub fn count_distinct_signed(&self) -> usize {
        self.distinct_signers().len()
    }

    pub fn is_threshold_met(&self) -> bool {
        self.count_distinct_signed() >= usize::from(self.descriptor.threshold)
    }

    /// Approvals still required before the call can be dispatched
    pub fn remaining_approvals(&self) -> usize {
        usize::from(self.descriptor.threshold).saturating_sub(self.count_distinct_signed())
    }

    pub fn has_signed(&self, account: &AccountId) -> bool {
        self.approvals
            .iter()
            .any(|event| event.kind == ApprovalKind::Signed && &event.signatory == account)
    }

    /// Whether an equivalent event was already recorded
    pub fn contains_occurrence(&self, event: &ApprovalEvent) -> bool {
        self.approvals
            .iter()
            .any(|existing| existing.is_same_occurrence(event))
    }

    /// Reason of the most recent failed submission
    pub fn last_error(&self) -> Option<&str> {
        self.approvals
            .iter()
            .rev()
            .find(|event| event.kind.is_error())
            .and_then(|event| event.reason.as_deref())
    }
}

/// Selection criteria for listing operations
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationFilter {
    pub chain_id: Option<ChainId>,
    pub status: Option<OperationStatus>,
    /// Only operations this account is a member of
    pub member: Option<AccountId>,
}

impl OperationFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_chain(chain_id: ChainId) -> Self {
        Self {
            chain_id: Some(chain_id),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: OperationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_member(mut self, member: AccountId) -> Self {
        self.member = Some(member);
        self
    }

    pub fn matches(&self, operation: &PendingOperation) -> bool {
        if let Some(chain_id) = &self.chain_id {
            if &operation.chain_id != chain_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if operation.status != status {
                return false;
            }
        }
        if let Some(member) = &self.member {
            if !operation.descriptor.is_member(member) {
                return false;
            }
        }
        true
    }
}
