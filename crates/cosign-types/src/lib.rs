//! Core types for cosign
//!
//! This crate provides the data model shared by the multisig engine: account
//! identities, multisig descriptors, call envelopes, wrapper contexts, pending
//! operations with their approval events, wallet records and configuration.

pub mod call;
pub mod config;
pub mod descriptor;
pub mod identity;
pub mod operation;
pub mod wallet;
pub mod wrapper;

pub use call::{CallData, CallEnvelope, CallHash, ExtrinsicHash, ExtrinsicRef, Timepoint};
pub use config::{
    ChainConfig, Config, ConfigError, CoordinatorConfig, DiscoveryConfig, LogConfig, StoreConfig,
};
pub use descriptor::{CryptoFamily, MultisigDescriptor};
pub use identity::{AccountId, IdentityError, MemberIdentity};
pub use operation::{
    ApprovalEvent, ApprovalKind, ChainId, OperationFilter, OperationKey, OperationSeed,
    OperationStatus, PendingOperation,
};
pub use wallet::{Wallet, WalletAccount, WalletDraft, WalletKind};
pub use wrapper::{ProxyType, WrapperContext};
