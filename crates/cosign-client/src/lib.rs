//! Client-side engine for multisig coordination.
//!
//! This crate wraps core calls through multisig and proxy layers, coordinates
//! approvals of pending operations against a chain connection, and reconciles
//! indexer-discovered multisigs with the user's wallets.

pub mod chain;
pub mod codec;
pub mod coordinator;
pub mod discovery;
pub mod wallet;
pub mod wrapper;

pub use chain::{ChainConnection, IncomingEvent};
pub use codec::{CallComposer, ScaleCallComposer, Weight};
pub use coordinator::{transition_for, ApprovalCoordinator};
pub use discovery::{
    reconcile, DiscoveredMultisig, DiscoveryReconciler, DiscoverySummary, MultisigIndexer,
    ReconcileAction, Reconciliation,
};
pub use wallet::{MemoryWalletRegistry, WalletRegistry};
pub use wrapper::{wrap, wrap_cancel, CallWrapper, ChainContext, TimepointLookup};
