//! Reconciliation of indexer-discovered multisigs with known wallets
//!
//! Indexer results are untrusted: the multisig identity is recomputed from the
//! reported members and threshold before any wallet is created from it.

use crate::wallet::WalletRegistry;
use async_trait::async_trait;
use cosign_crypto::derive_account_identity;
use cosign_errors::{Error, Result};
use cosign_telemetry::metrics;
use cosign_types::{
    AccountId, ChainId, Config, MultisigDescriptor, Wallet, WalletDraft, WalletKind,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// A multisig reported by an indexer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveredMultisig {
    pub chain_id: Option<ChainId>,
    pub descriptor: MultisigDescriptor,
    pub account_id: AccountId,
    pub name: Option<String>,
}

/// External indexer of on-chain multisigs
#[async_trait]
pub trait MultisigIndexer: Send + Sync {
    /// Multisigs that have any of `members` as a signatory
    async fn multisigs_for(&self, members: &[AccountId]) -> Result<Vec<DiscoveredMultisig>>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileAction {
    None,
    Create(WalletDraft),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reconciliation {
    pub already_known: bool,
    pub action: ReconcileAction,
}

/// Counts from one discovery pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiscoverySummary {
    pub known: usize,
    pub created: usize,
    pub rejected: usize,
}

/// Decide whether a discovered multisig needs a new wallet
pub fn reconcile(
    descriptor: &MultisigDescriptor,
    candidate_identity: &AccountId,
    known_wallets: &[Wallet],
) -> Result<Reconciliation> {
    reconcile_named(descriptor, candidate_identity, None, None, known_wallets)
}

fn reconcile_named(
    descriptor: &MultisigDescriptor,
    candidate_identity: &AccountId,
    chain_id: Option<ChainId>,
    name: Option<&str>,
    known_wallets: &[Wallet],
) -> Result<Reconciliation> {
    let identity = derive_account_identity(descriptor)?;
    if &identity != candidate_identity {
        return Err(Error::IdentityMismatch {
            expected: identity.to_hex(),
            actual: candidate_identity.to_hex(),
        });
    }

    if known_wallets.iter().any(|w| w.holds_account(&identity)) {
        return Ok(Reconciliation {
            already_known: true,
            action: ReconcileAction::None,
        });
    }

    let name = name
        .map(str::to_string)
        .unwrap_or_else(|| default_name(descriptor, &identity));
    Ok(Reconciliation {
        already_known: false,
        action: ReconcileAction::Create(WalletDraft::multisig(
            name,
            identity,
            chain_id,
            descriptor.clone(),
        )),
    })
}

/// "Multisig 2/3 0x1234…abcd"
fn default_name(descriptor: &MultisigDescriptor, identity: &AccountId) -> String {
    let hex = identity.to_hex();
    let short = if hex.len() > 12 {
        format!("{}…{}", &hex[..6], &hex[hex.len() - 4..])
    } else {
        hex
    };
    format!(
        "Multisig {}/{} {short}",
        descriptor.threshold,
        descriptor.canonical_members().len()
    )
}

pub struct DiscoveryReconciler {
    registry: Arc<dyn WalletRegistry>,
    indexer: Arc<dyn MultisigIndexer>,
}

impl DiscoveryReconciler {
    pub fn new(registry: Arc<dyn WalletRegistry>, indexer: Arc<dyn MultisigIndexer>) -> Self {
        Self { registry, indexer }
    }

    /// Reconcile one candidate and create its wallet if needed
    pub async fn reconcile_with_registry(
        &self,
        candidate: &DiscoveredMultisig,
    ) -> Result<Reconciliation> {
        let wallets = self.registry.list_wallets().await?;
        let reconciliation = reconcile_named(
            &candidate.descriptor,
            &candidate.account_id,
            candidate.chain_id.clone(),
            candidate.name.as_deref(),
            &wallets,
        )?;
        if let ReconcileAction::Create(draft) = &reconciliation.action {
            let wallet = self.registry.create_wallet(draft.clone()).await?;
            info!(
                wallet = wallet.id,
                account = %candidate.account_id,
                "registered discovered multisig"
            );
        }
        Ok(reconciliation)
    }

    /// One discovery pass over the accounts of the user's own wallets
    ///
    /// Candidates failing verification are logged and skipped.
    pub async fn sync_discovered(&self) -> Result<DiscoverySummary> {
        let wallets = self.registry.list_wallets().await?;
        let mut members: Vec<AccountId> = wallets
            .iter()
            .filter(|w| w.kind != WalletKind::Multisig)
            .flat_map(|w| w.accounts.iter().map(|a| a.account_id.clone()))
            .collect();
        members.sort();
        members.dedup();
        if members.is_empty() {
            debug!("no local accounts to discover multisigs for");
            return Ok(DiscoverySummary::default());
        }

        let candidates = self.indexer.multisigs_for(&members).await?;
        let mut summary = DiscoverySummary::default();
        for candidate in &candidates {
            match self.reconcile_with_registry(candidate).await {
                Ok(Reconciliation {
                    action: ReconcileAction::Create(_),
                    ..
                }) => {
                    summary.created += 1;
                    metrics::record_discovery("created");
                }
                Ok(_) => {
                    summary.known += 1;
                    metrics::record_discovery("known");
                }
                Err(e) if e.is_io() => return Err(e),
                Err(e) => {
                    summary.rejected += 1;
                    metrics::record_discovery("rejected");
                    warn!(account = %candidate.account_id, error = %e, "discarding indexer result");
                }
            }
        }
        info!(
            known = summary.known,
            created = summary.created,
            rejected = summary.rejected,
            "discovery pass finished"
        );
        Ok(summary)
    }

    /// Start periodic discovery if the configuration enables it
    pub fn spawn_configured(self: Arc<Self>, config: &Config) -> Option<JoinHandle<()>> {
        if !config.discovery.enabled {
            debug!("multisig discovery disabled");
            return None;
        }
        let interval = config.discovery_interval().max(Duration::from_secs(1));
        info!(interval_secs = interval.as_secs(), "starting multisig discovery");
        Some(self.spawn_periodic(interval))
    }

    /// Run `sync_discovered` every `interval` until the task is aborted
    pub fn spawn_periodic(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sync_discovered().await {
                    warn!(error = %e, "discovery pass failed");
                }
            }
        })
    }
}
