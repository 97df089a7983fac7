//! Wrapping of a core call through multisig and proxy layers
//!
//! A wrapper stack is applied innermost first. The call hash identifying the
//! operation is always the hash of the core call as supplied, so every
//! signatory computes the same key no matter how its own account wraps it.

use crate::codec::{CallComposer, ScaleCallComposer};
use cosign_crypto::call_hash;
use cosign_errors::{Error, Result};
use cosign_store::MultisigOperationStore;
use cosign_types::{
    AccountId, CallData, CallEnvelope, CallHash, ChainId, Config, OperationKey, Timepoint,
    WrapperContext,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Source of known creation timepoints, keyed by operation call hash
pub trait TimepointLookup: Send + Sync {
    fn known_timepoint(&self, chain_id: &ChainId, call_hash: &CallHash) -> Option<Timepoint>;
}

impl TimepointLookup for MultisigOperationStore {
    fn known_timepoint(&self, chain_id: &ChainId, call_hash: &CallHash) -> Option<Timepoint> {
        self.timepoint(&OperationKey::new(chain_id.clone(), *call_hash))
            .ok()
            .flatten()
    }
}

/// Per-chain collaborators used while wrapping
#[derive(Clone, Copy)]
pub struct ChainContext<'a> {
    pub chain_id: &'a ChainId,
    pub composer: Option<&'a dyn CallComposer>,
    pub timepoints: Option<&'a dyn TimepointLookup>,
}

impl<'a> ChainContext<'a> {
    pub fn new(chain_id: &'a ChainId) -> Self {
        Self {
            chain_id,
            composer: None,
            timepoints: None,
        }
    }

    pub fn with_composer(mut self, composer: &'a dyn CallComposer) -> Self {
        self.composer = Some(composer);
        self
    }

    pub fn with_timepoints(mut self, timepoints: &'a dyn TimepointLookup) -> Self {
        self.timepoints = Some(timepoints);
        self
    }

    fn composer(&self) -> Result<&'a dyn CallComposer> {
        self.composer.ok_or_else(|| {
            Error::UnresolvedWrapperContext(format!("no call composer for chain {}", self.chain_id))
        })
    }
}

/// Wrap `core_call` through `stack`, innermost layer first
///
/// With an empty stack the wrapped call is the core call itself and no
/// composer is needed.
pub fn wrap(
    core_call: CallData,
    stack: &[WrapperContext],
    ctx: &ChainContext<'_>,
) -> Result<CallEnvelope> {
    let hash = call_hash(&core_call);
    let mut inner = core_call.clone();
    let mut submitter = None;
    let mut seen_multisig = false;

    for layer in stack {
        let composer = ctx.composer()?;
        inner = match layer {
            WrapperContext::Multisig { descriptor, signer } => {
                if !descriptor.is_member(signer) {
                    return Err(Error::UnresolvedWrapperContext(format!(
                        "signer {signer} is not a member of the multisig"
                    )));
                }
                descriptor.validate()?;
                let others = descriptor.other_signatories(signer)?;
                // the innermost multisig carries the operation itself
                let inner_hash = if seen_multisig {
                    call_hash(&inner)
                } else {
                    hash
                };
                seen_multisig = true;
                let timepoint = ctx
                    .timepoints
                    .and_then(|lookup| lookup.known_timepoint(ctx.chain_id, &inner_hash));
                debug!(
                    chain = %ctx.chain_id,
                    inner = %inner_hash,
                    approve_existing = timepoint.is_some(),
                    "wrapping in multisig layer"
                );
                composer.as_multi(descriptor.threshold, &others, timepoint, &inner)?
            }
            WrapperContext::Proxy {
                proxied,
                proxy_type,
                ..
            } => composer.proxy(proxied, Some(*proxy_type), &inner)?,
        };
        submitter = Some(layer.submitter().clone());
    }

    Ok(CallEnvelope {
        core_call,
        wrapped_call: inner,
        call_hash: hash,
        submitter,
    })
}

/// Build the depositor's `cancel_as_multi` for `call_hash`, wrapped in `outer`
///
/// `multisig` must be a multisig layer whose signer is the depositor.
pub fn wrap_cancel(
    call_hash: &CallHash,
    multisig: &WrapperContext,
    timepoint: Timepoint,
    outer: &[WrapperContext],
    ctx: &ChainContext<'_>,
) -> Result<CallEnvelope> {
    let WrapperContext::Multisig { descriptor, signer } = multisig else {
        return Err(Error::UnresolvedWrapperContext(format!(
            "cancel requires a multisig layer, got {}",
            multisig.kind()
        )));
    };
    if !descriptor.is_member(signer) {
        return Err(Error::UnresolvedWrapperContext(format!(
            "signer {signer} is not a member of the multisig"
        )));
    }
    descriptor.validate()?;

    let others = descriptor.other_signatories(signer)?;
    let cancel = ctx
        .composer()?
        .cancel_as_multi(descriptor.threshold, &others, timepoint, call_hash)?;

    let mut envelope = wrap(cancel, outer, ctx)?;
    if envelope.submitter.is_none() {
        envelope.submitter = Some(signer.clone());
    }
    Ok(envelope)
}

/// Call composers per chain
#[derive(Clone, Default)]
pub struct CallWrapper {
    composers: HashMap<ChainId, Arc<dyn CallComposer>>,
}

impl CallWrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// SCALE composers for every configured chain
    pub fn from_config(config: &Config) -> Self {
        let mut wrapper = Self::new();
        for chain in &config.chains {
            wrapper = wrapper.with_composer(
                chain.chain_id(),
                Arc::new(ScaleCallComposer::from_chain(chain)),
            );
        }
        wrapper
    }

    pub fn with_composer(mut self, chain_id: ChainId, composer: Arc<dyn CallComposer>) -> Self {
        self.composers.insert(chain_id, composer);
        self
    }

    pub fn composer(&self, chain_id: &ChainId) -> Option<&dyn CallComposer> {
        self.composers.get(chain_id).map(|c| c.as_ref())
    }

    /// Context for `chain_id` with optional timepoint source
    pub fn context<'a>(
        &'a self,
        chain_id: &'a ChainId,
        timepoints: Option<&'a dyn TimepointLookup>,
    ) -> ChainContext<'a> {
        ChainContext {
            chain_id,
            composer: self.composer(chain_id),
            timepoints,
        }
    }

    pub fn wrap(
        &self,
        chain_id: &ChainId,
        core_call: CallData,
        stack: &[WrapperContext],
        timepoints: Option<&dyn TimepointLookup>,
    ) -> Result<CallEnvelope> {
        wrap(core_call, stack, &self.context(chain_id, timepoints))
    }

    pub fn wrap_cancel(
        &self,
        chain_id: &ChainId,
        call_hash: &CallHash,
        multisig: &WrapperContext,
        timepoint: Timepoint,
        outer: &[WrapperContext],
    ) -> Result<CallEnvelope> {
        wrap_cancel(
            call_hash,
            multisig,
            timepoint,
            outer,
            &self.context(chain_id, None),
        )
    }
}

/// Innermost multisig layer of a stack
pub fn innermost_multisig(stack: &[WrapperContext]) -> Option<&WrapperContext> {
    stack
        .iter()
        .find(|layer| matches!(layer, WrapperContext::Multisig { .. }))
}

/// Signer of the innermost multisig layer
pub fn multisig_signer(stack: &[WrapperContext]) -> Option<&AccountId> {
    match innermost_multisig(stack)? {
        WrapperContext::Multisig { signer, .. } => Some(signer),
        WrapperContext::Proxy { .. } => None,
    }
}
