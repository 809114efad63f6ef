// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! LIFO hook chain with continuation-passing dispatch
//!
//! The chain owns an ordered list of hook-sets, index 0 being the most
//! recently registered. Each dispatch takes a fresh snapshot of the list and
//! threads an immutable index through per-call continuation values, so nested
//! loads triggered while a parent module resolves never share cursor state.
//! When the chain is exhausted, the original resolver captured at
//! construction time answers the request.

use crate::error::Result;
use crate::host::{HostResolver, LoadContext, LoadOutcome, Resolution, ResolveContext};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Continuation offered to resolve hooks
pub trait ResolveNext: Sync {
    /// Offer the request to the rest of the chain
    fn call(&self, specifier: &str, context: &ResolveContext) -> Result<Resolution>;

    /// The result this continuation already produced during the current
    /// offer, if the hook invoked it. Lets the chain hand a delegated
    /// answer back instead of running the downstream hooks a second time.
    fn produced(&self) -> Option<Resolution> {
        None
    }
}

/// Continuation offered to load hooks
pub trait LoadNext: Sync {
    /// Offer the request to the rest of the chain
    fn call(&self, url: &str, context: &LoadContext) -> Result<LoadOutcome>;

    /// The outcome this continuation already produced during the current
    /// offer, if the hook invoked it
    fn produced(&self) -> Option<LoadOutcome> {
        None
    }
}

/// Resolve callback: may answer, delegate via `next`, or defer by
/// returning a [`Resolution`] without a URL
pub type ResolveFn =
    Box<dyn Fn(&str, &ResolveContext, &dyn ResolveNext) -> Result<Resolution> + Send + Sync>;

/// Load callback: may answer, delegate via `next`, or defer by returning
/// `None`
pub type LoadFn =
    Box<dyn Fn(&str, &LoadContext, &dyn LoadNext) -> Result<Option<LoadOutcome>> + Send + Sync>;

/// A bundle of optional resolve/load callbacks registered as one unit
#[derive(Default)]
pub struct HookSet {
    resolve: Option<ResolveFn>,
    load: Option<LoadFn>,
}

impl HookSet {
    /// Create an empty hook-set
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a resolve callback
    pub fn with_resolve<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &ResolveContext, &dyn ResolveNext) -> Result<Resolution>
            + Send
            + Sync
            + 'static,
    {
        self.resolve = Some(Box::new(f));
        self
    }

    /// Attach a load callback
    pub fn with_load<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &LoadContext, &dyn LoadNext) -> Result<Option<LoadOutcome>>
            + Send
            + Sync
            + 'static,
    {
        self.load = Some(Box::new(f));
        self
    }

    /// Offer a resolve request to this hook-set.
    ///
    /// A missing callback, or a callback answering without a URL, falls
    /// through to `next` — unless the callback already delegated, in which
    /// case the answer `next` produced is handed back as-is so the
    /// downstream hooks run at most once per offer. Hook errors propagate
    /// unmodified.
    pub fn offer_resolve(
        &self,
        specifier: &str,
        context: &ResolveContext,
        next: &dyn ResolveNext,
    ) -> Result<Resolution> {
        match &self.resolve {
            Some(hook) => {
                let result = hook(specifier, context, next)?;
                if result.url.is_some() {
                    return Ok(result);
                }
                match next.produced() {
                    Some(prior) => Ok(prior),
                    None => next.call(specifier, context),
                }
            }
            None => next.call(specifier, context),
        }
    }

    /// Offer a load request to this hook-set; `None` falls through to
    /// `next`, reusing the outcome `next` already produced if the callback
    /// delegated
    pub fn offer_load(
        &self,
        url: &str,
        context: &LoadContext,
        next: &dyn LoadNext,
    ) -> Result<LoadOutcome> {
        match &self.load {
            Some(hook) => match hook(url, context, next)? {
                Some(outcome) => Ok(outcome),
                None => match next.produced() {
                    Some(prior) => Ok(prior),
                    None => next.call(url, context),
                },
            },
            None => next.call(url, context),
        }
    }
}

struct ChainEntry {
    id: u64,
    hooks: Arc<HookSet>,
}

/// Ordered, mutable list of hook-sets with LIFO dispatch
pub struct HookChain {
    entries: RwLock<Vec<ChainEntry>>,
    next_id: AtomicU64,
    fallback: Arc<dyn HostResolver>,
}

impl HookChain {
    /// Create a chain terminating at the given original resolver
    pub fn new(fallback: Arc<dyn HostResolver>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            fallback,
        }
    }

    /// Register a hook-set at the front of the chain (LIFO)
    pub fn register(self: &Arc<Self>, hooks: Arc<HookSet>) -> HookHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.write().insert(0, ChainEntry { id, hooks });
        HookHandle {
            chain: Arc::clone(self),
            id,
        }
    }

    /// Remove a hook-set by id; removing an absent entry is a no-op
    fn deregister(&self, id: u64) {
        let mut entries = self.entries.write();
        if let Some(pos) = entries.iter().position(|e| e.id == id) {
            entries.remove(pos);
        }
    }

    /// Number of registered hook-sets
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no hook-sets are registered
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<HookSet>> {
        self.entries.read().iter().map(|e| Arc::clone(&e.hooks)).collect()
    }

    /// Dispatch a resolve request through the chain
    pub fn dispatch_resolve(
        &self,
        specifier: &str,
        context: &ResolveContext,
    ) -> Result<Resolution> {
        let snapshot = self.snapshot();
        resolve_at(&snapshot, 0, &*self.fallback, specifier, context)
    }

    /// Dispatch a load request through the chain
    pub fn dispatch_load(&self, url: &str, context: &LoadContext) -> Result<LoadOutcome> {
        let snapshot = self.snapshot();
        load_at(&snapshot, 0, &*self.fallback, url, context)
    }
}

impl HostResolver for HookChain {
    fn resolve(&self, specifier: &str, context: &ResolveContext) -> Result<Resolution> {
        self.dispatch_resolve(specifier, context)
    }

    fn load(&self, url: &str, context: &LoadContext) -> Result<LoadOutcome> {
        self.dispatch_load(url, context)
    }
}

/// Handle to a hook-set registered on a [`HookChain`]
pub struct HookHandle {
    chain: Arc<HookChain>,
    id: u64,
}

impl HookHandle {
    /// Remove the hook-set from the chain. Idempotent.
    pub fn deregister(&self) {
        self.chain.deregister(self.id);
    }
}

fn resolve_at(
    chain: &[Arc<HookSet>],
    index: usize,
    fallback: &dyn HostResolver,
    specifier: &str,
    context: &ResolveContext,
) -> Result<Resolution> {
    match chain.get(index) {
        Some(hooks) => {
            // Continuation is rebuilt for every position on every dispatch
            let next = NextResolve {
                chain,
                index: index + 1,
                fallback,
                produced: Mutex::new(None),
            };
            hooks.offer_resolve(specifier, context, &next)
        }
        None => fallback.resolve(specifier, context),
    }
}

fn load_at(
    chain: &[Arc<HookSet>],
    index: usize,
    fallback: &dyn HostResolver,
    url: &str,
    context: &LoadContext,
) -> Result<LoadOutcome> {
    match chain.get(index) {
        Some(hooks) => {
            let next = NextLoad {
                chain,
                index: index + 1,
                fallback,
                produced: Mutex::new(None),
            };
            hooks.offer_load(url, context, &next)
        }
        None => fallback.load(url, context),
    }
}

struct NextResolve<'a> {
    chain: &'a [Arc<HookSet>],
    index: usize,
    fallback: &'a dyn HostResolver,
    /// Last result a delegating hook obtained through this continuation
    produced: Mutex<Option<Resolution>>,
}

impl ResolveNext for NextResolve<'_> {
    fn call(&self, specifier: &str, context: &ResolveContext) -> Result<Resolution> {
        let result = resolve_at(self.chain, self.index, self.fallback, specifier, context)?;
        *self.produced.lock() = Some(result.clone());
        Ok(result)
    }

    fn produced(&self) -> Option<Resolution> {
        self.produced.lock().clone()
    }
}

struct NextLoad<'a> {
    chain: &'a [Arc<HookSet>],
    index: usize,
    fallback: &'a dyn HostResolver,
    produced: Mutex<Option<LoadOutcome>>,
}

impl LoadNext for NextLoad<'_> {
    fn call(&self, url: &str, context: &LoadContext) -> Result<LoadOutcome> {
        let outcome = load_at(self.chain, self.index, self.fallback, url, context)?;
        *self.produced.lock() = Some(outcome.clone());
        Ok(outcome)
    }

    fn produced(&self) -> Option<LoadOutcome> {
        self.produced.lock().clone()
    }
}
