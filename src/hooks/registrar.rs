// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Registration strategy selection
//!
//! Newer hosts expose a native hook facility with LIFO chaining built in;
//! older ones only expose a patchable resolution entry point. The registrar
//! picks one strategy at construction and presents the same
//! `register -> Registration` contract for both. In polyfill mode exactly
//! one [`HookChain`] exists per host across the whole process; every
//! registrar targeting the same host shares it. The original resolver is
//! captured as the chain's permanent fallback and the entry point replaced
//! exactly once per host; deregistration is always chain-removal, never
//! entry-point restoration.

use crate::error::{RegisterError, Result};
use crate::hooks::chain::{HookChain, HookHandle, HookSet};
use crate::host::{HostRuntime, NativeHookHandle};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Chains already patched over a host entry point, one per live host.
/// Keyed by the host allocation; dead hosts are pruned on lookup so a
/// reused address can never pick up a stale chain.
static INSTALLED_CHAINS: Mutex<Vec<InstalledChain>> = Mutex::new(Vec::new());

struct InstalledChain {
    host_key: usize,
    host: Weak<dyn HostRuntime>,
    chain: Arc<HookChain>,
}

/// Which interception mechanism a registrar drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrarMode {
    /// Delegating to the host's native hook facility
    Native,
    /// Driving a hand-built chain behind a patched entry point
    Polyfill,
}

/// Uniform hook registration over both host generations
pub struct HookRegistrar {
    host: Arc<dyn HostRuntime>,
    mode: RegistrarMode,
}

impl HookRegistrar {
    /// Create a registrar for the given host, fixing the strategy now
    pub fn new(host: Arc<dyn HostRuntime>) -> Self {
        let mode = if host.supports_native_hooks() {
            RegistrarMode::Native
        } else {
            RegistrarMode::Polyfill
        };
        tracing::debug!(
            "hook registrar using {:?} mode for host {}",
            mode,
            host.version()
        );
        Self { host, mode }
    }

    /// The strategy fixed at construction
    pub fn mode(&self) -> RegistrarMode {
        self.mode
    }

    /// Register a hook-set with whichever mechanism is active
    pub fn register(&self, hooks: Arc<HookSet>) -> Result<Registration> {
        match self.mode {
            RegistrarMode::Native => {
                let api = self.host.native_hooks().ok_or_else(|| {
                    RegisterError::host("native hook facility reported then withdrawn")
                })?;
                Ok(Registration::native(api.register(hooks)))
            }
            RegistrarMode::Polyfill => Ok(Registration::chained(self.chain().register(hooks))),
        }
    }

    /// The polyfill chain for this registrar's host, installing it on the
    /// first use anywhere in the process
    fn chain(&self) -> Arc<HookChain> {
        let host_key = Arc::as_ptr(&self.host) as *const () as usize;
        let mut installed = INSTALLED_CHAINS.lock();
        installed.retain(|entry| entry.host.strong_count() > 0);
        if let Some(entry) = installed.iter().find(|e| e.host_key == host_key) {
            return Arc::clone(&entry.chain);
        }
        let chain = Arc::new(HookChain::new(self.host.original_resolver()));
        self.host.install_entry_point(Arc::clone(&chain) as Arc<_>);
        tracing::debug!("installed polyfill hook chain over host entry point");
        installed.push(InstalledChain {
            host_key,
            host: Arc::downgrade(&self.host),
            chain: Arc::clone(&chain),
        });
        chain
    }
}

enum RegistrationInner {
    Native(Box<dyn NativeHookHandle>),
    Chained(HookHandle),
}

/// Live registration of one hook-set; dropping it does NOT deregister
pub struct Registration {
    inner: Mutex<Option<RegistrationInner>>,
}

impl Registration {
    fn native(handle: Box<dyn NativeHookHandle>) -> Self {
        Self {
            inner: Mutex::new(Some(RegistrationInner::Native(handle))),
        }
    }

    fn chained(handle: HookHandle) -> Self {
        Self {
            inner: Mutex::new(Some(RegistrationInner::Chained(handle))),
        }
    }

    /// Remove the hook-set. Calls after the first are no-ops.
    pub fn deregister(&self) {
        if let Some(inner) = self.inner.lock().take() {
            match inner {
                RegistrationInner::Native(handle) => handle.deregister(),
                RegistrationInner::Chained(handle) => handle.deregister(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{
        HostResolver, HostVersion, LoadContext, LoadOutcome, NativeHookApi, Resolution,
        ResolveContext,
    };
    use parking_lot::RwLock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticResolver;

    impl HostResolver for StaticResolver {
        fn resolve(&self, specifier: &str, _context: &ResolveContext) -> Result<Resolution> {
            Ok(Resolution::to(format!("host:{specifier}")))
        }

        fn load(&self, url: &str, _context: &LoadContext) -> Result<LoadOutcome> {
            Ok(LoadOutcome {
                format: "module".to_string(),
                code: format!("// {url}"),
            })
        }
    }

    struct CountingNativeApi {
        registrations: AtomicUsize,
    }

    struct NoopHandle;

    impl NativeHookHandle for NoopHandle {
        fn deregister(&self) {}
    }

    impl NativeHookApi for CountingNativeApi {
        fn register(&self, _hooks: Arc<HookSet>) -> Box<dyn NativeHookHandle> {
            self.registrations.fetch_add(1, Ordering::SeqCst);
            Box::new(NoopHandle)
        }
    }

    struct TestHost {
        version: HostVersion,
        native: Option<CountingNativeApi>,
        installs: AtomicUsize,
        entry_point: RwLock<Arc<dyn HostResolver>>,
    }

    impl TestHost {
        fn new(version: HostVersion, with_native: bool) -> Self {
            Self {
                version,
                native: with_native.then(|| CountingNativeApi {
                    registrations: AtomicUsize::new(0),
                }),
                installs: AtomicUsize::new(0),
                entry_point: RwLock::new(Arc::new(StaticResolver)),
            }
        }
    }

    impl HostRuntime for TestHost {
        fn version(&self) -> HostVersion {
            self.version
        }

        fn native_hooks(&self) -> Option<&dyn NativeHookApi> {
            self.native.as_ref().map(|api| api as &dyn NativeHookApi)
        }

        fn original_resolver(&self) -> Arc<dyn HostResolver> {
            Arc::new(StaticResolver)
        }

        fn install_entry_point(&self, resolver: Arc<dyn HostResolver>) {
            self.installs.fetch_add(1, Ordering::SeqCst);
            *self.entry_point.write() = resolver;
        }
    }

    #[test]
    fn test_mode_selection_by_version() {
        let newer = HookRegistrar::new(Arc::new(TestHost::new(HostVersion::new(1, 7, 0), true)));
        assert_eq!(newer.mode(), RegistrarMode::Native);

        let older = HookRegistrar::new(Arc::new(TestHost::new(HostVersion::new(1, 6, 4), false)));
        assert_eq!(older.mode(), RegistrarMode::Polyfill);

        // Version says capable but facility missing: fall back to polyfill
        let odd = HookRegistrar::new(Arc::new(TestHost::new(HostVersion::new(2, 0, 0), false)));
        assert_eq!(odd.mode(), RegistrarMode::Polyfill);
    }

    #[test]
    fn test_native_mode_delegates() {
        let host = Arc::new(TestHost::new(HostVersion::new(1, 8, 0), true));
        let registrar = HookRegistrar::new(Arc::clone(&host) as Arc<dyn HostRuntime>);

        let reg = registrar.register(Arc::new(HookSet::new())).unwrap();
        reg.deregister();

        let api = host.native.as_ref().unwrap();
        assert_eq!(api.registrations.load(Ordering::SeqCst), 1);
        // Native mode never touches the entry point
        assert_eq!(host.installs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_polyfill_installs_entry_point_once() {
        let host = Arc::new(TestHost::new(HostVersion::new(1, 2, 0), false));
        let registrar = HookRegistrar::new(Arc::clone(&host) as Arc<dyn HostRuntime>);

        let a = registrar.register(Arc::new(HookSet::new())).unwrap();
        let b = registrar.register(Arc::new(HookSet::new())).unwrap();
        let c = registrar.register(Arc::new(HookSet::new())).unwrap();
        assert_eq!(host.installs.load(Ordering::SeqCst), 1);

        // Deregistering everything leaves the chain installed: the original
        // resolver is the chain's fallback, so behavior reverts through it
        a.deregister();
        b.deregister();
        c.deregister();
        assert_eq!(host.installs.load(Ordering::SeqCst), 1);

        let entry = host.entry_point.read().clone();
        let result = entry.resolve("./a.js", &ResolveContext::default()).unwrap();
        assert_eq!(result.url.as_deref(), Some("host:./a.js"));
    }

    #[test]
    fn test_chain_shared_across_registrars_for_one_host() {
        let host = Arc::new(TestHost::new(HostVersion::new(1, 3, 0), false));
        let first = HookRegistrar::new(Arc::clone(&host) as Arc<dyn HostRuntime>);
        let second = HookRegistrar::new(Arc::clone(&host) as Arc<dyn HostRuntime>);

        let _a = first.register(Arc::new(HookSet::new())).unwrap();
        let _b = second
            .register(Arc::new(HookSet::new().with_resolve(|specifier, _, _| {
                if specifier == "virtual:pinned" {
                    Ok(Resolution::to("pinned:ok"))
                } else {
                    Ok(Resolution::deferred())
                }
            })))
            .unwrap();

        // Both registrations land on one chain behind one entry-point patch
        assert_eq!(host.installs.load(Ordering::SeqCst), 1);

        let entry = host.entry_point.read().clone();
        let hit = entry
            .resolve("virtual:pinned", &ResolveContext::default())
            .unwrap();
        assert_eq!(hit.url.as_deref(), Some("pinned:ok"));
    }

    #[test]
    fn test_registration_deregister_idempotent() {
        let host = Arc::new(TestHost::new(HostVersion::new(1, 0, 0), false));
        let registrar = HookRegistrar::new(Arc::clone(&host) as Arc<dyn HostRuntime>);

        let reg = registrar.register(Arc::new(HookSet::new())).unwrap();
        for _ in 0..4 {
            reg.deregister();
        }
    }
}
