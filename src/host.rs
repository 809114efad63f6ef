// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host runtime abstraction
//!
//! The interception layer never talks to a concrete engine. Everything it
//! needs from the host is expressed here: a version (for capability
//! detection), an optional native hook-registration facility, the original
//! pre-interception resolver, and a patchable resolution entry point for
//! hosts that predate native hooks. Tests substitute a fake implementation.

use crate::error::{RegisterError, Result};
use crate::hooks::HookSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Host version with native hook-registration support.
///
/// Hosts at or above this version expose [`HostRuntime::native_hooks`];
/// older hosts are driven through the polyfill chain instead.
pub const NATIVE_HOOKS_SINCE: HostVersion = HostVersion {
    major: 1,
    minor: 7,
    patch: 0,
};

/// A host runtime version, `major.minor.patch`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HostVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
    /// Patch version
    pub patch: u32,
}

impl HostVersion {
    /// Create a version from its components
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for HostVersion {
    type Err = RegisterError;

    fn from_str(s: &str) -> Result<Self> {
        // Tolerate a leading 'v' (version strings in the wild carry one)
        let raw = s.strip_prefix('v').unwrap_or(s);
        let mut parts = raw.splitn(3, '.');
        let mut next = || -> Result<u32> {
            parts
                .next()
                .unwrap_or("0")
                .parse()
                .map_err(|_| RegisterError::InvalidHostVersion(s.to_string()))
        };
        Ok(Self {
            major: next()?,
            minor: next()?,
            patch: next()?,
        })
    }
}

impl fmt::Display for HostVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Context passed to resolve hooks
#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
    /// URL of the module issuing the request, if any
    pub parent_url: Option<String>,
}

impl ResolveContext {
    /// Context for a request issued by the given parent module
    pub fn from_parent(parent_url: impl Into<String>) -> Self {
        Self {
            parent_url: Some(parent_url.into()),
        }
    }

    /// Identifier used to key per-caller caches
    pub(crate) fn identifier(&self) -> &str {
        self.parent_url.as_deref().unwrap_or("")
    }
}

/// Context passed to load hooks
#[derive(Debug, Clone, Default)]
pub struct LoadContext {
    /// Format suggested by the resolve step, if any
    pub format_hint: Option<String>,
}

/// Result of a resolve hook or of the original resolver.
///
/// A missing `url` means "defer to the rest of the chain".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Resolved module URL, absent to defer
    pub url: Option<String>,
}

impl Resolution {
    /// A resolution carrying a final URL
    pub fn to(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
        }
    }

    /// An empty resolution, deferring to the next hook
    pub fn deferred() -> Self {
        Self { url: None }
    }
}

/// Result of a load hook or of the original loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Module format reported to the host compiler
    pub format: String,
    /// Source text handed to the host compiler
    pub code: String,
}

/// The terminal resolve/load entry point.
///
/// In polyfill mode this is the function captured before the chain was
/// installed; it stays the chain's permanent fallback and is never restored
/// over the entry point once interception begins (deregistration is
/// chain-removal, not entry-point swapping).
pub trait HostResolver: Send + Sync {
    /// Resolve a specifier to a module URL
    fn resolve(&self, specifier: &str, context: &ResolveContext) -> Result<Resolution>;

    /// Load a resolved URL into source text
    fn load(&self, url: &str, context: &LoadContext) -> Result<LoadOutcome>;
}

/// Handle to a hook-set registered through the host's native facility
pub trait NativeHookHandle: Send {
    /// Remove the hook-set. Must be a no-op when already removed.
    fn deregister(&self);
}

/// Native hook-registration facility of newer hosts.
///
/// The host guarantees LIFO offering of requests to registered hook-sets,
/// so no chain logic is layered on top in native mode.
pub trait NativeHookApi: Send + Sync {
    /// Register a hook-set with the host
    fn register(&self, hooks: Arc<HookSet>) -> Box<dyn NativeHookHandle>;
}

/// The host runtime as seen by the interception layer
pub trait HostRuntime: Send + Sync {
    /// Version of the host, used for capability detection
    fn version(&self) -> HostVersion;

    /// Native hook facility, present on hosts >= [`NATIVE_HOOKS_SINCE`]
    fn native_hooks(&self) -> Option<&dyn NativeHookApi>;

    /// The pre-interception resolver, captured as the chain's fallback
    fn original_resolver(&self) -> Arc<dyn HostResolver>;

    /// Replace the host's synchronous resolution entry point.
    ///
    /// Only polyfill mode calls this, exactly once per host.
    fn install_entry_point(&self, resolver: Arc<dyn HostResolver>);

    /// Whether registration can delegate to the native facility
    fn supports_native_hooks(&self) -> bool {
        self.version() >= NATIVE_HOOKS_SINCE && self.native_hooks().is_some()
    }
}
