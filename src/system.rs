// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Composition root: alias table + transformer pipeline behind one hook-set
//!
//! An [`Interceptor`] wires the pieces together and manages the
//! registered/unregistered lifecycle. While registered, resolve requests are
//! offered to the alias table (falling through on a miss) and load requests
//! for any extension claimed by the pipeline are read from disk, transformed,
//! and reported to the host under a fixed output format.

use crate::alias::{AliasTable, AliasTarget};
use crate::error::Result;
use crate::hooks::{HookRegistrar, HookSet, Registration};
use crate::host::{HostRuntime, LoadOutcome, Resolution};
use crate::transform::TransformerPipeline;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Output format reported to the host for transformed modules
pub const DEFAULT_FORMAT: &str = "module";

/// Options for [`Interceptor::new`]
pub struct InterceptorOptions {
    /// Alias prefixes to install, in order
    pub aliases: Vec<(String, AliasTarget)>,
    /// Module format reported for every transformed load
    pub format: String,
}

impl Default for InterceptorOptions {
    fn default() -> Self {
        Self {
            aliases: Vec::new(),
            format: DEFAULT_FORMAT.to_string(),
        }
    }
}

/// Module interception facade with a register/revert lifecycle.
///
/// `register` is deliberately not idempotent: calling it twice installs the
/// hook-set twice. `revert` removes everything this instance installed and
/// is safe to call any number of times.
pub struct Interceptor {
    registrar: Arc<HookRegistrar>,
    aliases: Arc<AliasTable>,
    pipeline: Arc<TransformerPipeline>,
    format: String,
    registrations: Mutex<Vec<Registration>>,
}

impl Interceptor {
    /// Create an interceptor with its own registrar for the host.
    ///
    /// Several interceptors may target the same host: in polyfill mode the
    /// hook chain is interned per host process-wide, so the entry point is
    /// patched only once no matter how many registrars exist. Use
    /// [`Interceptor::with_registrar`] when a registrar is already at hand.
    pub fn new(host: Arc<dyn HostRuntime>, options: InterceptorOptions) -> Self {
        Self::with_registrar(Arc::new(HookRegistrar::new(host)), options)
    }

    /// Create an interceptor on a shared registrar
    pub fn with_registrar(registrar: Arc<HookRegistrar>, options: InterceptorOptions) -> Self {
        let aliases = Arc::new(AliasTable::new());
        aliases.set_alias(options.aliases);
        Self {
            registrar,
            aliases,
            pipeline: Arc::new(TransformerPipeline::new()),
            format: options.format,
            registrations: Mutex::new(Vec::new()),
        }
    }

    /// The alias table consulted by the resolve step
    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// The transformer pipeline consulted by the load step
    pub fn pipeline(&self) -> &TransformerPipeline {
        &self.pipeline
    }

    /// Install the resolve/load hook-set. Not idempotent.
    pub fn register(&self) -> Result<()> {
        let registration = self.registrar.register(Arc::new(self.build_hooks()))?;
        self.registrations.lock().push(registration);
        Ok(())
    }

    /// Remove every hook-set this instance installed. Idempotent.
    pub fn revert(&self) {
        for registration in self.registrations.lock().drain(..) {
            registration.deregister();
        }
    }

    /// Whether this instance currently has hooks installed
    pub fn is_registered(&self) -> bool {
        !self.registrations.lock().is_empty()
    }

    fn build_hooks(&self) -> HookSet {
        let aliases = Arc::clone(&self.aliases);
        let pipeline = Arc::clone(&self.pipeline);
        let format = self.format.clone();

        // URL forms of alias hits, keyed like the table's own cache, so a
        // repeat request skips the canonicalize syscall entirely
        let urls: DashMap<(String, String), String> = DashMap::new();

        HookSet::new()
            .with_resolve(move |specifier, context, _next| {
                let key = (specifier.to_string(), context.identifier().to_string());
                if let Some(url) = urls.get(&key) {
                    return Ok(Resolution::to(url.value().clone()));
                }
                match aliases.resolve(specifier, context) {
                    Some(target) => {
                        let url = path_to_url(&target);
                        urls.insert(key, url.clone());
                        Ok(Resolution::to(url))
                    }
                    // Miss: transparent fallthrough to the rest of the chain
                    None => Ok(Resolution::deferred()),
                }
            })
            .with_load(move |url, _context, _next| {
                let Some(path) = file_path_from_url(url) else {
                    return Ok(None);
                };
                if !pipeline.handles(&path) {
                    return Ok(None);
                }
                let source = fs::read_to_string(&path)?;
                match pipeline.transform(&source, &path) {
                    Ok(Some(code)) => Ok(Some(LoadOutcome {
                        format: format.clone(),
                        code,
                    })),
                    Ok(None) => Ok(None),
                    Err(err) => {
                        tracing::error!("transform failed for {}: {}", path.display(), err);
                        Err(err)
                    }
                }
            })
    }
}

impl Drop for Interceptor {
    fn drop(&mut self) {
        self.revert();
    }
}

/// Create an interceptor and register it in one call.
///
/// The returned value is the cleanup surface: call
/// [`Interceptor::revert`] (idempotent) or let it drop.
pub fn register_system(
    host: Arc<dyn HostRuntime>,
    options: InterceptorOptions,
) -> Result<Interceptor> {
    let interceptor = Interceptor::new(host, options);
    interceptor.register()?;
    Ok(interceptor)
}

/// Report an alias target as a `file://` URL when it canonicalizes,
/// otherwise as the raw substituted path
fn path_to_url(target: &str) -> String {
    match fs::canonicalize(target) {
        Ok(absolute) => match url::Url::from_file_path(&absolute) {
            Ok(url) => url.to_string(),
            Err(()) => target.to_string(),
        },
        Err(_) => target.to_string(),
    }
}

/// Map a module URL back to a filesystem path; `None` for non-file schemes
fn file_path_from_url(url: &str) -> Option<PathBuf> {
    match url::Url::parse(url) {
        Ok(parsed) if parsed.scheme() == "file" => parsed.to_file_path().ok(),
        Ok(_) => None,
        // Not URL-shaped: treat as a plain filesystem path
        Err(_) => Some(PathBuf::from(url)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_file_url_round_trip() {
        let path = file_path_from_url("file:///srv/app/main.ts").unwrap();
        assert_eq!(path, Path::new("/srv/app/main.ts"));
    }

    #[test]
    fn test_plain_path_accepted() {
        let path = file_path_from_url("./src/lib.ts").unwrap();
        assert_eq!(path, Path::new("./src/lib.ts"));
    }

    #[test]
    fn test_foreign_scheme_passed_over() {
        assert_eq!(file_path_from_url("builtin:fs"), None);
        assert_eq!(file_path_from_url("https://example.com/mod.js"), None);
    }

    #[test]
    fn test_path_to_url_survives_missing_target() {
        // A path that cannot canonicalize comes back untouched
        assert_eq!(path_to_url("/no/such/dir/x.ts"), "/no/such/dir/x.ts");
    }

    #[test]
    fn test_path_to_url_canonical_form() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("m.ts");
        fs::write(&file, "export {}").unwrap();

        let url = path_to_url(&file.display().to_string());
        assert!(url.starts_with("file://"), "got {url}");
        assert!(url.ends_with("m.ts"));
    }
}
