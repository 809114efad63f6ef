// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Specifier alias rewriting with memoized resolution
//!
//! An alias maps a literal specifier prefix to one or more candidate real
//! paths. Candidates are probed against the filesystem in order and the
//! first that exists wins. A miss is not an error: the caller defers to the
//! rest of the hook chain.
//!
//! Known limitation: candidates are probed exactly as substituted, with no
//! extension or index-file fallback. `@alias/foo` will not find
//! `@alias/foo.ts`; imports through an alias must be fully qualified.

use crate::host::ResolveContext;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Deserialize;
use std::path::Path;

/// One or more candidate substitutions for an alias prefix.
///
/// Deserializes from the configuration surface `string | string[]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AliasTarget {
    /// A single candidate path
    One(String),
    /// Candidates tried in order
    Many(Vec<String>),
}

impl AliasTarget {
    fn into_candidates(self) -> Vec<String> {
        match self {
            AliasTarget::One(c) => vec![c],
            AliasTarget::Many(cs) => cs,
        }
    }
}

impl From<&str> for AliasTarget {
    fn from(value: &str) -> Self {
        AliasTarget::One(value.to_string())
    }
}

impl From<String> for AliasTarget {
    fn from(value: String) -> Self {
        AliasTarget::One(value)
    }
}

impl From<Vec<String>> for AliasTarget {
    fn from(value: Vec<String>) -> Self {
        AliasTarget::Many(value)
    }
}

#[derive(Debug)]
struct AliasEntry {
    prefix: String,
    candidates: Vec<String>,
}

type ProbeFn = Box<dyn Fn(&Path) -> bool + Send + Sync>;

/// Ordered alias table with a per-(specifier, caller) resolution cache
pub struct AliasTable {
    entries: RwLock<Vec<AliasEntry>>,
    /// Keyed by (specifier, caller identifier); never invalidated in-process
    cache: DashMap<(String, String), String>,
    probe: ProbeFn,
}

impl AliasTable {
    /// Create an empty table probing the real filesystem
    pub fn new() -> Self {
        Self::with_probe(|path: &Path| path.exists())
    }

    /// Create an empty table with a custom existence probe
    pub fn with_probe<F>(probe: F) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        Self {
            entries: RwLock::new(Vec::new()),
            cache: DashMap::new(),
            probe: Box::new(probe),
        }
    }

    /// Register aliases.
    ///
    /// A prefix already present is replaced in place (not merged), keeping
    /// its original position; new prefixes are appended in input order.
    pub fn set_alias<I, T>(&self, aliases: I)
    where
        I: IntoIterator<Item = (String, T)>,
        T: Into<AliasTarget>,
    {
        let mut entries = self.entries.write();
        for (prefix, target) in aliases {
            let candidates = target.into().into_candidates();
            match entries.iter_mut().find(|e| e.prefix == prefix) {
                Some(existing) => existing.candidates = candidates,
                None => entries.push(AliasEntry { prefix, candidates }),
            }
        }
    }

    /// Number of registered alias prefixes
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no aliases are registered
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Resolve a specifier through the alias table.
    ///
    /// The first registered entry whose prefix matches wins; its candidates
    /// are substituted for the prefix and probed in order. `None` means no
    /// match or no existing candidate, and the caller should defer.
    pub fn resolve(&self, specifier: &str, context: &ResolveContext) -> Option<String> {
        let key = (specifier.to_string(), context.identifier().to_string());
        if let Some(hit) = self.cache.get(&key) {
            return Some(hit.value().clone());
        }

        let resolved = self.scan(specifier)?;
        self.cache.insert(key, resolved.clone());
        Some(resolved)
    }

    fn scan(&self, specifier: &str) -> Option<String> {
        let entries = self.entries.read();
        let entry = entries.iter().find(|e| specifier.starts_with(&e.prefix))?;
        let rest = &specifier[entry.prefix.len()..];
        entry
            .candidates
            .iter()
            .map(|candidate| format!("{candidate}{rest}"))
            .find(|substituted| (self.probe)(Path::new(substituted)))
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn table_with(entries: Vec<(String, AliasTarget)>) -> AliasTable {
        let table = AliasTable::new();
        table.set_alias(entries);
        table
    }

    #[test]
    fn test_first_existing_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let real = dir.path().join("real");
        fs::create_dir(&real).unwrap();
        fs::write(real.join("thing.js"), "export {}").unwrap();

        let table = table_with(vec![(
            "@a".to_string(),
            AliasTarget::Many(vec![
                missing.display().to_string(),
                real.display().to_string(),
            ]),
        )]);

        let resolved = table
            .resolve("@a/thing.js", &ResolveContext::default())
            .unwrap();
        assert_eq!(resolved, real.join("thing.js").display().to_string());
    }

    #[test]
    fn test_miss_when_no_candidate_exists() {
        let table = table_with(vec![(
            "@gone".to_string(),
            AliasTarget::One("/definitely/not/here".to_string()),
        )]);
        assert_eq!(table.resolve("@gone/x.js", &ResolveContext::default()), None);
    }

    #[test]
    fn test_unmatched_prefix_is_a_miss() {
        let table = table_with(vec![("@a".to_string(), AliasTarget::One("/tmp".to_string()))]);
        assert_eq!(table.resolve("lodash", &ResolveContext::default()), None);
    }

    #[test]
    fn test_no_extension_probing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("mod.ts"), "export {}").unwrap();

        let table = table_with(vec![(
            "@src".to_string(),
            AliasTarget::One(dir.path().display().to_string()),
        )]);

        // The file only exists with its extension; the bare specifier misses
        assert_eq!(table.resolve("@src/mod", &ResolveContext::default()), None);
        assert!(table.resolve("@src/mod.ts", &ResolveContext::default()).is_some());
    }

    #[test]
    fn test_cache_skips_filesystem_probing() {
        let probes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&probes);
        let table = AliasTable::with_probe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        table.set_alias(vec![("@a".to_string(), AliasTarget::One("/root".to_string()))]);

        let context = ResolveContext::from_parent("file:///caller.js");
        let first = table.resolve("@a/x.js", &context).unwrap();
        let probes_after_first = probes.load(Ordering::SeqCst);

        let second = table.resolve("@a/x.js", &context).unwrap();
        assert_eq!(first, second);
        assert_eq!(probes.load(Ordering::SeqCst), probes_after_first);
    }

    #[test]
    fn test_cache_keyed_by_caller_context() {
        let probes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&probes);
        let table = AliasTable::with_probe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        table.set_alias(vec![("@a".to_string(), AliasTarget::One("/root".to_string()))]);

        table.resolve("@a/x.js", &ResolveContext::from_parent("file:///one.js"));
        let after_one = probes.load(Ordering::SeqCst);
        // Same specifier from a different caller must probe again
        table.resolve("@a/x.js", &ResolveContext::from_parent("file:///two.js"));
        assert!(probes.load(Ordering::SeqCst) > after_one);
    }

    #[test]
    fn test_first_registered_matching_prefix_wins() {
        let table = AliasTable::with_probe(|_| true);
        table.set_alias(vec![
            ("@app".to_string(), AliasTarget::One("/first".to_string())),
            ("@app/deep".to_string(), AliasTarget::One("/second".to_string())),
        ]);

        // No longest-match: the earlier, shorter prefix matches first
        let resolved = table
            .resolve("@app/deep/x.js", &ResolveContext::default())
            .unwrap();
        assert_eq!(resolved, "/first/deep/x.js");
    }

    #[test]
    fn test_conflicting_prefix_replaced_not_merged() {
        let table = AliasTable::with_probe(|_| true);
        table.set_alias(vec![("@a".to_string(), AliasTarget::One("/old".to_string()))]);
        table.set_alias(vec![("@a".to_string(), AliasTarget::One("/new".to_string()))]);

        assert_eq!(table.len(), 1);
        let resolved = table.resolve("@a/m.js", &ResolveContext::default()).unwrap();
        assert_eq!(resolved, "/new/m.js");
    }

    #[test]
    fn test_alias_target_deserializes_both_shapes() {
        let one: AliasTarget = serde_json::from_str(r#""./src""#).unwrap();
        assert!(matches!(one, AliasTarget::One(ref s) if s == "./src"));

        let many: AliasTarget = serde_json::from_str(r#"["./a", "./b"]"#).unwrap();
        assert!(matches!(many, AliasTarget::Many(ref v) if v.len() == 2));
    }
}
