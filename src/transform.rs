// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Extension-keyed source transformer pipeline
//!
//! Transformers are opaque source-to-source functions (the actual compiler
//! lives outside this crate). Several transformers may claim the same
//! extension; they are folded in registration order, each consuming the
//! previous one's output. "No transformer claimed this extension" is
//! reported as `None`, distinct from a transform that produced empty text.

use crate::error::{RegisterError, Result};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// An opaque source-to-source transform supplied by an external compiler
pub type TransformFn = Arc<dyn Fn(&str, &Path) -> anyhow::Result<String> + Send + Sync>;

/// Identifier of a registered transformer, used for removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformerId(u64);

struct TransformerHook {
    id: TransformerId,
    /// Dotted, e.g. ".ts"
    extensions: Vec<String>,
    transform: TransformFn,
}

/// Ordered collection of (extension-set, transform) pairs
pub struct TransformerPipeline {
    hooks: RwLock<Vec<TransformerHook>>,
    next_id: AtomicU64,
}

impl TransformerPipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self {
            hooks: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a transformer for a set of extensions.
    ///
    /// Extensions are accepted with or without the leading dot.
    pub fn add<F>(&self, extensions: &[&str], transform: F) -> TransformerId
    where
        F: Fn(&str, &Path) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        let id = TransformerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let extensions = extensions.iter().map(|e| normalize_extension(e)).collect();
        self.hooks.write().push(TransformerHook {
            id,
            extensions,
            transform: Arc::new(transform),
        });
        id
    }

    /// Remove a transformer; removing an absent one is a no-op
    pub fn remove(&self, id: TransformerId) {
        let mut hooks = self.hooks.write();
        if let Some(pos) = hooks.iter().position(|h| h.id == id) {
            hooks.remove(pos);
        }
    }

    /// Whether any transformer claims the file's extension
    pub fn handles(&self, path: &Path) -> bool {
        match extname(path) {
            Some(ext) => self.hooks.read().iter().any(|h| h.extensions.contains(&ext)),
            None => false,
        }
    }

    /// Extensions claimed by at least one transformer, dotted
    pub fn extensions(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for hook in self.hooks.read().iter() {
            for ext in &hook.extensions {
                if !out.contains(ext) {
                    out.push(ext.clone());
                }
            }
        }
        out
    }

    /// Run every matching transformer over the source in registration order.
    ///
    /// `Ok(None)` means no transformer claimed the extension and the caller
    /// should pass the original source through untouched. A failing
    /// transformer aborts the fold with the offending file path attached;
    /// the partially transformed text is never returned.
    pub fn transform(&self, source: &str, path: &Path) -> Result<Option<String>> {
        let Some(ext) = extname(path) else {
            return Ok(None);
        };

        let matching: Vec<TransformFn> = self
            .hooks
            .read()
            .iter()
            .filter(|h| h.extensions.contains(&ext))
            .map(|h| Arc::clone(&h.transform))
            .collect();
        if matching.is_empty() {
            return Ok(None);
        }

        let mut code = source.to_string();
        for transform in matching {
            code = transform(&code, path).map_err(|source| RegisterError::Transform {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(Some(code))
    }
}

impl Default for TransformerPipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_extension(ext: &str) -> String {
    if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    }
}

fn extname(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
}
