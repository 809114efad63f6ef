// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for module interception

use std::path::PathBuf;
use thiserror::Error;

/// Result type for interception operations
pub type Result<T> = std::result::Result<T, RegisterError>;

/// Errors that can occur while intercepting module loads
#[derive(Debug, Error)]
pub enum RegisterError {
    /// Module not found by any hook or the original resolver
    #[error("Cannot find module '{0}'")]
    ModuleNotFound(String),

    /// A source transformer failed on a file
    #[error("Transform failed for '{path}': {source}")]
    Transform {
        /// File whose source was being transformed
        path: PathBuf,
        /// Underlying transformer error
        #[source]
        source: anyhow::Error,
    },

    /// File system error
    #[error("File system error: {0}")]
    Fs(#[from] std::io::Error),

    /// The host reported a version string that does not parse
    #[error("Invalid host version: {0}")]
    InvalidHostVersion(String),

    /// Error reported by the host runtime
    #[error("Host error: {0}")]
    Host(String),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

impl RegisterError {
    /// Create a module not found error
    pub fn module_not_found(specifier: impl Into<String>) -> Self {
        Self::ModuleNotFound(specifier.into())
    }

    /// Create a host error
    pub fn host(msg: impl Into<String>) -> Self {
        Self::Host(msg.into())
    }
}
