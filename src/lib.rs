// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-register
//!
//! Load-time module interception for Spacey-family runtimes.
//!
//! This crate lets a host runtime load non-native source formats
//! (TypeScript, JSX, ...) directly, with no separate compile step:
//!
//! - Chainable resolve/load hooks with LIFO priority, uniform across hosts
//!   that provide a native hook facility and older hosts that only expose a
//!   patchable resolution entry point
//! - Specifier alias rewriting with per-caller memoization
//! - An ordered, extension-keyed pipeline of source-to-source transformers
//!   (the actual compiler is an external collaborator)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spacey_register::{register_system, InterceptorOptions};
//!
//! fn main() -> spacey_register::Result<()> {
//!     let interceptor = register_system(host, InterceptorOptions::default())?;
//!     interceptor.aliases().set_alias(vec![("@app".to_string(), "./src".into())]);
//!     interceptor.pipeline().add(&[".ts", ".tsx"], |source, path| {
//!         compiler.transform(source, path)
//!     });
//!     // ... run the program; `.ts` imports now load directly ...
//!     interceptor.revert();
//!     Ok(())
//! }
//! ```
//!
//! Hooks execute synchronously on the calling thread, matching the host's
//! module-loading contract; nested loads recurse through the same chain with
//! per-call continuations.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alias;
pub mod error;
pub mod hooks;
pub mod host;
pub mod system;
pub mod transform;

// Re-exports
pub use alias::{AliasTable, AliasTarget};
pub use error::{RegisterError, Result};
pub use hooks::{HookChain, HookHandle, HookRegistrar, HookSet, Registration, RegistrarMode};
pub use host::{
    HostResolver, HostRuntime, HostVersion, LoadContext, LoadOutcome, NativeHookApi,
    NativeHookHandle, Resolution, ResolveContext, NATIVE_HOOKS_SINCE,
};
pub use system::{register_system, Interceptor, InterceptorOptions, DEFAULT_FORMAT};
pub use transform::{TransformerId, TransformerPipeline};

/// Version of the interception layer
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
