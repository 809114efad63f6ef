// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Hook chaining and registration
//!
//! Two layers: [`HookChain`] is the ordered LIFO list with
//! continuation-passing dispatch; [`HookRegistrar`] decides whether requests
//! flow through the host's native hook facility or through a chain patched
//! over the host's resolution entry point, and hides the difference behind
//! one `register` contract.

pub mod chain;
pub mod registrar;

pub use chain::{HookChain, HookHandle, HookSet, LoadFn, LoadNext, ResolveFn, ResolveNext};
pub use registrar::{HookRegistrar, Registration, RegistrarMode};
