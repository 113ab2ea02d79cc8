// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The RouterOS configuration compiler engine.
//!
//! Generators describe their output as [`engine::fragment::Fragment`]s:
//! RouterOS commands grouped by menu path. The engine merges fragments
//! in invocation order and puts the packet-marking (mangle) rules into
//! the one order the device can evaluate top-down.
//!
//! Topology-specific generators live in their own crates and build on
//! the types here.

#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

pub use roscc_api as api;

pub mod engine;
pub mod print;
