// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The compiler engine.
pub mod cmd;
pub mod fragment;
pub mod mangle;
pub mod merge;
pub mod sort;

use slog::Logger;
use slog::o;

/// State threaded through one compile call.
///
/// Nothing in here outlives the call; each compile builds its own.
pub struct CompileCtx {
    pub log: Logger,
}

impl CompileCtx {
    pub fn new(log: Logger) -> Self {
        Self { log }
    }

    /// A context whose log output goes nowhere.
    pub fn discard() -> Self {
        Self { log: Logger::root(slog::Discard, o!()) }
    }

    /// A context for one named generator, tagging its log records.
    pub fn child(&self, generator: &'static str) -> Self {
        Self { log: self.log.new(o!("generator" => generator)) }
    }
}
