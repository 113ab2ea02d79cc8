// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Types shared by every part of the RouterOS configuration compiler:
//! IPv4 addressing, subnet planning and RouterOS durations.
//!
//! Everything in this crate is pure arithmetic over its inputs. The
//! string-level helpers in [`subnet`] degrade to `None`, `false` or an
//! empty range when handed malformed text; only the planning operations
//! that a caller must act upon (splitting and VLSM) return a
//! [`SubnetError`].

pub mod ip;
pub mod subnet;
pub mod time;

pub use ip::*;
pub use subnet::*;
pub use time::*;
