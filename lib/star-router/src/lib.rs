// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The star-router topology.
//!
//! A star router sits between a set of LAN networks and a set of
//! uplinks: domestic and foreign WAN links plus VPN client tunnels.
//! Every LAN network routes through one uplink class (or one named
//! uplink), the split network picks its class by destination, and one
//! network may be load balanced across all uplinks of a class.
//!
//! [`compile`] turns an [`api::Topology`] into a
//! [`roscc::engine::merge::CompiledConfig`].

#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

pub mod api;
pub mod cfg;
pub mod engine;

pub use engine::compile;

use api::Ipv4Cidr;
use api::UplinkClass;
use roscc_api::SubnetError;
use thiserror::Error;

/// Why a topology could not be compiled.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum CompileError {
    #[error("the {class} probe pool has {available} addresses, {needed} needed")]
    ProbePoolExhausted { class: UplinkClass, needed: usize, available: usize },

    #[error("uplink name {0} is used more than once")]
    DuplicateUplink(String),

    #[error("network name {0} is used more than once")]
    DuplicateNetwork(String),

    #[error("network {network} is bound to unknown uplink {uplink}")]
    UnknownUplink { network: String, uplink: String },

    #[error("network {0} has neither a cidr nor a pool to carve one from")]
    Unplanned(String),

    #[error("network {network} ({cidr}) has no room for a gateway address")]
    NoGateway { network: String, cidr: Ipv4Cidr },

    #[error("uplink {uplink} has load-balancing weight {weight}, at most {max}")]
    WeightTooLarge { uplink: String, weight: u32, max: u32 },

    #[error(transparent)]
    Subnet(#[from] SubnetError),
}
