// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The star-router generators.
//!
//! Every generator is a function of the same [`Input`] returning a
//! [`Fragment`]; none of them knows about the others. [`compile()`]
//! invokes them in a fixed order and hands the fragments to the merger,
//! which is what puts rules from different generators into one order.
//!
//! ```text
//! |Generator |Emits                                                  |
//! |----------|-------------------------------------------------------|
//! |base      |interface lists, LOCAL-IP, accept rules, masquerade    |
//! |lan       |bridges, gateway addresses, DHCP                       |
//! |vlan      |VLAN interfaces on the trunk, bridge ports             |
//! |route     |routing tables, probe and failover routes, class marks |
//! |dns       |DNS redirects, forwarders, probe output marks          |
//! |lb        |PCC or NTH marks, tables and recursive routes          |
//! ```

pub mod base;
pub mod dns;
pub mod lan;
pub mod lb;
pub mod network;
pub mod route;
pub mod uplink;
pub mod vlan;

use crate::CompileError;
use crate::api::NetworkKind;
use crate::api::Topology;
use crate::cfg::CompileCfg;
use network::Network;
use roscc::engine::CompileCtx;
use roscc::engine::cmd::Section;
use roscc::engine::fragment::Fragment;
use roscc::engine::merge::CompiledConfig;
use roscc::engine::merge::finalize;
use roscc::engine::merge::merge;
use slog::Logger;
use slog::info;
use uplink::UplinkAlloc;

/// What every generator sees.
pub struct Input<'a> {
    pub topo: &'a Topology,
    pub cfg: &'a CompileCfg,
    pub uplinks: &'a UplinkAlloc,
    pub nets: &'a [Network],
}

impl Input<'_> {
    /// The network load balancing applies to: `None` unless balancing
    /// is on, the network exists and is not the split network, and its
    /// class has uplinks to balance across.
    ///
    /// A network this returns gets its routing from the balancer alone.
    pub fn lb_network(&self) -> Option<&Network> {
        let lb = self.topo.load_balance.as_ref()?;
        if lb.network == NetworkKind::Split
            || self.uplinks.uplinks(lb.class).is_empty()
        {
            return None;
        }
        self.nets.iter().find(|n| n.base && n.kind == lb.network)
    }
}

type Generator = fn(&Input, &CompileCtx) -> Fragment;

const GENERATORS: [(&str, Generator); 6] = [
    ("base", base::gen_base),
    ("lan", lan::gen_lan),
    ("vlan", vlan::gen_vlan),
    ("route", route::gen_route),
    ("dns", dns::gen_dns),
    ("lb", lb::gen_lb),
];

/// Compile `topo` into a RouterOS configuration.
pub fn compile(
    topo: &Topology,
    cfg: &CompileCfg,
    log: &Logger,
) -> Result<CompiledConfig, CompileError> {
    let ctx = CompileCtx::new(log.clone());
    let uplinks = UplinkAlloc::new(topo, &cfg.probes)?;
    lb::check_weights(topo, &uplinks)?;
    let nets = network::networks(&topo.subnets, &uplinks)?;
    let input = Input { topo, cfg, uplinks: &uplinks, nets: &nets };

    let frags = GENERATORS
        .iter()
        .map(|(name, generate)| generate(&input, &ctx.child(*name)));
    let out = finalize(merge(frags));

    info!(
        ctx.log, "compiled topology";
        "uplinks" => uplinks.all().count(),
        "networks" => nets.len(),
        "commands" => out.len(),
        "mangle" => out.get(&Section::MANGLE).len()
    );
    Ok(out)
}
