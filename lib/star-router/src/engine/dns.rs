// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! DNS redirection and forwarders.
//!
//! Clients resolve through the probe address of the uplink their
//! network is routed over. The same address is what the routing
//! generator pings to decide whether the uplink is alive, so a dead
//! uplink takes its resolver down with it rather than leaking queries
//! through another class.

use super::Input;
use crate::api::UplinkClass;
use itertools::Itertools;
use roscc::engine::CompileCtx;
use roscc::engine::cmd::Command;
use roscc::engine::cmd::Section;
use roscc::engine::fragment::Fragment;
use roscc::engine::mangle::Chain;
use roscc::engine::mangle::MangleRule;
use roscc::engine::mangle::tag;
use slog::debug;
use slog::warn;

pub const DNS_PORT: u16 = 53;

/// The forwarder that unions every class.
pub const ALL_FORWARDER: &str = "All";

/// Emit the port-53 redirects for every network, the per-class
/// forwarders and the rules pinning each probe to its own uplink.
pub fn gen_dns(input: &Input, ctx: &CompileCtx) -> Fragment {
    let mut frag = Fragment::new();
    let alloc = input.uplinks;

    for net in input.nets {
        let Some(u) = net.dns_uplink(alloc) else {
            warn!(
                ctx.log, "no uplink to resolve through";
                "network" => &net.name, "class" => %net.kind.dns_class()
            );
            continue;
        };

        for protocol in ["udp", "tcp"] {
            frag.push(
                Section::NAT,
                Command::add()
                    .arg("action", "dst-nat")
                    .arg("chain", "dstnat")
                    .arg("src-address", net.cidr)
                    .arg("protocol", protocol)
                    .arg("dst-port", DNS_PORT)
                    .arg("to-addresses", u.probe)
                    .arg("to-ports", DNS_PORT)
                    .comment(format!("DNS {}", net.name)),
            );
        }
        debug!(
            ctx.log, "DNS redirect";
            "network" => &net.name, "uplink" => &u.name, "probe" => %u.probe
        );
    }

    let mut all = vec![];
    for class in UplinkClass::ALL {
        let servers = alloc.probe_slice(class);
        if servers.is_empty() {
            continue;
        }
        frag.push(
            Section::DNS_FORWARDERS,
            Command::add()
                .arg("name", class)
                .arg("dns-servers", servers.iter().join(",")),
        );
        all.extend_from_slice(servers);
    }
    if !all.is_empty() {
        frag.push(
            Section::DNS_FORWARDERS,
            Command::add()
                .arg("name", ALL_FORWARDER)
                .arg("dns-servers", all.iter().join(",")),
        );
    }

    for u in alloc.all() {
        frag.push_mangle(
            MangleRule::mark_routing(Chain::Output, &u.table())
                .arg("dst-address", u.probe)
                .arg("protocol", "udp")
                .arg("dst-port", DNS_PORT)
                .passthrough(false)
                .comment(format!("{} DNS {}", tag::OUTPUT, u.name)),
        );
    }

    frag
}
