// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Routing tables, routes and the class-routing mangle rules.
//!
//! Every uplink is watched through its probe: a host route pins the
//! probe to the uplink's gateway, and every default route through the
//! uplink is a recursive route via the probe with `check-gateway=ping`.
//! When the probe stops answering, the routes through it go inactive
//! and the next route by distance takes over.
//!
//! ```text
//! |Table       |Routes                                       |
//! |------------|---------------------------------------------|
//! |main        |probe host routes, WAN failover               |
//! |to-<Class>  |failover across the class, in uplink order   |
//! |to-<uplink> |the uplink alone                             |
//! ```

use super::Input;
use super::uplink::Uplink;
use crate::api::Ipv4Addr;
use crate::api::Ipv4Cidr;
use crate::api::NetworkKind;
use crate::api::UplinkClass;
use roscc::engine::CompileCtx;
use roscc::engine::cmd::Command;
use roscc::engine::cmd::Section;
use roscc::engine::fragment::Fragment;
use roscc::engine::mangle::Chain;
use roscc::engine::mangle::MangleRule;
use roscc::engine::mangle::NO_MARK;
use roscc::engine::mangle::tag;
use slog::debug;
use slog::warn;

/// Probe host routes only resolve through directly connected gateways.
pub const PROBE_SCOPE: u8 = 10;

/// Recursive routes may resolve through the probe host routes.
pub const TARGET_SCOPE: u8 = 11;

/// A `/routing table` entry.
pub fn table(name: &str) -> Command {
    Command::add().flag("fib").arg("name", name)
}

/// A default route in `table` through `probe`, live while the probe
/// answers pings.
pub fn recursive_route(
    table: Option<&str>,
    probe: Ipv4Addr,
    distance: usize,
) -> Command {
    Command::add()
        .arg("dst-address", Ipv4Cidr::DEFAULT)
        .arg("gateway", probe)
        .arg_opt("routing-table", table)
        .arg("distance", distance)
        .arg("check-gateway", "ping")
        .arg("target-scope", TARGET_SCOPE)
}

/// Emit the routing tables and routes of every uplink and the mangle
/// rules that steer traffic into them.
pub fn gen_route(input: &Input, ctx: &CompileCtx) -> Fragment {
    let mut frag = Fragment::new();
    routes(&mut frag, input, ctx);
    vpn_endpoints(&mut frag, input, ctx);
    services(&mut frag, input, ctx);
    split(&mut frag, input, ctx);
    network_marks(&mut frag, input, ctx);
    inbound(&mut frag, input, ctx);
    frag
}

fn routes(frag: &mut Fragment, input: &Input, ctx: &CompileCtx) {
    let alloc = input.uplinks;

    for class in UplinkClass::ALL {
        if alloc.len(class) > 0 {
            frag.push(Section::ROUTING_TABLE, table(&class.table()));
        }
    }
    for u in alloc.all() {
        frag.push(Section::ROUTING_TABLE, table(&u.table()));
    }

    for u in alloc.all() {
        frag.push(
            Section::ROUTE,
            Command::add()
                .arg("dst-address", Ipv4Cidr::host(u.probe))
                .arg("gateway", &u.gateway)
                .arg("scope", PROBE_SCOPE)
                .comment(format!("Probe {}", u.name)),
        );
        frag.push(
            Section::ROUTE,
            recursive_route(Some(&u.table()), u.probe, 1).comment(&u.name),
        );
    }

    for class in UplinkClass::ALL {
        let table = class.table();
        for u in alloc.uplinks(class) {
            frag.push(
                Section::ROUTE,
                recursive_route(Some(&table), u.probe, u.idx + 1)
                    .comment(format!("{class} {}", u.name)),
            );
        }
    }

    // The router's own traffic.
    for (i, u) in alloc.wan().enumerate() {
        frag.push(
            Section::ROUTE,
            recursive_route(None, u.probe, i + 1)
                .comment(format!("Main {}", u.name)),
        );
    }

    debug!(ctx.log, "routes"; "uplinks" => alloc.all().count());
}

// The class that reaches the internet outside any tunnel.
fn bypass_class(input: &Input) -> Option<UplinkClass> {
    [UplinkClass::Foreign, UplinkClass::Domestic]
        .into_iter()
        .find(|c| input.uplinks.len(*c) > 0)
}

fn vpn_endpoints(frag: &mut Fragment, input: &Input, ctx: &CompileCtx) {
    for u in input.uplinks.uplinks(UplinkClass::Vpn) {
        let Some(endpoint) = u.endpoint else {
            continue;
        };
        let Some(class) = bypass_class(input) else {
            warn!(
                ctx.log, "no WAN link to reach VPN endpoint";
                "uplink" => &u.name, "endpoint" => %endpoint
            );
            continue;
        };

        frag.push_mangle(
            MangleRule::mark_routing(Chain::Output, &class.table())
                .arg("dst-address", endpoint)
                .passthrough(false)
                .comment(format!("{} {}", tag::VPN_ENDPOINT, u.name)),
        );
    }
}

fn services(frag: &mut Fragment, input: &Input, ctx: &CompileCtx) {
    for svc in &input.topo.services {
        if input.uplinks.len(svc.via) == 0 {
            warn!(
                ctx.log, "no uplink for service route";
                "service" => &svc.name, "via" => %svc.via
            );
            continue;
        }
        if svc.dst.is_empty() && svc.dst_port.is_none() {
            warn!(
                ctx.log, "service route matches everything, skipping";
                "service" => &svc.name
            );
            continue;
        }

        let list = svc.address_list();
        for dst in &svc.dst {
            frag.push(
                Section::ADDRESS_LIST,
                Command::add().arg("address", dst).arg("list", &list),
            );
        }

        let mut rule = MangleRule::mark_routing(
            Chain::Prerouting,
            &svc.via.table(),
        )
        .in_interface_list(super::base::LAN_LIST);
        if !svc.dst.is_empty() {
            rule = rule.arg("dst-address-list", &list);
        }
        if let Some(protocol) = &svc.protocol {
            rule = rule.arg("protocol", protocol);
        }
        if let Some(port) = &svc.dst_port {
            rule = rule.arg("dst-port", port);
        }
        frag.push_mangle(
            rule.passthrough(false)
                .comment(format!("{} {}", tag::SERVICE, svc.name)),
        );
    }
}

fn split(frag: &mut Fragment, input: &Input, ctx: &CompileCtx) {
    let Some(net) = input.nets.iter().find(|n| n.kind == NetworkKind::Split)
    else {
        return;
    };
    let list = &input.cfg.domestic_address_list;

    for (class, dst) in [
        (UplinkClass::Domestic, list.clone()),
        (UplinkClass::Foreign, format!("!{list}")),
    ] {
        if input.uplinks.len(class) == 0 {
            warn!(
                ctx.log, "split network has no uplink for class";
                "class" => %class
            );
            continue;
        }
        frag.push_mangle(
            MangleRule::mark_routing(Chain::Prerouting, &class.table())
                .in_interface(&net.bridge)
                .arg("dst-address-list", dst)
                .passthrough(false)
                .comment(format!("{} {class}", tag::SPLIT)),
        );
    }
}

fn network_marks(frag: &mut Fragment, input: &Input, ctx: &CompileCtx) {
    let balanced = input.lb_network().map(|n| n.name.as_str());

    for net in input.nets {
        let Some(table) = net.table() else {
            continue;
        };
        if balanced == Some(net.name.as_str()) {
            debug!(ctx.log, "network is load balanced"; "network" => &net.name);
            continue;
        }
        if net.uplink.is_none() {
            if let Some(class) = net.kind.class() {
                if input.uplinks.len(class) == 0 {
                    warn!(
                        ctx.log, "network has no uplink";
                        "network" => &net.name, "class" => %class
                    );
                    continue;
                }
            }
        }

        frag.push_mangle(
            MangleRule::mark_routing(Chain::Prerouting, &table)
                .in_interface(&net.bridge)
                .passthrough(false)
                .comment(format!("Route {}", net.name)),
        );
    }
}

// Connections arriving on a WAN link must answer through it, whatever
// the class routing says.
fn reply_via(
    frag: &mut Fragment,
    u: &Uplink,
    mark: &str,
    protocol: &str,
    port: u16,
    comment: &str,
) {
    frag.push_mangle(
        MangleRule::mark_connection(Chain::Input, mark)
            .in_interface(&u.interface)
            .connection_mark(NO_MARK)
            .arg("protocol", protocol)
            .arg("dst-port", port)
            .passthrough(true)
            .comment(comment),
    );
    frag.push_mangle(
        MangleRule::mark_routing(Chain::Output, &u.table())
            .connection_mark(mark)
            .passthrough(false)
            .comment(comment),
    );
}

fn inbound(frag: &mut Fragment, input: &Input, ctx: &CompileCtx) {
    let inbound = &input.topo.inbound;

    for u in input.uplinks.wan() {
        if let Some(port) = inbound.ssh_port {
            let mark = format!("ssh-{}", u.name);
            let comment = format!("{} {}", tag::SSH, u.name);
            reply_via(frag, u, &mark, "tcp", port, &comment);
        }

        for srv in &inbound.vpn_servers {
            let mark = format!("vpns-{}-{}", srv.name, u.name);
            let comment =
                format!("{} {} {}", tag::VPN_SERVER, srv.name, u.name);
            reply_via(frag, u, &mark, &srv.protocol, srv.port, &comment);
        }
    }

    debug!(
        ctx.log, "inbound";
        "ssh" => inbound.ssh_port.is_some(),
        "vpn_servers" => inbound.vpn_servers.len()
    );
}
