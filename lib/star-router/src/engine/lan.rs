// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! LAN bridges, addressing and DHCP.

use super::Input;
use super::base::LAN_LIST;
use crate::api::Ipv4Range;
use roscc::engine::CompileCtx;
use roscc::engine::cmd::Command;
use roscc::engine::cmd::Section;
use roscc::engine::fragment::Fragment;
use slog::debug;

/// Emit a bridge per network, its gateway address and, when the block
/// leaves room for one, a DHCP server.
pub fn gen_lan(input: &Input, ctx: &CompileCtx) -> Fragment {
    let mut frag = Fragment::new();

    for net in input.nets {
        let gw = net.gateway;
        frag.push(
            Section::INTERFACE_BRIDGE,
            Command::add().arg("name", &net.bridge).comment(&net.name),
        );
        frag.push(
            Section::INTERFACE_LIST_MEMBER,
            Command::add()
                .arg("interface", &net.bridge)
                .arg("list", LAN_LIST),
        );
        frag.push(
            Section::ADDRESS,
            Command::add()
                .arg("address", format!("{gw}/{}", net.cidr.prefix_len()))
                .arg("interface", &net.bridge)
                .arg("network", net.cidr.ip())
                .comment(&net.name),
        );

        let range =
            net.layout.dhcp_range(net.cidr).unwrap_or(Ipv4Range::EMPTY);
        if range.is_empty() {
            debug!(ctx.log, "no DHCP range"; "network" => &net.name);
            continue;
        }

        let pool = format!("{}-pool", net.name);
        frag.push(
            Section::POOL,
            Command::add().arg("name", &pool).arg("ranges", range),
        );
        frag.push(
            Section::DHCP_SERVER,
            Command::add()
                .arg("name", format!("{}-dhcp", net.name))
                .arg("interface", &net.bridge)
                .arg("address-pool", &pool)
                .arg("lease-time", input.cfg.dhcp_lease),
        );
        frag.push(
            Section::DHCP_NETWORK,
            Command::add()
                .arg("address", net.cidr)
                .arg("gateway", gw)
                .arg("dns-server", gw)
                .comment(&net.name),
        );
        debug!(
            ctx.log, "LAN network";
            "network" => &net.name, "gateway" => %gw
        );
    }

    frag
}
