// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! VLAN/trunk wiring.
//!
//! Each network is tagged on the trunk with the third octet of its
//! subnet as VLAN id, so `192.168.30.0/24` travels as VLAN 30.

use super::Input;
use super::network::Network;
use roscc::engine::CompileCtx;
use roscc::engine::cmd::Command;
use roscc::engine::cmd::Section;
use roscc::engine::fragment::Fragment;
use slog::debug;
use slog::warn;
use std::collections::BTreeMap;

/// The VLAN id of `net`.
pub fn vlan_id(net: &Network) -> u16 {
    u16::from(net.cidr.ip().bytes()[2])
}

pub fn vlan_name(id: u16, trunk: &str, net: &Network) -> String {
    format!("VLAN{id}-{trunk}-{}", net.name)
}

/// Emit a VLAN interface on the trunk and a bridge port for every
/// network.
///
/// VLAN id 0 is reserved for priority tagging, so networks landing on
/// it are skipped, as is every network after the first to claim an id.
pub fn gen_vlan(input: &Input, ctx: &CompileCtx) -> Fragment {
    let mut frag = Fragment::new();
    let Some(trunk) = &input.topo.trunk else {
        return frag;
    };
    let trunk = trunk.interface.as_str();
    let mut claimed: BTreeMap<u16, &str> = BTreeMap::new();

    for net in input.nets {
        let id = vlan_id(net);
        if id == 0 {
            warn!(
                ctx.log, "VLAN id 0 is reserved, skipping network";
                "network" => &net.name, "cidr" => %net.cidr
            );
            continue;
        }
        if let Some(owner) = claimed.get(&id) {
            warn!(
                ctx.log, "VLAN id already in use, skipping network";
                "network" => &net.name, "vlan" => id, "owner" => *owner
            );
            continue;
        }
        claimed.insert(id, &net.name);

        let name = vlan_name(id, trunk, net);
        frag.push(
            Section::VLAN,
            Command::add()
                .arg("name", &name)
                .arg("interface", trunk)
                .arg("vlan-id", id)
                .comment(&net.name),
        );
        frag.push(
            Section::BRIDGE_PORT,
            Command::add().arg("bridge", &net.bridge).arg("interface", &name),
        );
        debug!(ctx.log, "VLAN"; "network" => &net.name, "vlan" => id);
    }

    frag
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::Trunk;
    use crate::engine::test_input::Fixture;
    use crate::engine::test_input::lines;
    use crate::engine::test_input::subnet;
    use crate::engine::test_input::topology;

    #[test]
    fn no_trunk_no_vlans() {
        assert!(Fixture::new(topology()).run(gen_vlan).is_empty());
    }

    #[test]
    fn third_octet_ids() {
        let mut topo = topology();
        topo.trunk = Some(Trunk { interface: "sfp1".into() });
        topo.subnets.base.vpn = None;
        let frag = Fixture::new(topo).run(gen_vlan);

        assert_eq!(
            lines(&frag, &Section::VLAN),
            [
                "add name=VLAN10-sfp1-Split interface=sfp1 vlan-id=10 \
                 comment=Split",
                "add name=VLAN20-sfp1-Domestic interface=sfp1 vlan-id=20 \
                 comment=Domestic",
                "add name=VLAN30-sfp1-Foreign interface=sfp1 vlan-id=30 \
                 comment=Foreign",
            ]
        );
        assert_eq!(
            lines(&frag, &Section::BRIDGE_PORT)[0],
            "add bridge=LANBridgeSplit interface=VLAN10-sfp1-Split"
        );
    }

    #[test]
    fn reserved_and_duplicate_ids() {
        let mut topo = topology();
        topo.trunk = Some(Trunk { interface: "ether5".into() });
        topo.subnets.base.split = subnet("10.0.0.0/24");
        topo.subnets.base.vpn = subnet("172.16.30.0/24");
        let frag = Fixture::new(topo).run(gen_vlan);

        let names: Vec<_> = frag
            .get(&Section::VLAN)
            .iter()
            .map(|e| Command::parse(e.text()))
            .filter_map(|c| c.get("name").map(str::to_string))
            .collect();
        assert_eq!(names, ["VLAN20-ether5-Domestic", "VLAN30-ether5-Foreign"]);
        assert_eq!(frag.get(&Section::BRIDGE_PORT).len(), 2);
    }
}
