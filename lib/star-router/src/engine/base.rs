// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The base configuration every other generator relies on.

use super::Input;
use roscc::engine::CompileCtx;
use roscc::engine::cmd::Command;
use roscc::engine::cmd::Section;
use roscc::engine::fragment::Fragment;
use roscc::engine::mangle::Chain;
use roscc::engine::mangle::MangleRule;
use slog::debug;

pub const WAN_LIST: &str = "WAN";
pub const LAN_LIST: &str = "LAN";

/// The private ranges that make up the local address list.
pub const LOCAL_RANGES: [&str; 3] =
    ["192.168.0.0/16", "172.16.0.0/12", "10.0.0.0/8"];

const ACCEPT_CHAINS: [Chain; 5] = [
    Chain::Prerouting,
    Chain::Postrouting,
    Chain::Output,
    Chain::Input,
    Chain::Forward,
];

/// Emit the interface lists, the local address list, the accept rules
/// for local-to-local traffic and masquerading on the WAN list.
pub fn gen_base(input: &Input, ctx: &CompileCtx) -> Fragment {
    let mut frag = Fragment::new();
    if input.uplinks.is_empty() && input.nets.is_empty() {
        return frag;
    }

    let local = &input.cfg.local_address_list;

    for list in [WAN_LIST, LAN_LIST] {
        frag.push(Section::INTERFACE_LIST, Command::add().arg("name", list));
    }

    for u in input.uplinks.all() {
        frag.push(
            Section::INTERFACE_LIST_MEMBER,
            Command::add()
                .arg("interface", &u.interface)
                .arg("list", WAN_LIST)
                .comment(&u.name),
        );
    }

    for range in LOCAL_RANGES {
        frag.push(
            Section::ADDRESS_LIST,
            Command::add().arg("address", range).arg("list", local),
        );
    }

    for chain in ACCEPT_CHAINS {
        frag.push_mangle(
            MangleRule::accept(chain)
                .arg("src-address-list", local)
                .arg("dst-address-list", local)
                .comment("Accept local"),
        );
    }

    frag.push(
        Section::NAT,
        Command::add()
            .arg("action", "masquerade")
            .arg("chain", "srcnat")
            .arg("out-interface-list", WAN_LIST)
            .comment("Masquerade WAN"),
    );

    debug!(
        ctx.log, "base config";
        "wan_members" => input.uplinks.all().count()
    );
    frag
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::Topology;
    use crate::engine::test_input::Fixture;
    use crate::engine::test_input::lines;
    use crate::engine::test_input::topology;
    use roscc::engine::mangle::Tier;

    #[test]
    fn empty_topology_emits_nothing() {
        let frag = Fixture::new(Topology::default()).run(gen_base);
        assert!(frag.is_empty());
    }

    #[test]
    fn lists_and_accepts() {
        let frag = Fixture::new(topology()).run(gen_base);

        assert_eq!(
            lines(&frag, &Section::INTERFACE_LIST),
            ["add name=WAN", "add name=LAN"]
        );
        let members = lines(&frag, &Section::INTERFACE_LIST_MEMBER);
        assert_eq!(
            members,
            [
                "add interface=ether1 list=WAN comment=dom1",
                "add interface=ether2 list=WAN comment=wan1",
                "add interface=ether3 list=WAN comment=wan2",
                "add interface=wireguard-client-wg1 list=WAN comment=wg1",
            ]
        );
        assert_eq!(
            lines(&frag, &Section::ADDRESS_LIST)[2],
            "add address=10.0.0.0/8 list=LOCAL-IP"
        );

        let mangle = frag.get(&Section::MANGLE);
        assert_eq!(mangle.len(), 5);
        assert!(
            mangle
                .iter()
                .all(|e| e.mangle().map(|m| m.tier()) == Some(Tier::Accept))
        );
        assert_eq!(
            lines(&frag, &Section::NAT),
            ["add action=masquerade chain=srcnat out-interface-list=WAN \
              comment=\"Masquerade WAN\""]
        );
    }
}
