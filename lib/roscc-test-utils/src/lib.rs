// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Common routines for integration tests.

// This type of pedantry is more trouble than it's worth here.
#![allow(dead_code)]

use roscc::engine::cmd::Command;
use roscc::engine::cmd::Section;
use slog::Drain;
use slog::Logger;
use slog::o;

pub use roscc::engine::mangle::MangleMeta;
pub use roscc::engine::mangle::Tier;
pub use roscc::engine::merge::CompiledConfig;
pub use star_router::CompileError;
pub use star_router::api::*;
pub use star_router::cfg::CompileCfg;
pub use star_router::compile;

/// A logger writing through the test harness's captured stdout,
/// filtered by `RUST_LOG`.
pub fn test_logger() -> Logger {
    let decorator =
        slog_term::PlainSyncDecorator::new(slog_term::TestStdoutWriter);
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_envlogger::new(drain);
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, o!("unit" => "test"))
}

pub fn wan(name: &str, iface: &str, gw: [u8; 4]) -> WanLink {
    WanLink {
        name: name.into(),
        interface: iface.into(),
        gateway: Gateway::Addr(Ipv4Addr::from(gw)),
        priority: None,
        weight: 1,
    }
}

pub fn vpn(name: &str) -> VpnClient {
    VpnClient {
        name: name.into(),
        interface: None,
        endpoint: None,
        priority: None,
        weight: 1,
    }
}

pub fn subnet(cidr: &str) -> Option<SubnetCfg> {
    Some(SubnetCfg {
        cidr: cidr.parse().unwrap(),
        layout: AddrLayout::Standard,
    })
}

/// Two foreign links balanced with PCC over the foreign network.
pub fn two_foreign_pcc() -> Topology {
    let mut topo = Topology::default();
    topo.wan.foreign = vec![
        wan("wan1", "ether1", [10, 1, 0, 1]),
        wan("wan2", "ether2", [10, 2, 0, 1]),
    ];
    topo.subnets.base.foreign = subnet("192.168.30.0/24");
    topo.load_balance = Some(LoadBalance {
        method: LbMethod::Pcc,
        network: NetworkKind::Foreign,
        class: UplinkClass::Foreign,
    });
    topo
}

/// Every class, every base network, a service route, inbound SSH and a
/// trunk.
pub fn full_star() -> Topology {
    let mut topo = Topology::default();
    topo.wan.domestic = vec![wan("dom1", "ether1", [10, 1, 0, 1])];
    topo.wan.foreign = vec![
        wan("wan1", "ether2", [10, 2, 0, 1]),
        wan("wan2", "ether3", [10, 3, 0, 1]),
    ];
    let mut wg = vpn("wg1");
    wg.endpoint = Some(Ipv4Addr::from([203, 0, 113, 7]));
    topo.vpn_clients.wireguard = vec![wg];
    topo.vpn_clients.openvpn = vec![vpn("ovpn1")];
    topo.subnets.base = BaseSubnets {
        split: subnet("192.168.10.0/24"),
        domestic: subnet("192.168.20.0/24"),
        foreign: subnet("192.168.30.0/24"),
        vpn: subnet("192.168.40.0/24"),
    };
    topo.trunk = Some(Trunk { interface: "ether5".into() });
    topo.services = vec![ServiceRoute {
        name: "games".into(),
        dst: vec!["198.51.100.0/24".parse().unwrap()],
        protocol: Some("udp".into()),
        dst_port: None,
        via: UplinkClass::Domestic,
    }];
    topo.inbound.ssh_port = Some(2222);
    topo.load_balance = Some(LoadBalance::default());
    topo
}

/// Compile `topo` with the default configuration.
pub fn compile_default(topo: &Topology) -> CompiledConfig {
    compile(topo, &CompileCfg::default(), &test_logger())
        .unwrap_or_else(|e| panic!("compile failed: {e}"))
}

/// The comment of every mangle rule, in final order.
pub fn mangle_comments(cfg: &CompiledConfig) -> Vec<String> {
    cfg.mangle_meta()
        .iter()
        .map(|m| m.comment.clone().unwrap_or_default())
        .collect()
}

/// The commands of `section`, parsed back.
pub fn commands(cfg: &CompiledConfig, section: &Section) -> Vec<Command> {
    cfg.get(section).iter().map(|l| Command::parse(l)).collect()
}

/// Assert that every mangle rule matching on a connection mark comes
/// after a rule setting it.
pub fn assert_marks_set_before_use(cfg: &CompiledConfig) {
    let mut set = std::collections::BTreeSet::new();
    for (idx, meta) in cfg.mangle_meta().iter().enumerate() {
        if meta.conn_mark.matches_set_mark() {
            let mark = meta.conn_mark.matches.as_deref().unwrap_or_default();
            assert!(
                set.contains(mark),
                "mangle rule {idx} matches {mark} before it is set: {:?}",
                cfg.get(&Section::MANGLE).get(idx)
            );
        }
        if let Some(mark) = &meta.conn_mark.sets {
            set.insert(mark.clone());
        }
    }
}
