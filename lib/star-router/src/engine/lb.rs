// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Load balancing one network across the uplinks of a class.
//!
//! Both algorithms mark a new connection once and route every later
//! packet of it by that mark, so the rules of one uplink form a group:
//!
//! ```text
//! prerouting  mark-connection  in-interface=<uplink>   replies come back
//! prerouting  mark-connection  in-interface=<bridge>   bucket or counter
//! output      mark-routing     connection-mark=<mark>
//! prerouting  mark-routing     connection-mark=<mark>
//! ```
//!
//! The sorter keeps every rule that sets a mark above every rule that
//! matches on it, whatever the group order.

use super::Input;
use super::network::Network;
use super::route;
use super::uplink::Uplink;
use super::uplink::UplinkAlloc;
use crate::CompileError;
use crate::api::LbMethod;
use crate::api::NetworkKind;
use crate::api::Topology;
use roscc::engine::CompileCtx;
use roscc::engine::cmd::Section;
use roscc::engine::fragment::Fragment;
use roscc::engine::mangle::Chain;
use roscc::engine::mangle::LbTag;
use roscc::engine::mangle::MangleRule;
use roscc::engine::mangle::NO_MARK;
use slog::debug;
use slog::warn;

/// The per-connection classifier matches on both ends of the flow.
pub const PCC_CLASSIFIER: &str = "both-addresses-and-ports";

/// The connection and routing mark of `u` under `tag`, which is also
/// the name of its routing table.
pub fn lb_mark(tag: LbTag, u: &Uplink) -> String {
    format!("{}-{}", tag.tag().to_lowercase(), u.name)
}

/// The largest PCC weight. An uplink takes one classifier rule per unit
/// of weight.
pub const MAX_WEIGHT: u32 = 64;

/// Refuse a PCC configuration whose balanced uplinks carry a weight
/// above [`MAX_WEIGHT`].
pub fn check_weights(
    topo: &Topology,
    uplinks: &UplinkAlloc,
) -> Result<(), CompileError> {
    let Some(lb) = &topo.load_balance else {
        return Ok(());
    };
    if !matches!(lb.method, LbMethod::Pcc) {
        return Ok(());
    }

    match uplinks.uplinks(lb.class).iter().find(|u| u.weight > MAX_WEIGHT) {
        Some(u) => Err(CompileError::WeightTooLarge {
            uplink: u.name.clone(),
            weight: u.weight,
            max: MAX_WEIGHT,
        }),
        None => Ok(()),
    }
}

fn group_comment(tag: LbTag, u: &Uplink) -> String {
    format!("{tag} {}", u.name)
}

/// Emit the load-balancing rules, tables and routes for the configured
/// network, if any.
pub fn gen_lb(input: &Input, ctx: &CompileCtx) -> Fragment {
    let mut frag = Fragment::new();
    let Some(lb) = &input.topo.load_balance else {
        return frag;
    };
    if lb.network == NetworkKind::Split {
        warn!(ctx.log, "the split network cannot be load balanced");
        return frag;
    }
    let uplinks = input.uplinks.uplinks(lb.class);
    if uplinks.is_empty() {
        warn!(ctx.log, "no uplinks to balance across"; "class" => %lb.class);
        return frag;
    }
    let Some(net) = input.lb_network() else {
        warn!(
            ctx.log, "load-balanced network does not exist";
            "network" => %lb.network
        );
        return frag;
    };

    match lb.method {
        LbMethod::Pcc => pcc(&mut frag, input, net, uplinks),
        LbMethod::Nth => nth(&mut frag, input, net, uplinks),
    }

    debug!(
        ctx.log, "load balancing";
        "method" => %lb.method,
        "network" => &net.name,
        "class" => %lb.class,
        "uplinks" => uplinks.len()
    );
    frag
}

// The connection from a LAN host that no rule has claimed yet.
fn new_from(net: &Network, input: &Input, mark: &str) -> MangleRule {
    MangleRule::mark_connection(Chain::Prerouting, mark)
        .in_interface(&net.bridge)
        .connection_mark(NO_MARK)
        .arg("connection-state", "new")
        .arg(
            "dst-address-list",
            format!("!{}", input.cfg.local_address_list),
        )
}

/// Per-connection classifier buckets: the hash space is cut into as
/// many buckets as the weights add up to and each uplink takes
/// `weight` consecutive buckets. A weight of 0 counts as 1; weights
/// are bounded by [`check_weights`] before any rule is generated.
pub fn pcc(
    frag: &mut Fragment,
    input: &Input,
    net: &Network,
    uplinks: &[Uplink],
) {
    let total: u64 = uplinks.iter().map(|u| u64::from(u.weight.max(1))).sum();
    let mut bucket = 0;

    for u in uplinks {
        let mark = lb_mark(LbTag::Pcc, u);
        let comment = group_comment(LbTag::Pcc, u);

        frag.push_mangle(inbound(u, &mark, &comment));
        for _ in 0..u.weight.max(1) {
            frag.push_mangle(
                new_from(net, input, &mark)
                    .arg(
                        "per-connection-classifier",
                        format!("{PCC_CLASSIFIER}:{total}/{bucket}"),
                    )
                    .passthrough(true)
                    .comment(&comment),
            );
            bucket += 1;
        }
        route_by_mark(frag, net, u, &mark, &comment);
    }
}

/// Round-robin counters: of every N new connections, the k-th goes to
/// the k-th uplink. Weights do not apply.
pub fn nth(
    frag: &mut Fragment,
    input: &Input,
    net: &Network,
    uplinks: &[Uplink],
) {
    let every = u32::try_from(uplinks.len()).unwrap_or(u32::MAX);

    for (k, u) in (1..=every).zip(uplinks) {
        let mark = lb_mark(LbTag::Nth, u);
        let comment = group_comment(LbTag::Nth, u);

        frag.push_mangle(inbound(u, &mark, &comment));
        frag.push_mangle(
            new_from(net, input, &mark)
                .nth(every, k)
                .passthrough(true)
                .comment(&comment),
        );
        route_by_mark(frag, net, u, &mark, &comment);
    }
}

// Connections opened from outside through `u` stay on `u`.
fn inbound(u: &Uplink, mark: &str, comment: &str) -> MangleRule {
    MangleRule::mark_connection(Chain::Prerouting, mark)
        .in_interface(&u.interface)
        .connection_mark(NO_MARK)
        .passthrough(true)
        .comment(comment)
}

fn route_by_mark(
    frag: &mut Fragment,
    net: &Network,
    u: &Uplink,
    mark: &str,
    comment: &str,
) {
    frag.push_mangle(
        MangleRule::mark_routing(Chain::Output, mark)
            .connection_mark(mark)
            .passthrough(false)
            .comment(comment),
    );
    frag.push_mangle(
        MangleRule::mark_routing(Chain::Prerouting, mark)
            .connection_mark(mark)
            .in_interface(&net.bridge)
            .passthrough(false)
            .comment(comment),
    );
    frag.push(Section::ROUTING_TABLE, route::table(mark));
    frag.push(
        Section::ROUTE,
        route::recursive_route(Some(mark), u.probe, 1).comment(comment),
    );
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::LoadBalance;
    use crate::api::UplinkClass;
    use crate::engine::test_input::Fixture;
    use crate::engine::test_input::lines;
    use crate::engine::test_input::topology;
    use roscc::engine::mangle::SubRank;
    use roscc::engine::mangle::Tier;

    fn balanced(method: LbMethod) -> Fixture {
        let mut topo = topology();
        topo.load_balance = Some(LoadBalance {
            method,
            network: NetworkKind::Foreign,
            class: UplinkClass::Foreign,
        });
        Fixture::new(topo)
    }

    fn with_comment(frag: &Fragment, comment: &str) -> Vec<String> {
        frag.get(&Section::MANGLE)
            .iter()
            .filter(|e| {
                e.mangle().and_then(|m| m.comment.as_deref()) == Some(comment)
            })
            .map(|e| e.text().to_string())
            .collect()
    }

    #[test]
    fn off_by_default() {
        assert!(Fixture::new(topology()).run(gen_lb).is_empty());
    }

    #[test]
    fn pcc_groups() {
        let frag = balanced(LbMethod::Pcc).run(gen_lb);

        let wan2 = with_comment(&frag, "PCC wan2");
        assert_eq!(
            wan2,
            [
                "add action=mark-connection chain=prerouting \
                 new-connection-mark=pcc-wan2 in-interface=ether3 \
                 connection-mark=no-mark passthrough=yes comment=\"PCC wan2\"",
                "add action=mark-connection chain=prerouting \
                 new-connection-mark=pcc-wan2 in-interface=LANBridgeForeign \
                 connection-mark=no-mark connection-state=new \
                 dst-address-list=!LOCAL-IP \
                 per-connection-classifier=both-addresses-and-ports:2/1 \
                 passthrough=yes comment=\"PCC wan2\"",
                "add action=mark-routing chain=output \
                 new-routing-mark=pcc-wan2 connection-mark=pcc-wan2 \
                 passthrough=no comment=\"PCC wan2\"",
                "add action=mark-routing chain=prerouting \
                 new-routing-mark=pcc-wan2 connection-mark=pcc-wan2 \
                 in-interface=LANBridgeForeign passthrough=no \
                 comment=\"PCC wan2\"",
            ]
        );
        assert_eq!(
            lines(&frag, &Section::ROUTING_TABLE),
            ["add fib name=pcc-wan1", "add fib name=pcc-wan2"]
        );
        assert_eq!(
            lines(&frag, &Section::ROUTE),
            [
                "add dst-address=0.0.0.0/0 gateway=8.8.8.8 \
                 routing-table=pcc-wan1 distance=1 check-gateway=ping \
                 target-scope=11 comment=\"PCC wan1\"",
                "add dst-address=0.0.0.0/0 gateway=1.1.1.1 \
                 routing-table=pcc-wan2 distance=1 check-gateway=ping \
                 target-scope=11 comment=\"PCC wan2\"",
            ]
        );

        let metas: Vec<_> = frag
            .get(&Section::MANGLE)
            .iter()
            .filter_map(|e| e.mangle())
            .collect();
        assert!(metas.iter().all(|m| m.tier() == Tier::Network));
        assert!(metas.iter().all(|m| m.lb == Some(LbTag::Pcc)));
    }

    #[test]
    fn pcc_weights_partition_buckets() {
        let mut topo = balanced(LbMethod::Pcc).topo;
        topo.wan.foreign[0].weight = 3;
        topo.wan.foreign[1].weight = 0;
        let frag = Fixture::new(topo).run(gen_lb);

        let buckets: Vec<String> = frag
            .get(&Section::MANGLE)
            .iter()
            .filter_map(|e| {
                e.text()
                    .split(' ')
                    .find_map(|t| t.strip_prefix("per-connection-classifier="))
                    .map(str::to_string)
            })
            .collect();
        assert_eq!(
            buckets,
            [
                "both-addresses-and-ports:4/0",
                "both-addresses-and-ports:4/1",
                "both-addresses-and-ports:4/2",
                "both-addresses-and-ports:4/3",
            ]
        );
        assert_eq!(with_comment(&frag, "PCC wan2").len(), 4);
    }

    #[test]
    fn oversized_weights() {
        let mut fix = balanced(LbMethod::Pcc);
        fix.topo.wan.foreign[0].weight = u32::MAX;
        fix.topo.wan.foreign[1].weight = 2;
        let fix = Fixture::new(fix.topo);
        assert_eq!(
            check_weights(&fix.topo, &fix.uplinks),
            Err(CompileError::WeightTooLarge {
                uplink: "wan1".into(),
                weight: u32::MAX,
                max: MAX_WEIGHT,
            })
        );

        // NTH ignores weights, and so do unbalanced classes.
        let mut nth = fix.topo.clone();
        if let Some(lb) = nth.load_balance.as_mut() {
            lb.method = LbMethod::Nth;
        }
        assert_eq!(check_weights(&nth, &fix.uplinks), Ok(()));
        let mut off = fix.topo.clone();
        off.load_balance = None;
        assert_eq!(check_weights(&off, &fix.uplinks), Ok(()));

        let mut fix = balanced(LbMethod::Pcc);
        fix.topo.wan.foreign[0].weight = MAX_WEIGHT;
        let fix = Fixture::new(fix.topo);
        assert_eq!(check_weights(&fix.topo, &fix.uplinks), Ok(()));
        assert_eq!(with_comment(&fix.run(gen_lb), "PCC wan1").len(), 67);
    }

    #[test]
    fn nth_counters() {
        let frag = balanced(LbMethod::Nth).run(gen_lb);

        let counters: Vec<_> = frag
            .get(&Section::MANGLE)
            .iter()
            .filter(|e| e.mangle().map(|m| m.sub_rank()) == Some(SubRank::Nth))
            .map(|e| e.text().to_string())
            .collect();
        assert_eq!(counters.len(), 2);
        assert!(counters[0].contains("nth=2,1"));
        assert!(counters[0].contains("new-connection-mark=nth-wan1"));
        assert!(counters[1].contains("nth=2,2"));
        assert_eq!(with_comment(&frag, "NTH wan1").len(), 4);
        assert_eq!(
            lines(&frag, &Section::ROUTING_TABLE),
            ["add fib name=nth-wan1", "add fib name=nth-wan2"]
        );
    }

    #[test]
    fn nothing_to_balance() {
        let mut fix = balanced(LbMethod::Pcc);
        fix.topo.wan.foreign.clear();
        assert!(Fixture::new(fix.topo).run(gen_lb).is_empty());

        let mut fix = balanced(LbMethod::Nth);
        fix.topo.subnets.base.foreign = None;
        assert!(Fixture::new(fix.topo).run(gen_lb).is_empty());

        let mut fix = balanced(LbMethod::Pcc);
        fix.topo.load_balance = Some(LoadBalance {
            method: LbMethod::Pcc,
            network: NetworkKind::Split,
            class: UplinkClass::Foreign,
        });
        assert!(Fixture::new(fix.topo).run(gen_lb).is_empty());
    }

    #[test]
    fn other_class() {
        let mut fix = balanced(LbMethod::Pcc);
        fix.topo.load_balance = Some(LoadBalance {
            method: LbMethod::Pcc,
            network: NetworkKind::Vpn,
            class: UplinkClass::Domestic,
        });
        let frag = Fixture::new(fix.topo).run(gen_lb);
        let group = with_comment(&frag, "PCC dom1");
        assert_eq!(group.len(), 4);
        assert!(group[1].contains("in-interface=LANBridgeVPN"));
        assert!(group[1].contains("both-addresses-and-ports:1/0"));
    }
}
