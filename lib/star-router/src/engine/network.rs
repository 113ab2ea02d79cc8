// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! LAN networks, flattened out of the topology's subnets.

use super::uplink::Uplink;
use super::uplink::UplinkAlloc;
use crate::CompileError;
use crate::api::AddrLayout;
use crate::api::Ipv4Addr;
use crate::api::Ipv4Cidr;
use crate::api::NamedSubnet;
use crate::api::NetworkKind;
use crate::api::SubnetCfg;
use crate::api::Subnets;
use crate::api::allocate_vlsm;
use std::collections::BTreeSet;

/// One LAN network with its addressing settled.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Network {
    pub name: String,
    pub kind: NetworkKind,
    pub bridge: String,
    pub cidr: Ipv4Cidr,
    pub layout: AddrLayout,
    /// The router's own address on the bridge.
    pub gateway: Ipv4Addr,
    /// Routed through this uplink rather than the kind's class.
    pub uplink: Option<String>,
    /// One of the four base networks.
    pub base: bool,
}

impl Network {
    /// The routing table this network's traffic is marked into, `None`
    /// for the split network.
    pub fn table(&self) -> Option<String> {
        match &self.uplink {
            Some(uplink) => Some(format!("to-{uplink}")),
            None => self.kind.class().map(|c| c.table()),
        }
    }

    /// The uplink whose probe answers this network's DNS: the bound
    /// uplink, or else the first uplink of the DNS class.
    pub fn dns_uplink<'a>(
        &self,
        alloc: &'a UplinkAlloc,
    ) -> Option<&'a Uplink> {
        match &self.uplink {
            Some(name) => alloc.get(name),
            None => alloc.uplinks(self.kind.dns_class()).first(),
        }
    }
}

// Every generator assumes a network has a bridge with an address on it,
// so a block without room for the gateway is refused here.
fn gateway(
    name: &str,
    cidr: Ipv4Cidr,
    layout: AddrLayout,
) -> Result<Ipv4Addr, CompileError> {
    layout
        .gateway(cidr)
        .ok_or_else(|| CompileError::NoGateway { network: name.into(), cidr })
}

fn base_network(
    kind: NetworkKind,
    cfg: &SubnetCfg,
) -> Result<Network, CompileError> {
    let name = kind.to_string();
    Ok(Network {
        gateway: gateway(&name, cfg.cidr, cfg.layout)?,
        name,
        kind,
        bridge: format!("LANBridge{kind}"),
        cidr: cfg.cidr,
        layout: cfg.layout,
        uplink: None,
        base: true,
    })
}

/// Flatten `subnets` into networks: the base networks in split,
/// domestic, foreign, VPN order, then the additional domestic, foreign
/// and VPN-client networks in declaration order.
///
/// Additional networks declared by host count are carved out of
/// [`Subnets::pool`], largest first. A network whose block leaves no
/// room for a gateway address is an error.
pub fn networks(
    subnets: &Subnets,
    alloc: &UplinkAlloc,
) -> Result<Vec<Network>, CompileError> {
    let base = &subnets.base;
    let mut nets: Vec<Network> = [
        (NetworkKind::Split, &base.split),
        (NetworkKind::Domestic, &base.domestic),
        (NetworkKind::Foreign, &base.foreign),
        (NetworkKind::Vpn, &base.vpn),
    ]
    .into_iter()
    .filter_map(|(kind, cfg)| cfg.as_ref().map(|cfg| base_network(kind, cfg)))
    .collect::<Result<_, _>>()?;

    let extra: Vec<(NetworkKind, &NamedSubnet)> = subnets
        .domestic
        .iter()
        .map(|s| (NetworkKind::Domestic, s))
        .chain(subnets.foreign.iter().map(|s| (NetworkKind::Foreign, s)))
        .chain(subnets.vpn_client.iter().map(|s| (NetworkKind::Vpn, s)))
        .collect();

    let planned = plan(subnets, &extra)?;

    for ((kind, s), cidr) in extra.into_iter().zip(planned) {
        let uplink = match (kind, &s.uplink) {
            (_, Some(uplink)) => Some(uplink.clone()),
            (NetworkKind::Vpn, None) => Some(s.name.clone()),
            _ => None,
        };
        if let Some(name) = &uplink {
            if alloc.get(name).is_none() {
                return Err(CompileError::UnknownUplink {
                    network: s.name.clone(),
                    uplink: name.clone(),
                });
            }
        }

        nets.push(Network {
            name: s.name.clone(),
            kind,
            bridge: format!("LANBridge{kind}-{}", s.name),
            cidr,
            layout: s.layout,
            gateway: gateway(&s.name, cidr, s.layout)?,
            uplink,
            base: false,
        });
    }

    let mut seen = BTreeSet::new();
    for net in &nets {
        if !seen.insert(net.name.as_str()) {
            return Err(CompileError::DuplicateNetwork(net.name.clone()));
        }
    }

    Ok(nets)
}

// The block of every additional network, index for index.
fn plan(
    subnets: &Subnets,
    extra: &[(NetworkKind, &NamedSubnet)],
) -> Result<Vec<Ipv4Cidr>, CompileError> {
    let mut blocks: Vec<Option<Ipv4Cidr>> =
        extra.iter().map(|(_, s)| s.cidr).collect();

    // Largest first, ties in declaration order, matching the order the
    // planner hands blocks out.
    let mut wanted: Vec<(usize, u64)> = extra
        .iter()
        .enumerate()
        .filter(|(_, (_, s))| s.cidr.is_none())
        .map(|(i, (_, s))| match s.hosts {
            Some(hosts) => Ok((i, hosts)),
            None => Err(CompileError::Unplanned(s.name.clone())),
        })
        .collect::<Result<_, _>>()?;

    if let Some(&(i, _)) = wanted.first() {
        let Some(pool) = subnets.pool else {
            return Err(CompileError::Unplanned(extra[i].1.name.clone()));
        };

        wanted.sort_by(|a, b| b.1.cmp(&a.1));
        let hosts: Vec<u64> = wanted.iter().map(|(_, h)| *h).collect();
        let carved = allocate_vlsm(&pool.to_string(), &hosts)?;
        for ((i, _), info) in wanted.iter().zip(carved) {
            blocks[*i] = Some(info.cidr);
        }
    }

    Ok(blocks.into_iter().flatten().collect())
}
