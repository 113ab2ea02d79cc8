// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The uplink allocator.
//!
//! Every generator that needs an uplink's index or probe address asks
//! [`UplinkAlloc`]; none of them does index math of its own. The probe
//! assignment lives in [`probe_range()`] and nowhere else:
//!
//! ```text
//! |Class    |Pool     |Positions |
//! |---------|---------|----------|
//! |Domestic |domestic |0..D      |
//! |Foreign  |foreign  |0..F      |
//! |VPN      |foreign  |F..F+V    |
//! ```
//!
//! VPN clients take the foreign positions after the foreign WAN links
//! so that no VPN probe is ever also a foreign probe.

use crate::CompileError;
use crate::api::Gateway;
use crate::api::Ipv4Addr;
use crate::api::Topology;
use crate::api::UplinkClass;
use crate::api::VpnFamily;
use crate::api::WanLink;
use crate::cfg::Pool;
use crate::cfg::ProbePools;
use core::ops::Range;
use std::collections::BTreeSet;

/// The number of uplinks of each class.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ClassCounts {
    pub domestic: usize,
    pub foreign: usize,
    pub vpn: usize,
}

impl ClassCounts {
    pub fn get(&self, class: UplinkClass) -> usize {
        match class {
            UplinkClass::Domestic => self.domestic,
            UplinkClass::Foreign => self.foreign,
            UplinkClass::Vpn => self.vpn,
        }
    }
}

/// The pool and pool positions holding the probes of `class`.
pub fn probe_range(
    class: UplinkClass,
    counts: ClassCounts,
) -> (Pool, Range<usize>) {
    match class {
        UplinkClass::Domestic => (Pool::Domestic, 0..counts.domestic),
        UplinkClass::Foreign => (Pool::Foreign, 0..counts.foreign),
        UplinkClass::Vpn => {
            (Pool::Foreign, counts.foreign..counts.foreign + counts.vpn)
        }
    }
}

/// One uplink, with its place in its class and its probe address.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Uplink {
    pub name: String,
    pub class: UplinkClass,
    pub interface: String,
    pub gateway: Gateway,
    pub priority: Option<u32>,
    pub weight: u32,
    /// The tunnel endpoint, VPN clients only.
    pub endpoint: Option<Ipv4Addr>,
    pub family: Option<VpnFamily>,
    /// The position within its class.
    pub idx: usize,
    pub probe: Ipv4Addr,
}

impl Uplink {
    /// The routing table that reaches the internet through this uplink
    /// alone.
    pub fn table(&self) -> String {
        format!("to-{}", self.name)
    }
}

/// The ordered uplinks of a topology.
#[derive(Clone, Debug)]
pub struct UplinkAlloc {
    domestic: Vec<Uplink>,
    foreign: Vec<Uplink>,
    vpn: Vec<Uplink>,
    probes: ProbePools,
}

// Stable: ties, and uplinks without a priority, keep declaration order.
fn order(uplinks: &mut [Uplink]) {
    uplinks.sort_by_key(|u| (u.priority.is_none(), u.priority));
    for (idx, u) in uplinks.iter_mut().enumerate() {
        u.idx = idx;
    }
}

impl UplinkAlloc {
    pub fn new(
        topo: &Topology,
        probes: &ProbePools,
    ) -> Result<Self, CompileError> {
        let wan = |class, links: &[WanLink]| {
            links
                .iter()
                .map(|l| Uplink {
                    name: l.name.clone(),
                    class,
                    interface: l.interface.clone(),
                    gateway: l.gateway.clone(),
                    priority: l.priority,
                    weight: l.weight,
                    endpoint: None,
                    family: None,
                    idx: 0,
                    probe: Ipv4Addr::ANY_ADDR,
                })
                .collect::<Vec<_>>()
        };

        let mut domestic = wan(UplinkClass::Domestic, &topo.wan.domestic);
        let mut foreign = wan(UplinkClass::Foreign, &topo.wan.foreign);
        let mut vpn: Vec<_> = topo
            .vpn_clients
            .flatten()
            .map(|(family, c)| {
                let interface = c
                    .interface
                    .clone()
                    .unwrap_or_else(|| family.default_iface(&c.name));
                Uplink {
                    name: c.name.clone(),
                    class: UplinkClass::Vpn,
                    gateway: Gateway::Iface(interface.clone()),
                    interface,
                    priority: c.priority,
                    weight: c.weight,
                    endpoint: c.endpoint,
                    family: Some(family),
                    idx: 0,
                    probe: Ipv4Addr::ANY_ADDR,
                }
            })
            .collect();

        let mut seen = BTreeSet::new();
        for u in domestic.iter().chain(&foreign).chain(&vpn) {
            if !seen.insert(u.name.as_str()) {
                return Err(CompileError::DuplicateUplink(u.name.clone()));
            }
        }

        order(&mut domestic);
        order(&mut foreign);
        order(&mut vpn);

        let counts = ClassCounts {
            domestic: domestic.len(),
            foreign: foreign.len(),
            vpn: vpn.len(),
        };

        for (class, uplinks) in [
            (UplinkClass::Domestic, &mut domestic),
            (UplinkClass::Foreign, &mut foreign),
            (UplinkClass::Vpn, &mut vpn),
        ] {
            let (pool, range) = probe_range(class, counts);
            let pool = probes.pool(pool);
            let Some(slice) = pool.get(range.clone()) else {
                return Err(CompileError::ProbePoolExhausted {
                    class,
                    needed: range.end,
                    available: pool.len(),
                });
            };
            for (u, probe) in uplinks.iter_mut().zip(slice) {
                u.probe = *probe;
            }
        }

        Ok(Self { domestic, foreign, vpn, probes: probes.clone() })
    }

    fn counts(&self) -> ClassCounts {
        ClassCounts {
            domestic: self.domestic.len(),
            foreign: self.foreign.len(),
            vpn: self.vpn.len(),
        }
    }

    pub fn uplinks(&self, class: UplinkClass) -> &[Uplink] {
        match class {
            UplinkClass::Domestic => &self.domestic,
            UplinkClass::Foreign => &self.foreign,
            UplinkClass::Vpn => &self.vpn,
        }
    }

    /// Every uplink: domestic, then foreign, then VPN.
    pub fn all(&self) -> impl Iterator<Item = &Uplink> {
        self.domestic.iter().chain(&self.foreign).chain(&self.vpn)
    }

    /// The WAN links, domestic then foreign.
    pub fn wan(&self) -> impl Iterator<Item = &Uplink> {
        self.domestic.iter().chain(&self.foreign)
    }

    pub fn get(&self, name: &str) -> Option<&Uplink> {
        self.all().find(|u| u.name == name)
    }

    /// The probe of the `idx`th uplink of `class`.
    pub fn probe(&self, class: UplinkClass, idx: usize) -> Option<Ipv4Addr> {
        self.uplinks(class).get(idx).map(|u| u.probe)
    }

    /// The probes of `class`, in uplink order.
    pub fn probe_slice(&self, class: UplinkClass) -> &[Ipv4Addr] {
        let (pool, range) = probe_range(class, self.counts());
        // Checked in `new`.
        self.probes.pool(pool).get(range).unwrap_or_default()
    }

    pub fn len(&self, class: UplinkClass) -> usize {
        self.uplinks(class).len()
    }

    pub fn is_empty(&self) -> bool {
        self.all().next().is_none()
    }
}
