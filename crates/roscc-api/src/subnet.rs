// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Subnet planning.
//!
//! This covers the facts derived from a single CIDR ([`SubnetInfo`]),
//! splitting a block into equal parts, variable-length allocation
//! ([`allocate_vlsm`]) and the LAN addressing conventions used for
//! gateways and DHCP pools ([`AddrLayout`]).
//!
//! Point-to-point blocks follow RFC 3021: a /31 has no broadcast and
//! two usable addresses, a /32 has no broadcast and one.

use crate::ip::AddrClass;
use crate::ip::Ipv4Addr;
use crate::ip::Ipv4Cidr;
use crate::ip::Ipv4PrefixLen;
use crate::ip::Ipv4Range;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// The most blocks a single [`split_subnet`] call may produce.
pub const MAX_SPLIT_BLOCKS: u64 = 1 << 16;

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum SubnetError {
    #[error("invalid base network {0}")]
    InvalidBase(String),

    #[error("invalid prefix length /{0}")]
    InvalidPrefix(u8),

    #[error("split must lengthen the prefix: /{from} -> /{to}")]
    NonEnlargingSplit { from: u8, to: u8 },

    #[error("splitting /{from} into /{to} yields too many blocks")]
    SplitTooLarge { from: u8, to: u8 },

    #[error("no IPv4 block holds {0} hosts")]
    HostCountTooLarge(u64),

    #[error("{base} holds {available} addresses, {needed} requested")]
    InsufficientSpace { base: Ipv4Cidr, needed: u64, available: u64 },
}

/// The number of hosts a block of `prefix_len` can address.
pub fn usable_hosts(prefix_len: Ipv4PrefixLen) -> u64 {
    match prefix_len.val() {
        32 => 1,
        31 => 2,
        _ => prefix_len.block_size() - 2,
    }
}

/// Everything derivable from a CIDR.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct SubnetInfo {
    pub cidr: Ipv4Cidr,
    pub mask: Ipv4Addr,
    pub wildcard: Ipv4Addr,
    /// `None` for /31 and /32.
    pub broadcast: Option<Ipv4Addr>,
    pub first_usable: Ipv4Addr,
    pub last_usable: Ipv4Addr,
    pub total_hosts: u64,
    pub usable_hosts: u64,
    pub class: AddrClass,
    pub is_private: bool,
    pub is_loopback: bool,
    /// The adjacent block of the same size above this one.
    pub next: Option<Ipv4Cidr>,
    /// The adjacent block of the same size below this one.
    pub previous: Option<Ipv4Cidr>,
    /// The block one bit shorter that contains this one; `None` at /0.
    pub supernet: Option<Ipv4Cidr>,
}

impl SubnetInfo {
    pub fn new(cidr: Ipv4Cidr) -> Self {
        let (net, prefix_len) = cidr.parts();
        let size = prefix_len.block_size();
        let start = u64::from(u32::from(net));
        let last = cidr.last();

        let (first_usable, last_usable, broadcast) = match prefix_len.val() {
            32 => (net, net, None),
            31 => (net, last, None),
            _ => (
                Ipv4Addr::from(u32::from(net) + 1),
                Ipv4Addr::from(u32::from(last) - 1),
                Some(last),
            ),
        };

        let next = last
            .checked_add(1)
            .map(|ip| Ipv4Cidr::new(ip, prefix_len));
        let previous = start
            .checked_sub(size)
            .map(|ip| Ipv4Cidr::new(Ipv4Addr::from(ip as u32), prefix_len));
        let supernet = prefix_len
            .val()
            .checked_sub(1)
            .and_then(|p| Ipv4Cidr::new_checked(net, p).ok());

        Self {
            cidr,
            mask: cidr.to_mask(),
            wildcard: Ipv4Addr::from(!u32::from(cidr.to_mask())),
            broadcast,
            first_usable,
            last_usable,
            total_hosts: size,
            usable_hosts: usable_hosts(prefix_len),
            class: net.class(),
            is_private: net.is_private(),
            is_loopback: net.is_loopback(),
            next,
            previous,
            supernet,
        }
    }

    pub fn network(&self) -> Ipv4Addr {
        self.cidr.ip()
    }

    pub fn prefix_len(&self) -> u8 {
        self.cidr.prefix_len()
    }

    /// The highest address in the block, whether or not it is a
    /// broadcast address.
    pub fn last_address(&self) -> Ipv4Addr {
        self.cidr.last()
    }

    pub fn usable_range(&self) -> Ipv4Range {
        Ipv4Range::new(self.first_usable, self.last_usable)
    }

    pub fn cidr_notation(&self) -> String {
        self.cidr.to_string()
    }
}

fn parse_prefix(prefix: &str) -> Option<Ipv4PrefixLen> {
    let raw = prefix.trim().trim_start_matches('/');
    Ipv4PrefixLen::new(raw.parse().ok()?).ok()
}

/// Mask `ip` with the prefix `prefix` (given as text, with or without
/// a leading '/').
pub fn network_address(ip: &str, prefix: &str) -> Option<Ipv4Addr> {
    let ip = ip.trim().parse::<Ipv4Addr>().ok()?;
    Some(ip.safe_mask(parse_prefix(prefix)?))
}

pub fn subnet_info(ip: &str, prefix: u8) -> Option<SubnetInfo> {
    let ip = ip.trim().parse::<Ipv4Addr>().ok()?;
    let cidr = Ipv4Cidr::new_checked(ip, prefix).ok()?;
    Some(SubnetInfo::new(cidr))
}

/// Split the /`from` block holding `base` into its /`to` blocks, in
/// address order.
pub fn split_subnet(
    base: &str,
    from: u8,
    to: u8,
) -> Result<Vec<SubnetInfo>, SubnetError> {
    if to <= from {
        return Err(SubnetError::NonEnlargingSplit { from, to });
    }

    let to_len =
        Ipv4PrefixLen::new(to).map_err(|_| SubnetError::InvalidPrefix(to))?;
    let ip = base
        .trim()
        .parse::<Ipv4Addr>()
        .map_err(|e| SubnetError::InvalidBase(format!("{base}: {e}")))?;
    let base = Ipv4Cidr::new_checked(ip, from)
        .map_err(|_| SubnetError::InvalidPrefix(from))?;

    let count = 1u64 << (to - from);
    if count > MAX_SPLIT_BLOCKS {
        return Err(SubnetError::SplitTooLarge { from, to });
    }

    let start = u64::from(u32::from(base.ip()));
    let step = to_len.block_size();
    let blocks = (0..count)
        .map(|i| {
            let ip = Ipv4Addr::from((start + i * step) as u32);
            SubnetInfo::new(Ipv4Cidr::new(ip, to_len))
        })
        .collect();
    Ok(blocks)
}

pub fn is_in_subnet(ip: &str, cidr: &str) -> bool {
    match (ip.trim().parse::<Ipv4Addr>(), cidr.trim().parse::<Ipv4Cidr>()) {
        (Ok(ip), Ok(cidr)) => cidr.is_member(ip),
        _ => false,
    }
}

/// The addresses of the block `base/prefix`.
///
/// Without `include_network_and_broadcast` this is the usable-host
/// range, which is empty for a /31 and the single host for a /32.
/// Malformed input yields an empty range.
pub fn ip_range(
    base: &str,
    prefix: u8,
    include_network_and_broadcast: bool,
) -> Ipv4Range {
    let Some(info) = subnet_info(base, prefix) else {
        return Ipv4Range::EMPTY;
    };

    if include_network_and_broadcast {
        return Ipv4Range::new(info.network(), info.last_address());
    }

    match prefix {
        31 => Ipv4Range::EMPTY,
        _ => info.usable_range(),
    }
}

/// The longest prefix whose block has at least `host_count` usable
/// addresses. Zero hosts fit in a /32.
pub fn smallest_prefix_for(host_count: u64) -> Option<Ipv4PrefixLen> {
    (0..=32)
        .rev()
        .filter_map(|p| Ipv4PrefixLen::new(p).ok())
        .find(|pl| usable_hosts(*pl) >= host_count)
}

pub fn mask_to_prefix(mask: &str) -> Option<u8> {
    let mask = mask.trim().parse::<Ipv4Addr>().ok()?;
    Ipv4PrefixLen::from_netmask(mask).map(|pl| pl.val())
}

pub fn prefix_to_mask(prefix: u8) -> Option<Ipv4Addr> {
    Ipv4PrefixLen::new(prefix).ok().map(Ipv4PrefixLen::to_netmask)
}

/// Carve `base` (a CIDR) into one block per host requirement.
///
/// Requirements are served largest first, each from the front of the
/// remaining space, so the result is ordered by descending requirement
/// and the blocks are contiguous. Because every block is a power of two
/// no larger than the ones before it, each block starts aligned.
pub fn allocate_vlsm(
    base: &str,
    host_requirements: &[u64],
) -> Result<Vec<SubnetInfo>, SubnetError> {
    let base = base
        .trim()
        .parse::<Ipv4Cidr>()
        .map_err(|e| SubnetError::InvalidBase(format!("{base}: {e}")))?;

    let mut reqs = host_requirements.to_vec();
    reqs.sort_unstable_by(|a, b| b.cmp(a));

    let start = u64::from(u32::from(base.ip()));
    let available = base.parts().1.block_size();
    let mut used = 0u64;
    let mut blocks = Vec::with_capacity(reqs.len());

    for req in reqs {
        let prefix_len = smallest_prefix_for(req)
            .ok_or(SubnetError::HostCountTooLarge(req))?;
        let size = prefix_len.block_size();

        if used + size > available {
            return Err(SubnetError::InsufficientSpace {
                base,
                needed: used + size,
                available,
            });
        }

        let ip = Ipv4Addr::from((start + used) as u32);
        blocks.push(SubnetInfo::new(Ipv4Cidr::new(ip, prefix_len)));
        used += size;
    }

    Ok(blocks)
}

/// Which low addresses of a LAN block are reserved before the gateway
/// and the DHCP pool.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AddrLayout {
    /// `.0` network, `.1` gateway, DHCP from `.2`.
    #[default]
    Standard,
    /// `.0`-`.3` reserved for point-to-point addressing, `.4` gateway,
    /// DHCP from `.5`.
    Tunnel,
}

impl AddrLayout {
    const fn gateway_offset(self) -> u64 {
        match self {
            Self::Standard => 1,
            Self::Tunnel => 4,
        }
    }

    const fn dhcp_offset(self) -> u64 {
        match self {
            Self::Standard => 2,
            Self::Tunnel => 5,
        }
    }

    /// The gateway address of `cidr`, if the block is large enough to
    /// hold it below the broadcast address.
    pub fn gateway(self, cidr: Ipv4Cidr) -> Option<Ipv4Addr> {
        let (net, prefix_len) = cidr.parts();
        if prefix_len.val() >= 31 {
            return None;
        }

        let broadcast = prefix_len.block_size() - 1;
        if self.gateway_offset() >= broadcast {
            return None;
        }
        net.checked_add(self.gateway_offset() as u32)
    }

    /// The DHCP pool of `cidr`: from the first DHCP address up to the
    /// address below broadcast.
    ///
    /// Point-to-point blocks have no pool at all. A block too small to
    /// reach the first DHCP address gets an empty pool.
    pub fn dhcp_range(self, cidr: Ipv4Cidr) -> Option<Ipv4Range> {
        let (net, prefix_len) = cidr.parts();
        if prefix_len.val() >= 31 {
            return None;
        }

        let start = u64::from(u32::from(net));
        let first = start + self.dhcp_offset();
        let last = start + prefix_len.block_size() - 2;
        if first > last {
            return Some(Ipv4Range::EMPTY);
        }

        Some(Ipv4Range::new(
            Ipv4Addr::from(first as u32),
            Ipv4Addr::from(last as u32),
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    fn cidr(s: &str) -> Ipv4Cidr {
        s.parse().unwrap()
    }

    #[test]
    fn network_address_masks() {
        assert_eq!(
            network_address("192.168.1.100", "24"),
            Some(ip("192.168.1.0"))
        );
        assert_eq!(network_address("10.1.2.3", "/8"), Some(ip("10.0.0.0")));
        assert_eq!(network_address("10.1.2.3", "0"), Some(Ipv4Addr::ANY_ADDR));
        assert_eq!(network_address("10.1.2", "24"), None);
        assert_eq!(network_address("10.1.2.3", "33"), None);
        assert_eq!(network_address("10.1.2.3", "x"), None);
    }

    #[test]
    fn info_ordinary_block() {
        let info = subnet_info("192.168.1.77", 24).unwrap();
        assert_eq!(info.network(), ip("192.168.1.0"));
        assert_eq!(info.broadcast, Some(ip("192.168.1.255")));
        assert_eq!(info.mask, ip("255.255.255.0"));
        assert_eq!(info.wildcard, ip("0.0.0.255"));
        assert_eq!(info.first_usable, ip("192.168.1.1"));
        assert_eq!(info.last_usable, ip("192.168.1.254"));
        assert_eq!(info.total_hosts, 256);
        assert_eq!(info.usable_hosts, 254);
        assert_eq!(info.class, AddrClass::C);
        assert!(info.is_private);
        assert!(!info.is_loopback);
        assert_eq!(info.next, Some(cidr("192.168.2.0/24")));
        assert_eq!(info.previous, Some(cidr("192.168.0.0/24")));
        assert_eq!(info.supernet, Some(cidr("192.168.0.0/23")));
        assert_eq!(info.cidr_notation(), "192.168.1.0/24");
    }

    #[test]
    fn info_point_to_point() {
        let p31 = subnet_info("10.0.0.1", 31).unwrap();
        assert_eq!(p31.broadcast, None);
        assert_eq!(p31.usable_hosts, 2);
        assert_eq!(p31.first_usable, ip("10.0.0.0"));
        assert_eq!(p31.last_usable, ip("10.0.0.1"));

        let p32 = subnet_info("10.0.0.1", 32).unwrap();
        assert_eq!(p32.broadcast, None);
        assert_eq!(p32.usable_hosts, 1);
        assert_eq!(p32.total_hosts, 1);
        assert_eq!(p32.first_usable, p32.last_usable);
    }

    #[test]
    fn info_edges_of_space() {
        let all = subnet_info("1.2.3.4", 0).unwrap();
        assert_eq!(all.network(), Ipv4Addr::ANY_ADDR);
        assert_eq!(all.total_hosts, 1 << 32);
        assert_eq!(all.supernet, None);
        assert_eq!(all.next, None);
        assert_eq!(all.previous, None);

        let top = subnet_info("255.255.255.0", 24).unwrap();
        assert_eq!(top.next, None);
        assert_eq!(top.class, AddrClass::E);
        let bottom = subnet_info("0.0.0.0", 24).unwrap();
        assert_eq!(bottom.previous, None);

        assert!(subnet_info("1.2.3.4", 33).is_none());
        assert!(subnet_info("1.2.3", 24).is_none());
    }

    #[test]
    fn info_invariants_hold() {
        for addr in ["0.0.0.0", "10.9.8.7", "172.16.5.4", "255.255.255.255"] {
            for p in 0..=32 {
                let info = subnet_info(addr, p).unwrap();
                let a = ip(addr);
                assert!(info.network() <= a && a <= info.last_address());
                if p < 31 {
                    assert_eq!(info.usable_hosts, info.total_hosts - 2);
                }
                let back: Ipv4Cidr = info.cidr_notation().parse().unwrap();
                assert_eq!(back.parts(), (info.network(), info.cidr.parts().1));
            }
        }
    }

    #[test]
    fn split_into_quarters() {
        let blocks = split_subnet("192.168.1.0", 24, 26).unwrap();
        let nets: Vec<String> =
            blocks.iter().map(SubnetInfo::cidr_notation).collect();
        assert_eq!(
            nets,
            [
                "192.168.1.0/26",
                "192.168.1.64/26",
                "192.168.1.128/26",
                "192.168.1.192/26",
            ]
        );
    }

    #[test]
    fn split_rejects() {
        assert_eq!(
            split_subnet("192.168.1.0", 24, 24),
            Err(SubnetError::NonEnlargingSplit { from: 24, to: 24 })
        );
        assert_eq!(
            split_subnet("192.168.1.0", 24, 20),
            Err(SubnetError::NonEnlargingSplit { from: 24, to: 20 })
        );
        assert_eq!(
            split_subnet("192.168.1.0", 24, 33),
            Err(SubnetError::InvalidPrefix(33))
        );
        assert!(matches!(
            split_subnet("192.168.1", 24, 26),
            Err(SubnetError::InvalidBase(_))
        ));
        assert_eq!(
            split_subnet("10.0.0.0", 8, 32),
            Err(SubnetError::SplitTooLarge { from: 8, to: 32 })
        );
        assert_eq!(split_subnet("10.0.0.0", 8, 24).unwrap().len(), 65536);
    }

    #[test]
    fn membership() {
        assert!(is_in_subnet("10.1.1.1", "10.0.0.0/8"));
        assert!(!is_in_subnet("11.1.1.1", "10.0.0.0/8"));
        assert!(!is_in_subnet("10.1.1", "10.0.0.0/8"));
        assert!(!is_in_subnet("10.1.1.1", "10.0.0.0"));
        assert!(!is_in_subnet("10.1.1.1", "10.0.0.0/40"));
    }

    #[test]
    fn ranges() {
        let hosts: Vec<_> = ip_range("10.0.0.0", 30, false).collect();
        assert_eq!(hosts, [ip("10.0.0.1"), ip("10.0.0.2")]);

        let all: Vec<_> = ip_range("10.0.0.0", 30, true).collect();
        assert_eq!(all.len(), 4);

        assert!(ip_range("10.0.0.0", 31, false).is_empty());
        assert_eq!(ip_range("10.0.0.0", 31, true).len(), 2);
        assert_eq!(
            ip_range("10.0.0.9", 32, false).collect::<Vec<_>>(),
            [ip("10.0.0.9")]
        );
        assert_eq!(ip_range("10.0.0.9", 32, true).len(), 1);
        assert!(ip_range("bogus", 24, true).is_empty());
        assert_eq!(ip_range("0.0.0.0", 0, true).len(), 1 << 32);
    }

    #[test]
    fn smallest_prefix() {
        let p = |n| smallest_prefix_for(n).map(|pl| pl.val());
        assert_eq!(p(30), Some(27));
        assert_eq!(p(31), Some(26));
        assert_eq!(p(0), Some(32));
        assert_eq!(p(1), Some(32));
        assert_eq!(p(2), Some(31));
        assert_eq!(p(3), Some(29));
        assert_eq!(p(254), Some(24));
        assert_eq!(p(255), Some(23));
        assert_eq!(p((1 << 32) - 2), Some(0));
        assert_eq!(p(1 << 32), None);
    }

    #[test]
    fn masks() {
        assert_eq!(mask_to_prefix("255.255.255.128"), Some(25));
        assert_eq!(mask_to_prefix("0.0.0.0"), Some(0));
        assert_eq!(mask_to_prefix("255.255.0.255"), None);
        assert_eq!(mask_to_prefix("255.255.255"), None);
        for p in 0..=32 {
            let mask = prefix_to_mask(p).unwrap().to_string();
            assert_eq!(mask_to_prefix(&mask), Some(p));
        }
        assert_eq!(prefix_to_mask(33), None);
    }

    #[test]
    fn vlsm_packs_descending() {
        let blocks =
            allocate_vlsm("192.168.0.0/24", &[10, 50, 2, 100]).unwrap();
        let nets: Vec<String> =
            blocks.iter().map(SubnetInfo::cidr_notation).collect();
        assert_eq!(
            nets,
            [
                "192.168.0.0/25",
                "192.168.0.128/26",
                "192.168.0.192/28",
                "192.168.0.208/31",
            ]
        );

        let reqs = [100, 50, 10, 2];
        for (block, req) in blocks.iter().zip(reqs) {
            assert!(block.usable_hosts >= req);
        }
        for pair in blocks.windows(2) {
            let end = u32::from(pair[0].last_address());
            assert_eq!(end + 1, u32::from(pair[1].network()));
        }
    }

    #[test]
    fn vlsm_failures() {
        assert!(matches!(
            allocate_vlsm("192.168.0.0", &[10]),
            Err(SubnetError::InvalidBase(_))
        ));
        assert_eq!(
            allocate_vlsm("192.168.0.0/24", &[200, 60]),
            Err(SubnetError::InsufficientSpace {
                base: cidr("192.168.0.0/24"),
                needed: 320,
                available: 256,
            })
        );
        assert!(matches!(
            allocate_vlsm("10.0.0.0/30", &[10]),
            Err(SubnetError::InsufficientSpace { .. })
        ));
        assert!(allocate_vlsm("10.0.0.0/24", &[]).unwrap().is_empty());
    }

    #[test]
    fn standard_layout() {
        let lan = cidr("192.168.10.0/24");
        assert_eq!(
            AddrLayout::Standard.gateway(lan),
            Some(ip("192.168.10.1"))
        );
        let pool = AddrLayout::Standard.dhcp_range(lan).unwrap();
        assert_eq!(pool.to_string(), "192.168.10.2-192.168.10.254");

        let small = cidr("192.168.10.0/30");
        assert_eq!(
            AddrLayout::Standard.dhcp_range(small).unwrap().to_string(),
            "192.168.10.2"
        );
        assert_eq!(AddrLayout::Standard.dhcp_range(cidr("10.0.0.0/31")), None);
        assert_eq!(AddrLayout::Standard.dhcp_range(cidr("10.0.0.0/32")), None);
        assert_eq!(AddrLayout::Standard.gateway(cidr("10.0.0.0/31")), None);
    }

    #[test]
    fn tunnel_layout() {
        let lan = cidr("10.8.0.0/24");
        assert_eq!(AddrLayout::Tunnel.gateway(lan), Some(ip("10.8.0.4")));
        let pool = AddrLayout::Tunnel.dhcp_range(lan).unwrap();
        assert_eq!(pool.first(), Some(ip("10.8.0.5")));
        assert_eq!(pool.last(), Some(ip("10.8.0.254")));

        let small = cidr("10.8.0.0/30");
        assert_eq!(AddrLayout::Tunnel.gateway(small), None);
        assert!(AddrLayout::Tunnel.dhcp_range(small).unwrap().is_empty());

        let eight = cidr("10.8.0.0/29");
        assert_eq!(AddrLayout::Tunnel.dhcp_range(eight).unwrap().len(), 2);
    }
}
