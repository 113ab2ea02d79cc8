// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use core::fmt;
use core::fmt::Debug;
use core::fmt::Display;
use core::result;
use core::str::FromStr;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

/// An IPv4 address.
///
/// Addresses (de)serialize as their dotted-quad text so that topology
/// files can be written by hand.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Ipv4Addr {
    inner: [u8; 4],
}

impl Ipv4Addr {
    pub const ANY_ADDR: Self = Self { inner: [0; 4] };
    pub const LOCAL_BCAST: Self = Self { inner: [255; 4] };

    /// Return the bytes of the address.
    #[inline]
    pub fn bytes(&self) -> [u8; 4] {
        self.inner
    }

    pub const fn from_const(bytes: [u8; 4]) -> Self {
        Self { inner: bytes }
    }

    /// Return the address after applying the network mask.
    pub fn mask(self, mask: u8) -> Result<Self, String> {
        let prefix_len = Ipv4PrefixLen::new(mask)?;
        Ok(self.safe_mask(prefix_len))
    }

    pub fn safe_mask(self, prefix_len: Ipv4PrefixLen) -> Self {
        Self::from(u32::from(self) & u32::from(prefix_len.to_netmask()))
    }

    /// The address `n` positions above this one, if it is still an
    /// IPv4 address.
    pub fn checked_add(self, n: u32) -> Option<Self> {
        u32::from(self).checked_add(n).map(Self::from)
    }

    /// The address `n` positions below this one, if it is still an
    /// IPv4 address.
    pub fn checked_sub(self, n: u32) -> Option<Self> {
        u32::from(self).checked_sub(n).map(Self::from)
    }

    /// The classful network class this address falls into.
    pub const fn class(&self) -> AddrClass {
        match self.inner[0] {
            0..=127 => AddrClass::A,
            128..=191 => AddrClass::B,
            192..=223 => AddrClass::C,
            224..=239 => AddrClass::D,
            _ => AddrClass::E,
        }
    }

    /// Is this address in one of the RFC 1918 private ranges?
    pub const fn is_private(&self) -> bool {
        matches!(
            self.inner,
            [10, ..] | [172, 16..=31, ..] | [192, 168, ..]
        )
    }

    pub const fn is_loopback(&self) -> bool {
        self.inner[0] == 127
    }
}

impl From<core::net::Ipv4Addr> for Ipv4Addr {
    fn from(ip4: core::net::Ipv4Addr) -> Self {
        Self { inner: ip4.octets() }
    }
}

impl From<Ipv4Addr> for core::net::Ipv4Addr {
    fn from(ip4: Ipv4Addr) -> Self {
        Self::from(ip4.inner)
    }
}

impl From<Ipv4Addr> for u32 {
    fn from(ip: Ipv4Addr) -> u32 {
        u32::from_be_bytes(ip.bytes())
    }
}

impl From<u32> for Ipv4Addr {
    fn from(val: u32) -> Self {
        Self { inner: val.to_be_bytes() }
    }
}

impl From<[u8; 4]> for Ipv4Addr {
    fn from(bytes: [u8; 4]) -> Self {
        Self { inner: bytes }
    }
}

impl FromStr for Ipv4Addr {
    type Err = String;

    fn from_str(val: &str) -> result::Result<Self, Self::Err> {
        let octets: Vec<u8> = val
            .split('.')
            .map(|s| {
                // `u8::from_str` accepts a leading '+'; dotted quads do not.
                if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(format!("malformed octet: '{s}'"));
                }
                s.parse().map_err(|e| format!("{e}"))
            })
            .collect::<result::Result<Vec<u8>, _>>()?;

        if octets.len() != 4 {
            return Err(format!("malformed ip: {val}"));
        }

        Ok(Self { inner: [octets[0], octets[1], octets[2], octets[3]] })
    }
}

impl Display for Ipv4Addr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.inner[0], self.inner[1], self.inner[2], self.inner[3],
        )
    }
}

// There's no reason to view an Ipv4Addr as its raw array, so just
// present it in a human-friendly manner.
impl Debug for Ipv4Addr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Ipv4Addr {{ inner: {self} }}")
    }
}

impl Serialize for Ipv4Addr {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ipv4Addr {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The classful network classes.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize,
)]
pub enum AddrClass {
    A,
    B,
    C,
    D,
    E,
}

impl Display for AddrClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
        };
        write!(f, "{s}")
    }
}

/// A valid IPv4 prefix length.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize, Ord,
    PartialOrd,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Ipv4PrefixLen(u8);

impl TryFrom<u8> for Ipv4PrefixLen {
    type Error = String;

    fn try_from(p: u8) -> Result<Self, Self::Error> {
        Self::new(p)
    }
}

impl From<Ipv4PrefixLen> for u8 {
    fn from(p: Ipv4PrefixLen) -> u8 {
        p.0
    }
}

impl Ipv4PrefixLen {
    pub const NETMASK_NONE: Self = Self(0);
    pub const NETMASK_ALL: Self = Self(32);

    pub fn new(prefix_len: u8) -> Result<Self, String> {
        if prefix_len > 32 {
            return Err(format!("bad IPv4 prefix length: {prefix_len}"));
        }

        Ok(Self(prefix_len))
    }

    /// Convert the prefix length into a subnet mask.
    pub fn to_netmask(self) -> Ipv4Addr {
        // A shift by the full width yields `None`: that is the /0 mask.
        let bits = u32::MAX.checked_shl(32 - u32::from(self.0)).unwrap_or(0);
        Ipv4Addr::from(bits)
    }

    /// Convert a subnet mask back into a prefix length.
    ///
    /// Returns `None` unless the mask is a contiguous run of 1 bits
    /// followed by 0 bits.
    pub fn from_netmask(mask: Ipv4Addr) -> Option<Self> {
        let bits = u32::from(mask);
        let ones = bits.leading_ones();
        if bits.checked_shl(ones).unwrap_or(0) != 0 {
            return None;
        }
        // `leading_ones()` of a u32 is at most 32.
        Some(Self(ones as u8))
    }

    /// The number of addresses in a block of this length.
    pub fn block_size(self) -> u64 {
        1u64 << (32 - self.0)
    }

    pub fn val(&self) -> u8 {
        self.0
    }
}

/// An IPv4 CIDR.
///
/// The address is always the network address: constructing a CIDR
/// from a host address masks it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Ipv4Cidr {
    ip: Ipv4Addr,
    prefix_len: Ipv4PrefixLen,
}

impl core::cmp::Ord for Ipv4Cidr {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        if self.ip != other.ip {
            self.ip.cmp(&other.ip)
        } else {
            self.prefix_len.cmp(&other.prefix_len)
        }
    }
}

impl core::cmp::PartialOrd for Ipv4Cidr {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Ipv4Cidr {
    type Err = String;

    /// Convert a string like "192.168.2.0/24" into an `Ipv4Cidr`.
    fn from_str(val: &str) -> result::Result<Self, Self::Err> {
        let (ip_s, prefix_s) = match val.split_once('/') {
            Some(v) => v,
            None => return Err("no '/' found".to_string()),
        };

        let ip = match ip_s.parse() {
            Ok(v) => v,
            Err(e) => return Err(format!("bad IP: {e}")),
        };

        let raw = match prefix_s.parse::<u8>() {
            Ok(v) => v,
            Err(e) => {
                return Err(format!("bad prefix length: {e}"));
            }
        };

        let prefix_len = Ipv4PrefixLen::new(raw)?;
        Ok(Ipv4Cidr::new(ip, prefix_len))
    }
}

impl Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.ip, self.prefix_len.val())
    }
}

impl Serialize for Ipv4Cidr {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ipv4Cidr {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Ipv4Cidr {
    /// The default route, `0.0.0.0/0`.
    pub const DEFAULT: Self =
        Self { ip: Ipv4Addr::ANY_ADDR, prefix_len: Ipv4PrefixLen(0) };

    pub fn ip(&self) -> Ipv4Addr {
        self.parts().0
    }

    /// Does this CIDR represent the default route subnet?
    pub fn is_default(&self) -> bool {
        let (ip, prefix_len) = self.parts();
        ip == Ipv4Addr::ANY_ADDR && prefix_len.val() == 0
    }

    /// Is this `ip` a member of the CIDR?
    pub fn is_member(&self, ip: Ipv4Addr) -> bool {
        ip.safe_mask(self.parts().1) == self.ip()
    }

    pub fn new(ip: Ipv4Addr, prefix_len: Ipv4PrefixLen) -> Self {
        let ip = ip.safe_mask(prefix_len);
        Ipv4Cidr { ip, prefix_len }
    }

    pub fn new_checked(ip: Ipv4Addr, prefix_len: u8) -> Result<Self, String> {
        let pl = Ipv4PrefixLen::new(prefix_len)?;
        let ip = ip.safe_mask(pl);
        Ok(Ipv4Cidr { ip, prefix_len: pl })
    }

    /// A /32 holding exactly `ip`.
    pub fn host(ip: Ipv4Addr) -> Self {
        Ipv4Cidr { ip, prefix_len: Ipv4PrefixLen::NETMASK_ALL }
    }

    pub fn parts(&self) -> (Ipv4Addr, Ipv4PrefixLen) {
        (self.ip, self.prefix_len)
    }

    pub fn prefix_len(self) -> u8 {
        self.parts().1.val()
    }

    /// Convert the CIDR prefix length into a subnet mask.
    pub fn to_mask(self) -> Ipv4Addr {
        self.prefix_len.to_netmask()
    }

    /// The highest address inside the block.
    pub fn last(self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.ip) | !u32::from(self.to_mask()))
    }
}

#[cfg(feature = "ipnetwork")]
impl From<ipnetwork::Ipv4Network> for Ipv4Cidr {
    fn from(n: ipnetwork::Ipv4Network) -> Self {
        let ip: Ipv4Addr = n.ip().into();
        // A valid `Ipv4Network` necessarily has a valid prefix.
        Ipv4Cidr::new(ip, Ipv4PrefixLen(n.prefix()))
    }
}

#[cfg(feature = "ipnetwork")]
impl From<Ipv4Cidr> for ipnetwork::Ipv4Network {
    fn from(c: Ipv4Cidr) -> Self {
        let (ip, prefix) = c.parts();
        // A valid `Ipv4Cidr` necessarily has a valid prefix so fine to unwrap.
        ipnetwork::Ipv4Network::new(ip.into(), prefix.val()).unwrap()
    }
}

/// An inclusive run of IPv4 addresses, possibly empty.
///
/// The range is also an iterator over its addresses; nothing is
/// materialised up front, so even a /0 is cheap to describe.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ipv4Range {
    // Half-open `[next, end)`, widened so that 255.255.255.255 can be
    // the last member.
    next: u64,
    end: u64,
}

impl Ipv4Range {
    pub const EMPTY: Self = Self { next: 0, end: 0 };

    /// The range `first..=last`; empty when `first > last`.
    pub fn new(first: Ipv4Addr, last: Ipv4Addr) -> Self {
        if first > last {
            return Self::EMPTY;
        }

        Self {
            next: u64::from(u32::from(first)),
            end: u64::from(u32::from(last)) + 1,
        }
    }

    pub fn first(&self) -> Option<Ipv4Addr> {
        (!self.is_empty()).then(|| Ipv4Addr::from(self.next as u32))
    }

    pub fn last(&self) -> Option<Ipv4Addr> {
        (!self.is_empty()).then(|| Ipv4Addr::from((self.end - 1) as u32))
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.next)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let ip = u64::from(u32::from(ip));
        self.next <= ip && ip < self.end
    }
}

impl Iterator for Ipv4Range {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_empty() {
            return None;
        }
        let ip = Ipv4Addr::from(self.next as u32);
        self.next += 1;
        Some(ip)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.len()) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

/// Renders in RouterOS pool syntax: `first-last`, or a lone address.
impl Display for Ipv4Range {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) if first == last => write!(f, "{first}"),
            (Some(first), Some(last)) => write!(f, "{first}-{last}"),
            _ => Ok(()),
        }
    }
}
