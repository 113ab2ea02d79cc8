// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The topology model.
//!
//! These types are owned and validated by the surrounding application;
//! the compiler only checks what it needs to produce a consistent
//! configuration.

use core::fmt;
use core::fmt::Display;
pub use roscc::api::*;
use serde::Deserialize;
use serde::Serialize;

/// The class of an uplink, which is also the class of traffic it
/// carries.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub enum UplinkClass {
    Domestic,
    #[default]
    Foreign,
    #[serde(rename = "VPN")]
    Vpn,
}

impl UplinkClass {
    pub const ALL: [Self; 3] = [Self::Domestic, Self::Foreign, Self::Vpn];

    /// The routing table that fails over between the class's uplinks.
    pub fn table(self) -> String {
        format!("to-{self}")
    }
}

impl Display for UplinkClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Domestic => "Domestic",
            Self::Foreign => "Foreign",
            Self::Vpn => "VPN",
        };
        write!(f, "{s}")
    }
}

/// The next hop of a WAN link: an address, or the link's interface for
/// point-to-point links.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Gateway {
    Addr(Ipv4Addr),
    Iface(String),
}

impl Display for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Addr(ip) => write!(f, "{ip}"),
            Self::Iface(iface) => write!(f, "{iface}"),
        }
    }
}

fn default_weight() -> u32 {
    1
}

/// A domestic or foreign WAN link.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct WanLink {
    pub name: String,
    pub interface: String,
    pub gateway: Gateway,

    /// Lower comes first. Links without a priority come after all links
    /// with one, in declaration order.
    #[serde(default)]
    pub priority: Option<u32>,

    /// The share of new connections under per-connection load
    /// balancing.
    #[serde(default = "default_weight")]
    pub weight: u32,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct WanLinks {
    #[serde(default)]
    pub domestic: Vec<WanLink>,
    #[serde(default)]
    pub foreign: Vec<WanLink>,
}

/// The protocol of a VPN client tunnel.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum VpnFamily {
    Wireguard,
    Openvpn,
    L2tp,
    Pptp,
    Sstp,
    Ikev2,
}

impl VpnFamily {
    /// Families in the order their clients are flattened.
    pub const ALL: [Self; 6] = [
        Self::Wireguard,
        Self::Openvpn,
        Self::L2tp,
        Self::Pptp,
        Self::Sstp,
        Self::Ikev2,
    ];

    /// The interface a client of this family gets when none is given.
    pub fn default_iface(self, client: &str) -> String {
        let prefix = match self {
            Self::Wireguard => "wireguard-client",
            Self::Openvpn => "ovpn-client",
            Self::L2tp => "l2tp-client",
            Self::Pptp => "pptp-client",
            Self::Sstp => "sstp-client",
            Self::Ikev2 => "ikev2-client",
        };
        format!("{prefix}-{client}")
    }
}

impl Display for VpnFamily {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Wireguard => "wireguard",
            Self::Openvpn => "openvpn",
            Self::L2tp => "l2tp",
            Self::Pptp => "pptp",
            Self::Sstp => "sstp",
            Self::Ikev2 => "ikev2",
        };
        write!(f, "{s}")
    }
}

/// One VPN client tunnel.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct VpnClient {
    pub name: String,

    /// Defaults to [`VpnFamily::default_iface`].
    #[serde(default)]
    pub interface: Option<String>,

    /// The address of the VPN server, which must be reached outside the
    /// tunnel.
    #[serde(default)]
    pub endpoint: Option<Ipv4Addr>,

    #[serde(default)]
    pub priority: Option<u32>,

    #[serde(default = "default_weight")]
    pub weight: u32,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct VpnClients {
    #[serde(default)]
    pub wireguard: Vec<VpnClient>,
    #[serde(default)]
    pub openvpn: Vec<VpnClient>,
    #[serde(default)]
    pub l2tp: Vec<VpnClient>,
    #[serde(default)]
    pub pptp: Vec<VpnClient>,
    #[serde(default)]
    pub sstp: Vec<VpnClient>,
    #[serde(default)]
    pub ikev2: Vec<VpnClient>,
}

impl VpnClients {
    pub fn family(&self, family: VpnFamily) -> &[VpnClient] {
        match family {
            VpnFamily::Wireguard => &self.wireguard,
            VpnFamily::Openvpn => &self.openvpn,
            VpnFamily::L2tp => &self.l2tp,
            VpnFamily::Pptp => &self.pptp,
            VpnFamily::Sstp => &self.sstp,
            VpnFamily::Ikev2 => &self.ikev2,
        }
    }

    /// Every client, family by family in [`VpnFamily::ALL`] order.
    pub fn flatten(&self) -> impl Iterator<Item = (VpnFamily, &VpnClient)> {
        VpnFamily::ALL.into_iter().flat_map(move |family| {
            self.family(family).iter().map(move |c| (family, c))
        })
    }
}

/// One of the four base LAN networks.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SubnetCfg {
    pub cidr: Ipv4Cidr,
    #[serde(default)]
    pub layout: AddrLayout,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct BaseSubnets {
    #[serde(default)]
    pub split: Option<SubnetCfg>,
    #[serde(default)]
    pub domestic: Option<SubnetCfg>,
    #[serde(default)]
    pub foreign: Option<SubnetCfg>,
    #[serde(default)]
    pub vpn: Option<SubnetCfg>,
}

/// An additional LAN network.
///
/// The block is either given as `cidr` or carved out of
/// [`Subnets::pool`] to hold `hosts` hosts.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct NamedSubnet {
    pub name: String,
    #[serde(default)]
    pub cidr: Option<Ipv4Cidr>,
    #[serde(default)]
    pub hosts: Option<u64>,
    #[serde(default)]
    pub layout: AddrLayout,

    /// Route through this uplink instead of the network's class.
    #[serde(default)]
    pub uplink: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Subnets {
    #[serde(default)]
    pub base: BaseSubnets,
    #[serde(default)]
    pub domestic: Vec<NamedSubnet>,
    #[serde(default)]
    pub foreign: Vec<NamedSubnet>,

    /// Networks dedicated to one VPN client. The uplink defaults to the
    /// client of the same name.
    #[serde(default)]
    pub vpn_client: Vec<NamedSubnet>,

    /// The block that networks declared by host count are carved from.
    #[serde(default)]
    pub pool: Option<Ipv4Cidr>,
}

/// The kind of a LAN network, which decides how it is routed.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize,
)]
pub enum NetworkKind {
    /// Routed by destination: domestic destinations through the
    /// domestic class, everything else through the foreign class.
    Split,
    Domestic,
    #[default]
    Foreign,
    #[serde(rename = "VPN")]
    Vpn,
}

impl NetworkKind {
    /// The class that routes this kind of network, `None` for split.
    pub fn class(self) -> Option<UplinkClass> {
        match self {
            Self::Split => None,
            Self::Domestic => Some(UplinkClass::Domestic),
            Self::Foreign => Some(UplinkClass::Foreign),
            Self::Vpn => Some(UplinkClass::Vpn),
        }
    }

    /// The class whose probe answers this network's DNS queries.
    pub fn dns_class(self) -> UplinkClass {
        self.class().unwrap_or(UplinkClass::Foreign)
    }
}

impl Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Split => "Split",
            Self::Domestic => "Domestic",
            Self::Foreign => "Foreign",
            Self::Vpn => "VPN",
        };
        write!(f, "{s}")
    }
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LbMethod {
    /// Per-connection classifier buckets, weighted.
    #[default]
    Pcc,
    /// Round-robin `nth` counters.
    Nth,
}

impl Display for LbMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Pcc => "pcc",
            Self::Nth => "nth",
        };
        write!(f, "{s}")
    }
}

/// Spread the new connections of one base network across every uplink
/// of a class.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct LoadBalance {
    #[serde(default)]
    pub method: LbMethod,
    #[serde(default)]
    pub network: NetworkKind,
    #[serde(default)]
    pub class: UplinkClass,
}

/// VLAN tagging of the LAN networks over one trunk port.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Trunk {
    pub interface: String,
}

/// Force traffic to some destinations through one class.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ServiceRoute {
    pub name: String,
    #[serde(default)]
    pub dst: Vec<Ipv4Cidr>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub dst_port: Option<String>,
    pub via: UplinkClass,
}

impl ServiceRoute {
    /// The address list holding [`Self::dst`].
    pub fn address_list(&self) -> String {
        format!("Service-{}", self.name)
    }
}

/// A VPN server on the router, reached from the WAN side.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct VpnServer {
    pub name: String,
    pub protocol: String,
    pub port: u16,
}

/// Services reached from the WAN side, whose replies must leave through
/// the uplink the request came in on.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Inbound {
    #[serde(default)]
    pub ssh_port: Option<u16>,
    #[serde(default)]
    pub vpn_servers: Vec<VpnServer>,
}

/// Everything the compiler needs to know about one router.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Topology {
    #[serde(default)]
    pub subnets: Subnets,
    #[serde(default)]
    pub wan: WanLinks,
    #[serde(default)]
    pub vpn_clients: VpnClients,
    #[serde(default)]
    pub load_balance: Option<LoadBalance>,
    #[serde(default)]
    pub trunk: Option<Trunk>,
    #[serde(default)]
    pub services: Vec<ServiceRoute>,
    #[serde(default)]
    pub inbound: Inbound,
}
