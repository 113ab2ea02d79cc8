// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Packet-marking (mangle) rules.
//!
//! The device evaluates mangle rules top-down and a rule that matches
//! on a mark only works if the rule setting that mark sits above it.
//! To order rules coming from unrelated generators, every rule carries
//! a [`MangleMeta`] record next to its command. Rules built with
//! [`MangleRule`] fill in the record as they are built; raw command
//! lines get theirs from [`MangleMeta::parse`].
//!
//! A rule's tier comes from its action and the leading tag of its
//! comment, see [`tag`] and [`MangleMeta::tier`].

use super::cmd::Command;
use core::fmt;
use core::fmt::Display;
use serde::Serialize;

/// Comment tags that place a rule in a tier.
///
/// A comment carries a tag when it starts with the tag followed by the
/// end of the comment or a space.
pub mod tag {
    pub const VPN_ENDPOINT: &str = "VPN Endpoint";
    pub const OUTPUT: &str = "Output";
    pub const SERVICE: &str = "Service";
    pub const SPLIT: &str = "Split";
    pub const VPN_SERVER: &str = "VPN Server";
    pub const SSH: &str = "SSH";
    pub const PCC: &str = "PCC";
    pub const NTH: &str = "NTH";

    pub fn has(comment: &str, tag: &str) -> bool {
        match comment.strip_prefix(tag) {
            Some(rest) => rest.is_empty() || rest.starts_with(' '),
            None => false,
        }
    }
}

/// The connection mark that matches connections nobody has marked yet.
pub const NO_MARK: &str = "no-mark";

#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum Chain {
    Prerouting,
    Input,
    Forward,
    Output,
    Postrouting,
    Other(String),
}

impl From<&str> for Chain {
    fn from(s: &str) -> Self {
        match s {
            "prerouting" => Self::Prerouting,
            "input" => Self::Input,
            "forward" => Self::Forward,
            "output" => Self::Output,
            "postrouting" => Self::Postrouting,
            _ => Self::Other(s.to_string()),
        }
    }
}

impl Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Prerouting => "prerouting",
            Self::Input => "input",
            Self::Forward => "forward",
            Self::Output => "output",
            Self::Postrouting => "postrouting",
            Self::Other(s) => s,
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum MangleAction {
    Accept,
    MarkConnection,
    MarkRouting,
    MarkPacket,
    Other(String),
}

impl From<&str> for MangleAction {
    fn from(s: &str) -> Self {
        match s {
            "accept" => Self::Accept,
            "mark-connection" => Self::MarkConnection,
            "mark-routing" => Self::MarkRouting,
            "mark-packet" => Self::MarkPacket,
            _ => Self::Other(s.to_string()),
        }
    }
}

impl Display for MangleAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Accept => "accept",
            Self::MarkConnection => "mark-connection",
            Self::MarkRouting => "mark-routing",
            Self::MarkPacket => "mark-packet",
            Self::Other(s) => s,
        };
        write!(f, "{s}")
    }
}

/// The connection mark a rule sets and the one it matches on.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Serialize)]
pub struct ConnMark {
    pub sets: Option<String>,
    pub matches: Option<String>,
}

impl ConnMark {
    /// Does the rule match on a mark some earlier rule must have set?
    ///
    /// `no-mark` and negated matches do not depend on an earlier rule.
    pub fn matches_set_mark(&self) -> bool {
        match &self.matches {
            Some(m) => m != NO_MARK && !m.starts_with('!'),
            None => false,
        }
    }
}

/// The load-balancing algorithm a rule belongs to.
#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum LbTag {
    /// Per-connection classifier buckets.
    Pcc,
    /// Round-robin `nth` counters.
    Nth,
}

impl LbTag {
    pub fn from_comment(comment: &str) -> Option<Self> {
        if tag::has(comment, tag::PCC) {
            Some(Self::Pcc)
        } else if tag::has(comment, tag::NTH) {
            Some(Self::Nth)
        } else {
            None
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Pcc => tag::PCC,
            Self::Nth => tag::NTH,
        }
    }
}

impl Display for LbTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Where a rule sits in the mangle table, lowest first.
#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum Tier {
    /// `action=accept` short-circuits, e.g. LAN-to-LAN traffic.
    Accept,
    /// Routing the tunnel endpoints of VPN clients, before anything can
    /// steer their own traffic into the tunnel.
    VpnEndpoint,
    /// Output-chain rules forcing specific destinations via a class.
    OutputSpecial,
    /// Application or service routes.
    Service,
    /// The split network, steered by destination.
    Split,
    /// Per-network class routing, including load balancing.
    Network,
    /// Reply routing for inbound VPN-server and SSH connections.
    Inbound,
}

impl Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Accept => "accept",
            Self::VpnEndpoint => "vpn-endpoint",
            Self::OutputSpecial => "output",
            Self::Service => "service",
            Self::Split => "split",
            Self::Network => "network",
            Self::Inbound => "inbound",
        };
        write!(f, "{s}")
    }
}

/// Ordering inside [`Tier::Network`], lowest first.
#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum SubRank {
    /// prerouting `mark-connection` with an interface match.
    ConnMarkIn,
    /// output `mark-routing`.
    OutputRouting,
    /// Any `nth` counter.
    Nth,
    /// prerouting `mark-routing` on a connection mark set above.
    RoutingByConnMark,
    Other,
}

impl Display for SubRank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::ConnMarkIn => "conn-in",
            Self::OutputRouting => "out-route",
            Self::Nth => "nth",
            Self::RoutingByConnMark => "route-by-conn",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// What the sorter needs to know about a mangle rule.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct MangleMeta {
    pub chain: Chain,
    pub action: MangleAction,
    pub comment: Option<String>,
    pub conn_mark: ConnMark,
    /// Matches on `in-interface` or `in-interface-list`.
    pub in_interface: bool,
    /// Carries an `nth` counter.
    pub nth: bool,
    pub lb: Option<LbTag>,
}

impl MangleMeta {
    pub fn new(chain: Chain, action: MangleAction) -> Self {
        Self {
            chain,
            action,
            comment: None,
            conn_mark: ConnMark::default(),
            in_interface: false,
            nth: false,
            lb: None,
        }
    }

    /// Recover the record from a command.
    pub fn from_command(cmd: &Command) -> Self {
        let comment = cmd.get_comment().map(str::to_string);
        Self {
            chain: Chain::from(cmd.get("chain").unwrap_or_default()),
            action: MangleAction::from(cmd.get("action").unwrap_or_default()),
            lb: comment.as_deref().and_then(LbTag::from_comment),
            comment,
            conn_mark: ConnMark {
                sets: cmd.get("new-connection-mark").map(str::to_string),
                matches: cmd.get("connection-mark").map(str::to_string),
            },
            in_interface: cmd.has("in-interface")
                || cmd.has("in-interface-list"),
            nth: cmd.has("nth"),
        }
    }

    /// Recover the record from raw command text.
    pub fn parse(line: &str) -> Self {
        Self::from_command(&Command::parse(line))
    }

    pub fn tier(&self) -> Tier {
        if self.action == MangleAction::Accept {
            return Tier::Accept;
        }

        let comment = self.comment.as_deref().unwrap_or_default();
        if tag::has(comment, tag::VPN_ENDPOINT) {
            Tier::VpnEndpoint
        } else if tag::has(comment, tag::OUTPUT) {
            Tier::OutputSpecial
        } else if tag::has(comment, tag::SERVICE) {
            Tier::Service
        } else if tag::has(comment, tag::SPLIT) {
            Tier::Split
        } else if tag::has(comment, tag::VPN_SERVER)
            || tag::has(comment, tag::SSH)
        {
            Tier::Inbound
        } else {
            Tier::Network
        }
    }

    pub fn sub_rank(&self) -> SubRank {
        if self.nth {
            return SubRank::Nth;
        }

        match (&self.chain, &self.action) {
            (Chain::Prerouting, MangleAction::MarkConnection)
                if self.in_interface =>
            {
                SubRank::ConnMarkIn
            }
            (Chain::Output, MangleAction::MarkRouting) => {
                SubRank::OutputRouting
            }
            (Chain::Prerouting, MangleAction::MarkRouting)
                if self.conn_mark.matches_set_mark() =>
            {
                SubRank::RoutingByConnMark
            }
            _ => SubRank::Other,
        }
    }
}

/// A mangle rule under construction.
///
/// Every builder method writes the command argument and the matching
/// [`MangleMeta`] field together.
#[derive(Clone, Debug)]
pub struct MangleRule {
    cmd: Command,
    meta: MangleMeta,
}

impl MangleRule {
    pub fn new(chain: Chain, action: MangleAction) -> Self {
        let cmd = Command::add()
            .arg("action", &action)
            .arg("chain", &chain);
        Self { cmd, meta: MangleMeta::new(chain, action) }
    }

    pub fn accept(chain: Chain) -> Self {
        Self::new(chain, MangleAction::Accept)
    }

    pub fn mark_connection(chain: Chain, mark: &str) -> Self {
        let mut rule = Self::new(chain, MangleAction::MarkConnection);
        rule.cmd = rule.cmd.arg("new-connection-mark", mark);
        rule.meta.conn_mark.sets = Some(mark.to_string());
        rule
    }

    pub fn mark_routing(chain: Chain, table: &str) -> Self {
        Self::new(chain, MangleAction::MarkRouting)
            .arg("new-routing-mark", table)
    }

    /// Any matcher the sorter does not care about.
    pub fn arg(mut self, key: &str, val: impl Display) -> Self {
        self.cmd = self.cmd.arg(key, val);
        self
    }

    pub fn in_interface(mut self, iface: &str) -> Self {
        self.meta.in_interface = true;
        self.arg("in-interface", iface)
    }

    pub fn in_interface_list(mut self, list: &str) -> Self {
        self.meta.in_interface = true;
        self.arg("in-interface-list", list)
    }

    pub fn connection_mark(mut self, mark: &str) -> Self {
        self.meta.conn_mark.matches = Some(mark.to_string());
        self.arg("connection-mark", mark)
    }

    pub fn nth(mut self, every: u32, packet: u32) -> Self {
        self.meta.nth = true;
        self.arg("nth", format!("{every},{packet}"))
    }

    pub fn passthrough(self, yes: bool) -> Self {
        self.arg("passthrough", if yes { "yes" } else { "no" })
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        let comment = comment.into();
        self.meta.lb = LbTag::from_comment(&comment);
        self.cmd = self.cmd.comment(comment.clone());
        self.meta.comment = Some(comment);
        self
    }

    pub fn meta(&self) -> &MangleMeta {
        &self.meta
    }

    pub fn command(&self) -> &Command {
        &self.cmd
    }

    pub fn into_parts(self) -> (Command, MangleMeta) {
        (self.cmd, self.meta)
    }
}
