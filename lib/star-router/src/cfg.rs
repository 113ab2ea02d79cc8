// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Compiler configuration.
//!
//! Unlike the [`crate::api::Topology`], which describes one router, this
//! holds the knobs shared by every compile: the probe-address pools,
//! the DHCP lease time and the names of the address lists the generated
//! rules refer to.

use crate::api::Ipv4Addr;
use crate::api::RosDuration;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Public resolvers abroad, used in order as foreign and VPN probes.
pub const FOREIGN_PROBES: [Ipv4Addr; 10] = [
    Ipv4Addr::from_const([8, 8, 8, 8]),
    Ipv4Addr::from_const([1, 1, 1, 1]),
    Ipv4Addr::from_const([9, 9, 9, 9]),
    Ipv4Addr::from_const([208, 67, 222, 222]),
    Ipv4Addr::from_const([8, 8, 4, 4]),
    Ipv4Addr::from_const([1, 0, 0, 1]),
    Ipv4Addr::from_const([149, 112, 112, 112]),
    Ipv4Addr::from_const([208, 67, 220, 220]),
    Ipv4Addr::from_const([94, 140, 14, 14]),
    Ipv4Addr::from_const([94, 140, 15, 15]),
];

/// Public resolvers at home, used in order as domestic probes.
pub const DOMESTIC_PROBES: [Ipv4Addr; 8] = [
    Ipv4Addr::from_const([217, 218, 127, 127]),
    Ipv4Addr::from_const([217, 218, 155, 155]),
    Ipv4Addr::from_const([178, 22, 122, 100]),
    Ipv4Addr::from_const([185, 51, 200, 2]),
    Ipv4Addr::from_const([10, 202, 10, 10]),
    Ipv4Addr::from_const([10, 202, 10, 11]),
    Ipv4Addr::from_const([78, 157, 42, 100]),
    Ipv4Addr::from_const([78, 157, 42, 101]),
];

/// Which probe pool an address comes from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Pool {
    Domestic,
    Foreign,
}

/// The ordered probe-address pools.
///
/// A probe address is both the liveness-check target of an uplink and
/// the DNS resolver reached through it, so every uplink needs its own.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct ProbePools {
    pub domestic: Vec<Ipv4Addr>,
    pub foreign: Vec<Ipv4Addr>,
}

impl Default for ProbePools {
    fn default() -> Self {
        Self {
            domestic: DOMESTIC_PROBES.to_vec(),
            foreign: FOREIGN_PROBES.to_vec(),
        }
    }
}

impl ProbePools {
    pub fn pool(&self, pool: Pool) -> &[Ipv4Addr] {
        match pool {
            Pool::Domestic => &self.domestic,
            Pool::Foreign => &self.foreign,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct CompileCfg {
    pub probes: ProbePools,

    /// Lease time of every generated DHCP server.
    pub dhcp_lease: RosDuration,

    /// The address list of domestic destinations, maintained outside
    /// the compiled configuration. Split routing matches on it.
    pub domestic_address_list: String,

    /// The address list of private ranges. Traffic between its members
    /// is never marked.
    pub local_address_list: String,
}

impl Default for CompileCfg {
    fn default() -> Self {
        Self {
            probes: ProbePools::default(),
            dhcp_lease: RosDuration::from_secs(30 * 60),
            domestic_address_list: "DOMESTIC-IP".to_string(),
            local_address_list: "LOCAL-IP".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CfgError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
}

impl CompileCfg {
    pub fn from_toml_str(s: &str) -> Result<Self, CfgError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CfgError> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(
            CompileCfg::from_toml_str("").unwrap(),
            CompileCfg::default()
        );
    }

    #[test]
    fn partial_toml() {
        let cfg = CompileCfg::from_toml_str(
            r#"
            dhcp_lease = "1d"
            local_address_list = "RFC1918"

            [probes]
            domestic = ["192.0.2.1", "192.0.2.2"]
            "#,
        )
        .unwrap();

        assert_eq!(cfg.dhcp_lease.as_secs(), 86_400);
        assert_eq!(cfg.local_address_list, "RFC1918");
        assert_eq!(cfg.domestic_address_list, "DOMESTIC-IP");
        assert_eq!(cfg.probes.domestic.len(), 2);
        assert_eq!(cfg.probes.foreign, FOREIGN_PROBES);
    }

    #[test]
    fn bad_toml() {
        let err =
            CompileCfg::from_toml_str("dhcp_lease = \"soon\"").unwrap_err();
        assert!(matches!(err, CfgError::Toml(_)));

        let err = CompileCfg::load("/nonexistent/roscc.toml").unwrap_err();
        assert!(matches!(err, CfgError::Io(_)));
    }

    #[test]
    fn pools_are_disjoint() {
        for ip in FOREIGN_PROBES {
            assert!(!DOMESTIC_PROBES.contains(&ip), "{ip}");
        }
    }
}
