// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The mangle priority sort.
//!
//! Rules are ordered by the key
//!
//! ```text
//! (tier, sub-rank, load-balancing sub-tier, emission index)
//! ```
//!
//! The sub-rank and load-balancing sub-tier only apply inside
//! [`Tier::Network`]; in every other tier they are absent and rules
//! keep their emission order.
//!
//! # Network tier
//!
//! ```text
//! |Sub-rank           |Rule                                          |
//! |-------------------|----------------------------------------------|
//! |ConnMarkIn         |prerouting mark-connection, in-interface match|
//! |OutputRouting      |output mark-routing                           |
//! |Nth                |anything with an nth counter                  |
//! |RoutingByConnMark  |prerouting mark-routing on a set conn mark    |
//! |Other              |everything else                               |
//! ```
//!
//! Between rules of equal sub-rank, plain network rules come before
//! PCC rules, which come before NTH rules.
//!
//! This third component departs from the three-part key
//! `(tier, sub-rank, emission index)`, under which equal sub-ranks
//! would keep emission order. With it the relative order of plain and
//! load-balancing rules no longer depends on which generator ran first.

use super::fragment::Entry;
use super::mangle::LbTag;
use super::mangle::MangleMeta;
use super::mangle::SubRank;
use super::mangle::Tier;
use itertools::Itertools;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SortKey {
    pub tier: Tier,
    pub sub: Option<SubRank>,
    pub lb: Option<LbTag>,
}

impl SortKey {
    pub fn of(meta: &MangleMeta) -> Self {
        match meta.tier() {
            Tier::Network => Self {
                tier: Tier::Network,
                sub: Some(meta.sub_rank()),
                lb: meta.lb,
            },
            tier => Self { tier, sub: None, lb: None },
        }
    }
}

/// Sort mangle entries into evaluation order.
///
/// Entries without a sort record are parsed. The sort is stable, so
/// sorting sorted output changes nothing.
pub fn sort_mangle(entries: Vec<Entry>) -> Vec<Entry> {
    entries
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| {
            let key = match entry.mangle() {
                Some(meta) => SortKey::of(meta),
                None => SortKey::of(&MangleMeta::parse(entry.text())),
            };
            (key, idx, entry)
        })
        .sorted_by_key(|(key, idx, _)| (*key, *idx))
        .map(|(_, _, entry)| entry)
        .collect()
}

/// Sort raw mangle command lines into evaluation order.
pub fn sort_mangle_lines<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            let line: &str = line.as_ref();
            (SortKey::of(&MangleMeta::parse(line)), idx, line)
        })
        .sorted_by_key(|(key, idx, _)| (*key, *idx))
        .map(|(_, _, line)| line.to_string())
        .collect()
}
