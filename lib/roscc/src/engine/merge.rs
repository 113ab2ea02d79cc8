// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Merging generator fragments into the final configuration.

use super::cmd::Section;
use super::fragment::Fragment;
use super::mangle::MangleMeta;
use super::sort::sort_mangle;
use core::fmt;
use core::fmt::Display;
use serde::Serialize;
use serde::Serializer;
use serde::ser::SerializeMap;

/// Concatenate `frags` section by section, in the order given.
///
/// Nothing is deduplicated. A section appears in the result only if at
/// least one fragment holds an entry for it, so merging empty fragments
/// yields an empty fragment.
pub fn merge(frags: impl IntoIterator<Item = Fragment>) -> Fragment {
    let mut out = Fragment::new();
    for frag in frags {
        out.append(frag);
    }
    out
}

/// Sort the mangle section of `frag` and render every entry to text.
pub fn finalize(frag: Fragment) -> CompiledConfig {
    let mut sections = vec![];
    let mut mangle = vec![];

    for (section, entries) in frag.into_sections() {
        if entries.is_empty() {
            continue;
        }

        let entries = if section == Section::MANGLE {
            let sorted = sort_mangle(entries);
            mangle = sorted
                .iter()
                .map(|e| match e.mangle() {
                    Some(meta) => meta.clone(),
                    None => MangleMeta::parse(e.text()),
                })
                .collect();
            sorted
        } else {
            entries
        };

        let lines = entries.into_iter().map(|e| e.text().to_string()).collect();
        sections.push((section, lines));
    }

    CompiledConfig { sections, mangle }
}

/// The compiled configuration: RouterOS commands grouped by section.
///
/// The mangle section is in evaluation order. Sections with no commands
/// are never present.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CompiledConfig {
    sections: Vec<(Section, Vec<String>)>,
    mangle: Vec<MangleMeta>,
}

impl CompiledConfig {
    pub fn get(&self, section: &Section) -> &[String] {
        self.sections
            .iter()
            .find(|(s, _)| s == section)
            .map(|(_, lines)| lines.as_slice())
            .unwrap_or_default()
    }

    pub fn sections(&self) -> impl Iterator<Item = (&Section, &[String])> {
        self.sections.iter().map(|(s, l)| (s, l.as_slice()))
    }

    /// The sort records of the mangle section, index for index.
    pub fn mangle_meta(&self) -> &[MangleMeta] {
        &self.mangle
    }

    /// The number of commands across all sections.
    pub fn len(&self) -> usize {
        self.sections.iter().map(|(_, l)| l.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl Display for CompiledConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (section, lines) in &self.sections {
            writeln!(f, "{section}")?;
            for line in lines {
                writeln!(f, "{line}")?;
            }
        }
        Ok(())
    }
}

impl Serialize for CompiledConfig {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(self.sections.len()))?;
        for (section, lines) in &self.sections {
            map.serialize_entry(section.path(), lines)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::cmd::Command;
    use crate::engine::mangle::Chain;
    use crate::engine::mangle::MangleRule;
    use crate::engine::mangle::Tier;

    fn nat(comment: &str) -> Command {
        Command::add().arg("chain", "dstnat").comment(comment)
    }

    #[test]
    fn concatenates_in_invocation_order() {
        let mut a = Fragment::new();
        a.push(Section::NAT, nat("a1"));
        a.push(Section::ROUTE, Command::add().arg("dst-address", "0.0.0.0/0"));
        a.push(Section::NAT, nat("a2"));

        let mut b = Fragment::new();
        b.push(Section::NAT, nat("b1"));
        b.push(Section::NAT, nat("a1"));

        let merged = merge([a, b]);
        let comments: Vec<_> = merged
            .get(&Section::NAT)
            .iter()
            .map(|e| Command::parse(e.text()))
            .map(|c| c.get_comment().unwrap_or_default().to_string())
            .collect();
        // No deduplication.
        assert_eq!(comments, ["a1", "a2", "b1", "a1"]);
        assert_eq!(merged.get(&Section::ROUTE).len(), 1);
    }

    #[test]
    fn empty_in_empty_out() {
        let merged = merge([Fragment::new(), Fragment::new()]);
        assert!(merged.is_empty());
        assert_eq!(merged.sections().count(), 0);

        let cfg = finalize(merged);
        assert!(cfg.is_empty());
        assert_eq!(cfg.to_string(), "");
        assert_eq!(serde_json::to_string(&cfg).unwrap(), "{}");
    }

    #[test]
    fn finalize_sorts_only_mangle() {
        let mut gen1 = Fragment::new();
        gen1.push(Section::NAT, nat("second"));
        gen1.push_mangle(
            MangleRule::mark_routing(Chain::Prerouting, "to-Foreign")
                .in_interface("LANBridgeForeign")
                .comment("Route Foreign"),
        );

        let mut gen2 = Fragment::new();
        gen2.push(Section::NAT, nat("first"));
        gen2.push_mangle(
            MangleRule::accept(Chain::Prerouting)
                .arg("src-address-list", "LOCAL-IP"),
        );

        let cfg = finalize(merge([gen1, gen2]));
        let tiers: Vec<_> =
            cfg.mangle_meta().iter().map(|m| m.tier()).collect();
        assert_eq!(tiers, [Tier::Accept, Tier::Network]);
        assert!(cfg.get(&Section::MANGLE)[0].starts_with("add action=accept"));

        let nat = cfg.get(&Section::NAT);
        assert!(nat[0].ends_with("comment=second"));
        assert!(nat[1].ends_with("comment=first"));
        assert_eq!(cfg.len(), 4);
    }

    #[test]
    fn renders_as_script() {
        let mut frag = Fragment::new();
        frag.push(
            Section::ROUTING_TABLE,
            Command::add().arg("name", "to-Foreign").arg("fib", ""),
        );
        frag.push(Section::NAT, nat("dns"));

        let cfg = finalize(frag);
        assert_eq!(
            cfg.to_string(),
            "/routing table\n\
             add name=to-Foreign fib=\"\"\n\
             /ip firewall nat\n\
             add chain=dstnat comment=dns\n"
        );

        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["/ip firewall nat"][0], "add chain=dstnat comment=dns");
    }
}
