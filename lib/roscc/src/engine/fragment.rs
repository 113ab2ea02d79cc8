// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Rule fragments: one generator's output, grouped by section.

use super::cmd::Command;
use super::cmd::Section;
use super::mangle::MangleMeta;
use super::mangle::MangleRule;

/// One line of generated output.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Entry {
    text: String,
    mangle: Option<MangleMeta>,
}

impl Entry {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The sort record, present on every entry of the mangle section.
    pub fn mangle(&self) -> Option<&MangleMeta> {
        self.mangle.as_ref()
    }
}

impl From<MangleRule> for Entry {
    fn from(rule: MangleRule) -> Self {
        let (cmd, meta) = rule.into_parts();
        Self { text: cmd.to_string(), mangle: Some(meta) }
    }
}

/// Commands grouped by [`Section`].
///
/// Sections keep the order in which they were first written to, and a
/// section only exists once it holds an entry.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Fragment {
    sections: Vec<(Section, Vec<Entry>)>,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries_mut(&mut self, section: Section) -> &mut Vec<Entry> {
        let idx = match self.sections.iter().position(|(s, _)| *s == section)
        {
            Some(idx) => idx,
            None => {
                self.sections.push((section, vec![]));
                self.sections.len() - 1
            }
        };
        &mut self.sections[idx].1
    }

    pub fn push(&mut self, section: Section, cmd: Command) {
        let entry = Entry { text: cmd.to_string(), mangle: None };
        self.entries_mut(section).push(entry);
    }

    pub fn push_mangle(&mut self, rule: MangleRule) {
        self.entries_mut(Section::MANGLE).push(Entry::from(rule));
    }

    /// Add a line of text produced elsewhere.
    ///
    /// Mangle lines get their sort record by parsing the text.
    pub fn push_raw(&mut self, section: Section, line: impl Into<String>) {
        let text = line.into();
        let mangle =
            (section == Section::MANGLE).then(|| MangleMeta::parse(&text));
        self.entries_mut(section).push(Entry { text, mangle });
    }

    /// Append `entries` to `section`, creating it only if there is
    /// something to append.
    pub fn extend(
        &mut self,
        section: Section,
        entries: impl IntoIterator<Item = Entry>,
    ) {
        let mut entries = entries.into_iter().peekable();
        if entries.peek().is_none() {
            return;
        }
        self.entries_mut(section).extend(entries);
    }

    /// Append every section of `other`.
    pub fn append(&mut self, other: Fragment) {
        for (section, entries) in other.sections {
            self.extend(section, entries);
        }
    }

    pub fn get(&self, section: &Section) -> &[Entry] {
        self.sections
            .iter()
            .find(|(s, _)| s == section)
            .map(|(_, entries)| entries.as_slice())
            .unwrap_or_default()
    }

    pub fn sections(&self) -> impl Iterator<Item = (&Section, &[Entry])> {
        self.sections.iter().map(|(s, e)| (s, e.as_slice()))
    }

    pub fn into_sections(self) -> impl Iterator<Item = (Section, Vec<Entry>)> {
        self.sections.into_iter()
    }

    /// The number of entries across all sections.
    pub fn len(&self) -> usize {
        self.sections.iter().map(|(_, e)| e.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
