// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Print compiled configurations in a human-friendly manner.
//!
//! This is mostly a place to hang printing routines so that they can be
//! used by both callers and integration tests.

use crate::engine::cmd::Section;
use crate::engine::mangle::MangleMeta;
use crate::engine::merge::CompiledConfig;
use crate::engine::sort::SortKey;
use std::io::Write;
use tabwriter::TabWriter;

/// Print a [`CompiledConfig`].
pub fn print_config(cfg: &CompiledConfig) -> std::io::Result<()> {
    print_config_into(&mut std::io::stdout(), cfg)
}

/// Print a [`CompiledConfig`] into a given writer.
pub fn print_config_into(
    writer: &mut impl Write,
    cfg: &CompiledConfig,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "SECTION\tCOMMANDS")?;
    write_hrb(&mut t)?;
    for (section, lines) in cfg.sections() {
        writeln!(t, "{section}\t{}", lines.len())?;
    }
    write_hr(&mut t)?;
    writeln!(t, "TOTAL\t{}", cfg.len())?;
    t.flush()?;

    for (section, lines) in cfg.sections() {
        writeln!(t, "\n{section}")?;
        write_hr(&mut t)?;
        for (i, line) in lines.iter().enumerate() {
            writeln!(t, "{i}\t{line}")?;
        }
        t.flush()?;
    }

    t.flush()
}

/// Print the mangle section of a [`CompiledConfig`] with its sort keys.
pub fn print_mangle(cfg: &CompiledConfig) -> std::io::Result<()> {
    print_mangle_into(&mut std::io::stdout(), cfg)
}

/// Print the mangle section of a [`CompiledConfig`] into a given writer.
pub fn print_mangle_into(
    writer: &mut impl Write,
    cfg: &CompiledConfig,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "{}", Section::MANGLE)?;
    write_hrb(&mut t)?;
    print_mangle_header(&mut t)?;
    write_hr(&mut t)?;
    for (idx, meta) in cfg.mangle_meta().iter().enumerate() {
        print_mangle_meta(&mut t, idx, meta)?;
    }
    t.flush()
}

/// Print the header for the [`print_mangle_meta()`] output.
pub fn print_mangle_header(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "IDX\tTIER\tSUB\tCHAIN\tACTION\tSETS\tMATCHES\tCOMMENT")
}

/// Print one mangle sort record.
pub fn print_mangle_meta(
    t: &mut impl Write,
    idx: usize,
    meta: &MangleMeta,
) -> std::io::Result<()> {
    let key = SortKey::of(meta);
    let sub = match (key.sub, key.lb) {
        (Some(sub), Some(lb)) => format!("{sub}/{lb}"),
        (Some(sub), None) => sub.to_string(),
        (None, _) => "-".to_string(),
    };

    writeln!(
        t,
        "{idx}\t{}\t{sub}\t{}\t{}\t{}\t{}\t{}",
        key.tier,
        meta.chain,
        meta.action,
        meta.conn_mark.sets.as_deref().unwrap_or("-"),
        meta.conn_mark.matches.as_deref().unwrap_or("-"),
        meta.comment.as_deref().unwrap_or(""),
    )
}

/// Print horizontal rule in bold.
pub fn write_hrb(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:=<70}", "=")
}

/// Print horizontal rule.
pub fn write_hr(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:-<70}", "-")
}
