// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Mangle sorter microbenchmarks.

use criterion::BatchSize;
use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::Throughput;
use criterion::criterion_group;
use criterion::criterion_main;
use roscc::engine::fragment::Entry;
use roscc::engine::mangle::Chain;
use roscc::engine::mangle::MangleRule;
use roscc::engine::mangle::NO_MARK;
use roscc::engine::sort::sort_mangle;
use roscc::engine::sort::sort_mangle_lines;
use std::hint::black_box;

/// Build the mangle rules of `n` load-balanced uplinks, emitted in the
/// reverse of their evaluation order.
fn lb_rules(n: u32) -> Vec<MangleRule> {
    let mut rules = vec![];
    for i in 0..n {
        let mark = format!("pcc-wan{i}");
        let comment = format!("PCC wan{i}");
        rules.push(
            MangleRule::mark_routing(Chain::Prerouting, &mark)
                .connection_mark(&mark)
                .in_interface("LANBridgeForeign")
                .passthrough(false)
                .comment(&comment),
        );
        rules.push(
            MangleRule::mark_routing(Chain::Output, &mark)
                .connection_mark(&mark)
                .comment(&comment),
        );
        rules.push(
            MangleRule::mark_connection(Chain::Prerouting, &mark)
                .in_interface("LANBridgeForeign")
                .connection_mark(NO_MARK)
                .arg(
                    "per-connection-classifier",
                    format!("both-addresses-and-ports:{n}/{i}"),
                )
                .comment(&comment),
        );
        rules.push(
            MangleRule::mark_connection(Chain::Input, &format!("ssh-wan{i}"))
                .in_interface(&format!("ether{i}"))
                .comment(format!("SSH wan{i}")),
        );
    }
    rules.push(
        MangleRule::accept(Chain::Prerouting)
            .arg("src-address-list", "LOCAL-IP")
            .arg("dst-address-list", "LOCAL-IP"),
    );
    rules
}

/// Sorting entries that carry their sort record against sorting raw
/// lines that must be parsed first.
fn sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("mangle/sort");

    for uplinks in [2, 8, 32] {
        let rules = lb_rules(uplinks);
        let lines: Vec<String> =
            rules.iter().map(|r| r.command().to_string()).collect();
        group.throughput(Throughput::Elements(rules.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("entries", uplinks),
            &rules,
            |b, rules| {
                b.iter_batched(
                    || rules.iter().cloned().map(Entry::from).collect(),
                    |entries: Vec<Entry>| black_box(sort_mangle(entries)),
                    BatchSize::SmallInput,
                )
            },
        );
        group.bench_with_input(
            BenchmarkId::new("lines", uplinks),
            &lines,
            |b, lines| {
                b.iter(|| black_box(sort_mangle_lines(lines.as_slice())))
            },
        );
    }

    group.finish();
}

criterion_group!(benches, sort);
criterion_main!(benches);
