// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Topology regression tests.
//!
//! Each file under `tests/resources/topologies` holds named cases: a
//! topology and what its compiled configuration must (or must not)
//! contain. Every compiled case must also keep the mangle tiers in
//! order and set each connection mark before matching on it.

use roscc_test_utils::*;
use serde::Deserialize;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
struct Case {
    description: String,
    topology: Topology,
    #[serde(default)]
    expect: Expect,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct Expect {
    /// The compile fails with an error whose text contains this.
    error: Option<String>,
    /// Section paths present in the output.
    sections: Vec<String>,
    /// Section paths absent from the output.
    absent: Vec<String>,
    /// Text the rendered script contains.
    script: Vec<String>,
    /// Mangle comments whose first occurrences appear in this order.
    mangle_order: Vec<String>,
}

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct Label {
    family: String,
    name: String,
}

fn load_cases(root_dir: &str) -> HashMap<Label, Case> {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/resources")
        .join(root_dir);

    let mut tests = HashMap::new();
    for entry in std::fs::read_dir(&dir)
        .unwrap_or_else(|e| panic!("failed to find directory {root_dir}: {e}"))
    {
        let entry = entry.unwrap_or_else(|e| {
            panic!("failed to enumerate child of {root_dir}: {e}")
        });

        let path_owned = entry.path();
        let path = path_owned.as_path();
        if path.extension() != Some("ron".as_ref()) {
            continue;
        }

        let contents = std::fs::read_to_string(path).unwrap_or_else(|e| {
            panic!("failed to read contents of {}: {e}", path.display())
        });
        let cases: HashMap<String, Case> = ron::from_str(&contents)
            .unwrap_or_else(|e| {
                panic!("failed to parse {}: {e}", path.display())
            });

        let family =
            path.file_stem().and_then(OsStr::to_str).unwrap_or("<unlabelled>");

        tests.extend(
            cases
                .into_iter()
                .map(|(name, v)| (Label { family: family.into(), name }, v)),
        );
    }

    assert!(!tests.is_empty(), "no cases under {}", dir.display());
    tests
}

fn check(case: &Case) -> Result<(), String> {
    let res = compile(&case.topology, &CompileCfg::default(), &test_logger());
    let expect = &case.expect;

    let cfg = match (res, &expect.error) {
        (Err(e), Some(want)) if e.to_string().contains(want.as_str()) => {
            return Ok(());
        }
        (Err(e), _) => return Err(format!("unexpected error: {e}")),
        (Ok(_), Some(want)) => {
            return Err(format!("compiled, expected error: {want}"));
        }
        (Ok(cfg), None) => cfg,
    };

    let present: Vec<&str> = cfg.sections().map(|(s, _)| s.path()).collect();
    for s in &expect.sections {
        if !present.contains(&s.as_str()) {
            return Err(format!("missing section {s}"));
        }
    }
    for s in &expect.absent {
        if present.contains(&s.as_str()) {
            return Err(format!("unexpected section {s}"));
        }
    }

    let script = cfg.to_string();
    for text in &expect.script {
        if !script.contains(text.as_str()) {
            return Err(format!("script lacks {text:?}"));
        }
    }

    let comments = mangle_comments(&cfg);
    let mut last = None;
    for want in &expect.mangle_order {
        let Some(pos) = comments.iter().position(|c| c == want) else {
            return Err(format!("no mangle rule commented {want:?}"));
        };
        if last.is_some_and(|l| pos < l) {
            return Err(format!("mangle rule {want:?} out of order"));
        }
        last = Some(pos);
    }

    let tiers: Vec<Tier> = cfg.mangle_meta().iter().map(|m| m.tier()).collect();
    if !tiers.windows(2).all(|w| w[0] <= w[1]) {
        return Err("mangle tiers out of order".into());
    }
    assert_marks_set_before_use(&cfg);
    Ok(())
}

#[test]
fn topology_regression() {
    let mut failures = vec![];
    for (label, case) in load_cases("topologies") {
        let Label { family, name } = label;
        if let Err(why) = check(&case) {
            failures.push(format!(
                "{family}/{name}: {why}\n -- {}",
                case.description
            ));
        }
    }
    failures.sort();
    assert!(failures.is_empty(), "\n{}", failures.join("\n"));
}

#[test]
fn fixtures_round_trip_through_ron() {
    let topo = full_star();
    let text = ron::to_string(&topo).unwrap();
    let back: Topology = ron::from_str(&text).unwrap();
    assert_eq!(back, topo);
}
