// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Exit-code taxonomy and no-partial-artifact behavior of the `shear`
//! binary, exercised through real process invocations.

use std::path::Path;
use std::process::Command;

use shear::chain::{Chain, ChainElement, ChainMetadata, ElementKind};

fn shear() -> Command {
    Command::new(env!("CARGO_BIN_EXE_shear"))
}

fn element(name: &str, kind: ElementKind, ordinal: u32, width: usize) -> ChainElement {
    ChainElement {
        name: name.to_string(),
        kind,
        ordinal,
        width,
    }
}

fn write_chained_netlist(path: &Path, order: Chain) {
    let metadata = ChainMetadata {
        boundary_count: 1,
        internal_count: 1,
        order,
    };
    let content = format!(
        "{}\n{}\nmodule top (a);\n  input a;\nendmodule\n",
        shear::BOILERPLATE,
        metadata.comment().unwrap()
    );
    std::fs::write(path, content).unwrap();
}

#[test]
fn asm_succeeds_and_writes_both_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let netlist = dir.path().join("design.v");
    let spec = dir.path().join("tv.json");
    let base = dir.path().join("run");

    write_chained_netlist(
        &netlist,
        Chain(vec![
            element("a", ElementKind::Input, 0, 2),
            element("b", ElementKind::Output, 1, 3),
        ]),
    );
    std::fs::write(
        &spec,
        r#"{
            "inputs": [{"name": "a", "polarity": "input", "width": 2}],
            "coverageList": [{"vector": [3], "goldenOutput": "101"}]
        }"#,
    )
    .unwrap();

    // Netlist first, spec second: positionals are order-independent.
    let status = shear()
        .arg("asm")
        .arg(&netlist)
        .arg(&spec)
        .arg("-o")
        .arg(&base)
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(0));

    let vec_path = dir.path().join("run_vec.bin");
    let out_path = dir.path().join("run_out.bin");
    let stimulus = std::fs::read_to_string(&vec_path).unwrap();
    let response = std::fs::read_to_string(&out_path).unwrap();
    assert_eq!(stimulus.lines().nth(2), Some("11"));
    assert_eq!(response.lines().nth(2), Some("101"));
}

#[test]
fn asm_order_mismatch_exits_65_with_zero_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let netlist = dir.path().join("design.v");
    let spec = dir.path().join("tv.json");
    let base = dir.path().join("run");

    write_chained_netlist(&netlist, Chain(vec![element("a", ElementKind::Input, 0, 1)]));
    std::fs::write(
        &spec,
        r#"{
            "inputs": [{"name": "mismatched", "polarity": "input"}],
            "coverageList": [{"vector": [1], "goldenOutput": ""}]
        }"#,
    )
    .unwrap();

    let status = shear()
        .arg("asm")
        .arg(&spec)
        .arg(&netlist)
        .arg("-o")
        .arg(&base)
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(65));
    assert!(!dir.path().join("run_vec.bin").exists());
    assert!(!dir.path().join("run_out.bin").exists());
}

#[test]
fn asm_unclassifiable_suffixes_exit_64() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("one.txt");
    let b = dir.path().join("two.txt");
    std::fs::write(&a, "").unwrap();
    std::fs::write(&b, "").unwrap();

    let status = shear().arg("asm").arg(&a).arg(&b).status().unwrap();
    assert_eq!(status.code(), Some(64));
}

#[test]
fn asm_missing_spec_exits_66() {
    let dir = tempfile::tempdir().unwrap();
    let netlist = dir.path().join("design.v");
    write_chained_netlist(&netlist, Chain(vec![]));

    let status = shear()
        .arg("asm")
        .arg(dir.path().join("absent.json"))
        .arg(&netlist)
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(66));
}

#[test]
fn cut_missing_input_exits_66() {
    let dir = tempfile::tempdir().unwrap();
    let status = shear()
        .arg("cut")
        .arg(dir.path().join("absent.v"))
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(66));
}

#[test]
fn cut_missing_dq_exits_65_with_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let netlist = dir.path().join("design.v");
    std::fs::write(
        &netlist,
        "module top (clk, q);\n  input clk;\n  output q;\n  DFF r1 ( .CLK(clk), .Q(q) );\nendmodule\n",
    )
    .unwrap();
    let output = dir.path().join("design.cut.v");

    let status = shear()
        .arg("cut")
        .arg(&netlist)
        .arg("-o")
        .arg(&output)
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(65));
    assert!(!output.exists());
}
