// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Shear — scan-chain test preparation for structural testing.
//!
//! Shear rewrites synthesized netlists so flip-flop and black-box boundaries
//! become explicit named scan ports (`cut`), and packs test-vector data into
//! fixed-width binary bitstream artifacts for downstream ATPG/simulation
//! tooling (`asm`).
//!
//! # Pipeline
//!
//! ```text
//! netlist (+ optional black-box netlist)
//!   → Netlist        (verilog — owned structural AST, parser, renderer)
//!   → Cutter         (cut — DFF/black-box boundaries → named scan ports)
//!   → cut netlist file
//!
//! chained netlist ──→ ChainMetadata  (chain — ordered scan elements)
//! test-vector JSON ─→ TVInfo         (tv — ports + coverage entries)
//!   → ScanMaps       (assemble — ordinal/name reconciliation, index plans)
//!   → Artifacts      (assemble — stimulus + golden-response bitstreams)
//! ```
//!
//! # Key modules
//!
//! - [`verilog`] — structural Verilog subset: AST, parser, renderer
//! - [`cut`] — netlist cutter turning sequential boundaries into chain taps
//! - [`chain`] — scan-chain model and embedded-metadata extraction
//! - [`tv`] — test-vector specification (TVInfo) JSON model
//! - [`assemble`] — scan-chain reconciliation and bitstream assembly

pub mod verilog;

pub mod cut;

pub mod chain;

pub mod tv;

pub mod assemble;

/// Fixed banner prepended to every generated artifact.
pub const BOILERPLATE: &str = "/* generated by shear: scan-chain test preparation */";
