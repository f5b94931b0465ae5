// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Scan-chain reconciliation and test-vector bitstream assembly.
//!
//! Reconciliation proves that the physical scan order (chain ordinals) and
//! the logical test-vector order (declared ports) agree, then compiles
//! index-addressed serialization plans so the per-entry loop does no name
//! lookups. Assembly walks those plans once per coverage entry, producing one
//! fixed-width base-2 line per entry for each of the two artifacts.

use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use num_bigint::BigUint;
use num_traits::One;
use rayon::prelude::*;
use serde::Serialize;

use crate::chain::{Chain, ElementKind};
use crate::tv::{CoverageEntry, Polarity, TVInfo};

/// Metadata header embedded in each artifact: number of coverage entries and
/// bits per line.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BinMetadata {
    pub count: usize,
    pub length: usize,
}

/// Where one scan-in element's bits come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StimulusSource {
    /// Index into the coverage entry's vector.
    Vector(usize),
    /// Bypass element: always zero-filled.
    BypassZero,
}

/// What one scan-out element does to the reversed golden string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseStep {
    /// Take `width` bits at the cursor and advance it.
    Consume(usize),
    /// Emit `width` zeros without consuming.
    ZeroFill(usize),
    /// Emit nothing, cursor untouched.
    Skip,
}

/// Validated correspondence between a scan chain and a test-vector spec,
/// plus the compiled per-element serialization plans.
#[derive(Debug)]
pub struct ScanMaps {
    /// TV input-port name → index into the input-polarity port sequence.
    pub input_map: IndexMap<String, usize>,
    /// Element name → index into the full scan-out-order sequence.
    pub output_map: IndexMap<String, usize>,
    /// Σ widths over the full scan-in order (stimulus line length).
    pub input_length: usize,
    /// Σ widths over the full scan-out order (response line length).
    pub output_length: usize,
    stimulus_plan: Vec<(StimulusSource, usize)>,
    response_plan: Vec<ResponseStep>,
    /// Number of input-polarity ports each coverage vector must supply.
    vector_arity: usize,
}

impl ScanMaps {
    /// Prove that the physical scan order and the logical test-vector order
    /// agree, and build the serialization plans. Any mismatch is fatal to the
    /// run; nothing has been written yet when this fails.
    pub fn reconcile(chain: &Chain, tv: &TVInfo) -> Result<Self, AsmError> {
        let scan_in = chain.scan_in_order();
        let scan_out = chain.scan_out_order();

        let chain_order: Vec<_> = scan_in
            .iter()
            .filter(|e| e.kind != ElementKind::BypassInput)
            .collect();
        let input_order: Vec<_> = tv
            .inputs
            .iter()
            .filter(|p| p.polarity != Polarity::Output)
            .collect();

        if chain_order.len() != input_order.len() {
            return Err(AsmError::CountMismatch {
                chain: chain_order.len(),
                tv: input_order.len(),
            });
        }

        let mut input_map = IndexMap::new();
        for (i, port) in input_order.iter().enumerate() {
            if chain_order[i].name != port.name {
                return Err(AsmError::NameMismatch {
                    position: i,
                    chain_name: chain_order[i].name.clone(),
                    tv_name: port.name.clone(),
                });
            }
            input_map.insert(port.name.clone(), i);
        }

        let mut output_map = IndexMap::new();
        let mut output_length = 0usize;
        for (i, element) in scan_out.iter().enumerate() {
            if element.kind == ElementKind::BypassOutput {
                clilog::info!("bypassing scan-out element {}", element.name);
            }
            output_map.insert(element.name.clone(), i);
            output_length += element.width;
        }

        let mut input_length = 0usize;
        let mut stimulus_plan = Vec::with_capacity(scan_in.len());
        for element in &scan_in {
            input_length += element.width;
            let source = if let Some(&locus) = input_map.get(&element.name) {
                StimulusSource::Vector(locus)
            } else if element.kind == ElementKind::BypassInput {
                StimulusSource::BypassZero
            } else {
                return Err(AsmError::RegisterNotInTv {
                    name: element.name.clone(),
                });
            };
            stimulus_plan.push((source, element.width));
        }

        let response_plan = scan_out
            .iter()
            .map(|element| {
                if element.kind == ElementKind::BypassOutput {
                    ResponseStep::ZeroFill(element.width)
                } else if output_map.contains_key(&element.name) {
                    ResponseStep::Consume(element.width)
                } else {
                    ResponseStep::Skip
                }
            })
            .collect();

        Ok(Self {
            input_map,
            output_map,
            input_length,
            output_length,
            stimulus_plan,
            response_plan,
            vector_arity: input_order.len(),
        })
    }

    /// Bits the golden string must provide per entry.
    fn consumed_bits(&self) -> usize {
        self.response_plan
            .iter()
            .map(|step| match step {
                ResponseStep::Consume(w) => *w,
                _ => 0,
            })
            .sum()
    }

    fn stimulus_line(
        &self,
        entry_index: usize,
        entry: &CoverageEntry,
        overflowed: &AtomicBool,
    ) -> Result<String, AsmError> {
        if entry.vector.len() != self.vector_arity {
            return Err(AsmError::VectorArity {
                entry: entry_index,
                expected: self.vector_arity,
                got: entry.vector.len(),
            });
        }
        let mut line = String::with_capacity(self.input_length);
        for &(source, width) in &self.stimulus_plan {
            match source {
                StimulusSource::Vector(locus) => {
                    let value = &entry.vector[locus].0;
                    let mask = (BigUint::one() << width) - BigUint::one();
                    let masked = value & mask;
                    if &masked != value {
                        overflowed.store(true, Ordering::Relaxed);
                    }
                    line.push_str(&pad_binary(&masked, width));
                }
                StimulusSource::BypassZero => {
                    push_zeros(&mut line, width);
                }
            }
        }
        Ok(line)
    }

    fn response_line(&self, entry_index: usize, entry: &CoverageEntry) -> Result<String, AsmError> {
        if let Some(bad) = entry
            .golden_output
            .chars()
            .find(|&c| c != '0' && c != '1')
        {
            return Err(AsmError::GoldenNotBinary {
                entry: entry_index,
                found: bad,
            });
        }
        // The golden string is stored in reverse shift order. Bits are plain
        // ASCII after the digit check, so byte offsets are bit offsets.
        let reversed: String = entry.golden_output.chars().rev().collect();
        let needed = self.consumed_bits();
        if reversed.len() < needed {
            return Err(AsmError::GoldenTooShort {
                entry: entry_index,
                needed,
                got: reversed.len(),
            });
        }
        let mut line = String::with_capacity(self.output_length);
        let mut cursor = 0usize;
        for step in &self.response_plan {
            match step {
                ResponseStep::Consume(width) => {
                    line.push_str(&reversed[cursor..cursor + width]);
                    cursor += width;
                }
                ResponseStep::ZeroFill(width) => push_zeros(&mut line, *width),
                ResponseStep::Skip => {}
            }
        }
        Ok(line)
    }
}

/// Both rendered artifacts, built fully in memory before anything touches
/// the filesystem.
#[derive(Debug)]
pub struct Artifacts {
    pub stimulus: String,
    pub response: String,
    pub count: usize,
}

/// Serialize every coverage entry against the reconciled maps. Entries are
/// independent, so they are assembled in parallel; the collect preserves the
/// original coverage-entry order.
pub fn assemble(maps: &ScanMaps, tv: &TVInfo) -> Result<Artifacts, AsmError> {
    let overflowed = AtomicBool::new(false);
    let lines: Vec<(String, String)> = tv
        .coverage_list
        .par_iter()
        .enumerate()
        .map(|(i, entry)| {
            let stimulus = maps.stimulus_line(i, entry, &overflowed)?;
            let response = maps.response_line(i, entry)?;
            Ok((stimulus, response))
        })
        .collect::<Result<Vec<_>, AsmError>>()?;
    if overflowed.load(Ordering::Relaxed) {
        clilog::warn!("some vector values exceed their declared field width; truncated modulo 2^width");
    }

    let count = lines.len();
    let stimulus = render_artifact(
        &BinMetadata {
            count,
            length: maps.input_length,
        },
        lines.iter().map(|(s, _)| s.as_str()),
    )?;
    let response = render_artifact(
        &BinMetadata {
            count,
            length: maps.output_length,
        },
        lines.iter().map(|(_, r)| r.as_str()),
    )?;
    Ok(Artifacts {
        stimulus,
        response,
        count,
    })
}

/// Render one artifact: banner line, metadata header line, one bit line per
/// coverage entry.
pub fn render_artifact<'a>(
    metadata: &BinMetadata,
    lines: impl Iterator<Item = &'a str>,
) -> Result<String, AsmError> {
    let json = serde_json::to_string(metadata).map_err(|e| AsmError::Metadata(e.to_string()))?;
    let mut out = String::new();
    out.push_str(crate::BOILERPLATE);
    out.push('\n');
    out.push_str(crate::chain::METADATA_START);
    out.push_str(&json);
    out.push_str(crate::chain::METADATA_END);
    out.push('\n');
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    Ok(out)
}

/// Unsigned base-2 digits, MSB first, left-zero-padded to `digits`.
fn pad_binary(value: &BigUint, digits: usize) -> String {
    let raw = value.to_str_radix(2);
    if raw.len() >= digits {
        raw
    } else {
        let mut padded = String::with_capacity(digits);
        push_zeros(&mut padded, digits - raw.len());
        padded.push_str(&raw);
        padded
    }
}

fn push_zeros(out: &mut String, count: usize) {
    for _ in 0..count {
        out.push('0');
    }
}

#[derive(Debug)]
pub enum AsmError {
    /// Chain and test-vector input counts differ.
    CountMismatch { chain: usize, tv: usize },
    /// Chain and test-vector names disagree at a position.
    NameMismatch {
        position: usize,
        chain_name: String,
        tv_name: String,
    },
    /// A non-bypass scan-in element has no test-vector port.
    RegisterNotInTv { name: String },
    /// A coverage entry supplies the wrong number of vector values.
    VectorArity {
        entry: usize,
        expected: usize,
        got: usize,
    },
    /// A golden response has fewer bits than the scan-out walk consumes.
    GoldenTooShort {
        entry: usize,
        needed: usize,
        got: usize,
    },
    /// A golden response contains a character other than '0' or '1'.
    GoldenNotBinary { entry: usize, found: char },
    /// Metadata serialization failed (software error, not a data error).
    Metadata(String),
}

impl std::fmt::Display for AsmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AsmError::CountMismatch { chain, tv } => write!(
                f,
                "ordinal mismatch between TV and scan chains: {} chain elements vs {} TV inputs",
                chain, tv
            ),
            AsmError::NameMismatch {
                position,
                chain_name,
                tv_name,
            } => write!(
                f,
                "ordinal mismatch between TV and scan chains at position {}: chain '{}' vs TV '{}'",
                position, chain_name, tv_name
            ),
            AsmError::RegisterNotInTv { name } => {
                write!(f, "chain register {} not found in the TVs", name)
            }
            AsmError::VectorArity {
                entry,
                expected,
                got,
            } => write!(
                f,
                "coverage entry {} supplies {} values, expected {}",
                entry, got, expected
            ),
            AsmError::GoldenTooShort { entry, needed, got } => write!(
                f,
                "coverage entry {} golden response has {} bits, scan-out walk needs {}",
                entry, got, needed
            ),
            AsmError::GoldenNotBinary { entry, found } => write!(
                f,
                "coverage entry {} golden response contains non-binary character '{}'",
                entry, found
            ),
            AsmError::Metadata(msg) => write!(f, "could not generate metadata string: {}", msg),
        }
    }
}

impl std::error::Error for AsmError {}
