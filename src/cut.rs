// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Netlist cutter: rewrites sequential and black-box boundaries into explicit
//! named scan ports.
//!
//! Every flip-flop instance becomes a pair of pass-through ports (the D side
//! exposed as an output, the Q side driven from a new input), turning the
//! sequential circuit into a flattened combinational shell whose chain taps
//! are visible at the module boundary. Designated black-box instances are
//! removed the same way, with each pin classified as a chain input or output
//! by the black-box module's declared port directions.

use std::collections::HashSet;

use crate::verilog::{Assign, Decl, DeclKind, Expr, Item, Module};

/// Configured cutter. Built once per run, then applied to the top module.
pub struct Cutter {
    dff_prefix: String,
    ignored: HashSet<String>,
    blackbox_name: Option<String>,
    blackbox_inputs: HashSet<String>,
}

/// What the cutter removed, for logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct CutStats {
    pub cut_dffs: usize,
    pub cut_blackbox_pins: usize,
}

impl Cutter {
    pub fn new(dff_prefix: impl Into<String>, ignored: HashSet<String>) -> Self {
        Self {
            dff_prefix: dff_prefix.into(),
            ignored,
            blackbox_name: None,
            blackbox_inputs: HashSet::new(),
        }
    }

    /// Register the black-box module whose instances should be cut. Only the
    /// declared input names are consulted; the module body is opaque.
    pub fn with_blackbox(mut self, blackbox: &Module) -> Self {
        self.blackbox_name = Some(blackbox.name.clone());
        self.blackbox_inputs = blackbox.input_names().into_iter().collect();
        self
    }

    /// Cut the module in place: flip-flop and black-box instances are removed
    /// and replaced by scan ports with pass-through assigns. New declarations
    /// come first, then the surviving items in their original order with the
    /// new assigns interleaved at the cut points.
    pub fn cut(&self, module: &mut Module) -> Result<CutStats, CutError> {
        let mut stats = CutStats::default();
        let mut declarations: Vec<Item> = Vec::new();
        let mut items: Vec<Item> = Vec::new();

        for item in std::mem::take(&mut module.items) {
            match item {
                Item::Instance(inst) if inst.module.starts_with(&self.dff_prefix) => {
                    let d = inst
                        .connection("D")
                        .cloned()
                        .ok_or_else(|| CutError::MissingDQ {
                            instance: inst.name.clone(),
                        })?;
                    let q = inst
                        .connection("Q")
                        .cloned()
                        .ok_or_else(|| CutError::MissingDQ {
                            instance: inst.name.clone(),
                        })?;

                    let input_name = inst.name.clone();
                    let output_name = format!("\\{}.q", inst.name);

                    module.ports.push(input_name.clone());
                    module.ports.push(output_name.clone());
                    declarations.push(input_decl(&input_name));
                    declarations.push(output_decl(&output_name));

                    // Q net now driven by the new input port; the new output
                    // port exposes whatever drove D.
                    items.push(Item::Assign(Assign {
                        lhs: q,
                        rhs: Expr::Ident(input_name),
                    }));
                    items.push(Item::Assign(Assign {
                        lhs: Expr::Ident(output_name),
                        rhs: d,
                    }));
                    stats.cut_dffs += 1;
                }
                Item::Instance(inst)
                    if self.blackbox_name.as_deref() == Some(inst.module.as_str()) =>
                {
                    for conn in &inst.connections {
                        let port = conn.port.as_deref().ok_or_else(|| {
                            CutError::OrderedBlackboxConnection {
                                instance: inst.name.clone(),
                            }
                        })?;
                        let Some(expr) = &conn.expr else {
                            continue; // explicitly unconnected pin
                        };
                        let chain_output = self.blackbox_inputs.contains(port);

                        match expr {
                            Expr::Concat(elems) => {
                                // Concatenations always expand, one port per
                                // element; the ignore set does not apply here.
                                for (i, elem) in elems.iter().enumerate() {
                                    let name = if chain_output {
                                        format!("\\{}_{}_{}.q", inst.name, port, i)
                                    } else {
                                        format!("{}_{}_{}", inst.name, port, i)
                                    };
                                    self.emit_pin(
                                        module,
                                        &mut declarations,
                                        &mut items,
                                        chain_output,
                                        name,
                                        elem.clone(),
                                    );
                                    stats.cut_blackbox_pins += 1;
                                }
                            }
                            _ => {
                                if self.ignored.contains(&ignore_key(expr)) {
                                    continue;
                                }
                                let name = if chain_output {
                                    format!("\\{}_{}.q", inst.name, port)
                                } else {
                                    format!("{}.{}", inst.name, port)
                                };
                                self.emit_pin(
                                    module,
                                    &mut declarations,
                                    &mut items,
                                    chain_output,
                                    name,
                                    expr.clone(),
                                );
                                stats.cut_blackbox_pins += 1;
                            }
                        }
                    }
                }
                other => items.push(other),
            }
        }

        declarations.extend(items);
        module.items = declarations;
        Ok(stats)
    }

    /// Emit one scan port for a cut black-box pin. A chain output is driven
    /// by the original connection target; a chain input drives it.
    fn emit_pin(
        &self,
        module: &mut Module,
        declarations: &mut Vec<Item>,
        items: &mut Vec<Item>,
        chain_output: bool,
        name: String,
        target: Expr,
    ) {
        module.ports.push(name.clone());
        if chain_output {
            declarations.push(output_decl(&name));
            items.push(Item::Assign(Assign {
                lhs: Expr::Ident(name),
                rhs: target,
            }));
        } else {
            declarations.push(input_decl(&name));
            items.push(Item::Assign(Assign {
                lhs: target,
                rhs: Expr::Ident(name),
            }));
        }
    }
}

/// Ignore-set key for a single (non-concatenated) connection target: the
/// literal identifier name without its escape marker, or the rendered text
/// for non-identifier expressions.
fn ignore_key(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.trim_start_matches('\\').to_string(),
        other => other.to_string(),
    }
}

fn input_decl(name: &str) -> Item {
    Item::Decl(Decl {
        kind: DeclKind::Input,
        range: None,
        names: vec![name.to_string()],
    })
}

fn output_decl(name: &str) -> Item {
    Item::Decl(Decl {
        kind: DeclKind::Output,
        range: None,
        names: vec![name.to_string()],
    })
}

#[derive(Debug)]
pub enum CutError {
    /// Input or black-box file contained no module definition.
    NoModule(String),
    /// A scanned flip-flop instance lacks a named D or Q connection.
    MissingDQ { instance: String },
    /// Black-box pins cannot be classified without port names.
    OrderedBlackboxConnection { instance: String },
}

impl std::fmt::Display for CutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CutError::NoModule(path) => write!(f, "no module definition found in '{}'", path),
            CutError::MissingDQ { instance } => {
                write!(f, "cell {} missing either a 'D' or 'Q' port", instance)
            }
            CutError::OrderedBlackboxConnection { instance } => write!(
                f,
                "black-box instance {} uses ordered port connections; named connections required",
                instance
            ),
        }
    }
}

impl std::error::Error for CutError {}
