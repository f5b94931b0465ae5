// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Unified CLI for shear scan-chain test preparation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::exit;

use clap::{Parser, Subcommand};
use shear::assemble::{assemble, AsmError, ScanMaps};
use shear::chain::{ChainError, ChainMetadata};
use shear::cut::{CutError, Cutter};
use shear::tv::{TVInfo, TvError};
use shear::verilog::Netlist;

/// Exit codes follow the sysexits taxonomy.
mod exits {
    pub const OK: i32 = 0;
    pub const USAGE: i32 = 64;
    pub const DATAERR: i32 = 65;
    pub const NOINPUT: i32 = 66;
    pub const SOFTWARE: i32 = 70;
    pub const CANTCREAT: i32 = 73;
}

#[derive(Parser)]
#[command(name = "shear", about = "Shear — scan-chain test preparation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cut a synthesized netlist at flip-flop and black-box boundaries.
    ///
    /// Every flip-flop instance is removed and replaced by a named scan input
    /// and output port with pass-through assigns, producing a flattened
    /// combinational shell whose chain taps are visible at the module
    /// boundary.
    Cut(CutArgs),

    /// Assemble test vectors into binary bitstream artifacts.
    ///
    /// Reconciles the declared test-vector port order against the physical
    /// scan-chain ordinal order, then writes one stimulus artifact and one
    /// golden-response artifact, one fixed-width base-2 line per test case.
    Asm(AsmArgs),
}

#[derive(Parser)]
struct CutArgs {
    /// Netlist to cut (gate-level Verilog).
    netlist: PathBuf,

    /// Flip-flop cell name prefix.
    #[clap(short, long, default_value = "DFF")]
    dff: String,

    /// Black-box module definition (.v) whose instances should be cut.
    #[clap(long)]
    blackbox: Option<PathBuf>,

    /// Connection names to ignore when cutting black-box pins,
    /// comma-separated. Applies to single connections only, never to
    /// concatenation elements.
    #[clap(short, long, value_delimiter = ',')]
    ignoring: Vec<String>,

    /// Path to the output file. (Default: input + .cut.v)
    #[clap(short, long)]
    output: Option<PathBuf>,
}

#[derive(Parser)]
struct AsmArgs {
    /// Test-vector spec (.json) and chained netlist (.v), in any order.
    #[clap(num_args = 2)]
    files: Vec<String>,

    /// Base path for the output artifacts; <base>_vec.bin and <base>_out.bin
    /// are written. (Default: the .json input path)
    #[clap(short, long)]
    output: Option<String>,
}

fn main() {
    clilog::init_stderr_color_debug();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                    exits::OK
                }
                _ => exits::USAGE,
            };
            let _ = e.print();
            exit(code);
        }
    };

    match cli.command {
        Commands::Cut(args) => cmd_cut(args),
        Commands::Asm(args) => cmd_asm(args),
    }
}

fn fail(code: i32, message: String) -> ! {
    clilog::error!("{}", message);
    exit(code);
}

fn cmd_cut(args: CutArgs) -> ! {
    if !args.netlist.exists() {
        fail(
            exits::NOINPUT,
            format!("file '{}' not found", args.netlist.display()),
        );
    }
    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(format!("{}.cut.v", args.netlist.display())));

    let mut netlist = match Netlist::parse_file(&args.netlist) {
        Ok(netlist) => netlist,
        Err(e) => fail(exits::DATAERR, e.to_string()),
    };

    let ignored: HashSet<String> = args.ignoring.into_iter().filter(|s| !s.is_empty()).collect();
    let mut cutter = Cutter::new(args.dff, ignored);
    if let Some(blackbox_path) = &args.blackbox {
        let blackbox = match Netlist::parse_file(blackbox_path) {
            Ok(netlist) => netlist,
            Err(e) => fail(exits::DATAERR, e.to_string()),
        };
        let Some(module) = blackbox.first_module() else {
            fail(
                exits::DATAERR,
                CutError::NoModule(blackbox_path.display().to_string()).to_string(),
            );
        };
        cutter = cutter.with_blackbox(module);
    }

    let Some(module) = netlist.first_module_mut() else {
        fail(
            exits::DATAERR,
            CutError::NoModule(args.netlist.display().to_string()).to_string(),
        );
    };

    let stats = match cutter.cut(module) {
        Ok(stats) => stats,
        Err(e) => fail(exits::DATAERR, e.to_string()),
    };
    clilog::info!(
        "cut {} flip-flops and {} black-box pins in module {}",
        stats.cut_dffs,
        stats.cut_blackbox_pins,
        module.name
    );

    let content = format!("{}\n{}", shear::BOILERPLATE, module.render());
    write_output(&output, &content);
    clilog::info!("wrote cut netlist to {}", output.display());
    exit(exits::OK);
}

fn cmd_asm(args: AsmArgs) -> ! {
    let json_args: Vec<&String> = args.files.iter().filter(|f| f.ends_with(".json")).collect();
    let v_args: Vec<&String> = args.files.iter().filter(|f| f.ends_with(".v")).collect();
    if json_args.len() != 1 || v_args.len() != 1 {
        eprintln!("Arguments: <.json> <.v> (any order).");
        exit(exits::USAGE);
    }
    let json = json_args[0];
    let netlist = v_args[0];

    let base = args.output.as_deref().unwrap_or(json);
    let vector_output = format!("{}_vec.bin", base);
    let golden_output = format!("{}_out.bin", base);

    let tvinfo = match TVInfo::parse_file(Path::new(json)) {
        Ok(tvinfo) => tvinfo,
        Err(TvError::Io(msg)) => fail(exits::NOINPUT, msg),
        Err(e) => fail(exits::DATAERR, e.to_string()),
    };

    let metadata = match ChainMetadata::extract(Path::new(netlist)) {
        Ok(metadata) => metadata,
        Err(ChainError::Io(msg)) => fail(exits::NOINPUT, msg),
        Err(e) => fail(exits::DATAERR, e.to_string()),
    };
    clilog::info!(
        "scan chain: {} elements ({} boundary, {} internal)",
        metadata.order.0.len(),
        metadata.boundary_count,
        metadata.internal_count
    );

    let maps = match ScanMaps::reconcile(&metadata.order, &tvinfo) {
        Ok(maps) => maps,
        Err(e) => fail(exits::DATAERR, e.to_string()),
    };

    let artifacts = match assemble(&maps, &tvinfo) {
        Ok(artifacts) => artifacts,
        Err(e @ AsmError::Metadata(_)) => fail(exits::SOFTWARE, e.to_string()),
        Err(e) => fail(exits::DATAERR, e.to_string()),
    };
    clilog::info!(
        "assembled {} test cases ({} stimulus bits, {} response bits per case)",
        artifacts.count,
        maps.input_length,
        maps.output_length
    );

    write_output(Path::new(&vector_output), &artifacts.stimulus);
    write_output(Path::new(&golden_output), &artifacts.response);
    clilog::info!(
        "wrote {} and {}",
        vector_output,
        golden_output
    );
    exit(exits::OK);
}

/// Write one artifact in a single pass; a failure aborts with the
/// cannot-create code before any further file is touched.
fn write_output(path: &Path, content: &str) {
    if let Err(e) = std::fs::write(path, content) {
        fail(
            exits::CANTCREAT,
            format!("could not write '{}': {}", path.display(), e),
        );
    }
}
