//! mrac - MRA compiler for FPGA arcade cores
//!
//! Usage: mrac <config.toml> --machines <machines.toml> [-o <dir>] [--rom]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use mra_compiler::common::{BuildError, BuildResult};
use mra_compiler::config::GlobalConfig;
use mra_compiler::driver::{self, BuildOptions};
use mra_compiler::layout::LayoutArgs;
use mra_compiler::machine::MachineSet;

#[derive(Parser, Debug)]
#[command(name = "mrac")]
#[command(version = "0.2.0")]
#[command(about = "Compiles MAME machine records into MRA ROM recipes", long_about = None)]
struct Args {
    /// Core configuration TOML
    #[arg(required = true)]
    config: PathBuf,

    /// Machine inventory TOML
    #[arg(short, long)]
    machines: PathBuf,

    /// Output directory for MRA files
    #[arg(short, long, default_value = "mra")]
    output: PathBuf,

    /// Also execute the recipes into binary ROM images
    #[arg(long)]
    rom: bool,

    /// Directory searched for MAME zip archives
    #[arg(long, default_value = ".")]
    zip_dir: PathBuf,

    /// ROM output directory (default: $JTROOT/rom)
    #[arg(long)]
    rom_dir: Option<PathBuf>,

    /// Directory holding custom firmware sources
    #[arg(long, default_value = "firmware")]
    firmware_dir: PathBuf,

    /// Core (RBF) name recorded in the MRA; defaults to the config stem
    #[arg(long)]
    rbf: Option<String>,

    /// KEY=VALUE core macros consulted for bank-boundary comments
    #[arg(long = "macro", value_name = "KEY=VALUE")]
    macros: Vec<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stdout)
        .init();

    if let Err(e) = run(&args) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run(args: &Args) -> BuildResult<()> {
    let cfg = GlobalConfig::from_path(&args.config)?;
    let machines = MachineSet::from_path(&args.machines)?;

    let mut macros = BTreeMap::new();
    for def in &args.macros {
        match def.split_once('=') {
            Some((key, value)) => {
                macros.insert(key.to_string(), value.to_string());
            }
            None => return Err(BuildError::config(format!("bad macro definition: {def}"))),
        }
    }

    let rbf = match &args.rbf {
        Some(rbf) => rbf.clone(),
        None => args
            .config
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "core".to_string()),
    };

    let rom_dir = if args.rom {
        Some(match &args.rom_dir {
            Some(dir) => dir.clone(),
            None => match std::env::var("JTROOT") {
                Ok(root) => PathBuf::from(root).join("rom"),
                Err(_) => {
                    return Err(BuildError::config(
                        "JTROOT is not set; pass --rom-dir to choose the ROM output directory",
                    ))
                }
            },
        })
    } else {
        None
    };

    let opts = BuildOptions {
        mra_dir: args.output.clone(),
        rom_dir,
        zip_dir: args.zip_dir.clone(),
        rbf,
        layout: LayoutArgs {
            firmware_dir: args.firmware_dir.clone(),
            macros,
        },
    };
    driver::run_core(&cfg, &machines, &opts)
}
