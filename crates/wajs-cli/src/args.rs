use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "wajs")]
#[command(about = "Bridge Rust compiled to WebAssembly with host JavaScript", long_about = None)]
#[command(version)]
pub struct Cli {
    /// More logging: -v info, -vv debug, -vvv trace (RUST_LOG also works)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (default: ./wajs.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synthesize a linked module into <stem>.wasm, <stem>.js and <stem>.manifest.json
    Build {
        /// Linked module produced by the Rust toolchain
        input: PathBuf,
        /// Output stem (default: the input path with `.wajs` for its extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Short identifiers, compact loader, no name section
        #[arg(long)]
        minify: bool,
        /// Embed a file as NAME=PATH (repeatable)
        #[arg(long, value_name = "NAME=PATH")]
        embed: Vec<String>,
        /// Print the manifest as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Describe the bridge functions and exports of a module
    Inspect {
        /// Linked or synthesized module
        input: PathBuf,
        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Run a synthesized module with the in-process host
    Run {
        /// Synthesized module
        wasm: PathBuf,
        /// Manifest (default: <stem>.manifest.json next to the module)
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Advance virtual time by this many ms instead of running until idle
        #[arg(long, value_name = "MS")]
        advance: Option<u64>,
    },
}
