use anyhow::Result;
use clap::Parser;
use env_logger::Env;

use wajs_cli::args::{Cli, Commands};
use wajs_cli::commands::{build, inspect, run};
use wajs_cli::config::WajsConfig;

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("warn"));
    let level = match verbose {
        0 => None,
        1 => Some(log::LevelFilter::Info),
        2 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    };
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.format_timestamp(None).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = WajsConfig::load(cli.config.as_deref())?;
    log::debug!("configuration: {config:?}");

    match &cli.command {
        Commands::Build {
            input,
            output,
            minify,
            embed,
            json,
        } => build::run(&config, input, output.as_deref(), *minify, embed, *json),
        Commands::Inspect { input, json } => inspect::run(input, *json),
        Commands::Run {
            wasm,
            manifest,
            advance,
        } => run::run(wasm, manifest.as_deref(), *advance, config.runtime.clone()),
    }
}
