use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use fontflat_cli::cli::Cli;

fn main() -> Result<()> {
    // Per-font size reports are `info!`; RUST_LOG still overrides.
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    Cli::parse().command.run()
}
