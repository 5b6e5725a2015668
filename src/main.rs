use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod dataset;
mod dialogue;
mod experiment;
mod generate;
mod progress;
mod report;
mod tracking;
mod util;
mod workflow;

use cli::{Command, RootArgs};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CYOA_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = RootArgs::parse();
    match args.command {
        Command::Collect(args) => workflow::run_collect(args),
        Command::Patterns(args) => workflow::run_patterns(args),
        Command::Generate(args) => workflow::run_generate(args),
        Command::Analyze(args) => workflow::run_analyze(args),
        Command::Progress(args) => {
            let code = workflow::run_progress(args)?;
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
    }
}
