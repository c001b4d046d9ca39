//! vbsel CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod run;

#[derive(Parser)]
#[command(name = "vbsel")]
#[command(about = "vbsel - multi-jet plus missing-momentum event selection")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the selection over a JSON-lines event file
    Run {
        /// Analysis configuration (YAML, or JSON by extension)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Input events, one JSON object per line
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for histograms.json, cutflow.json and ntuple.parquet
        #[arg(long)]
        out_dir: PathBuf,

        /// Threads (0 = auto, 1 = sequential). Overrides the config value.
        #[arg(long)]
        threads: Option<usize>,

        /// Allow writing into a non-empty `out_dir` (overwrites known filenames).
        #[arg(long)]
        overwrite: bool,
    },

    /// Check that a configuration resolves into a runnable analysis
    Validate {
        /// Analysis configuration (YAML, or JSON by extension)
        #[arg(short, long)]
        config: PathBuf,

        /// Output file for the summary (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the default configuration as YAML
    Config {
        /// Output file. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print version
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Run { config, input, out_dir, threads, overwrite } => {
            run::cmd_run(config.as_ref(), &input, &out_dir, threads, overwrite)
        }
        Commands::Validate { config, output } => run::cmd_validate(&config, output.as_ref()),
        Commands::Config { output } => run::cmd_config(output.as_ref()),
        Commands::Version => {
            println!("vbsel {}", vbsel_core::VERSION);
            Ok(())
        }
    }
}
