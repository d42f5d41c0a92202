//! Granary CLI binary.
//!
//! Scores, validates and compares stock risk index runs from CSV inputs.

mod cmd;
mod input;
mod logging;
mod output;

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::input::InputArgs;
use crate::logging::LogFormat;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "granary")]
#[command(about = "Stock risk index for agricultural commodities", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log filter (e.g. `info`, `granary_features=debug`); defaults to RUST_LOG or `info`
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// List the risk components
    Components {
        /// Show inputs and descriptions
        #[arg(short, long)]
        verbose: bool,
    },

    /// Merge sources, score and classify every record
    Score {
        #[command(flatten)]
        input: InputArgs,

        /// Pipeline configuration (JSON); defaults to $GRANARY_CONFIG
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Weight preset overriding the configuration (three_component, four_component)
        #[arg(short, long)]
        weights: Option<String>,

        /// Only show records of this period
        #[arg(short, long)]
        period: Option<i32>,

        /// Rows shown in text output
        #[arg(long, default_value = "20")]
        top: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Score and run the validation checks
    Validate {
        #[command(flatten)]
        input: InputArgs,

        /// Pipeline configuration (JSON); defaults to $GRANARY_CONFIG
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Weight preset overriding the configuration
        #[arg(short, long)]
        weights: Option<String>,

        /// Known shortfall events (JSON array)
        #[arg(short, long)]
        events: Option<PathBuf>,

        /// Output format (text or json)
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Exit with an error when any check fails
        #[arg(long)]
        strict: bool,
    },

    /// Compare two scored runs by region and commodity
    Compare {
        /// Scores of the later run (JSON from `score --format json`)
        current: PathBuf,

        /// Scores of the earlier run
        previous: PathBuf,

        /// Pipeline configuration supplying the change thresholds
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    dotenvy::dotenv().ok();
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref(), cli.log_format);

    match cli.command {
        Commands::Components { verbose } => {
            cmd::components::list_components(verbose);
        }
        Commands::Score {
            input,
            config,
            weights,
            period,
            top,
            format,
            output,
        } => {
            let config = input::load_config(config.as_deref(), weights.as_deref())?;
            cmd::score::score(&input, config, period, top, format, output.as_deref())?;
        }
        Commands::Validate {
            input,
            config,
            weights,
            events,
            format,
            strict,
        } => {
            let config = input::load_config(config.as_deref(), weights.as_deref())?;
            cmd::validate::validate(&input, config, events.as_deref(), format, strict)?;
        }
        Commands::Compare {
            current,
            previous,
            config,
            format,
            output,
        } => {
            let config = input::load_config(config.as_deref(), None)?;
            cmd::compare::compare(&current, &previous, &config, format, output.as_deref())?;
        }
    }

    Ok(())
}
