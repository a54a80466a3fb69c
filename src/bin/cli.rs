//! Survey harvester CLI
//!
//! Harvests one extract per run and consolidates whatever extracts exist.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use survey_harvest::{
    error::Result,
    models::{Config, PeriodScope, Target},
    pipeline,
};

/// Course survey harvester and consolidator
#[derive(Parser, Debug)]
#[command(
    name = "survey-harvest",
    version,
    about = "Harvest course survey results and consolidate them per period and subject"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the periods the form currently offers
    Periods,

    /// Harvest one extract
    Harvest {
        /// What to harvest
        #[arg(value_enum)]
        target: Target,

        /// Restrict to these periods (id or label); repeatable. Default: all
        #[arg(short, long = "period")]
        periods: Vec<String>,

        /// Concurrent leaf fetches (default: per-target value from config)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Extract path (default: per-target value from config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Join the extracts into the consolidated document
    Consolidate {
        /// Document path (default: paths.output from config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Periods => {
            let periods = pipeline::list_periods(&config).await?;
            if periods.is_empty() {
                log::warn!("The form offers no periods");
            }
            for period in &periods {
                println!("{}\t{}", period.id, period.label);
            }
        }

        Command::Harvest {
            target,
            periods,
            workers,
            output,
        } => {
            if let Some(workers) = workers {
                config.workers.set_for_target(target, workers);
            }
            if let Some(output) = output {
                config.paths.set_extract(target, output);
            }
            config.validate()?;

            let scope = PeriodScope::from_selectors(periods);
            let report = pipeline::run_harvest(&config, target, &scope).await?;
            if report.leaves_failed > 0 {
                log::warn!(
                    "{} of {} leaf units failed; re-run to fill the gaps",
                    report.leaves_failed,
                    report.leaves_total
                );
            }
        }

        Command::Consolidate { output } => {
            pipeline::run_consolidate(&config, output).await?;
        }

        Command::Validate => {
            log::info!("Validating {}...", cli.config.display());

            if let Err(e) = Config::load_validated(&cli.config) {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }
    }

    log::info!("Done!");

    Ok(())
}
