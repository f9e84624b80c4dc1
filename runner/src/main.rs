use chrono::{SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, process::ExitCode};
use tagbench::{
    analysis::{averages, read_averages, read_results, write_csv, Report},
    config::BenchConfig,
    database::Store,
    sweep::Sweep,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use tracing_unwrap::ResultExt;

#[derive(Parser, Debug)]
#[command(author, version, about = "Benchmarks storage layouts for tagged documents")]
struct Args {
    /// tracing filter, overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the benchmark sweep
    Run {
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// SQLite file to benchmark against
        #[arg(long)]
        database: Option<PathBuf>,

        /// repetitions per configuration
        #[arg(long)]
        runs: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,
    },
    /// Re-derive the averages file from a raw results file
    Aggregate {
        #[arg(long, default_value = "benchmark_results.csv")]
        results: PathBuf,

        #[arg(long, default_value = "benchmark_averages.csv")]
        averages: PathBuf,
    },
    /// Print the best configurations, indexing speedups and per-model comparisons
    Summary {
        #[arg(long, default_value = "benchmark_averages.csv")]
        averages: PathBuf,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = match &args.log_level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_log(),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    fmt().with_env_filter(filter).with_thread_names(true).init();

    match args.command {
        Command::Run {
            config,
            database,
            runs,
            seed,
        } => {
            let mut config = match config {
                Some(path) => BenchConfig::load(&path).unwrap_or_log(),
                None => BenchConfig::default(),
            };
            if let Some(path) = database {
                config.database.path = path;
            }
            if let Some(runs) = runs {
                config.sweep.runs = runs;
            }
            if seed.is_some() {
                config.sweep.seed = seed;
            }

            if config.preflight_checks() {
                error!("Configuration contains errors, refusing to start the sweep");
                return ExitCode::FAILURE;
            }

            let store = Store::load(&config.database, &config.limits).unwrap_or_log();
            let summary = Sweep::new(&config, store).run().unwrap_or_log();
            info!(
                results = %config.output.results.display(),
                averages = %config.output.averages.display(),
                "Sweep finished with {} successful runs",
                summary.successful
            );
        }
        Command::Aggregate { results, averages: output } => {
            let results = read_results(&results).unwrap_or_log();
            let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            let records = averages(&results, &timestamp);
            write_csv(&output, &records).unwrap_or_log();
            info!(
                path = %output.display(),
                "Averaged {} results into {} configurations",
                results.len(),
                records.len()
            );
        }
        Command::Summary { averages } => {
            let records = read_averages(&averages).unwrap_or_log();
            println!("{}", Report::new(&records));
        }
    }

    ExitCode::SUCCESS
}
