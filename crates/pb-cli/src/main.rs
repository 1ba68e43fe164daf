mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use commands::{FilterArgs, IdeasArgs};
use pb_core::view::SortKey;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// pulseboard CLI -- poll the ideation agent services and summarize them.
#[derive(Parser)]
#[command(name = "pb", version, about)]
struct Cli {
    /// Config file (default: ~/.pulseboard/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log as JSON lines on stderr.
    #[arg(long, global = true)]
    json_logs: bool,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// One-shot overview of every feed (default when no subcommand is given).
    Status,

    /// List ideas, filtered and sorted.
    Ideas(IdeasArgs),

    /// Show the agent roster with current health.
    Agents {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Decision counts and average ICE score.
    Stats {
        #[command(flatten)]
        filter: FilterArgs,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Keep refreshing and print a line per update until ctrl-c.
    Watch {
        #[command(flatten)]
        filter: FilterArgs,
        /// Sort key for the visible list: created_at, ice_score, profit_tier.
        #[arg(long)]
        sort: Option<SortKey>,
        /// Print fetch metrics (Prometheus text format) on exit.
        #[arg(long)]
        metrics: bool,
    },

    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = commands::load_config(cli.config.as_deref())?;

    let level = match cli.verbose {
        0 => cfg.general.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    if cli.json_logs || cfg.general.json_logs {
        pb_telemetry::logging::init_logging_json("pb", level);
    } else {
        pb_telemetry::logging::init_logging("pb", level);
    }

    match cli.command {
        None | Some(Commands::Status) => commands::status::run(&cfg).await?,
        Some(Commands::Ideas(args)) => commands::ideas::run(&cfg, &args).await?,
        Some(Commands::Agents { json }) => commands::agents::run(&cfg, json).await?,
        Some(Commands::Stats { filter, json }) => commands::stats::run(&cfg, &filter, json).await?,
        Some(Commands::Watch {
            filter,
            sort,
            metrics,
        }) => commands::watch::run(&cfg, &filter, sort, metrics).await?,
        Some(Commands::Config) => print!("{}", cfg.to_toml()?),
    }

    Ok(())
}
