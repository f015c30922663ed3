//! plutus CLI - Tick data queries, OHLC bars and dataset optimization.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use plutus_lib::prelude::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod display;

use display::Format;

#[derive(Parser)]
#[command(name = "plutus")]
#[command(about = "Tick data queries and OHLC aggregation over local datasets", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Dataset root directory
    #[arg(short, long, env = "PLUTUS_DATA_ROOT", global = true)]
    root: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress progress output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Query ticks or OHLC bars for a ticker
    Query {
        /// Ticker symbol (e.g., FPT, VIC)
        ticker: String,

        /// Range start, inclusive (YYYY-MM-DD or YYYY-MM-DD HH:MM:SS)
        #[arg(short, long)]
        begin: String,

        /// Range end, exclusive (YYYY-MM-DD or YYYY-MM-DD HH:MM:SS)
        #[arg(short, long)]
        end: String,

        /// Bar interval (1m, 5m, 15m, 30m, 1h, 4h, 1d); omit for raw ticks
        #[arg(short, long)]
        interval: Option<String>,

        /// Comma-separated output fields
        #[arg(long)]
        fields: Option<String>,

        /// Storage format to read (auto, raw, optimized)
        #[arg(long, default_value = "auto")]
        prefer: String,

        /// Align intraday bars to a session open (HH:MM)
        #[arg(long)]
        session_open: Option<String>,

        /// Fail on the first corrupt row instead of skipping it
        #[arg(long)]
        strict: bool,

        /// Output file path. Defaults to stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "csv")]
        format: Format,

        /// Print query statistics to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Convert raw files into the optimized columnar format
    Optimize {
        /// Maximum concurrent conversions
        #[arg(long)]
        concurrency: Option<usize>,

        /// Rows per Parquet row group
        #[arg(long)]
        row_group_size: Option<usize>,
    },

    /// List tickers in the dataset
    List {
        /// Search pattern
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show files and cached statistics of a ticker
    Info {
        /// Ticker symbol
        ticker: String,
    },
}

/// Installs the tracing subscriber, preferring `RUST_LOG` over `-v` flags.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn dataset_root(root: Option<PathBuf>) -> Result<DatasetRoot> {
    let Some(path) = root else {
        anyhow::bail!("No dataset root given. Pass --root or set PLUTUS_DATA_ROOT");
    };
    let path = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(DatasetRoot::new(path)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Show help if no command provided
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    init_tracing(cli.verbose);
    let root = dataset_root(cli.root)?;
    tracing::debug!(root = %root, "dataset root resolved");

    match command {
        Commands::Query {
            ticker,
            begin,
            end,
            interval,
            fields,
            prefer,
            session_open,
            strict,
            output,
            format,
            stats,
        } => commands::query::run_query(
            root,
            &commands::query::QueryArgs {
                ticker,
                begin,
                end,
                interval,
                fields,
                prefer,
                session_open,
                strict,
                output,
                format,
                stats,
            },
        ),
        Commands::Optimize {
            concurrency,
            row_group_size,
        } => commands::optimize::optimize(root, concurrency, row_group_size, cli.quiet).await,
        Commands::List { search } => commands::list::list_tickers(&root, search.as_deref()),
        Commands::Info { ticker } => commands::info::show_info(&root, &ticker),
    }
}
