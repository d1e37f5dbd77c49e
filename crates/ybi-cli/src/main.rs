//! `run_backtest` -- the command-line entry point for one reproducible
//! backtest run. Resolves config and date range, runs the simulation, writes
//! artifacts, and exits with the run's contract code (see `ybi_core::error`).

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use ybi_backtest::RunConfig;
use ybi_core::BacktestError;
use ybi_data::PolygonDataClient;

#[derive(Debug, Parser)]
#[command(name = "run_backtest", about = "Run a reproducible YBI small-cap scalping backtest")]
struct Args {
    /// First trading day to simulate, inclusive (YYYY-MM-DD).
    #[arg(long)]
    start: NaiveDate,

    /// Last trading day to simulate, inclusive (YYYY-MM-DD).
    #[arg(long)]
    end: NaiveDate,

    /// Path to a YAML run configuration.
    #[arg(long)]
    config: PathBuf,

    /// Output directory for artifacts; created if missing.
    #[arg(long)]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "ybi_cli=info,ybi_backtest=info".into()))
        .init();

    let args = Args::parse();

    if args.end < args.start {
        eprintln!("--end ({}) is before --start ({})", args.end, args.start);
        std::process::exit(2);
    }

    let raw = match std::fs::read_to_string(&args.config) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("could not read config at {}: {e}", args.config.display());
            std::process::exit(2);
        }
    };
    let config: RunConfig = match serde_yaml::from_str(&raw) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("invalid config at {}: {e}", args.config.display());
            std::process::exit(2);
        }
    };

    let data = match PolygonDataClient::from_env() {
        Ok(client) => client,
        Err(e) => exit_for(e),
    };

    let output = match ybi_backtest::run_backtest(args.start, args.end, &config, &data, &args.out).await {
        Ok(output) => output,
        Err(e) => exit_for(e),
    };

    let any_eligible = output.day_audit.iter().any(|d| d.status.is_eligible());
    if !output.day_audit.is_empty() && !any_eligible {
        eprintln!("no trading day in [{}, {}] produced usable data", args.start, args.end);
        std::process::exit(3);
    }

    tracing::info!(
        n_days = output.day_audit.len(),
        n_trades = output.trades.len(),
        total_pnl = output.metrics.total_pnl,
        "run complete"
    );
    Ok(())
}

fn exit_for(e: BacktestError) -> ! {
    eprintln!("run_backtest failed: {e}");
    std::process::exit(e.exit_code());
}
