//! Quotecast CLI: intraday forecasts, refresh loop, and exchange-rate lookup.
//!
//! Commands:
//! - `forecast`: fetch bars, clean, normalize, and forecast one or more tickers
//! - `watch`: re-run forecasts on a timer
//! - `rate`: show the current USD→INR rate (live or fallback)
//! - `config`: print the effective configuration as TOML
//!
//! Exit codes: 0 success, 2 no data, 3 insufficient data, 1 anything else.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use quotecast_core::data::{CircuitBreaker, DataIngestor, QuoteProvider, SyntheticProvider, YahooProvider};
use quotecast_core::domain::Interval;
use quotecast_core::{ErrorKind, PipelineResult};
use quotecast_runner::{
    export_json, save_artifacts, watch, ForecastReport, ForecastRequest, QuotecastConfig, Session,
    SessionError, WatchOptions,
};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "quotecast",
    version,
    about = "Quotecast CLI: intraday bar cleaning, INR normalization, and short-horizon forecasts"
)]
struct Cli {
    /// Path to a TOML config file. Defaults to ./quotecast.toml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use deterministic synthetic bars instead of Yahoo Finance.
    #[arg(long, global = true, default_value_t = false)]
    synthetic: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct RequestArgs {
    /// Tickers (e.g. AAPL RELIANCE.NS TCS.BO).
    #[arg(required = true)]
    tickers: Vec<String>,

    /// Number of predicted points.
    #[arg(long)]
    horizon: Option<usize>,

    /// Bar interval (1m, 2m, 5m, 15m, 30m, 60m, 90m, 1d).
    #[arg(long)]
    interval: Option<Interval>,

    /// Days of history to fetch.
    #[arg(long)]
    lookback_days: Option<u32>,

    /// Print the full JSON report instead of a summary.
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl RequestArgs {
    fn requests(&self) -> Vec<ForecastRequest> {
        self.tickers
            .iter()
            .map(|ticker| ForecastRequest {
                ticker: ticker.trim().to_string(),
                lookback_days: self.lookback_days,
                interval: self.interval,
                horizon: self.horizon,
            })
            .collect()
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Forecast one or more tickers.
    Forecast {
        #[command(flatten)]
        request: RequestArgs,

        /// Read raw bars from a CSV file instead of the provider (single ticker).
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write report.json, series.csv, and predictions.csv under this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Re-run forecasts on a timer.
    Watch {
        #[command(flatten)]
        request: RequestArgs,

        /// Stop after this many rounds.
        #[arg(long)]
        rounds: Option<u64>,

        /// Refresh period in seconds (overrides fetch.refresh_secs).
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        every: Option<u64>,
    },
    /// Show the current exchange rate.
    Rate {
        /// Bypass the cache and fetch again.
        #[arg(long, default_value_t = false)]
        refresh: bool,
    },
    /// Print the effective configuration.
    Config,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = QuotecastConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Rate { refresh } => {
            let session = build_session(config, cli.synthetic)?;
            let rate = if refresh {
                session.refresh_rate()
            } else {
                session.rate()
            };
            println!(
                "{} = {:.4} ({:?}, {})",
                session.config().fx.pair_symbol,
                rate.rate,
                rate.provenance,
                rate.fetched_at.format("%Y-%m-%d %H:%M:%S")
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Forecast {
            request,
            csv,
            output_dir,
        } => {
            let session = build_session(config, cli.synthetic)?;
            let results = match csv {
                Some(path) => {
                    let [ticker] = request.tickers.as_slice() else {
                        bail!("--csv takes exactly one ticker");
                    };
                    let fetched = DataIngestor::new().load(ticker, &path)?;
                    log::info!("{ticker}: {} raw rows ({:?})", fetched.frame.height(), fetched.source);
                    let result =
                        session.run_frame(&fetched.frame, ticker, request.horizon, request.interval);
                    vec![(ticker.clone(), result)]
                }
                None => session.forecast_many(&request.requests()),
            };
            for (_, result) in &results {
                if let (Ok(result), Some(dir)) = (result, &output_dir) {
                    let run_dir = save_artifacts(result, dir)?;
                    println!("Artifacts saved to: {}", run_dir.display());
                }
            }
            print_results(&results, request.json)?;
            Ok(exit_code(&results))
        }
        Commands::Watch {
            request,
            rounds,
            every,
        } => {
            let period = every
                .map(std::time::Duration::from_secs)
                .unwrap_or_else(|| config.fetch.refresh_period());
            let session = build_session(config, cli.synthetic)?;
            let mut options = WatchOptions::new(period);
            options.max_rounds = rounds;

            let mut last_code = ExitCode::SUCCESS;
            let mut print_error = None;
            watch(&session, &request.requests(), &options, |tick| {
                println!("round {}", tick.round + 1);
                if let Err(e) = print_results(&tick.results, request.json) {
                    print_error = Some(e);
                    return ControlFlow::Break(());
                }
                last_code = exit_code(&tick.results);
                ControlFlow::Continue(())
            });
            match print_error {
                Some(e) => Err(e),
                None => Ok(last_code),
            }
        }
    }
}

fn build_session(config: QuotecastConfig, synthetic: bool) -> Result<Session> {
    let provider: Arc<dyn QuoteProvider> = if synthetic {
        Arc::new(SyntheticProvider::new())
    } else {
        let circuit_breaker = Arc::new(CircuitBreaker::default_provider());
        Arc::new(YahooProvider::new(circuit_breaker)?)
    };
    log::debug!("quote provider: {}", provider.name());
    Ok(Session::new(config, provider)?)
}

fn print_results(results: &[(String, Result<PipelineResult, SessionError>)], json: bool) -> Result<()> {
    for (ticker, result) in results {
        match result {
            Ok(result) if json => println!("{}", export_json(result)?),
            Ok(result) => println!("{}", ForecastReport::from(result).summary()),
            Err(e) => eprintln!("{ticker}: {e}"),
        }
    }
    Ok(())
}

/// Worst outcome wins: unexpected > no data > insufficient data > success.
fn exit_code(results: &[(String, Result<PipelineResult, SessionError>)]) -> ExitCode {
    let rank = |kind: ErrorKind| match kind {
        ErrorKind::InsufficientData => (1, 3u8),
        ErrorKind::NoData => (2, 2),
        ErrorKind::Unexpected => (3, 1),
    };
    results
        .iter()
        .filter_map(|(_, r)| r.as_ref().err())
        .map(|e| rank(e.kind()))
        .max()
        .map_or(ExitCode::SUCCESS, |(_, code)| ExitCode::from(code))
}
