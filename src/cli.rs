//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::retrying_data_port::RetryingDataPort;
use crate::domain::analysis::{AnalysisBundle, Analyzer};
use crate::domain::config::AnalysisConfig;
use crate::domain::error::{ErrorKind, StockcastError};
use crate::domain::forecast::ModelCache;
use crate::domain::universe::Universe;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "stockcast", about = "Seasonal decomposition and price forecasting")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyse and forecast one or more tickers
    Analyze {
        #[arg(short, long)]
        config: PathBuf,
        /// Override the configured tickers (repeatable)
        #[arg(short, long)]
        ticker: Vec<String>,
        /// Print the analysis bundles as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// List the supported companies
    Tickers {
        /// Mark which tickers have data in the configured CSV directory
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Analyze {
            config,
            ticker,
            json,
        } => run_analyze(&config, &ticker, json),
        Command::Tickers { config } => run_tickers(config.as_deref()),
        Command::Validate { config } => run_validate(&config),
    }
}

fn fail(err: &StockcastError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<AnalysisConfig, StockcastError> {
    let adapter = FileConfigAdapter::from_file(path).map_err(|e| match e {
        StockcastError::Io(io) => StockcastError::ConfigParse {
            file: path.display().to_string(),
            reason: io.to_string(),
        },
        other => other,
    })?;
    AnalysisConfig::from_port(&adapter)
}

fn csv_dir(config: &AnalysisConfig) -> Result<PathBuf, StockcastError> {
    config
        .csv_dir
        .clone()
        .ok_or_else(|| StockcastError::ConfigMissing {
            section: "data".into(),
            key: "csv_dir".into(),
        })
}

/// Replace the configured tickers with command-line ones, if any.
pub fn resolve_tickers(overrides: &[String], config: &AnalysisConfig) -> Vec<String> {
    if overrides.is_empty() {
        return config.tickers.clone();
    }
    let mut tickers: Vec<String> = Vec::with_capacity(overrides.len());
    for ticker in overrides.iter().map(|t| t.trim().to_uppercase()) {
        if !ticker.is_empty() && !tickers.contains(&ticker) {
            tickers.push(ticker);
        }
    }
    tickers
}

#[derive(Serialize)]
struct ErrorReport {
    kind: ErrorKind,
    message: String,
}

#[derive(Serialize)]
struct TickerReport<'a> {
    ticker: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<&'a AnalysisBundle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorReport>,
}

fn run_analyze(config_path: &Path, ticker_overrides: &[String], json: bool) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let mut config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    config.tickers = resolve_tickers(ticker_overrides, &config);

    let dir = match csv_dir(&config) {
        Ok(d) => d,
        Err(e) => return fail(&e),
    };
    let data_port = RetryingDataPort::new(CsvAdapter::new(dir), config.retry);

    eprintln!(
        "Analysing {} tickers, {} to {}",
        config.tickers.len(),
        config.range.start,
        config.range.end
    );
    let analyzer = Analyzer::new(config, data_port).with_cache(Arc::new(ModelCache::new()));
    let results = analyzer.analyze_configured();

    let universe = Universe::default();
    for (ticker, result) in &results {
        match result {
            Ok(bundle) => print_summary(bundle, &universe),
            Err(e) => eprintln!("\n=== {ticker} ===\nerror: {e}"),
        }
    }

    if json {
        let reports: Vec<TickerReport> = results
            .iter()
            .map(|(ticker, result)| TickerReport {
                ticker,
                analysis: result.as_ref().ok(),
                error: result.as_ref().err().map(|e| ErrorReport {
                    kind: e.kind(),
                    message: e.to_string(),
                }),
            })
            .collect();
        match serde_json::to_string_pretty(&reports) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("error: failed to serialise results: {e}");
                return ExitCode::from(1);
            }
        }
    }

    let succeeded = results.iter().filter(|(_, r)| r.is_ok()).count();
    eprintln!("\n{succeeded} of {} tickers analysed", results.len());
    match results.iter().find_map(|(_, r)| r.as_ref().err()) {
        Some(first) if succeeded == 0 => first.into(),
        _ => ExitCode::SUCCESS,
    }
}

fn print_summary(bundle: &AnalysisBundle, universe: &Universe) {
    let name = universe
        .find(&bundle.ticker)
        .map(|c| format!(" ({})", c.name))
        .unwrap_or_default();
    let m = &bundle.metrics;

    eprintln!("\n=== {}{} ===", bundle.ticker, name);
    eprintln!("Latest Close:     {:.2} ({})", m.latest_close, m.latest_date);
    eprintln!(
        "Return:           {:+.2}% over {} days",
        m.percent_change, m.days_analyzed
    );
    eprintln!("Avg Volume:       {:.0}", m.average_volume);

    if let Some(d) = &bundle.decomposition {
        eprintln!(
            "Decomposition:    {}, period {}, seasonal strength {:.2}",
            d.model,
            d.period,
            d.seasonal_strength()
        );
    }
    if let (Some(f), Some(o)) = (&bundle.forecast, &bundle.outlook) {
        eprintln!("Model:            {} (AIC {:.1})", f.model.order, f.model.aic);
        if let Some(last) = f.last() {
            eprintln!(
                "{}-day Forecast:   {:.2} ({:+.2}%), {:.0}% interval [{:.2}, {:.2}]",
                f.points.len(),
                o.final_price,
                o.change_pct,
                f.confidence_level * 100.0,
                last.lower_bound,
                last.upper_bound
            );
        }
        eprintln!(
            "Confidence:       {} (interval width {:.1}%)",
            o.label, o.interval_width_pct
        );
    }
    for warning in &bundle.warnings {
        eprintln!("warning: {warning}");
    }
    for failure in &bundle.failures {
        eprintln!("{} failed: {}", failure.stage, failure.message);
    }
}

fn run_tickers(config_path: Option<&Path>) -> ExitCode {
    let universe = Universe::default();

    let available = match config_path {
        None => None,
        Some(path) => {
            let listed = load_config(path)
                .and_then(|c| csv_dir(&c))
                .and_then(|dir| CsvAdapter::new(dir).list_tickers());
            match listed {
                Ok(tickers) => Some(tickers),
                Err(e) => return fail(&e),
            }
        }
    };

    for company in &universe.companies {
        let marker = match &available {
            Some(tickers) if tickers.contains(&company.ticker) => "  [data]",
            Some(_) => "  [missing]",
            None => "",
        };
        println!(
            "{:<14} {:<28} {}{}",
            company.ticker, company.name, company.sector, marker
        );
    }
    eprintln!("{} companies", universe.count());
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    eprintln!("  Range:          {} to {}", config.range.start, config.range.end);
    eprintln!("  Tickers:        {}", config.tickers.join(", "));
    eprintln!(
        "  Decomposition:  {}, period {}",
        config.decomposition.model, config.decomposition.period
    );
    eprintln!(
        "  Forecast:       {} days, seasonal period {}, {:.0}% interval",
        config.forecast.horizon,
        config.forecast.seasonal_period,
        config.forecast.confidence_level * 100.0
    );
    match &config.csv_dir {
        Some(dir) if dir.is_dir() => eprintln!("  Data:           {}", dir.display()),
        Some(dir) => eprintln!("warning: csv_dir {} does not exist", dir.display()),
        None => eprintln!("warning: no [data] csv_dir configured"),
    }

    eprintln!("\nConfiguration is valid");
    ExitCode::SUCCESS
}
