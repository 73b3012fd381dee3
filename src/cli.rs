//! CLI definition and dispatch.

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{BacktestRequest, BacktestResult};
use crate::domain::config_validation::{config_date, strategy_inputs, validate_backtest_config};
use crate::domain::error::PricelabError;
use crate::domain::metrics::DEFAULT_STARTING_CAPITAL;
use crate::domain::ohlcv::normalize_symbol;
use crate::domain::strategy::{DEFAULT_STRATEGY, StrategyParams};
use crate::ports::config_port::ConfigPort;

#[derive(Parser, Debug)]
#[command(name = "pricelab", about = "Daily price store and strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest, backfilling missing prices first
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        /// threshold_cross, moving_average or rsi_mean_reversion
        #[arg(short, long)]
        strategy: Option<String>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Write the full result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Fetch a date range from the quote source into the store
    Fetch {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    /// Print stored bars for a symbol
    Prices {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        /// Only the most recent N bars
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show stored data range for symbol(s)
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Start the JSON HTTP API
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
}

impl Command {
    pub fn config_path(&self) -> &Path {
        match self {
            Command::Backtest { config, .. }
            | Command::Fetch { config, .. }
            | Command::Prices { config, .. }
            | Command::Info { config, .. }
            | Command::Serve { config } => config,
        }
    }
}

/// Command-line values that take precedence over `[backtest]` config keys.
#[derive(Debug, Clone, Default)]
pub struct BacktestOverrides {
    pub symbol: Option<String>,
    pub strategy: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// `[log] level` (default `info`) and `[log] ansi` (default on).
pub fn log_settings(config: &dyn ConfigPort) -> (String, bool) {
    let level = config
        .get_non_empty("log", "level")
        .unwrap_or_else(|| "info".to_string());
    (level, config.get_bool("log", "ansi", true))
}

/// Log to stderr. `RUST_LOG` wins over `[log] level`.
pub fn init_tracing(cli: &Cli) {
    let (level, ansi) = match FileConfigAdapter::from_file(cli.command.config_path()) {
        Ok(config) => log_settings(&config),
        Err(_) => ("info".to_string(), true),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // A second init (tests) is harmless.
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(ansi),
        )
        .with(filter)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            symbol,
            strategy,
            start,
            end,
            output,
        } => run_backtest(
            &config,
            &BacktestOverrides {
                symbol,
                strategy,
                start,
                end,
            },
            output.as_deref(),
        ),
        Command::Fetch {
            config,
            symbol,
            start,
            end,
        } => run_fetch(&config, &symbol, start, end),
        Command::Prices {
            config,
            symbol,
            limit,
        } => run_prices(&config, &symbol, limit),
        Command::Info { config, symbol } => run_info(&config, symbol.as_deref()),
        Command::Serve { config } => run_serve(&config),
    }
}

fn fail(err: PricelabError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

pub fn build_backtest_request(
    config: &dyn ConfigPort,
    overrides: &BacktestOverrides,
) -> Result<BacktestRequest, PricelabError> {
    let symbol = overrides
        .symbol
        .clone()
        .or_else(|| config.get_non_empty("backtest", "symbol"))
        .ok_or_else(|| PricelabError::ConfigMissing {
            section: "backtest".into(),
            key: "symbol".into(),
        })?;

    let start_date = match overrides.start {
        Some(d) => d,
        None => config_date(config, "backtest", "start_date")?.ok_or_else(|| {
            PricelabError::ConfigMissing {
                section: "backtest".into(),
                key: "start_date".into(),
            }
        })?,
    };
    let end_date = match overrides.end {
        Some(d) => d,
        None => config_date(config, "backtest", "end_date")?
            .unwrap_or_else(|| Local::now().date_naive()),
    };

    let strategy_name = overrides
        .strategy
        .clone()
        .or_else(|| config.get_non_empty("backtest", "strategy"))
        .unwrap_or_else(|| DEFAULT_STRATEGY.to_string());
    let strategy = StrategyParams::from_name(&strategy_name, &strategy_inputs(config)?)?;

    let request = BacktestRequest::new(&symbol, start_date, end_date, strategy).with_starting_capital(
        config.get_double("backtest", "starting_capital", DEFAULT_STARTING_CAPITAL),
    );
    request.validate()?;
    Ok(request)
}

pub fn print_summary(result: &BacktestResult) {
    let report = &result.report;
    eprintln!("\n=== Results: {} ===", result.symbol);
    eprintln!("Strategy:         {}", result.strategy);
    eprintln!("Period:           {} to {}", result.start_date, result.end_date);
    eprintln!("Total PnL:        {:.2}", report.total_pnl);
    eprintln!("Annualized:       {:.2}%", report.annualized_return);
    eprintln!("Max Drawdown:     {:.2}%", report.max_drawdown);
    eprintln!("Win Probability:  {:.1}%", report.win_probability * 100.0);
    eprintln!(
        "Total Trades:     {} ({} won, {} lost)",
        report.total_trades, report.trades_won, report.trades_lost
    );
    eprintln!("Final Capital:    {:.2}", report.final_capital);

    if result.has_trades() {
        eprintln!("\n=== Trades ===");
        for trade in &result.trades {
            let pnl_sign = if trade.pnl >= 0.0 { "+" } else { "" };
            eprintln!(
                "  {} @ {:.2} -> {} @ {:.2}  {}{:.2}",
                trade.entry_date,
                trade.entry_price,
                trade.exit_date,
                trade.exit_price,
                pnl_sign,
                trade.pnl,
            );
        }
    }
}

fn run_backtest(
    config_path: &Path,
    overrides: &BacktestOverrides,
    output_path: Option<&Path>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&config) {
        return fail(e);
    }
    let request = match build_backtest_request(&config, overrides) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::json_report_adapter::JsonReportAdapter;
        use crate::adapters::quote_source_from_config;
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        use crate::domain::backtest::run_backtest as run_engine;
        use crate::domain::config_validation::retry_policy;
        use crate::ports::quote_port::QuoteSource;
        use crate::ports::report_port::ReportPort;

        let store = match SqliteAdapter::from_config(&config) {
            Ok(s) => s,
            Err(e) => return fail(e),
        };
        let source = match quote_source_from_config(&config) {
            Ok(s) => s,
            Err(e) => return fail(e),
        };
        let policy = retry_policy(&config);

        eprintln!(
            "Running backtest: {} {} from {} to {}",
            request.symbol, request.strategy, request.start_date, request.end_date
        );
        let source: &dyn QuoteSource = source.as_ref();
        let result = match run_engine(&store, Some(source), &policy, &request) {
            Ok(r) => r,
            Err(e) => return fail(e),
        };

        print_summary(&result);
        if let Some(warning) = result.no_trades() {
            eprintln!("\nwarning: {warning}");
        }

        if let Some(path) = output_path {
            let path_str = path.to_string_lossy();
            if let Err(e) = JsonReportAdapter::new().write(&result, &path_str) {
                return fail(e);
            }
            eprintln!("\nReport written to: {}", path.display());
        }
        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (request, output_path);
        eprintln!("error: sqlite feature is required for backtest");
        ExitCode::from(1)
    }
}

fn run_fetch(config_path: &Path, symbol: &str, start: NaiveDate, end: NaiveDate) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let symbol = match normalize_symbol(symbol) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    if start > end {
        return fail(PricelabError::invalid_parameter(
            "start",
            format!("{start} is after end {end}"),
        ));
    }

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::quote_source_from_config;
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        use crate::domain::backfill::backfill;
        use crate::domain::config_validation::retry_policy;

        let store = match SqliteAdapter::from_config(&config) {
            Ok(s) => s,
            Err(e) => return fail(e),
        };
        let source = match quote_source_from_config(&config) {
            Ok(s) => s,
            Err(e) => return fail(e),
        };

        eprintln!("Fetching {symbol} from {} ({start} to {end})", source.name());
        match backfill(&store, source.as_ref(), &retry_policy(&config), &symbol, start, end) {
            Ok(inserted) => {
                println!("Inserted {inserted} new rows for {symbol}.");
                ExitCode::SUCCESS
            }
            Err(e) => fail(e),
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, symbol);
        eprintln!("error: sqlite feature is required for fetch");
        ExitCode::from(1)
    }
}

fn run_prices(config_path: &Path, symbol: &str, limit: Option<usize>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let symbol = match normalize_symbol(symbol) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        use crate::ports::data_port::PriceStore;

        let store = match SqliteAdapter::from_config(&config) {
            Ok(s) => s,
            Err(e) => return fail(e),
        };

        let (first, last) = match store.get_data_range(&symbol) {
            Ok(Some((first, last, _))) => (first, last),
            Ok(None) => {
                eprintln!("{symbol}: no data found");
                return ExitCode::from(5);
            }
            Err(e) => return fail(e),
        };
        let bars = match store.get_range(&symbol, first, last) {
            Ok(b) => b,
            Err(e) => return fail(e),
        };

        let skip = limit.map_or(0, |n| bars.len().saturating_sub(n));
        println!("date,open,high,low,close,volume");
        for bar in &bars[skip..] {
            println!(
                "{},{:.4},{:.4},{:.4},{:.4},{}",
                bar.date, bar.open, bar.high, bar.low, bar.close, bar.volume
            );
        }
        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, symbol, limit);
        eprintln!("error: sqlite feature is required for prices");
        ExitCode::from(1)
    }
}

fn run_info(config_path: &Path, symbol: Option<&str>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        use crate::ports::data_port::PriceStore;

        let store = match SqliteAdapter::from_config(&config) {
            Ok(s) => s,
            Err(e) => return fail(e),
        };

        let symbols = match symbol.map(normalize_symbol) {
            Some(Ok(s)) => vec![s],
            Some(Err(e)) => return fail(e),
            None => match store.list_symbols() {
                Ok(s) => s,
                Err(e) => return fail(e),
            },
        };
        if symbols.is_empty() {
            eprintln!("no symbols stored");
        }

        for s in &symbols {
            match store.get_data_range(s) {
                Ok(Some((min_date, max_date, count))) => {
                    println!("{s}: {count} bars, {min_date} to {max_date}");
                }
                Ok(None) => eprintln!("{s}: no data found"),
                Err(e) => eprintln!("error querying {s}: {e}"),
            }
        }
        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, symbol);
        eprintln!("error: sqlite feature is required for info");
        ExitCode::from(1)
    }
}

fn run_serve(config_path: &Path) -> ExitCode {
    #[cfg(feature = "web")]
    {
        use crate::adapters::quote_source_from_config;
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        use crate::adapters::web::{AppState, build_router};
        use crate::domain::config_validation::retry_policy;
        use crate::ports::data_port::PriceStore;
        use crate::ports::quote_port::QuoteSource;
        use axum::http::HeaderValue;
        use std::net::SocketAddr;
        use std::sync::Arc;

        eprintln!("Loading config from {}", config_path.display());
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(code) => return code,
        };
        if let Err(e) = validate_backtest_config(&config) {
            return fail(e);
        }

        let store = match SqliteAdapter::from_config(&config) {
            Ok(s) => Arc::new(s) as Arc<dyn PriceStore + Send + Sync>,
            Err(e) => return fail(e),
        };
        let source: Arc<dyn QuoteSource + Send + Sync> = match quote_source_from_config(&config) {
            Ok(s) => Arc::from(s),
            Err(e) => return fail(e),
        };

        let listen = config
            .get_non_empty("web", "listen")
            .unwrap_or_else(|| "127.0.0.1:8000".to_string());
        let addr: SocketAddr = match listen.parse() {
            Ok(a) => a,
            Err(e) => {
                return fail(PricelabError::ConfigInvalid {
                    section: "web".into(),
                    key: "listen".into(),
                    reason: format!("{e}"),
                });
            }
        };

        let origin = config
            .get_non_empty("web", "cors_origin")
            .unwrap_or_else(|| "http://localhost:3000".to_string());
        let cors_origin = match HeaderValue::from_str(&origin) {
            Ok(v) => Some(v),
            Err(e) => {
                return fail(PricelabError::ConfigInvalid {
                    section: "web".into(),
                    key: "cors_origin".into(),
                    reason: format!("{e}"),
                });
            }
        };

        let state = AppState {
            store,
            source: Some(Arc::clone(&source)),
            policy: retry_policy(&config),
            starting_capital: config.get_double(
                "backtest",
                "starting_capital",
                DEFAULT_STARTING_CAPITAL,
            ),
        };
        let router = build_router(state, cors_origin);

        let runtime = match tokio::runtime::Runtime::new() {
            Ok(r) => r,
            Err(e) => return fail(PricelabError::Io(e)),
        };

        eprintln!("Starting web server on {addr}");
        let served = runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router).await
        });

        // The blocking HTTP client must be dropped outside the runtime.
        drop(runtime);
        drop(source);

        match served {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => fail(PricelabError::Io(e)),
        }
    }

    #[cfg(not(feature = "web"))]
    {
        let _ = config_path;
        eprintln!("error: web feature is required for serve");
        ExitCode::from(1)
    }
}
