//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::adapters::setup_csv::{parse_search_start, read_setups};
use crate::adapters::text_report_adapter::{format_profit_factor, TextReportAdapter};
use crate::domain::batch::{run_batch, run_batch_parallel, BatchRun};
use crate::domain::config_validation::simulation_params_from_config;
use crate::domain::error::PipreplayError;
use crate::domain::outcome::{OutcomeRecord, TradeResult};
use crate::domain::report::{build_report, RunMeta};
use crate::domain::simulator::simulate;
use crate::domain::timeframe::Timeframe;
use crate::domain::trade::{Direction, EntryZone, TradeDefinition};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{DayBars, PriceDataPort, SymbolDayBars};
use crate::ports::report_port::ReportPort;
use crate::ports::run_store_port::RunStorePort;

pub const DEFAULT_MODE: &str = "historical";

#[derive(Parser, Debug)]
#[command(name = "pipreplay", about = "Replay trade setups against historical minute bars")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Simulate one setup against one day of M1 bars
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        date: NaiveDate,
        /// long, short, buy or sell
        #[arg(long)]
        bias: Direction,
        #[arg(long)]
        entry_min: f64,
        #[arg(long)]
        entry_max: f64,
        #[arg(long)]
        sl: f64,
        #[arg(long)]
        tp1: f64,
        #[arg(long)]
        tp2: f64,
        #[arg(long)]
        sl_pips: f64,
        /// HH:MM on the trade date, or a full timestamp
        #[arg(long)]
        search_start: Option<String>,
        #[arg(long)]
        tp1_close_pct: Option<f64>,
    },
    /// Run a batch of setups from a CSV file and store the run
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        setups: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        parallel: bool,
        #[arg(long)]
        notes: Option<String>,
        /// Print the run without storing it
        #[arg(long)]
        no_store: bool,
    },
    /// Render the report of a stored run
    Report {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        run_id: String,
        #[arg(long, value_enum, default_value = "text")]
        format: ReportFormat,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List stored runs, newest first
    Runs {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Delete a stored run and its results
    DeleteRun {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        run_id: String,
    },
    /// Import an MT5 M1 export and store every timeframe
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        file: PathBuf,
        #[arg(long)]
        symbol: String,
    },
    /// Show data range for symbol(s)
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long, default_value = "M1")]
        timeframe: String,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Simulate {
            config,
            symbol,
            date,
            bias,
            entry_min,
            entry_max,
            sl,
            tp1,
            tp2,
            sl_pips,
            search_start,
            tp1_close_pct,
        } => {
            let trade = TradeDefinition {
                direction: bias,
                entry_zone: EntryZone {
                    min: entry_min,
                    max: entry_max,
                },
                stop_loss: sl,
                take_profit_1: tp1,
                take_profit_2: tp2,
                stop_distance_pips: sl_pips,
                search_start: None,
                checklist_score: None,
                confidence: None,
            };
            run_simulate(
                &config,
                &symbol,
                date,
                trade,
                search_start.as_deref(),
                tp1_close_pct,
            )
        }
        Command::Backtest {
            config,
            setups,
            symbol,
            parallel,
            notes,
            no_store,
        } => run_backtest(&config, &setups, symbol.as_deref(), parallel, notes, no_store),
        Command::Report {
            config,
            run_id,
            format,
            output,
        } => run_report(&config, &run_id, format, output.as_ref()),
        Command::Runs { config, limit } => run_list_runs(&config, limit),
        Command::DeleteRun { config, run_id } => run_delete_run(&config, &run_id),
        Command::Import {
            config,
            file,
            symbol,
        } => run_import(&config, &file, &symbol),
        Command::Info {
            config,
            symbol,
            timeframe,
        } => run_info(&config, symbol.as_deref(), &timeframe),
    }
}

fn fail(err: PipreplayError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

/// Symbol from the command line, else `[backtest] symbol`.
pub fn resolve_symbol(
    symbol_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<String, PipreplayError> {
    symbol_override
        .map(str::to_string)
        .or_else(|| config.get_string("backtest", "symbol"))
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PipreplayError::ConfigMissing {
            section: "backtest".into(),
            key: "symbol".into(),
        })
}

/// Bars come from `[data] csv_dir` when set, otherwise from SQLite.
pub fn price_source(config: &dyn ConfigPort) -> Result<Box<dyn PriceDataPort>, PipreplayError> {
    if let Some(dir) = config.get_string("data", "csv_dir") {
        return Ok(Box::new(CsvAdapter::new(PathBuf::from(dir))));
    }

    #[cfg(feature = "sqlite")]
    {
        Ok(Box::new(open_sqlite(config)?))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        Err(PipreplayError::ConfigMissing {
            section: "data".into(),
            key: "csv_dir".into(),
        })
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(
    config: &dyn ConfigPort,
) -> Result<crate::adapters::sqlite_adapter::SqliteAdapter, PipreplayError> {
    let adapter = crate::adapters::sqlite_adapter::SqliteAdapter::from_config(config)?;
    adapter.initialize_schema()?;
    Ok(adapter)
}

#[cfg(feature = "sqlite")]
fn open_run_store(config: &dyn ConfigPort) -> Result<Box<dyn RunStorePort>, ExitCode> {
    open_sqlite(config)
        .map(|a| Box::new(a) as Box<dyn RunStorePort>)
        .map_err(fail)
}

#[cfg(not(feature = "sqlite"))]
fn open_run_store(_config: &dyn ConfigPort) -> Result<Box<dyn RunStorePort>, ExitCode> {
    eprintln!("error: sqlite feature is required for stored runs");
    Err(ExitCode::from(1))
}

fn renderer(format: ReportFormat) -> Box<dyn ReportPort> {
    match format {
        ReportFormat::Text => Box::new(TextReportAdapter::new()),
        ReportFormat::Json => Box::new(JsonReportAdapter::new()),
    }
}

fn run_simulate(
    config_path: &Path,
    symbol: &str,
    date: NaiveDate,
    mut trade: TradeDefinition,
    search_start: Option<&str>,
    tp1_close_pct: Option<f64>,
) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let mut params = match simulation_params_from_config(&config, symbol) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    if let Some(pct) = tp1_close_pct {
        params = params.with_tp1_close_fraction(pct / 100.0);
        if let Err(e) = params.validate() {
            return fail(e);
        }
    }

    if let Some(raw) = search_start {
        match parse_search_start(date, raw) {
            Ok(t) => trade.search_start = Some(t),
            Err(reason) => return fail(PipreplayError::InvalidTrade { reason }),
        }
    }
    if let Err(e) = trade.validate() {
        return fail(e);
    }

    let source = match price_source(&config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let days = SymbolDayBars::new(source.as_ref(), symbol);
    let bars = match days.bars_for_date(date) {
        Ok(b) => b,
        Err(e) => return fail(e),
    };
    eprintln!("Simulating {} {} on {} ({} bars)", days.symbol(), trade.direction, date, bars.len());

    let outcome = if bars.is_empty() {
        OutcomeRecord::no_data(&trade)
    } else {
        simulate(&trade, &bars, &params)
    };
    eprintln!("Result: {} ({:+.1} pips)", outcome.result_kind, outcome.pnl_pips);

    let result = TradeResult {
        trade_date: date,
        entry_zone: trade.entry_zone,
        outcome,
    };
    match serde_json::to_string_pretty(&result) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(PipreplayError::Serialization {
            reason: e.to_string(),
        }),
    }
}

fn run_backtest(
    config_path: &Path,
    setups_path: &Path,
    symbol_override: Option<&str>,
    parallel: bool,
    notes_override: Option<String>,
    no_store: bool,
) -> ExitCode {
    // Stage 1: Load config and resolve symbol
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let symbol = match resolve_symbol(symbol_override, &config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    // Stage 2: Simulation parameters
    let params = match simulation_params_from_config(&config, &symbol) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    // Stage 3: Setups
    eprintln!("Loading setups from {}", setups_path.display());
    let trades = match read_setups(setups_path) {
        Ok(t) => t,
        Err(e) => return fail(e),
    };

    let mode = config
        .get_string("backtest", "mode")
        .unwrap_or_else(|| DEFAULT_MODE.to_string());
    let notes = notes_override.or_else(|| config.get_string("backtest", "notes"));
    let meta = RunMeta::for_trades(&symbol, &mode, notes, &trades);

    // Stage 4: Run store, opened before simulating so a bad store fails fast
    let store = if no_store {
        None
    } else {
        match open_run_store(&config) {
            Ok(s) => Some(s),
            Err(code) => return code,
        }
    };

    // Stage 5: Simulate
    let source = match price_source(&config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let days = SymbolDayBars::new(source.as_ref(), &symbol);
    eprintln!(
        "Running {} setups for {} over {}{}",
        trades.len(),
        symbol,
        meta.period(),
        if parallel { " (parallel)" } else { "" }
    );
    let batch = if parallel {
        run_batch_parallel(&trades, &days, &params)
    } else {
        run_batch(&trades, &days, &params)
    };

    // Stage 6: Store
    let run_id = match store {
        Some(store) => match store_batch(store.as_ref(), &meta, &batch) {
            Ok(id) => {
                eprintln!("Stored run {id}");
                Some(id)
            }
            Err(e) => return fail(e),
        },
        None => None,
    };

    // Stage 7: Print summary
    let mut report = build_report(&meta, &batch.summary, &batch.results);
    if let Some(id) = &run_id {
        report = report.with_run_id(id);
    }
    match TextReportAdapter::new().render(&report) {
        Ok(text) => {
            print!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

/// Store a finished batch; returns the new run id.
pub fn store_batch(
    store: &dyn RunStorePort,
    meta: &RunMeta,
    batch: &BatchRun,
) -> Result<String, PipreplayError> {
    store.store_run(meta, &batch.summary, &batch.results)
}

fn run_report(
    config_path: &Path,
    run_id: &str,
    format: ReportFormat,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let store = match open_run_store(&config) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let run = match store.load_run(run_id) {
        Ok(Some(r)) => r,
        Ok(None) => {
            return fail(PipreplayError::RunNotFound {
                run_id: run_id.to_string(),
            })
        }
        Err(e) => return fail(e),
    };
    let results = match store.load_results(run_id) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    let report = build_report(&run.meta, &run.summary, &results).with_run_id(&run.run_id);
    let adapter = renderer(format);

    match output_path {
        Some(path) => match adapter.write(&report, &path.to_string_lossy()) {
            Ok(()) => {
                eprintln!("Report written to: {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => fail(e),
        },
        None => match adapter.render(&report) {
            Ok(text) => {
                print!("{text}");
                if format == ReportFormat::Json {
                    println!();
                }
                ExitCode::SUCCESS
            }
            Err(e) => fail(e),
        },
    }
}

fn run_list_runs(config_path: &Path, limit: usize) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let store = match open_run_store(&config) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let runs = match store.list_runs(limit) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    if runs.is_empty() {
        eprintln!("No stored runs");
        return ExitCode::SUCCESS;
    }

    println!(
        "{:<12}  {:<16}  {:<8}  {:<24}  {:>6}  {:>6}  {:>6}  {:>6}  {:>10}",
        "RUN", "CREATED", "SYMBOL", "PERIOD", "SETUPS", "TRADES", "WIN%", "PF", "P&L"
    );
    for run in &runs {
        let s = &run.summary;
        println!(
            "{:<12}  {:<16}  {:<8}  {:<24}  {:>6}  {:>6}  {:>6.1}  {:>6}  {:>+10.1}",
            run.run_id,
            run.created_at.format("%Y-%m-%d %H:%M").to_string(),
            run.meta.symbol,
            run.meta.period(),
            s.total_setups,
            s.total_trades,
            s.win_rate,
            format_profit_factor(s.profit_factor),
            s.total_pnl,
        );
    }
    ExitCode::SUCCESS
}

fn run_delete_run(config_path: &Path, run_id: &str) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let store = match open_run_store(&config) {
        Ok(s) => s,
        Err(code) => return code,
    };

    match store.delete_run(run_id) {
        Ok(true) => {
            eprintln!("Deleted run {run_id}");
            ExitCode::SUCCESS
        }
        Ok(false) => fail(PipreplayError::RunNotFound {
            run_id: run_id.to_string(),
        }),
        Err(e) => fail(e),
    }
}

/// Store M1 bars and every coarser timeframe resampled from them.
#[cfg(feature = "sqlite")]
pub fn import_bars(
    store: &crate::adapters::sqlite_adapter::SqliteAdapter,
    symbol: &str,
    m1_bars: &[crate::domain::bar::PriceBar],
) -> Result<Vec<(Timeframe, usize)>, PipreplayError> {
    use crate::domain::timeframe::resample;

    let mut counts = Vec::with_capacity(Timeframe::ALL.len());
    for tf in Timeframe::ALL {
        let written = if tf == Timeframe::M1 {
            store.insert_bars(symbol, tf, m1_bars)?
        } else {
            store.insert_bars(symbol, tf, &resample(m1_bars, tf))?
        };
        counts.push((tf, written));
    }
    Ok(counts)
}

fn run_import(config_path: &Path, file: &Path, symbol: &str) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let symbol = symbol.trim().to_uppercase();

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::csv_adapter::read_mt5_file;

        eprintln!("Reading {}", file.display());
        let mut bars = match read_mt5_file(file) {
            Ok(b) => b,
            Err(e) => return fail(e),
        };
        if bars.is_empty() {
            return fail(PipreplayError::NoData {
                symbol,
                detail: format!("no bars parsed from {}", file.display()),
            });
        }
        bars.sort_by_key(|b| b.time);

        let store = match open_sqlite(&config) {
            Ok(s) => s,
            Err(e) => return fail(e),
        };
        match import_bars(&store, &symbol, &bars) {
            Ok(counts) => {
                for (tf, n) in counts {
                    eprintln!("  {symbol} {tf}: {n} bars");
                }
                ExitCode::SUCCESS
            }
            Err(e) => fail(e),
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (&config, file, &symbol);
        eprintln!("error: sqlite feature is required for import");
        ExitCode::from(1)
    }
}

fn run_info(config_path: &Path, symbol: Option<&str>, timeframe: &str) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let timeframe: Timeframe = match timeframe.parse() {
        Ok(tf) => tf,
        Err(e) => return fail(e),
    };
    let source = match price_source(&config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    let symbols = match symbol {
        Some(s) => vec![s.trim().to_uppercase()],
        None => match source.list_symbols() {
            Ok(list) => list,
            Err(e) => return fail(e),
        },
    };
    if symbols.is_empty() {
        eprintln!("No symbols available");
        return ExitCode::SUCCESS;
    }

    let mut found = false;
    for sym in &symbols {
        match source.get_data_range(sym, timeframe) {
            Ok(Some((first, last, count))) => {
                found = true;
                println!("{sym} {timeframe}: {first} to {last} ({count} bars)");
            }
            Ok(None) => println!("{sym} {timeframe}: no data"),
            Err(e) => return fail(e),
        }
    }

    match symbol {
        Some(sym) if !found => fail(PipreplayError::NoData {
            symbol: sym.trim().to_uppercase(),
            detail: format!("no {timeframe} bars stored"),
        }),
        _ => ExitCode::SUCCESS,
    }
}
