//! CSV price data adapter for MT5 exports.
//!
//! Reads `{base_path}/{SYMBOL}_M1.csv`. MT5 writes tab separated files with a
//! `Date Time Open High Low Close TickVol Vol Spread` header; comma and
//! semicolon separated exports and a combined `date time` column are also
//! accepted.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use crate::domain::bar::{parse_timestamp, ParsedTime, PriceBar};
use crate::domain::error::PipreplayError;
use crate::domain::timeframe::{resample, Timeframe};
use crate::ports::data_port::PriceDataPort;

const M1_SUFFIX: &str = "_M1.csv";
const HEADER_CELLS: [&str; 4] = ["date", "time", "open", "<date>"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path
            .join(format!("{}{}", symbol.to_uppercase(), M1_SUFFIX))
    }

    fn load_symbol(&self, symbol: &str) -> Result<Vec<PriceBar>, PipreplayError> {
        let path = self.csv_path(symbol);
        match fs::read_to_string(&path) {
            Ok(content) => {
                let mut bars = parse_mt5_csv(&content);
                bars.sort_by_key(|b| b.time);
                Ok(bars)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no price file for symbol");
                Ok(Vec::new())
            }
            Err(e) => Err(PipreplayError::Database {
                reason: format!("failed to read {}: {}", path.display(), e),
            }),
        }
    }
}

/// Read an MT5 export from disk.
pub fn read_mt5_file(path: &Path) -> Result<Vec<PriceBar>, PipreplayError> {
    let content = fs::read_to_string(path)?;
    Ok(parse_mt5_csv(&content))
}

fn detect_delimiter(first_line: &str) -> u8 {
    if first_line.contains('\t') {
        b'\t'
    } else if first_line.contains(';') {
        b';'
    } else {
        b','
    }
}

/// Parse MT5 style CSV content into bars, in file order.
///
/// Malformed rows are skipped with a warning.
pub fn parse_mt5_csv(content: &str) -> Vec<PriceBar> {
    let content = content.trim_start_matches('\u{feff}');
    let delimiter = detect_delimiter(content.lines().next().unwrap_or(""));

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut bars = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let line = idx + 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(line, error = %e, "skipping unreadable CSV row");
                continue;
            }
        };
        let cells: Vec<&str> = record.iter().filter(|c| !c.is_empty()).collect();

        if line == 1
            && cells
                .iter()
                .any(|c| HEADER_CELLS.contains(&c.to_lowercase().as_str()))
        {
            continue;
        }

        match parse_row(&cells) {
            Ok(bar) => bars.push(bar),
            Err(reason) => warn!(line, %reason, "skipping malformed CSV row"),
        }
    }
    bars
}

fn parse_row(cells: &[&str]) -> Result<PriceBar, String> {
    if cells.len() < 6 {
        return Err(format!("expected at least 6 columns, found {}", cells.len()));
    }

    // combined "date time" first column, or separate date and time columns
    let (stamp, prices) = if cells[0].contains(' ') {
        (cells[0].to_string(), &cells[1..])
    } else {
        (format!("{} {}", cells[0], cells[1]), &cells[2..])
    };

    let time = parse_bar_time(&stamp)?;
    let price = |i: usize, name: &str| -> Result<f64, String> {
        prices
            .get(i)
            .ok_or_else(|| format!("missing {name} column"))?
            .parse::<f64>()
            .map_err(|e| format!("invalid {name} value: {e}"))
    };
    let volume = match prices.get(4) {
        Some(v) => v
            .parse::<i64>()
            .map_err(|e| format!("invalid volume value: {e}"))?,
        None => 0,
    };

    Ok(PriceBar {
        time,
        open: price(0, "open")?,
        high: price(1, "high")?,
        low: price(2, "low")?,
        close: price(3, "close")?,
        volume,
    })
}

fn parse_bar_time(stamp: &str) -> Result<NaiveDateTime, String> {
    match parse_timestamp(stamp) {
        Some(ParsedTime::Full(t)) => Ok(t),
        Some(ParsedTime::DateOnly(t)) => {
            warn!(%stamp, "timestamp without time of day, using midnight");
            Ok(t)
        }
        None => Err(format!("unparseable timestamp '{stamp}'")),
    }
}

impl PriceDataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, PipreplayError> {
        let bars: Vec<PriceBar> = self
            .load_symbol(symbol)?
            .into_iter()
            .filter(|b| b.date() >= start_date && b.date() <= end_date)
            .collect();
        Ok(resample(&bars, timeframe))
    }

    fn list_symbols(&self) -> Result<Vec<String>, PipreplayError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| PipreplayError::Database {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PipreplayError::Database {
                reason: format!("directory entry error: {}", e),
            })?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(symbol) = name.strip_suffix(M1_SUFFIX) {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, PipreplayError> {
        let bars = resample(&self.load_symbol(symbol)?, timeframe);
        match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Ok(Some((first.time, last.time, bars.len()))),
            _ => Ok(None),
        }
    }
}
