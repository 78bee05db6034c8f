//! Trade setup files.
//!
//! One setup per row with the header
//! `date,bias,entry_min,entry_max,stop_loss,tp1,tp2,sl_pips` followed by the
//! optional columns `search_start,checklist_score,confidence,tp1_close_pct`.

use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

use crate::domain::bar::parse_timestamp;
use crate::domain::error::PipreplayError;
use crate::domain::trade::{DatedTrade, Direction, EntryZone, TradeDefinition};

#[derive(Debug, Deserialize)]
struct SetupRow {
    date: String,
    bias: String,
    entry_min: f64,
    entry_max: f64,
    stop_loss: f64,
    tp1: f64,
    tp2: f64,
    sl_pips: f64,
    #[serde(default)]
    search_start: Option<String>,
    #[serde(default)]
    checklist_score: Option<String>,
    #[serde(default)]
    confidence: Option<String>,
    #[serde(default)]
    tp1_close_pct: Option<f64>,
}

impl SetupRow {
    fn into_dated(self) -> Result<DatedTrade, String> {
        let date = NaiveDate::parse_from_str(self.date.trim().replace('.', "-").as_str(), "%Y-%m-%d")
            .map_err(|_| format!("invalid date '{}'", self.date))?;
        let direction: Direction = self.bias.parse().map_err(|e: PipreplayError| e.to_string())?;

        let search_start = match non_empty(self.search_start) {
            Some(raw) => Some(parse_search_start(date, &raw)?),
            None => None,
        };

        let tp1_close_fraction = match self.tp1_close_pct {
            Some(pct) if (0.0..=100.0).contains(&pct) => Some(pct / 100.0),
            Some(pct) => return Err(format!("tp1_close_pct must be between 0 and 100, got {pct}")),
            None => None,
        };

        let trade = TradeDefinition {
            direction,
            entry_zone: EntryZone {
                min: self.entry_min,
                max: self.entry_max,
            },
            stop_loss: self.stop_loss,
            take_profit_1: self.tp1,
            take_profit_2: self.tp2,
            stop_distance_pips: self.sl_pips,
            search_start,
            checklist_score: non_empty(self.checklist_score),
            confidence: non_empty(self.confidence),
        };
        trade.validate().map_err(|e| e.to_string())?;

        Ok(DatedTrade {
            date,
            trade,
            tp1_close_fraction,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A full timestamp, or a time of day on the setup's date.
pub fn parse_search_start(date: NaiveDate, raw: &str) -> Result<NaiveDateTime, String> {
    if let Some(parsed) = parse_timestamp(raw) {
        return Ok(parsed.value());
    }
    ["%H:%M:%S", "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(raw.trim(), fmt).ok())
        .map(|t| date.and_time(t))
        .ok_or_else(|| format!("invalid search_start '{raw}'"))
}

/// Parse setup CSV content. The first invalid row aborts with its line number.
pub fn parse_setups(content: &str) -> Result<Vec<DatedTrade>, PipreplayError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = rdr
        .headers()
        .map_err(|e| PipreplayError::SetupParse {
            line: 1,
            reason: e.to_string(),
        })?
        .clone();

    let mut setups = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| PipreplayError::SetupParse {
            line: e.position().map_or(0, |p| p.line()),
            reason: e.to_string(),
        })?;
        let line = record.position().map_or(0, |p| p.line());

        let row: SetupRow = record
            .deserialize(Some(&headers))
            .map_err(|e| PipreplayError::SetupParse {
                line,
                reason: e.to_string(),
            })?;
        let dated = row
            .into_dated()
            .map_err(|reason| PipreplayError::SetupParse { line, reason })?;
        setups.push(dated);
    }
    Ok(setups)
}

pub fn read_setups(path: &Path) -> Result<Vec<DatedTrade>, PipreplayError> {
    let content = fs::read_to_string(path)?;
    parse_setups(&content)
}
