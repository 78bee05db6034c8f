#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use pipreplay::domain::bar::PriceBar;
use pipreplay::domain::error::PipreplayError;
use pipreplay::domain::simulator::SimulationParams;
use pipreplay::domain::timeframe::{resample, Timeframe};
use pipreplay::domain::trade::{DatedTrade, Direction, EntryZone, TradeDefinition};
use pipreplay::ports::data_port::PriceDataPort;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory price provider that counts `fetch_bars` calls.
pub struct MockPriceData {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
    fetches: AtomicUsize,
}

impl MockPriceData {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.data.entry(symbol.to_string()).or_default().extend(bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl PriceDataPort for MockPriceData {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, PipreplayError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.errors.get(symbol) {
            return Err(PipreplayError::Database {
                reason: reason.clone(),
            });
        }
        let mut bars: Vec<PriceBar> = self
            .data
            .get(symbol)
            .map(|all| {
                all.iter()
                    .filter(|b| b.date() >= start_date && b.date() <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        bars.sort_by_key(|b| b.time);
        Ok(resample(&bars, timeframe))
    }

    fn list_symbols(&self) -> Result<Vec<String>, PipreplayError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, PipreplayError> {
        match self.data.get(symbol) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.time).min().unwrap();
                let max = bars.iter().map(|b| b.time).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(day: NaiveDate, hm: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(&format!("{day} {hm}"), "%Y-%m-%d %H:%M").unwrap()
}

pub fn make_bar(day: NaiveDate, hm: &str, open: f64, high: f64, low: f64, close: f64) -> PriceBar {
    PriceBar {
        time: at(day, hm),
        open,
        high,
        low,
        close,
        volume: 100,
    }
}

/// Long setup: zone 100.00-100.10, stop 99.80, targets 100.40 and 100.80.
pub fn long_setup() -> TradeDefinition {
    TradeDefinition {
        direction: Direction::Long,
        entry_zone: EntryZone {
            min: 100.00,
            max: 100.10,
        },
        stop_loss: 99.80,
        take_profit_1: 100.40,
        take_profit_2: 100.80,
        stop_distance_pips: 20.0,
        search_start: None,
        checklist_score: Some("10/12".into()),
        confidence: Some("high".into()),
    }
}

pub fn dated(day: NaiveDate, trade: TradeDefinition) -> DatedTrade {
    DatedTrade {
        date: day,
        trade,
        tp1_close_fraction: None,
    }
}

/// Enters at the open, hits TP1 then TP2.
pub fn full_win_day(day: NaiveDate) -> Vec<PriceBar> {
    vec![
        make_bar(day, "09:00", 100.15, 100.15, 100.05, 100.08),
        make_bar(day, "09:01", 100.10, 100.45, 100.10, 100.40),
        make_bar(day, "09:02", 100.40, 100.85, 100.20, 100.80),
    ]
}

/// Enters at the open, then trades through the stop.
pub fn loss_day(day: NaiveDate) -> Vec<PriceBar> {
    vec![
        make_bar(day, "09:00", 100.15, 100.15, 100.05, 100.08),
        make_bar(day, "09:01", 100.05, 100.10, 99.75, 99.78),
    ]
}

/// Never trades down into the zone.
pub fn no_entry_day(day: NaiveDate) -> Vec<PriceBar> {
    vec![
        make_bar(day, "09:00", 100.30, 100.40, 100.20, 100.30),
        make_bar(day, "09:01", 100.30, 100.50, 100.25, 100.45),
    ]
}

pub fn params() -> SimulationParams {
    SimulationParams {
        session_cutoff_hour: 20,
        utc_offset_hours: 1,
        pip_size: 0.01,
        tp1_close_fraction: 0.5,
    }
}
