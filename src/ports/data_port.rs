//! Price data access ports.

use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::bar::PriceBar;
use crate::domain::error::PipreplayError;
use crate::domain::timeframe::Timeframe;

pub trait PriceDataPort: Send + Sync {
    /// Bars for `symbol` between `start_date` and `end_date` inclusive, ascending.
    /// An unknown symbol or empty range yields an empty vector.
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, PipreplayError>;

    fn list_symbols(&self) -> Result<Vec<String>, PipreplayError>;

    /// First bar time, last bar time and bar count, or `None` when nothing is stored.
    fn get_data_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, PipreplayError>;
}

/// One trading day of M1 bars, as consumed by the batch runner.
pub trait DayBars: Sync {
    fn bars_for_date(&self, date: NaiveDate) -> Result<Vec<PriceBar>, PipreplayError>;
}

/// [`DayBars`] for a single symbol backed by a [`PriceDataPort`].
pub struct SymbolDayBars<'a> {
    port: &'a dyn PriceDataPort,
    symbol: String,
}

impl<'a> SymbolDayBars<'a> {
    pub fn new(port: &'a dyn PriceDataPort, symbol: &str) -> Self {
        Self {
            port,
            symbol: symbol.to_uppercase(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl DayBars for SymbolDayBars<'_> {
    fn bars_for_date(&self, date: NaiveDate) -> Result<Vec<PriceBar>, PipreplayError> {
        self.port.fetch_bars(&self.symbol, Timeframe::M1, date, date)
    }
}
