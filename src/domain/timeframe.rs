//! Bar timeframes and M1 resampling.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, Timelike};
use serde::{Deserialize, Serialize};

use super::bar::PriceBar;
use super::error::PipreplayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 7] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
    ];

    pub fn minutes(self) -> u32 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = PipreplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.label() == upper)
            .ok_or(PipreplayError::UnknownTimeframe {
                label: s.to_string(),
            })
    }
}

/// Aggregate ascending M1 bars into `target` bars.
///
/// Intraday buckets are aligned to midnight; D1 groups by calendar date.
/// The aggregated bar carries the time of the first bar in its bucket.
pub fn resample(bars: &[PriceBar], target: Timeframe) -> Vec<PriceBar> {
    if target == Timeframe::M1 {
        return bars.to_vec();
    }

    let width = target.minutes();
    let bucket_key = |bar: &PriceBar| -> (NaiveDate, u32) {
        if target == Timeframe::D1 {
            (bar.date(), 0)
        } else {
            let minute_of_day = bar.time.hour() * 60 + bar.time.minute();
            (bar.date(), minute_of_day / width)
        }
    };

    let mut out = Vec::new();
    let mut start = 0;
    for i in 1..=bars.len() {
        if i == bars.len() || bucket_key(&bars[i]) != bucket_key(&bars[start]) {
            out.push(aggregate(&bars[start..i]));
            start = i;
        }
    }
    out
}

fn aggregate(bucket: &[PriceBar]) -> PriceBar {
    let first = &bucket[0];
    let last = &bucket[bucket.len() - 1];
    PriceBar {
        time: first.time,
        open: first.open,
        high: bucket.iter().map(|b| b.high).fold(f64::MIN, f64::max),
        low: bucket.iter().map(|b| b.low).fold(f64::MAX, f64::min),
        close: last.close,
        volume: bucket.iter().map(|b| b.volume).sum(),
    }
}
