//! Price bar representation and timestamp parsing.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// One OHLC bar. `time` is the bar open in broker/server time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl PriceBar {
    pub fn date(&self) -> NaiveDate {
        self.time.date()
    }

    /// Hour of this bar in the local trading session, wrapped into 0..24.
    pub fn session_hour(&self, utc_offset_hours: i32) -> u32 {
        (i64::from(self.time.hour()) + i64::from(utc_offset_hours)).rem_euclid(24) as u32
    }
}

/// How a timestamp string was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedTime {
    Full(NaiveDateTime),
    /// Only a date was present; the time defaults to midnight.
    DateOnly(NaiveDateTime),
}

impl ParsedTime {
    pub fn value(self) -> NaiveDateTime {
        match self {
            ParsedTime::Full(t) | ParsedTime::DateOnly(t) => t,
        }
    }
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Parse a bar timestamp. MT5 style dotted dates (`2024.01.02`) are accepted.
pub fn parse_timestamp(raw: &str) -> Option<ParsedTime> {
    let s = raw.trim().replace('.', "-");
    for fmt in DATETIME_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(&s, fmt) {
            return Some(ParsedTime::Full(t));
        }
    }
    NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .ok()
        .map(|d| ParsedTime::DateOnly(d.and_time(NaiveTime::MIN)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar_at(time: &str) -> PriceBar {
        PriceBar {
            time: NaiveDateTime::parse_from_str(time, "%Y-%m-%d %H:%M").unwrap(),
            open: 190.0,
            high: 190.5,
            low: 189.5,
            close: 190.2,
            volume: 120,
        }
    }

    #[test]
    fn session_hour_applies_offset() {
        let bar = bar_at("2024-03-04 08:15");
        assert_eq!(bar.session_hour(1), 9);
        assert_eq!(bar.session_hour(0), 8);
    }

    #[test]
    fn session_hour_wraps_past_midnight() {
        let bar = bar_at("2024-03-04 23:30");
        assert_eq!(bar.session_hour(1), 0);
        assert_eq!(bar.session_hour(3), 2);
    }

    #[test]
    fn session_hour_wraps_negative_offset() {
        let bar = bar_at("2024-03-04 01:00");
        assert_eq!(bar.session_hour(-2), 23);
    }

    #[test]
    fn session_hour_extreme_offsets() {
        let bar = bar_at("2024-03-04 09:00");
        assert_eq!(bar.session_hour(i32::MAX), 16);
        assert_eq!(bar.session_hour(i32::MIN), 1);
    }

    #[test]
    fn parse_timestamp_variants() {
        let expected = NaiveDateTime::parse_from_str("2024-01-02 08:30", "%Y-%m-%d %H:%M").unwrap();
        assert_eq!(
            parse_timestamp("2024-01-02 08:30:00"),
            Some(ParsedTime::Full(expected))
        );
        assert_eq!(
            parse_timestamp("2024.01.02 08:30"),
            Some(ParsedTime::Full(expected))
        );
        assert_eq!(
            parse_timestamp("2024-01-02T08:30:00"),
            Some(ParsedTime::Full(expected))
        );
    }

    #[test]
    fn parse_timestamp_date_only_is_midnight() {
        let parsed = parse_timestamp("2024-01-02").unwrap();
        assert!(matches!(parsed, ParsedTime::DateOnly(_)));
        assert_eq!(parsed.value().hour(), 0);
    }

    #[test]
    fn parse_timestamp_rejects_garbage() {
        assert_eq!(parse_timestamp("not a time"), None);
        assert_eq!(parse_timestamp(""), None);
    }
}
