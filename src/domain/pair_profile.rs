//! Instrument profiles: price precision and trading session per symbol.

use serde::{Deserialize, Serialize};

const DEFAULT_SESSION_START_HOUR: u32 = 8;
const DEFAULT_SESSION_CUTOFF_HOUR: u32 = 17;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairProfile {
    pub symbol: String,
    pub digits: u32,
    pub pip_size: f64,
    pub base_currency: String,
    pub quote_currency: String,
    /// Local session hour at which the watch window opens.
    pub session_start_hour: u32,
    /// Local session hour at which unresolved trades are force-closed.
    pub session_cutoff_hour: u32,
}

/// Price of one pip for an instrument quoted with `digits` decimals.
pub fn pip_size_for_digits(digits: u32) -> f64 {
    if digits <= 3 { 0.01 } else { 0.0001 }
}

/// Profile for `symbol`; unknown symbols derive theirs from the naming convention.
pub fn profile_for(symbol: &str) -> PairProfile {
    let symbol = symbol.trim().to_uppercase();
    let (digits, cutoff) = match symbol.as_str() {
        "GBPJPY" => (3, 20),
        "EURUSD" | "GBPUSD" => (5, 17),
        "XAUUSD" => (2, DEFAULT_SESSION_CUTOFF_HOUR),
        "USDJPY" | "EURJPY" => (3, DEFAULT_SESSION_CUTOFF_HOUR),
        other => (derived_digits(other), DEFAULT_SESSION_CUTOFF_HOUR),
    };

    let split = symbol.char_indices().nth(3).map(|(i, _)| i).unwrap_or(symbol.len());
    let (base, quote) = symbol.split_at(split);

    PairProfile {
        digits,
        pip_size: pip_size_for_digits(digits),
        base_currency: base.to_string(),
        quote_currency: quote.to_string(),
        session_start_hour: DEFAULT_SESSION_START_HOUR,
        session_cutoff_hour: cutoff,
        symbol,
    }
}

fn derived_digits(symbol: &str) -> u32 {
    if symbol.starts_with("XAU") {
        2
    } else if symbol.ends_with("JPY") {
        3
    } else {
        5
    }
}
