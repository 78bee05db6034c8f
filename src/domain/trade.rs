//! Trade definitions: the hypotheses fed to the simulator.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::error::PipreplayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }

    /// Signed pip distance from `from` to `to`, positive when in this direction's favor.
    pub fn pips_between(self, from: f64, to: f64, pip_size: f64) -> f64 {
        match self {
            Direction::Long => (to - from) / pip_size,
            Direction::Short => (from - to) / pip_size,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = PipreplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "long" | "buy" => Ok(Direction::Long),
            "short" | "sell" => Ok(Direction::Short),
            other => Err(PipreplayError::InvalidTrade {
                reason: format!("unknown direction '{other}'"),
            }),
        }
    }
}

/// Price range in which the limit order counts as filled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryZone {
    pub min: f64,
    pub max: f64,
}

impl EntryZone {
    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDefinition {
    pub direction: Direction,
    pub entry_zone: EntryZone,
    pub stop_loss: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
    pub stop_distance_pips: f64,
    pub search_start: Option<NaiveDateTime>,
    /// Checklist score tag such as `"10/12"`.
    pub checklist_score: Option<String>,
    pub confidence: Option<String>,
}

impl TradeDefinition {
    /// Reject definitions that would feed nonsense into pip and ratio math.
    pub fn validate(&self) -> Result<(), PipreplayError> {
        let prices = [
            ("entry_min", self.entry_zone.min),
            ("entry_max", self.entry_zone.max),
            ("stop_loss", self.stop_loss),
            ("tp1", self.take_profit_1),
            ("tp2", self.take_profit_2),
        ];
        for (name, value) in prices {
            if !value.is_finite() {
                return Err(PipreplayError::InvalidTrade {
                    reason: format!("{name} must be finite"),
                });
            }
        }
        if self.entry_zone.min > self.entry_zone.max {
            return Err(PipreplayError::InvalidTrade {
                reason: format!(
                    "entry zone is inverted ({} > {})",
                    self.entry_zone.min, self.entry_zone.max
                ),
            });
        }
        if !(self.stop_distance_pips.is_finite() && self.stop_distance_pips > 0.0) {
            return Err(PipreplayError::InvalidTrade {
                reason: format!(
                    "stop distance must be positive, got {}",
                    self.stop_distance_pips
                ),
            });
        }
        Ok(())
    }
}

/// A trade definition scheduled on a trading date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatedTrade {
    pub date: NaiveDate,
    pub trade: TradeDefinition,
    /// Per-trade override of the fraction closed at TP1.
    pub tp1_close_fraction: Option<f64>,
}
