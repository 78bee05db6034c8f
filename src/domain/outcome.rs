//! Simulation outcomes.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::error::PipreplayError;
use super::trade::{Direction, EntryZone, TradeDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    FullWin,
    PartialWin,
    Loss,
    Breakeven,
    Expired,
    NoEntry,
    NoData,
}

impl ResultKind {
    pub const ALL: [ResultKind; 7] = [
        ResultKind::FullWin,
        ResultKind::PartialWin,
        ResultKind::Loss,
        ResultKind::Breakeven,
        ResultKind::Expired,
        ResultKind::NoEntry,
        ResultKind::NoData,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResultKind::FullWin => "full_win",
            ResultKind::PartialWin => "partial_win",
            ResultKind::Loss => "loss",
            ResultKind::Breakeven => "breakeven",
            ResultKind::Expired => "expired",
            ResultKind::NoEntry => "no_entry",
            ResultKind::NoData => "no_data",
        }
    }

    /// True when a position was actually opened.
    pub fn is_traded(self) -> bool {
        !matches!(self, ResultKind::NoEntry | ResultKind::NoData)
    }

    pub fn is_win(self) -> bool {
        matches!(self, ResultKind::FullWin | ResultKind::PartialWin)
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultKind {
    type Err = PipreplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResultKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| PipreplayError::Serialization {
                reason: format!("unknown result kind '{s}'"),
            })
    }
}

/// Terminal record of one simulated trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_time: Option<NaiveDateTime>,
    pub stop_loss: f64,
    pub tp1: f64,
    pub tp2: f64,
    pub stop_distance_pips: f64,

    pub tp1_hit: bool,
    pub tp1_time: Option<NaiveDateTime>,
    pub tp1_pips: f64,
    pub tp2_hit: bool,
    pub tp2_time: Option<NaiveDateTime>,
    pub tp2_pips: f64,
    pub stop_hit: bool,
    pub stop_time: Option<NaiveDateTime>,

    pub result_kind: ResultKind,
    pub pnl_pips: f64,
    pub max_adverse_pips: f64,
    pub max_favorable_pips: f64,
    pub duration_minutes: i64,
    pub expired: bool,

    pub checklist_score: Option<String>,
    pub confidence: Option<String>,
}

impl OutcomeRecord {
    /// Record carrying only the trade's levels and tags, before any bar is seen.
    pub fn blank(trade: &TradeDefinition, result_kind: ResultKind) -> Self {
        Self {
            direction: trade.direction,
            entry_price: 0.0,
            entry_time: None,
            stop_loss: trade.stop_loss,
            tp1: trade.take_profit_1,
            tp2: trade.take_profit_2,
            stop_distance_pips: trade.stop_distance_pips,
            tp1_hit: false,
            tp1_time: None,
            tp1_pips: 0.0,
            tp2_hit: false,
            tp2_time: None,
            tp2_pips: 0.0,
            stop_hit: false,
            stop_time: None,
            result_kind,
            pnl_pips: 0.0,
            max_adverse_pips: 0.0,
            max_favorable_pips: 0.0,
            duration_minutes: 0,
            expired: false,
            checklist_score: trade.checklist_score.clone(),
            confidence: trade.confidence.clone(),
        }
    }

    /// Placeholder for a trade whose date had no price data.
    pub fn no_data(trade: &TradeDefinition) -> Self {
        Self::blank(trade, ResultKind::NoData)
    }
}

/// An outcome together with the batch context it was produced in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    pub trade_date: NaiveDate,
    pub entry_zone: EntryZone,
    pub outcome: OutcomeRecord,
}
