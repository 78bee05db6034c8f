//! Run reports: cohort breakdowns, equity curve, streaks and notable trades.
//!
//! A [`Report`] is a read-only projection of a run's summary and results and
//! can be rebuilt from them at any time.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use super::metrics::{GroupStats, RunSummary};
use super::outcome::{OutcomeRecord, ResultKind, TradeResult};
use super::trade::DatedTrade;

/// Descriptive header of a backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub symbol: String,
    pub mode: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl RunMeta {
    /// Meta spanning the earliest to the latest trade date of `trades`.
    pub fn for_trades(symbol: &str, mode: &str, notes: Option<String>, trades: &[DatedTrade]) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            mode: mode.to_string(),
            start_date: trades.iter().map(|t| t.date).min(),
            end_date: trades.iter().map(|t| t.date).max(),
            notes,
        }
    }

    pub fn period(&self) -> String {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => format!("{start} to {end}"),
            _ => "n/a".to_string(),
        }
    }
}

/// A run as held by a run store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRun {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub meta: RunMeta,
    pub summary: RunSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cohort {
    pub label: String,
    pub stats: GroupStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub pnl: f64,
    pub cumulative: f64,
    pub result_kind: ResultKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreakType {
    Win,
    Loss,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StreakStats {
    pub max_win_streak: usize,
    pub max_loss_streak: usize,
    pub current_streak: usize,
    pub current_type: Option<StreakType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub run_id: Option<String>,
    pub meta: RunMeta,
    pub summary: RunSummary,
    pub by_checklist_score: Vec<Cohort>,
    pub by_confidence: Vec<Cohort>,
    pub by_direction: Vec<Cohort>,
    pub by_weekday: Vec<Cohort>,
    pub equity_curve: Vec<EquityPoint>,
    pub streaks: StreakStats,
    pub best_trade: Option<TradeResult>,
    pub worst_trade: Option<TradeResult>,
}

impl Report {
    pub fn with_run_id(mut self, run_id: &str) -> Self {
        self.run_id = Some(run_id.to_string());
        self
    }
}

/// Build a report over the traded results of a run, in the order given.
pub fn build_report(meta: &RunMeta, summary: &RunSummary, results: &[TradeResult]) -> Report {
    let traded: Vec<&TradeResult> = results
        .iter()
        .filter(|r| r.outcome.result_kind.is_traded())
        .collect();

    Report {
        run_id: None,
        meta: meta.clone(),
        summary: summary.clone(),
        by_checklist_score: group_by_label(&traded, |r| {
            score_bracket(r.outcome.checklist_score.as_deref()).to_string()
        }),
        by_confidence: group_by_label(&traded, |r| {
            r.outcome
                .confidence
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or("UNKNOWN")
                .to_uppercase()
        }),
        by_direction: group_by_label(&traded, |r| r.outcome.direction.as_str().to_uppercase()),
        by_weekday: group_by_weekday(&traded),
        equity_curve: equity_curve(&traded),
        streaks: streaks(traded.iter().map(|r| r.outcome.result_kind)),
        best_trade: best_trade(&traded).cloned(),
        worst_trade: worst_trade(&traded).cloned(),
    }
}

/// Bracket for a checklist score such as `"8/12"`, keyed on its leading integer.
pub fn score_bracket(score: Option<&str>) -> &'static str {
    let leading = score.and_then(|s| s.split('/').next()?.trim().parse::<i64>().ok());
    match leading {
        Some(n) if n >= 10 => "10-12 (HIGH)",
        Some(n) if n >= 7 => "7-9 (MEDIUM)",
        Some(n) if n >= 4 => "4-6 (LOW)",
        Some(_) => "<4 (REJECT)",
        None => "Unknown",
    }
}

fn group_by_label<F>(traded: &[&TradeResult], label: F) -> Vec<Cohort>
where
    F: Fn(&TradeResult) -> String,
{
    let mut groups: BTreeMap<String, Vec<&OutcomeRecord>> = BTreeMap::new();
    for r in traded {
        groups.entry(label(r)).or_default().push(&r.outcome);
    }
    groups
        .into_iter()
        .map(|(label, members)| Cohort {
            label,
            stats: GroupStats::compute(members),
        })
        .collect()
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn group_by_weekday(traded: &[&TradeResult]) -> Vec<Cohort> {
    let mut groups: BTreeMap<u32, (Weekday, Vec<&OutcomeRecord>)> = BTreeMap::new();
    for r in traded {
        let day = r.trade_date.weekday();
        groups
            .entry(day.num_days_from_monday())
            .or_insert_with(|| (day, Vec::new()))
            .1
            .push(&r.outcome);
    }
    groups
        .into_values()
        .map(|(day, members)| Cohort {
            label: weekday_name(day).to_string(),
            stats: GroupStats::compute(members),
        })
        .collect()
}

fn equity_curve(traded: &[&TradeResult]) -> Vec<EquityPoint> {
    let mut cumulative = 0.0;
    traded
        .iter()
        .map(|r| {
            cumulative += r.outcome.pnl_pips;
            EquityPoint {
                date: r.trade_date,
                time: r.outcome.entry_time.map(|t| t.time()),
                pnl: r.outcome.pnl_pips,
                cumulative,
                result_kind: r.outcome.result_kind,
            }
        })
        .collect()
}

/// Win and loss streaks; breakevens and expiries neither extend nor break a streak.
pub fn streaks<I>(kinds: I) -> StreakStats
where
    I: IntoIterator<Item = ResultKind>,
{
    let mut s = StreakStats::default();
    for kind in kinds {
        let kind_type = match kind {
            ResultKind::FullWin | ResultKind::PartialWin => StreakType::Win,
            ResultKind::Loss => StreakType::Loss,
            _ => continue,
        };
        if s.current_type == Some(kind_type) {
            s.current_streak += 1;
        } else {
            s.current_streak = 1;
            s.current_type = Some(kind_type);
        }
        match kind_type {
            StreakType::Win => s.max_win_streak = s.max_win_streak.max(s.current_streak),
            StreakType::Loss => s.max_loss_streak = s.max_loss_streak.max(s.current_streak),
        }
    }
    s
}

fn best_trade<'a>(traded: &[&'a TradeResult]) -> Option<&'a TradeResult> {
    traded.iter().copied().fold(None, |best, r| match best {
        Some(b) if b.outcome.pnl_pips >= r.outcome.pnl_pips => Some(b),
        _ => Some(r),
    })
}

fn worst_trade<'a>(traded: &[&'a TradeResult]) -> Option<&'a TradeResult> {
    traded.iter().copied().fold(None, |worst, r| match worst {
        Some(w) if w.outcome.pnl_pips <= r.outcome.pnl_pips => Some(w),
        _ => Some(r),
    })
}
