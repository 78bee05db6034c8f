//! Single-trade outcome simulator.
//!
//! Replays M1 bars against an entry zone, a stop and two targets. The
//! simulation is a pure function of its inputs: the same trade, bars and
//! parameters always produce the same [`OutcomeRecord`].
//!
//! Phase 1 looks for the fill, phase 2 manages the open position bar by bar:
//! session cutoff, excursion tracking, stop, TP1 (partial close and stop to
//! breakeven), TP2.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::bar::PriceBar;
use super::error::PipreplayError;
use super::outcome::{OutcomeRecord, ResultKind};
use super::pair_profile::PairProfile;
use super::trade::{Direction, TradeDefinition};

/// Resolution order when one bar touches both the stop and a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameBarPolicy {
    /// The stop is tested first; a bar touching stop and target is a stop-out.
    StopFirst,
}

/// Intrabar path is unknown, so the stop always wins a same-bar tie.
/// Results are only comparable across runs while this stays fixed.
pub const SAME_BAR_POLICY: SameBarPolicy = SameBarPolicy::StopFirst;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Local session hour at which open trades are force-closed.
    pub session_cutoff_hour: u32,
    /// Hours added to bar time to get local session time.
    pub utc_offset_hours: i32,
    pub pip_size: f64,
    /// Share of the position closed at TP1, in `[0, 1]`.
    pub tp1_close_fraction: f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            session_cutoff_hour: 20,
            utc_offset_hours: 1,
            pip_size: 0.01,
            tp1_close_fraction: 0.5,
        }
    }
}

impl SimulationParams {
    pub fn for_profile(profile: &PairProfile) -> Self {
        Self {
            session_cutoff_hour: profile.session_cutoff_hour,
            pip_size: profile.pip_size,
            ..Self::default()
        }
    }

    pub fn with_tp1_close_fraction(&self, fraction: f64) -> Self {
        Self {
            tp1_close_fraction: fraction,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), PipreplayError> {
        if !(self.pip_size.is_finite() && self.pip_size > 0.0) {
            return Err(PipreplayError::InvalidParams {
                reason: format!("pip_size must be positive, got {}", self.pip_size),
            });
        }
        if !(0.0..=1.0).contains(&self.tp1_close_fraction) {
            return Err(PipreplayError::InvalidParams {
                reason: format!(
                    "tp1_close_fraction must be within [0, 1], got {}",
                    self.tp1_close_fraction
                ),
            });
        }
        if self.session_cutoff_hour > 24 {
            return Err(PipreplayError::InvalidParams {
                reason: format!(
                    "session_cutoff_hour must be at most 24, got {}",
                    self.session_cutoff_hour
                ),
            });
        }
        if self.utc_offset_hours.unsigned_abs() > 23 {
            return Err(PipreplayError::InvalidParams {
                reason: format!(
                    "utc_offset_hours must be within [-23, 23], got {}",
                    self.utc_offset_hours
                ),
            });
        }
        Ok(())
    }

    fn past_cutoff(&self, bar: &PriceBar) -> bool {
        bar.session_hour(self.utc_offset_hours) >= self.session_cutoff_hour
    }
}

enum EntrySearch {
    Filled(usize),
    Expired,
    Unfilled,
}

/// Simulate one trade against ascending bars.
///
/// Never fails: an empty bar slice yields [`ResultKind::NoData`].
pub fn simulate(
    trade: &TradeDefinition,
    bars: &[PriceBar],
    params: &SimulationParams,
) -> OutcomeRecord {
    if bars.is_empty() {
        return OutcomeRecord::no_data(trade);
    }

    match search_entry(trade, bars, params) {
        EntrySearch::Expired => {
            let mut rec = OutcomeRecord::blank(trade, ResultKind::Expired);
            rec.expired = true;
            rec
        }
        EntrySearch::Unfilled => {
            let mut rec = OutcomeRecord::blank(trade, ResultKind::NoEntry);
            rec.expired = true;
            rec
        }
        EntrySearch::Filled(idx) => manage_position(trade, bars, idx, params),
    }
}

fn search_entry(trade: &TradeDefinition, bars: &[PriceBar], params: &SimulationParams) -> EntrySearch {
    for (i, bar) in bars.iter().enumerate() {
        if trade.search_start.is_some_and(|start| bar.time < start) {
            continue;
        }
        if params.past_cutoff(bar) {
            return EntrySearch::Expired;
        }
        let touched = match trade.direction {
            Direction::Long => bar.low <= trade.entry_zone.max,
            Direction::Short => bar.high >= trade.entry_zone.min,
        };
        if touched {
            return EntrySearch::Filled(i);
        }
    }
    EntrySearch::Unfilled
}

fn reached(direction: Direction, bar: &PriceBar, level: f64) -> bool {
    match direction {
        Direction::Long => bar.high >= level,
        Direction::Short => bar.low <= level,
    }
}

fn stopped(direction: Direction, bar: &PriceBar, stop: f64) -> bool {
    match direction {
        Direction::Long => bar.low <= stop,
        Direction::Short => bar.high >= stop,
    }
}

fn minutes_between(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    (end - start).num_minutes().max(0)
}

fn manage_position(
    trade: &TradeDefinition,
    bars: &[PriceBar],
    entry_idx: usize,
    params: &SimulationParams,
) -> OutcomeRecord {
    let direction = trade.direction;
    let pip = params.pip_size;
    let keep = params.tp1_close_fraction;
    let entry_price = trade.entry_zone.midpoint();
    let entry_time = bars[entry_idx].time;

    let tp1_pips = (trade.take_profit_1 - entry_price).abs() / pip;
    let tp2_pips = (trade.take_profit_2 - entry_price).abs() / pip;

    let mut rec = OutcomeRecord::blank(trade, ResultKind::Expired);
    rec.entry_price = entry_price;
    rec.entry_time = Some(entry_time);

    let mut working_stop = trade.stop_loss;
    let mut max_adverse = 0.0_f64;
    let mut max_favorable = 0.0_f64;
    let mut resolved = false;

    for bar in &bars[entry_idx + 1..] {
        if params.past_cutoff(bar) {
            let remaining = direction.pips_between(entry_price, bar.close, pip);
            if rec.tp1_hit {
                rec.pnl_pips = tp1_pips * keep + remaining * (1.0 - keep);
                rec.result_kind = if rec.pnl_pips > 0.0 {
                    ResultKind::PartialWin
                } else {
                    ResultKind::Breakeven
                };
            } else {
                rec.pnl_pips = remaining;
                rec.result_kind = ResultKind::Expired;
            }
            rec.expired = true;
            rec.duration_minutes = minutes_between(entry_time, bar.time);
            resolved = true;
            break;
        }

        let (worst, best) = match direction {
            Direction::Long => (bar.low, bar.high),
            Direction::Short => (bar.high, bar.low),
        };
        max_adverse = max_adverse.max(-direction.pips_between(entry_price, worst, pip));
        max_favorable = max_favorable.max(direction.pips_between(entry_price, best, pip));

        // SAME_BAR_POLICY: stop before targets.
        if stopped(direction, bar, working_stop) {
            rec.stop_hit = true;
            rec.stop_time = Some(bar.time);
            if rec.tp1_hit {
                rec.pnl_pips = tp1_pips * keep;
                rec.result_kind = ResultKind::PartialWin;
            } else {
                rec.pnl_pips = -trade.stop_distance_pips;
                rec.result_kind = ResultKind::Loss;
            }
            rec.duration_minutes = minutes_between(entry_time, bar.time);
            resolved = true;
            break;
        }

        if !rec.tp1_hit && reached(direction, bar, trade.take_profit_1) {
            rec.tp1_hit = true;
            rec.tp1_time = Some(bar.time);
            rec.tp1_pips = tp1_pips;
            working_stop = entry_price;
        }

        if rec.tp1_hit && !rec.tp2_hit && reached(direction, bar, trade.take_profit_2) {
            rec.tp2_hit = true;
            rec.tp2_time = Some(bar.time);
            rec.tp2_pips = tp2_pips;
            rec.pnl_pips = tp1_pips * keep + tp2_pips * (1.0 - keep);
            rec.result_kind = ResultKind::FullWin;
            rec.duration_minutes = minutes_between(entry_time, bar.time);
            resolved = true;
            break;
        }
    }

    rec.max_adverse_pips = max_adverse;
    rec.max_favorable_pips = max_favorable;

    if !resolved {
        rec.result_kind = ResultKind::Expired;
        rec.expired = true;
        if let Some(last) = bars.last() {
            rec.duration_minutes = minutes_between(entry_time, last.time);
        }
    }

    rec
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trade::EntryZone;
    use approx::assert_abs_diff_eq;

    const EPS: f64 = 1e-9;

    fn t(hm: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("2024-03-05 {hm}"), "%Y-%m-%d %H:%M").unwrap()
    }

    fn bar(hm: &str, high: f64, low: f64) -> PriceBar {
        PriceBar {
            time: t(hm),
            open: (high + low) / 2.0,
            high,
            low,
            close: (high + low) / 2.0,
            volume: 1,
        }
    }

    fn bar_close(hm: &str, high: f64, low: f64, close: f64) -> PriceBar {
        PriceBar {
            close,
            ..bar(hm, high, low)
        }
    }

    fn long_trade() -> TradeDefinition {
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
            checklist_score: Some("9/12".into()),
            confidence: Some("medium".into()),
        }
    }

    fn short_trade() -> TradeDefinition {
        TradeDefinition {
            direction: Direction::Short,
            entry_zone: EntryZone {
                min: 100.00,
                max: 100.10,
            },
            stop_loss: 100.30,
            take_profit_1: 99.65,
            take_profit_2: 99.25,
            stop_distance_pips: 25.0,
            search_start: None,
            checklist_score: None,
            confidence: None,
        }
    }

    fn params() -> SimulationParams {
        SimulationParams {
            session_cutoff_hour: 20,
            utc_offset_hours: 1,
            pip_size: 0.01,
            tp1_close_fraction: 0.5,
        }
    }

    #[test]
    fn empty_bars_is_no_data() {
        let rec = simulate(&long_trade(), &[], &params());
        assert_eq!(rec.result_kind, ResultKind::NoData);
        assert_eq!(rec.entry_time, None);
        assert_eq!(rec.checklist_score.as_deref(), Some("9/12"));
    }

    #[test]
    fn long_full_win_through_both_targets() {
        let bars = vec![
            bar("08:00", 100.20, 100.05),
            bar("08:01", 100.45, 100.10),
            bar("08:02", 100.85, 100.50),
        ];
        let rec = simulate(&long_trade(), &bars, &params());

        assert_eq!(rec.result_kind, ResultKind::FullWin);
        assert_abs_diff_eq!(rec.entry_price, 100.05, epsilon = EPS);
        assert_eq!(rec.entry_time, Some(t("08:00")));
        assert!(rec.tp1_hit);
        assert_eq!(rec.tp1_time, Some(t("08:01")));
        assert_abs_diff_eq!(rec.tp1_pips, 35.0, epsilon = 1e-6);
        assert!(rec.tp2_hit);
        assert_eq!(rec.tp2_time, Some(t("08:02")));
        assert_abs_diff_eq!(rec.tp2_pips, 75.0, epsilon = 1e-6);
        assert_abs_diff_eq!(rec.pnl_pips, 55.0, epsilon = 1e-6);
        assert_eq!(rec.duration_minutes, 2);
        assert!(!rec.stop_hit);
        assert!(!rec.expired);
    }

    #[test]
    fn long_stop_before_tp1_is_full_loss() {
        let bars = vec![
            bar("08:00", 100.20, 100.05),
            bar("08:01", 100.15, 99.75),
            bar("08:02", 100.85, 100.50),
        ];
        let rec = simulate(&long_trade(), &bars, &params());

        assert_eq!(rec.result_kind, ResultKind::Loss);
        assert_eq!(rec.pnl_pips, -20.0);
        assert!(rec.stop_hit);
        assert_eq!(rec.stop_time, Some(t("08:01")));
        assert!(!rec.tp1_hit);
        assert_eq!(rec.duration_minutes, 1);
    }

    #[test]
    fn same_bar_stop_and_tp1_resolves_as_stop() {
        assert_eq!(SAME_BAR_POLICY, SameBarPolicy::StopFirst);
        let bars = vec![
            bar("08:00", 100.20, 100.05),
            // touches both the stop (99.80) and TP1 (100.40)
            bar("08:01", 100.50, 99.70),
        ];
        let rec = simulate(&long_trade(), &bars, &params());

        assert_eq!(rec.result_kind, ResultKind::Loss);
        assert_eq!(rec.pnl_pips, -20.0);
        assert!(!rec.tp1_hit);
    }

    #[test]
    fn same_bar_tp1_and_tp2_is_full_win() {
        let bars = vec![bar("08:00", 100.20, 100.05), bar("08:01", 100.90, 100.10)];
        let rec = simulate(&long_trade(), &bars, &params());

        assert_eq!(rec.result_kind, ResultKind::FullWin);
        assert_eq!(rec.tp1_time, rec.tp2_time);
    }

    #[test]
    fn runner_stopped_at_breakeven_is_partial_win() {
        let bars = vec![
            bar("08:00", 100.20, 100.05),
            bar("08:01", 100.45, 100.10),
            // back to entry (100.05) without reaching TP2
            bar("08:02", 100.30, 100.00),
        ];
        let rec = simulate(&long_trade(), &bars, &params());

        assert_eq!(rec.result_kind, ResultKind::PartialWin);
        assert!(rec.tp1_hit);
        assert!(rec.stop_hit);
        assert_abs_diff_eq!(rec.pnl_pips, 17.5, epsilon = 1e-6);
    }

    #[test]
    fn tp1_bar_itself_does_not_test_breakeven_stop() {
        // Bar hits TP1 and dips below entry; the stop moved only after this bar.
        let bars = vec![
            bar("08:00", 100.20, 100.05),
            bar("08:01", 100.45, 99.90),
            bar("08:02", 100.85, 100.50),
        ];
        let rec = simulate(&long_trade(), &bars, &params());
        assert_eq!(rec.result_kind, ResultKind::FullWin);
    }

    #[test]
    fn entry_uses_zone_midpoint_not_touch() {
        let bars = vec![bar("08:00", 100.50, 99.95), bar("08:01", 100.30, 100.06)];
        let rec = simulate(&long_trade(), &bars, &params());
        assert_abs_diff_eq!(rec.entry_price, 100.05, epsilon = EPS);
    }

    #[test]
    fn short_full_win() {
        let bars = vec![
            bar("09:00", 100.05, 99.90),
            bar("09:01", 99.90, 99.60),
            bar("09:02", 99.50, 99.20),
        ];
        let rec = simulate(&short_trade(), &bars, &params());

        assert_eq!(rec.result_kind, ResultKind::FullWin);
        assert_abs_diff_eq!(rec.tp1_pips, 40.0, epsilon = 1e-6);
        assert_abs_diff_eq!(rec.tp2_pips, 80.0, epsilon = 1e-6);
        assert_abs_diff_eq!(rec.pnl_pips, 60.0, epsilon = 1e-6);
    }

    #[test]
    fn short_stop_loss() {
        let bars = vec![bar("09:00", 100.05, 99.90), bar("09:01", 100.35, 100.00)];
        let rec = simulate(&short_trade(), &bars, &params());

        assert_eq!(rec.result_kind, ResultKind::Loss);
        assert_eq!(rec.pnl_pips, -25.0);
        assert_abs_diff_eq!(rec.max_adverse_pips, 30.0, epsilon = 1e-6);
    }

    #[test]
    fn short_entry_requires_high_into_zone() {
        let bars = vec![bar("09:00", 99.95, 99.80), bar("09:01", 99.99, 99.70)];
        let rec = simulate(&short_trade(), &bars, &params());
        assert_eq!(rec.result_kind, ResultKind::NoEntry);
        assert!(rec.expired);
    }

    #[test]
    fn no_fill_before_data_ends_is_no_entry() {
        let bars = vec![bar("08:00", 100.50, 100.20), bar("08:01", 100.60, 100.30)];
        let rec = simulate(&long_trade(), &bars, &params());

        assert_eq!(rec.result_kind, ResultKind::NoEntry);
        assert!(rec.expired);
        assert_eq!(rec.entry_time, None);
        assert_eq!(rec.entry_price, 0.0);
    }

    #[test]
    fn cutoff_before_entry_expires_without_entry() {
        // 19:00 server time + 1h offset = 20:00 local = cutoff
        let bars = vec![bar("18:59", 100.50, 100.20), bar("19:00", 100.20, 99.90)];
        let rec = simulate(&long_trade(), &bars, &params());

        assert_eq!(rec.result_kind, ResultKind::Expired);
        assert!(rec.expired);
        assert_eq!(rec.entry_time, None);
        assert_eq!(rec.pnl_pips, 0.0);
    }

    #[test]
    fn cutoff_with_open_position_marks_to_market() {
        let bars = vec![
            bar("18:30", 100.20, 100.05),
            bar_close("18:31", 100.25, 100.00, 100.15),
            bar_close("19:00", 100.30, 100.10, 100.20),
        ];
        let rec = simulate(&long_trade(), &bars, &params());

        assert_eq!(rec.result_kind, ResultKind::Expired);
        assert!(rec.expired);
        assert_abs_diff_eq!(rec.pnl_pips, 15.0, epsilon = 1e-6);
        assert_eq!(rec.duration_minutes, 30);
    }

    #[test]
    fn cutoff_after_tp1_blends_banked_and_runner() {
        let bars = vec![
            bar("18:30", 100.20, 100.05),
            bar("18:31", 100.45, 100.10),
            bar_close("19:00", 100.35, 100.20, 100.25),
        ];
        let rec = simulate(&long_trade(), &bars, &params());

        // 35 * 0.5 + 20 * 0.5
        assert_eq!(rec.result_kind, ResultKind::PartialWin);
        assert_abs_diff_eq!(rec.pnl_pips, 27.5, epsilon = 1e-6);
        assert!(rec.expired);
    }

    #[test]
    fn cutoff_after_tp1_with_negative_blend_is_breakeven() {
        let trade = long_trade();
        let p = SimulationParams {
            tp1_close_fraction: 0.1,
            ..params()
        };
        let bars = vec![
            bar("18:30", 100.20, 100.05),
            bar("18:31", 100.45, 100.10),
            // close well below entry while the breakeven stop was not touched intrabar
            bar_close("19:00", 100.30, 100.10, 99.00),
        ];
        let rec = simulate(&trade, &bars, &p);
        assert_eq!(rec.result_kind, ResultKind::Breakeven);
        assert!(rec.pnl_pips <= 0.0);
    }

    #[test]
    fn exhausted_bars_finalize_as_expired() {
        let bars = vec![
            bar("08:00", 100.20, 100.05),
            bar("08:10", 100.30, 100.00),
            bar("08:25", 100.35, 99.95),
        ];
        let rec = simulate(&long_trade(), &bars, &params());

        assert_eq!(rec.result_kind, ResultKind::Expired);
        assert!(rec.expired);
        assert_eq!(rec.pnl_pips, 0.0);
        assert_eq!(rec.duration_minutes, 25);
        assert_abs_diff_eq!(rec.max_adverse_pips, 10.0, epsilon = 1e-6);
        assert_abs_diff_eq!(rec.max_favorable_pips, 30.0, epsilon = 1e-6);
    }

    #[test]
    fn search_start_skips_earlier_bars() {
        let trade = TradeDefinition {
            search_start: Some(t("08:02")),
            ..long_trade()
        };
        let bars = vec![
            bar("08:00", 100.20, 100.05),
            bar("08:01", 100.45, 100.10),
            bar("08:02", 100.30, 100.08),
            bar("08:03", 100.25, 99.70),
        ];
        let rec = simulate(&trade, &bars, &params());

        assert_eq!(rec.entry_time, Some(t("08:02")));
        assert_eq!(rec.result_kind, ResultKind::Loss);
    }

    #[test]
    fn excursions_ignore_entry_bar() {
        let bars = vec![bar("08:00", 101.00, 99.00), bar("08:01", 100.15, 100.00)];
        let rec = simulate(&long_trade(), &bars, &params());
        assert_abs_diff_eq!(rec.max_adverse_pips, 5.0, epsilon = 1e-6);
        assert_abs_diff_eq!(rec.max_favorable_pips, 10.0, epsilon = 1e-6);
    }

    #[test]
    fn zero_close_fraction_puts_everything_on_runner() {
        let p = params().with_tp1_close_fraction(0.0);
        let bars = vec![
            bar("08:00", 100.20, 100.05),
            bar("08:01", 100.45, 100.10),
            bar("08:02", 100.85, 100.50),
        ];
        let rec = simulate(&long_trade(), &bars, &p);
        assert_abs_diff_eq!(rec.pnl_pips, 75.0, epsilon = 1e-6);
    }

    #[test]
    fn identical_inputs_give_identical_records() {
        let bars = vec![
            bar("08:00", 100.20, 100.05),
            bar("08:01", 100.45, 100.10),
            bar("08:02", 100.30, 100.00),
        ];
        let a = simulate(&long_trade(), &bars, &params());
        let b = simulate(&long_trade(), &bars, &params());
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn params_validation() {
        assert!(params().validate().is_ok());
        assert!(SimulationParams { pip_size: 0.0, ..params() }.validate().is_err());
        assert!(SimulationParams { tp1_close_fraction: 1.5, ..params() }.validate().is_err());
        assert!(SimulationParams { session_cutoff_hour: 25, ..params() }.validate().is_err());
        assert!(SimulationParams { utc_offset_hours: 30, ..params() }.validate().is_err());
        assert!(SimulationParams { utc_offset_hours: i32::MIN, ..params() }.validate().is_err());
    }

    #[test]
    fn extreme_offsets_do_not_panic() {
        let bars = vec![
            bar("08:00", 100.20, 100.05),
            bar("08:01", 100.45, 100.10),
            bar("08:02", 100.85, 100.50),
        ];
        for offset in [i32::MAX, i32::MIN] {
            let p = SimulationParams {
                utc_offset_hours: offset,
                ..params()
            };
            let rec = simulate(&long_trade(), &bars, &p);
            assert_eq!(rec.result_kind, ResultKind::FullWin);
        }
    }

    #[test]
    fn params_from_profile() {
        let profile = crate::domain::pair_profile::profile_for("EURUSD");
        let p = SimulationParams::for_profile(&profile);
        assert_eq!(p.session_cutoff_hour, 17);
        assert_eq!(p.pip_size, 0.0001);
        assert_eq!(p.tp1_close_fraction, 0.5);
    }
}
