//! Property tests for the trade outcome simulator.
//!
//! 1. Every record carries one of the closed result kinds.
//! 2. Simulation is a pure function of its inputs.
//! 3. Full wins pay exactly the blended target pips.
//! 4. Losses cost exactly the stop distance.

mod common;

use chrono::Duration;
use common::*;
use proptest::prelude::*;
use pipreplay::domain::bar::PriceBar;
use pipreplay::domain::outcome::ResultKind;
use pipreplay::domain::simulator::{simulate, SimulationParams};
use pipreplay::domain::trade::{Direction, EntryZone, TradeDefinition};

const EPS: f64 = 1e-9;

// ── Strategies ───────────────────────────────────────────────────────

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn arb_bars() -> impl Strategy<Value = Vec<PriceBar>> {
    prop::collection::vec((-0.15..0.15_f64, 0.0..0.1_f64, 0.0..0.1_f64), 1..240).prop_map(
        |steps| {
            let start = at(date(2024, 3, 5), "06:00");
            let mut close = 100.0;
            steps
                .into_iter()
                .enumerate()
                .map(|(i, (delta, up, down))| {
                    let open = close;
                    close = round2(open + delta);
                    PriceBar {
                        time: start + Duration::minutes(i as i64),
                        open,
                        high: round2(open.max(close) + up),
                        low: round2(open.min(close) - down),
                        close,
                        volume: 10,
                    }
                })
                .collect()
        },
    )
}

fn arb_trade() -> impl Strategy<Value = TradeDefinition> {
    (
        any::<bool>(),
        99.6..100.4_f64,
        0.0..0.2_f64,
        0.1..0.5_f64,
        0.1..0.6_f64,
        0.1..0.8_f64,
    )
        .prop_map(|(long, zone_min, width, stop, tp1, tp2_extra)| {
            let min = round2(zone_min);
            let max = round2(zone_min + width);
            let stop = round2(stop);
            let (direction, stop_loss, take_profit_1, take_profit_2) = if long {
                (
                    Direction::Long,
                    min - stop,
                    max + round2(tp1),
                    max + round2(tp1 + tp2_extra),
                )
            } else {
                (
                    Direction::Short,
                    max + stop,
                    min - round2(tp1),
                    min - round2(tp1 + tp2_extra),
                )
            };
            TradeDefinition {
                direction,
                entry_zone: EntryZone { min, max },
                stop_loss,
                take_profit_1,
                take_profit_2,
                stop_distance_pips: (stop * 100.0).round(),
                search_start: None,
                checklist_score: None,
                confidence: None,
            }
        })
}

fn arb_params() -> impl Strategy<Value = SimulationParams> {
    (10u32..=24, -3i32..=3, 0.0..=1.0_f64).prop_map(|(cutoff, offset, fraction)| {
        SimulationParams {
            session_cutoff_hour: cutoff,
            utc_offset_hours: offset,
            pip_size: 0.01,
            tp1_close_fraction: fraction,
        }
    })
}

// ── Properties ───────────────────────────────────────────────────────

proptest! {
    /// Non-empty bars never yield no_data, and only traded kinds carry an entry.
    #[test]
    fn result_kind_is_closed(trade in arb_trade(), bars in arb_bars(), params in arb_params()) {
        let rec = simulate(&trade, &bars, &params);
        prop_assert_ne!(rec.result_kind, ResultKind::NoData);
        prop_assert!(matches!(
            rec.result_kind,
            ResultKind::FullWin
                | ResultKind::PartialWin
                | ResultKind::Loss
                | ResultKind::Breakeven
                | ResultKind::Expired
                | ResultKind::NoEntry
        ));
        if rec.result_kind == ResultKind::NoEntry {
            prop_assert!(rec.entry_time.is_none());
            prop_assert_eq!(rec.pnl_pips, 0.0);
        }
        if rec.entry_time.is_some() {
            prop_assert_eq!(rec.entry_price, trade.entry_zone.midpoint());
        }
        prop_assert!(rec.max_adverse_pips >= 0.0);
        prop_assert!(rec.max_favorable_pips >= 0.0);
        prop_assert!(rec.duration_minutes >= 0);
    }

    /// Identical inputs give identical records.
    #[test]
    fn simulation_is_idempotent(trade in arb_trade(), bars in arb_bars(), params in arb_params()) {
        let first = simulate(&trade, &bars, &params);
        let second = simulate(&trade, &bars, &params);
        prop_assert_eq!(first, second);
    }

    /// A full win pays tp1 on the closed fraction and tp2 on the rest.
    #[test]
    fn full_win_pnl_identity(trade in arb_trade(), bars in arb_bars(), params in arb_params()) {
        let rec = simulate(&trade, &bars, &params);
        if rec.result_kind == ResultKind::FullWin {
            let f = params.tp1_close_fraction;
            let expected = rec.tp1_pips * f + rec.tp2_pips * (1.0 - f);
            prop_assert!((rec.pnl_pips - expected).abs() < EPS);
            prop_assert!(rec.tp1_hit && rec.tp2_hit);
            prop_assert!(!rec.stop_hit);
        }
    }

    /// A loss costs the declared stop distance and never follows TP1.
    #[test]
    fn loss_pnl_identity(trade in arb_trade(), bars in arb_bars(), params in arb_params()) {
        let rec = simulate(&trade, &bars, &params);
        if rec.result_kind == ResultKind::Loss {
            prop_assert_eq!(rec.pnl_pips, -trade.stop_distance_pips);
            prop_assert!(rec.stop_hit);
            prop_assert!(!rec.tp1_hit);
        }
        if rec.result_kind == ResultKind::PartialWin {
            prop_assert!(rec.tp1_hit);
        }
    }
}

#[test]
fn empty_bars_are_no_data() {
    let rec = simulate(&long_setup(), &[], &params());
    assert_eq!(rec.result_kind, ResultKind::NoData);
}
