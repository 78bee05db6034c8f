//! Run-level statistics over simulated outcomes.

use serde::{Deserialize, Serialize};

use super::outcome::{OutcomeRecord, ResultKind};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_setups: usize,
    pub total_trades: usize,
    /// Setups that never opened a position, `no_data` included.
    pub no_entry: usize,
    pub full_wins: usize,
    pub partial_wins: usize,
    pub losses: usize,
    pub breakevens: usize,
    pub expired: usize,
    /// Percentage of traded setups that ended as a full or partial win.
    pub win_rate: f64,
    #[serde(with = "profit_factor_serde")]
    pub profit_factor: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub total_pnl: f64,
    pub avg_pnl_per_trade: f64,
    pub max_drawdown: f64,
    pub avg_rr_achieved: f64,
    pub avg_duration_minutes: f64,
    pub max_adverse_excursion: f64,
}

impl RunSummary {
    /// Fold outcomes, in the order given, into a summary.
    pub fn compute<'a, I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = &'a OutcomeRecord>,
    {
        let mut s = RunSummary::default();
        let mut traded_pnls = Vec::new();
        let mut rr_sum = 0.0_f64;
        let mut rr_count = 0usize;
        let mut duration_sum = 0i64;
        let mut duration_count = 0usize;

        for rec in outcomes {
            s.total_setups += 1;
            match rec.result_kind {
                ResultKind::NoEntry | ResultKind::NoData => {
                    s.no_entry += 1;
                    continue;
                }
                ResultKind::FullWin => s.full_wins += 1,
                ResultKind::PartialWin => s.partial_wins += 1,
                ResultKind::Loss => s.losses += 1,
                ResultKind::Breakeven => s.breakevens += 1,
                ResultKind::Expired => s.expired += 1,
            }

            s.total_trades += 1;
            traded_pnls.push(rec.pnl_pips);

            if rec.pnl_pips > 0.0 {
                s.gross_profit += rec.pnl_pips;
            } else if rec.pnl_pips < 0.0 {
                s.gross_loss += rec.pnl_pips.abs();
            }

            if rec.stop_distance_pips > 0.0 && rec.pnl_pips != 0.0 {
                rr_sum += rec.pnl_pips / rec.stop_distance_pips;
                rr_count += 1;
            }

            if rec.duration_minutes > 0 {
                duration_sum += rec.duration_minutes;
                duration_count += 1;
            }

            s.max_adverse_excursion = s.max_adverse_excursion.max(rec.max_adverse_pips);
        }

        s.total_pnl = traded_pnls.iter().sum();
        s.win_rate = percentage(s.full_wins + s.partial_wins, s.total_trades);
        s.profit_factor = profit_factor(s.gross_profit, s.gross_loss);
        s.max_drawdown = max_drawdown(&traded_pnls);
        s.avg_pnl_per_trade = mean(s.total_pnl, s.total_trades);
        s.avg_rr_achieved = mean(rr_sum, rr_count);
        s.avg_duration_minutes = mean(duration_sum as f64, duration_count);
        s
    }
}

/// Win/loss statistics for one cohort of traded outcomes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupStats {
    pub count: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub avg_pnl: f64,
    #[serde(with = "profit_factor_serde")]
    pub profit_factor: f64,
}

impl GroupStats {
    pub fn compute<'a, I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = &'a OutcomeRecord>,
    {
        let mut g = GroupStats::default();
        let mut gross_profit = 0.0_f64;
        let mut gross_loss = 0.0_f64;

        for rec in outcomes {
            g.count += 1;
            if rec.result_kind.is_win() {
                g.wins += 1;
            } else if rec.result_kind == ResultKind::Loss {
                g.losses += 1;
            }
            g.total_pnl += rec.pnl_pips;
            if rec.pnl_pips > 0.0 {
                gross_profit += rec.pnl_pips;
            } else if rec.pnl_pips < 0.0 {
                gross_loss += rec.pnl_pips.abs();
            }
        }

        g.win_rate = percentage(g.wins, g.count);
        g.avg_pnl = mean(g.total_pnl, g.count);
        g.profit_factor = profit_factor(gross_profit, gross_loss);
        g
    }
}

pub fn profit_factor(gross_profit: f64, gross_loss: f64) -> f64 {
    if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

/// Largest fall of cumulative pnl from its running peak, the peak starting at zero.
pub fn max_drawdown(pnls: &[f64]) -> f64 {
    let mut cumulative = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;
    for pnl in pnls {
        cumulative += pnl;
        peak = peak.max(cumulative);
        max_dd = max_dd.max(peak - cumulative);
    }
    max_dd
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64 * 100.0
    } else {
        0.0
    }
}

fn mean(sum: f64, count: usize) -> f64 {
    if count > 0 { sum / count as f64 } else { 0.0 }
}

/// JSON has no infinity; an unbounded profit factor travels as the string `"inf"`.
pub mod profit_factor_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_infinite() && value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_f64(*value)
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(n),
            Repr::Text(s) if s == "inf" => Ok(f64::INFINITY),
            Repr::Text(s) => Err(serde::de::Error::custom(format!(
                "invalid profit factor '{s}'"
            ))),
        }
    }
}
