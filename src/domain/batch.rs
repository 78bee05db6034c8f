//! Batch runner: simulates many dated trades and summarizes the run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::bar::PriceBar;
use super::metrics::RunSummary;
use super::outcome::{OutcomeRecord, TradeResult};
use super::simulator::{simulate, SimulationParams};
use super::trade::DatedTrade;
use crate::ports::data_port::DayBars;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRun {
    pub summary: RunSummary,
    /// Ordered by trade date, then entry time.
    pub results: Vec<TradeResult>,
}

type Slot = Arc<OnceLock<Arc<Vec<PriceBar>>>>;

/// Per-run cache of one day's bars, loaded at most once per date.
///
/// Concurrent requests for a date that is still loading block until the
/// first loader publishes, then share its bars.
#[derive(Default)]
pub struct BarCache {
    slots: Mutex<HashMap<NaiveDate, Slot>>,
}

impl BarCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bars for `date`, loading them through `provider` on first use.
    /// A provider failure is logged and cached as an empty day.
    pub fn get_or_load(&self, date: NaiveDate, provider: &dyn DayBars) -> Arc<Vec<PriceBar>> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(slots.entry(date).or_default())
        };
        Arc::clone(slot.get_or_init(|| Arc::new(load_day(provider, date))))
    }

    /// Number of distinct dates requested so far.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn load_day(provider: &dyn DayBars, date: NaiveDate) -> Vec<PriceBar> {
    match provider.bars_for_date(date) {
        Ok(bars) => {
            debug!(%date, bars = bars.len(), "loaded day bars");
            bars
        }
        Err(e) => {
            warn!(%date, error = %e, "price data unavailable, trades on this date resolve as no_data");
            Vec::new()
        }
    }
}

fn simulate_dated(
    dated: &DatedTrade,
    cache: &BarCache,
    provider: &dyn DayBars,
    params: &SimulationParams,
) -> TradeResult {
    let bars = cache.get_or_load(dated.date, provider);
    let outcome = if bars.is_empty() {
        OutcomeRecord::no_data(&dated.trade)
    } else {
        match dated.tp1_close_fraction {
            Some(fraction) => simulate(&dated.trade, &bars, &params.with_tp1_close_fraction(fraction)),
            None => simulate(&dated.trade, &bars, params),
        }
    };
    TradeResult {
        trade_date: dated.date,
        entry_zone: dated.trade.entry_zone,
        outcome,
    }
}

fn finish(mut results: Vec<TradeResult>, days: usize) -> BatchRun {
    results.sort_by_key(|r| (r.trade_date, r.outcome.entry_time));
    let summary = RunSummary::compute(results.iter().map(|r| &r.outcome));
    info!(
        setups = summary.total_setups,
        trades = summary.total_trades,
        days,
        win_rate = summary.win_rate,
        total_pnl = summary.total_pnl,
        "batch complete"
    );
    BatchRun { summary, results }
}

/// Simulate every trade in turn, loading each date's bars once.
pub fn run_batch(
    trades: &[DatedTrade],
    provider: &dyn DayBars,
    params: &SimulationParams,
) -> BatchRun {
    info!(setups = trades.len(), "starting batch");
    let cache = BarCache::new();
    let results = trades
        .iter()
        .map(|dated| simulate_dated(dated, &cache, provider, params))
        .collect();
    finish(results, cache.len())
}

/// [`run_batch`] across the rayon pool. Produces the same [`BatchRun`].
pub fn run_batch_parallel(
    trades: &[DatedTrade],
    provider: &dyn DayBars,
    params: &SimulationParams,
) -> BatchRun {
    info!(setups = trades.len(), "starting parallel batch");
    let cache = BarCache::new();
    let results = trades
        .par_iter()
        .map(|dated| simulate_dated(dated, &cache, provider, params))
        .collect();
    finish(results, cache.len())
}
