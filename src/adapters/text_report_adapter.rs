//! Plain text report adapter implementing ReportPort.

use std::fmt::Write;

use crate::domain::error::PipreplayError;
use crate::domain::report::{Cohort, Report, StreakType};
use crate::ports::report_port::ReportPort;

const RULE_WIDTH: usize = 32;

#[derive(Debug, Default, Clone, Copy)]
pub struct TextReportAdapter;

impl TextReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

/// Profit factor for display; unbounded factors print as `∞`.
pub fn format_profit_factor(pf: f64) -> String {
    if pf.is_infinite() {
        "∞".to_string()
    } else {
        format!("{pf:.2}")
    }
}

fn signed_pips(pips: f64) -> String {
    format!("{pips:+.1} pips")
}

fn write_cohorts(out: &mut String, title: &str, cohorts: &[Cohort]) -> std::fmt::Result {
    if cohorts.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    writeln!(out, "{title}")?;
    for c in cohorts {
        writeln!(
            out,
            "  {}: {} trades, {:.1}% WR, {}, PF {}",
            c.label,
            c.stats.count,
            c.stats.win_rate,
            signed_pips(c.stats.total_pnl),
            format_profit_factor(c.stats.profit_factor)
        )?;
    }
    Ok(())
}

fn render_text(report: &Report) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    let s = &report.summary;

    writeln!(out, "Backtest Report")?;
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
    if let Some(run_id) = &report.run_id {
        writeln!(out, "Run:     {run_id}")?;
    }
    writeln!(out, "Symbol:  {}", report.meta.symbol)?;
    writeln!(out, "Period:  {}", report.meta.period())?;
    writeln!(out, "Mode:    {}", report.meta.mode)?;
    if let Some(notes) = &report.meta.notes {
        writeln!(out, "Notes:   {notes}")?;
    }

    writeln!(out)?;
    writeln!(out, "Overview")?;
    writeln!(
        out,
        "Setups: {} | Traded: {} | No entry: {}",
        s.total_setups, s.total_trades, s.no_entry
    )?;
    writeln!(
        out,
        "Wins: {} | Partial: {} | Losses: {}",
        s.full_wins, s.partial_wins, s.losses
    )?;
    writeln!(out, "Breakeven: {} | Expired: {}", s.breakevens, s.expired)?;
    writeln!(out, "Win rate:       {:.1}%", s.win_rate)?;
    writeln!(out, "Profit factor:  {}", format_profit_factor(s.profit_factor))?;
    writeln!(out, "Total P&L:      {}", signed_pips(s.total_pnl))?;
    writeln!(out, "Avg P&L/trade:  {}", signed_pips(s.avg_pnl_per_trade))?;
    writeln!(out, "Max drawdown:   {:.1} pips", s.max_drawdown)?;
    writeln!(out, "Avg R:R:        {:.2}", s.avg_rr_achieved)?;
    writeln!(out, "Avg duration:   {:.0} min", s.avg_duration_minutes)?;
    writeln!(out, "Max adverse:    {:.1} pips", s.max_adverse_excursion)?;

    let st = &report.streaks;
    writeln!(out)?;
    writeln!(out, "Streaks")?;
    writeln!(out, "Best win streak: {}", st.max_win_streak)?;
    writeln!(out, "Worst loss streak: {}", st.max_loss_streak)?;
    match st.current_type {
        Some(StreakType::Win) => writeln!(out, "Current: {} win", st.current_streak)?,
        Some(StreakType::Loss) => writeln!(out, "Current: {} loss", st.current_streak)?,
        None => writeln!(out, "Current: none")?,
    }

    write_cohorts(&mut out, "By Confidence", &report.by_confidence)?;
    write_cohorts(&mut out, "By Checklist Score", &report.by_checklist_score)?;
    write_cohorts(&mut out, "By Direction", &report.by_direction)?;
    write_cohorts(&mut out, "By Weekday", &report.by_weekday)?;

    if report.best_trade.is_some() || report.worst_trade.is_some() {
        writeln!(out)?;
        writeln!(out, "Notable Trades")?;
        for (label, trade) in [("Best", &report.best_trade), ("Worst", &report.worst_trade)] {
            if let Some(t) = trade {
                writeln!(
                    out,
                    "  {label}: {} ({} on {})",
                    signed_pips(t.outcome.pnl_pips),
                    t.outcome.direction.as_str().to_uppercase(),
                    t.trade_date
                )?;
            }
        }
    }

    Ok(out)
}

impl ReportPort for TextReportAdapter {
    fn render(&self, report: &Report) -> Result<String, PipreplayError> {
        render_text(report).map_err(|e| PipreplayError::Serialization {
            reason: e.to_string(),
        })
    }
}
