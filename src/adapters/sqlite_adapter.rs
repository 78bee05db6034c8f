//! SQLite adapter: historical bars and backtest run storage.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, info};

use crate::domain::bar::PriceBar;
use crate::domain::error::PipreplayError;
use crate::domain::metrics::RunSummary;
use crate::domain::outcome::{OutcomeRecord, TradeResult};
use crate::domain::report::{RunMeta, StoredRun};
use crate::domain::timeframe::Timeframe;
use crate::domain::trade::EntryZone;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PriceDataPort;
use crate::ports::run_store_port::RunStorePort;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";
const RUN_ID_LEN: usize = 12;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS historical_ohlc (
        symbol TEXT NOT NULL,
        timeframe TEXT NOT NULL,
        time TEXT NOT NULL,
        open REAL NOT NULL,
        high REAL NOT NULL,
        low REAL NOT NULL,
        close REAL NOT NULL,
        volume INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (symbol, timeframe, time)
    );
    CREATE INDEX IF NOT EXISTS idx_ohlc_symbol_tf_time ON historical_ohlc(symbol, timeframe, time);

    CREATE TABLE IF NOT EXISTS backtest_runs (
        id TEXT PRIMARY KEY,
        created_at TEXT NOT NULL,
        symbol TEXT NOT NULL,
        start_date TEXT,
        end_date TEXT,
        mode TEXT NOT NULL DEFAULT 'historical',
        total_setups INTEGER NOT NULL DEFAULT 0,
        total_trades INTEGER NOT NULL DEFAULT 0,
        wins INTEGER NOT NULL DEFAULT 0,
        losses INTEGER NOT NULL DEFAULT 0,
        partial_wins INTEGER NOT NULL DEFAULT 0,
        breakevens INTEGER NOT NULL DEFAULT 0,
        expired INTEGER NOT NULL DEFAULT 0,
        no_entry INTEGER NOT NULL DEFAULT 0,
        win_rate REAL NOT NULL DEFAULT 0,
        profit_factor REAL NOT NULL DEFAULT 0,
        total_pnl_pips REAL NOT NULL DEFAULT 0,
        max_drawdown_pips REAL NOT NULL DEFAULT 0,
        avg_rr_achieved REAL NOT NULL DEFAULT 0,
        avg_duration_minutes REAL NOT NULL DEFAULT 0,
        notes TEXT,
        summary_json TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS backtest_trades (
        id TEXT PRIMARY KEY,
        run_id TEXT NOT NULL REFERENCES backtest_runs(id),
        trade_date TEXT NOT NULL,
        symbol TEXT NOT NULL,
        bias TEXT NOT NULL,
        entry_price REAL NOT NULL DEFAULT 0,
        entry_time TEXT,
        entry_min REAL NOT NULL,
        entry_max REAL NOT NULL,
        stop_loss REAL NOT NULL,
        tp1 REAL NOT NULL,
        tp2 REAL NOT NULL,
        sl_pips REAL NOT NULL,
        checklist_score TEXT,
        confidence TEXT,
        outcome TEXT NOT NULL,
        pnl_pips REAL NOT NULL DEFAULT 0,
        tp1_hit INTEGER NOT NULL DEFAULT 0,
        tp1_time TEXT,
        tp1_pips REAL NOT NULL DEFAULT 0,
        tp2_hit INTEGER NOT NULL DEFAULT 0,
        tp2_time TEXT,
        tp2_pips REAL NOT NULL DEFAULT 0,
        sl_hit INTEGER NOT NULL DEFAULT 0,
        sl_time TEXT,
        max_adverse_pips REAL NOT NULL DEFAULT 0,
        max_favorable_pips REAL NOT NULL DEFAULT 0,
        duration_minutes INTEGER NOT NULL DEFAULT 0,
        expired INTEGER NOT NULL DEFAULT 0,
        source TEXT NOT NULL DEFAULT 'historical'
    );
    CREATE INDEX IF NOT EXISTS idx_bt_trades_run ON backtest_trades(run_id);
    CREATE INDEX IF NOT EXISTS idx_bt_trades_date ON backtest_trades(trade_date);
    CREATE INDEX IF NOT EXISTS idx_bt_trades_outcome ON backtest_trades(outcome);";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn query_err(e: rusqlite::Error) -> PipreplayError {
    PipreplayError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn conversion_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn get_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, TIME_FORMAT).map_err(|e| conversion_err(idx, e))
}

fn get_opt_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| NaiveDateTime::parse_from_str(&s, TIME_FORMAT).map_err(|e| conversion_err(idx, e)))
        .transpose()
}

fn get_opt_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| conversion_err(idx, e)))
        .transpose()
}

fn fmt_time(t: Option<NaiveDateTime>) -> Option<String> {
    t.map(|t| t.format(TIME_FORMAT).to_string())
}

fn fmt_date(d: Option<NaiveDate>) -> Option<String> {
    d.map(|d| d.format(DATE_FORMAT).to_string())
}

fn new_run_id() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(RUN_ID_LEN)
        .collect()
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PipreplayError> {
        let db_path = config.require_string("sqlite", "path")?;

        let raw_pool_size = config.get_int("sqlite", "pool_size", 4);
        let pool_size = u32::try_from(raw_pool_size)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| PipreplayError::ConfigInvalid {
                section: "sqlite".into(),
                key: "pool_size".into(),
                reason: format!("must be a positive integer, got {raw_pool_size}"),
            })?;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| PipreplayError::Database {
                    reason: e.to_string(),
                })?;

        debug!(path = %db_path, pool_size, "opened sqlite pool");
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, PipreplayError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| PipreplayError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, PipreplayError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| PipreplayError::Database {
                reason: e.to_string(),
            })
    }

    pub fn initialize_schema(&self) -> Result<(), PipreplayError> {
        self.conn()?.execute_batch(SCHEMA).map_err(query_err)
    }

    /// Upsert bars for `symbol` at `timeframe`; returns the number written.
    pub fn insert_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        bars: &[PriceBar],
    ) -> Result<usize, PipreplayError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO historical_ohlc
                        (symbol, timeframe, time, open, high, low, close, volume)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .map_err(query_err)?;
            for bar in bars {
                stmt.execute(params![
                    symbol,
                    timeframe.label(),
                    bar.time.format(TIME_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ])
                .map_err(query_err)?;
            }
        }
        tx.commit().map_err(query_err)?;
        debug!(symbol, timeframe = %timeframe, bars = bars.len(), "stored bars");
        Ok(bars.len())
    }

    fn load_run_row(row: &Row<'_>) -> rusqlite::Result<StoredRun> {
        let created_raw: String = row.get(1)?;
        let created_at = DateTime::parse_from_rfc3339(&created_raw)
            .map_err(|e| conversion_err(1, e))?
            .with_timezone(&Utc);
        let summary_raw: String = row.get(7)?;
        let summary: RunSummary =
            serde_json::from_str(&summary_raw).map_err(|e| conversion_err(7, e))?;
        Ok(StoredRun {
            run_id: row.get(0)?,
            created_at,
            meta: RunMeta {
                symbol: row.get(2)?,
                start_date: get_opt_date(row, 3)?,
                end_date: get_opt_date(row, 4)?,
                mode: row.get(5)?,
                notes: row.get(6)?,
            },
            summary,
        })
    }

    fn load_trade_row(row: &Row<'_>) -> rusqlite::Result<TradeResult> {
        let trade_date_raw: String = row.get(0)?;
        let trade_date = NaiveDate::parse_from_str(&trade_date_raw, DATE_FORMAT)
            .map_err(|e| conversion_err(0, e))?;
        let bias: String = row.get(1)?;
        let outcome_raw: String = row.get(13)?;

        let outcome = OutcomeRecord {
            direction: bias.parse().map_err(|e| conversion_err(1, e))?,
            entry_price: row.get(2)?,
            entry_time: get_opt_time(row, 3)?,
            stop_loss: row.get(6)?,
            tp1: row.get(7)?,
            tp2: row.get(8)?,
            stop_distance_pips: row.get(9)?,
            checklist_score: row.get(10)?,
            confidence: row.get(11)?,
            pnl_pips: row.get(12)?,
            result_kind: outcome_raw.parse().map_err(|e| conversion_err(13, e))?,
            tp1_hit: row.get(14)?,
            tp1_time: get_opt_time(row, 15)?,
            tp1_pips: row.get(16)?,
            tp2_hit: row.get(17)?,
            tp2_time: get_opt_time(row, 18)?,
            tp2_pips: row.get(19)?,
            stop_hit: row.get(20)?,
            stop_time: get_opt_time(row, 21)?,
            max_adverse_pips: row.get(22)?,
            max_favorable_pips: row.get(23)?,
            duration_minutes: row.get(24)?,
            expired: row.get(25)?,
        };

        Ok(TradeResult {
            trade_date,
            entry_zone: EntryZone {
                min: row.get(4)?,
                max: row.get(5)?,
            },
            outcome,
        })
    }
}

const RUN_COLUMNS: &str = "id, created_at, symbol, start_date, end_date, mode, notes, summary_json";

impl PriceDataPort for SqliteAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, PipreplayError> {
        let conn = self.conn()?;
        let start_str = format!("{} 00:00:00", start_date.format(DATE_FORMAT));
        let end_str = format!("{} 23:59:59", end_date.format(DATE_FORMAT));

        let mut stmt = conn
            .prepare(
                "SELECT time, open, high, low, close, volume
                 FROM historical_ohlc
                 WHERE symbol = ?1 AND timeframe = ?2 AND time >= ?3 AND time <= ?4
                 ORDER BY time ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(
                params![symbol.to_uppercase(), timeframe.label(), start_str, end_str],
                |row| {
                    Ok(PriceBar {
                        time: get_time(row, 0)?,
                        open: row.get(1)?,
                        high: row.get(2)?,
                        low: row.get(3)?,
                        close: row.get(4)?,
                        volume: row.get(5)?,
                    })
                },
            )
            .map_err(query_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn list_symbols(&self) -> Result<Vec<String>, PipreplayError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT symbol FROM historical_ohlc ORDER BY symbol")
            .map_err(query_err)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_err)?;
        rows.collect::<Result<Vec<String>, _>>().map_err(query_err)
    }

    fn get_data_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, PipreplayError> {
        let conn = self.conn()?;
        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(time), MAX(time), COUNT(*) FROM historical_ohlc
                 WHERE symbol = ?1 AND timeframe = ?2",
                params![symbol.to_uppercase(), timeframe.label()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_err)?;

        match result {
            (Some(min_str), Some(max_str), count) if count > 0 => {
                let parse = |s: &str| {
                    NaiveDateTime::parse_from_str(s, TIME_FORMAT).map_err(
                        |e: chrono::ParseError| PipreplayError::Database {
                            reason: e.to_string(),
                        },
                    )
                };
                Ok(Some((parse(&min_str)?, parse(&max_str)?, count as usize)))
            }
            _ => Ok(None),
        }
    }
}

impl RunStorePort for SqliteAdapter {
    fn store_run(
        &self,
        meta: &RunMeta,
        summary: &RunSummary,
        results: &[TradeResult],
    ) -> Result<String, PipreplayError> {
        let run_id = new_run_id();
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let summary_json =
            serde_json::to_string(summary).map_err(|e| PipreplayError::Serialization {
                reason: e.to_string(),
            })?;

        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        tx.execute(
            "INSERT INTO backtest_runs (
                id, created_at, symbol, start_date, end_date, mode,
                total_setups, total_trades, wins, losses, partial_wins, breakevens,
                expired, no_entry, win_rate, profit_factor, total_pnl_pips,
                max_drawdown_pips, avg_rr_achieved, avg_duration_minutes,
                notes, summary_json
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                       ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
            params![
                run_id,
                created_at,
                meta.symbol,
                fmt_date(meta.start_date),
                fmt_date(meta.end_date),
                meta.mode,
                summary.total_setups as i64,
                summary.total_trades as i64,
                summary.full_wins as i64,
                summary.losses as i64,
                summary.partial_wins as i64,
                summary.breakevens as i64,
                summary.expired as i64,
                summary.no_entry as i64,
                summary.win_rate,
                summary.profit_factor,
                summary.total_pnl,
                summary.max_drawdown,
                summary.avg_rr_achieved,
                summary.avg_duration_minutes,
                meta.notes,
                summary_json
            ],
        )
        .map_err(query_err)?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO backtest_trades (
                        id, run_id, trade_date, symbol, bias, entry_price, entry_time,
                        entry_min, entry_max, stop_loss, tp1, tp2, sl_pips,
                        checklist_score, confidence, outcome, pnl_pips,
                        tp1_hit, tp1_time, tp1_pips, tp2_hit, tp2_time, tp2_pips,
                        sl_hit, sl_time, max_adverse_pips, max_favorable_pips,
                        duration_minutes, expired, source
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                               ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26,
                               ?27, ?28, ?29, ?30)",
                )
                .map_err(query_err)?;

            for (idx, r) in results.iter().enumerate() {
                let o = &r.outcome;
                stmt.execute(params![
                    format!("{run_id}-{idx:05}"),
                    run_id,
                    r.trade_date.format(DATE_FORMAT).to_string(),
                    meta.symbol,
                    o.direction.as_str(),
                    o.entry_price,
                    fmt_time(o.entry_time),
                    r.entry_zone.min,
                    r.entry_zone.max,
                    o.stop_loss,
                    o.tp1,
                    o.tp2,
                    o.stop_distance_pips,
                    o.checklist_score,
                    o.confidence,
                    o.result_kind.as_str(),
                    o.pnl_pips,
                    o.tp1_hit,
                    fmt_time(o.tp1_time),
                    o.tp1_pips,
                    o.tp2_hit,
                    fmt_time(o.tp2_time),
                    o.tp2_pips,
                    o.stop_hit,
                    fmt_time(o.stop_time),
                    o.max_adverse_pips,
                    o.max_favorable_pips,
                    o.duration_minutes,
                    o.expired,
                    meta.mode
                ])
                .map_err(query_err)?;
            }
        }
        tx.commit().map_err(query_err)?;

        info!(%run_id, symbol = %meta.symbol, trades = results.len(), "stored backtest run");
        Ok(run_id)
    }

    fn load_run(&self, run_id: &str) -> Result<Option<StoredRun>, PipreplayError> {
        self.conn()?
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM backtest_runs WHERE id = ?1"),
                params![run_id],
                Self::load_run_row,
            )
            .optional()
            .map_err(query_err)
    }

    fn load_results(&self, run_id: &str) -> Result<Vec<TradeResult>, PipreplayError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT trade_date, bias, entry_price, entry_time, entry_min, entry_max,
                        stop_loss, tp1, tp2, sl_pips, checklist_score, confidence,
                        pnl_pips, outcome, tp1_hit, tp1_time, tp1_pips, tp2_hit, tp2_time,
                        tp2_pips, sl_hit, sl_time, max_adverse_pips, max_favorable_pips,
                        duration_minutes, expired
                 FROM backtest_trades
                 WHERE run_id = ?1
                 ORDER BY trade_date ASC, entry_time ASC, id ASC",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![run_id], Self::load_trade_row)
            .map_err(query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn list_runs(&self, limit: usize) -> Result<Vec<StoredRun>, PipreplayError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {RUN_COLUMNS} FROM backtest_runs
                 ORDER BY created_at DESC, rowid DESC LIMIT ?1"
            ))
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![limit as i64], Self::load_run_row)
            .map_err(query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn delete_run(&self, run_id: &str) -> Result<bool, PipreplayError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        tx.execute("DELETE FROM backtest_trades WHERE run_id = ?1", params![run_id])
            .map_err(query_err)?;
        let deleted = tx
            .execute("DELETE FROM backtest_runs WHERE id = ?1", params![run_id])
            .map_err(query_err)?;
        tx.commit().map_err(query_err)?;
        if deleted > 0 {
            info!(run_id, "deleted backtest run");
        }
        Ok(deleted > 0)
    }
}
