//! SQLite price store.

use crate::domain::error::PricelabError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PriceStore;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

const DATE_FORMAT: &str = "%Y-%m-%d";

const BAR_COLUMNS: &str = "symbol, date, open, high, low, close, volume";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PricelabError> {
        let db_path =
            config
                .get_non_empty("sqlite", "path")
                .ok_or_else(|| PricelabError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        // Concurrent backfills serialize on SQLite's write lock.
        let manager = SqliteConnectionManager::file(&db_path)
            .with_init(|c| c.busy_timeout(std::time::Duration::from_secs(5)));
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| PricelabError::Database {
                    reason: e.to_string(),
                })?;

        debug!(path = %db_path, pool_size, "opened sqlite store");
        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, PricelabError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| PricelabError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, PricelabError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| PricelabError::Database {
                reason: e.to_string(),
            })
    }

    pub fn initialize_schema(&self) -> Result<(), PricelabError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS prices (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL,
                PRIMARY KEY (symbol, date)
            );
            CREATE INDEX IF NOT EXISTS idx_prices_date ON prices(date);",
        )
        .map_err(query_error)?;

        Ok(())
    }

    /// Fetch the single bar at one end of a symbol's history.
    fn get_edge(&self, symbol: &str, order: &str) -> Result<Option<OhlcvBar>, PricelabError> {
        let conn = self.conn()?;
        let query = format!(
            "SELECT {BAR_COLUMNS} FROM prices WHERE symbol = ?1 ORDER BY date {order} LIMIT 1"
        );

        conn.query_row(&query, params![symbol], row_to_bar)
            .optional()
            .map_err(query_error)
    }
}

fn query_error(e: rusqlite::Error) -> PricelabError {
    PricelabError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_date(date_str: &str) -> Result<NaiveDate, PricelabError> {
    NaiveDate::parse_from_str(date_str, DATE_FORMAT).map_err(|e: chrono::ParseError| {
        PricelabError::Database {
            reason: format!("bad stored date '{date_str}': {e}"),
        }
    })
}

fn row_to_bar(row: &Row<'_>) -> rusqlite::Result<OhlcvBar> {
    let date_str: String = row.get(1)?;
    let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(OhlcvBar {
        symbol: row.get(0)?,
        date,
        open: row.get(2)?,
        high: row.get(3)?,
        low: row.get(4)?,
        close: row.get(5)?,
        volume: row.get(6)?,
    })
}

impl PriceStore for SqliteAdapter {
    fn get_range(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, PricelabError> {
        let conn = self.conn()?;

        let start_str = start_date.format(DATE_FORMAT).to_string();
        let end_str = end_date.format(DATE_FORMAT).to_string();

        let query = format!(
            "SELECT {BAR_COLUMNS} FROM prices
             WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date ASC"
        );

        let mut stmt = conn.prepare(&query).map_err(query_error)?;
        let rows = stmt
            .query_map(params![symbol, start_str, end_str], row_to_bar)
            .map_err(query_error)?;

        let mut bars = Vec::new();
        for row in rows {
            bars.push(row.map_err(query_error)?);
        }

        Ok(bars)
    }

    fn insert_bars(&self, bars: &[OhlcvBar]) -> Result<usize, PricelabError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO prices (symbol, date, open, high, low, close, volume)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(query_error)?;

            for bar in bars {
                inserted += stmt
                    .execute(params![
                        bar.symbol,
                        bar.date.format(DATE_FORMAT).to_string(),
                        bar.open,
                        bar.high,
                        bar.low,
                        bar.close,
                        bar.volume
                    ])
                    .map_err(query_error)?;
            }
        }

        tx.commit().map_err(query_error)?;
        Ok(inserted)
    }

    fn get_earliest(&self, symbol: &str) -> Result<Option<OhlcvBar>, PricelabError> {
        self.get_edge(symbol, "ASC")
    }

    fn get_latest(&self, symbol: &str) -> Result<Option<OhlcvBar>, PricelabError> {
        self.get_edge(symbol, "DESC")
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, PricelabError> {
        let conn = self.conn()?;

        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM prices WHERE symbol = ?1",
                params![symbol],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_error)?;

        match result {
            (Some(min_str), Some(max_str), count) if count > 0 => Ok(Some((
                parse_date(&min_str)?,
                parse_date(&max_str)?,
                count as usize,
            ))),
            _ => Ok(None),
        }
    }

    fn list_symbols(&self) -> Result<Vec<String>, PricelabError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT DISTINCT symbol FROM prices ORDER BY symbol")
            .map_err(query_error)?;

        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(query_error)?;

        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row.map_err(query_error)?);
        }

        Ok(symbols)
    }
}
