//! Relational persistence of the processed series and the combined
//! history/forecast table.
//!
//! Each run writes a batch stamped with one [`BatchTimestamp`]: rows are
//! inserted, then rows of older batches are deleted, all inside a single
//! transaction. A failed run therefore leaves the previous batch in place.

use crate::analyzers::types::{CombinedRow, CombinedSeries, DailyPoint, DailySeries};
use crate::error::{PipelineError, Result};
use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Connection, Row};
use std::fmt;
use tracing::{debug, info};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Tables the writer may touch. Names never come from callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    TsaDataProcessed,
    DataPlusPrediction,
}

impl Table {
    pub const ALL: [Table; 2] = [Table::TsaDataProcessed, Table::DataPlusPrediction];

    pub fn name(self) -> &'static str {
        match self {
            Table::TsaDataProcessed => "tsa_data_processed",
            Table::DataPlusPrediction => "data_plus_prediction",
        }
    }

    fn create_sql(self) -> &'static str {
        match self {
            Table::TsaDataProcessed => {
                "CREATE TABLE IF NOT EXISTS tsa_data_processed (
                    date TEXT NOT NULL,
                    passengers DOUBLE PRECISION NOT NULL,
                    updated_at TEXT NOT NULL
                )"
            }
            Table::DataPlusPrediction => {
                "CREATE TABLE IF NOT EXISTS data_plus_prediction (
                    date TEXT NOT NULL,
                    passengers DOUBLE PRECISION NULL,
                    mean DOUBLE PRECISION NULL,
                    mean_se DOUBLE PRECISION NULL,
                    mean_ci_lower DOUBLE PRECISION NULL,
                    mean_ci_upper DOUBLE PRECISION NULL,
                    updated_at TEXT NOT NULL
                )"
            }
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// UTC instant, truncated to microseconds, stamped on every row of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BatchTimestamp(DateTime<Utc>);

impl BatchTimestamp {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.trunc_subsecs(6))
    }

    /// Fixed-width text form; lexical order equals time order.
    pub fn as_text(&self) -> String {
        self.0.format(TIMESTAMP_FORMAT).to_string()
    }
}

impl fmt::Display for BatchTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

/// Rows destined for one table.
#[derive(Debug, Clone, Copy)]
pub enum Dataset<'a> {
    Processed(&'a DailySeries),
    Combined(&'a CombinedSeries),
}

impl Dataset<'_> {
    pub fn table(&self) -> Table {
        match self {
            Dataset::Processed(_) => Table::TsaDataProcessed,
            Dataset::Combined(_) => Table::DataPlusPrediction,
        }
    }

    fn len(&self) -> usize {
        match self {
            Dataset::Processed(series) => series.len(),
            Dataset::Combined(series) => series.len(),
        }
    }
}

/// A single open database connection.
pub struct Store {
    conn: AnyConnection,
}

impl Store {
    /// Opens a connection to `url` (`postgres://…` or `sqlite:…`).
    pub async fn connect(url: &str) -> Result<Self> {
        sqlx::any::install_default_drivers();
        let conn = AnyConnection::connect(url).await?;
        debug!(backend = conn.backend_name(), "Database connected");
        Ok(Self { conn })
    }

    pub async fn ensure_schema(&mut self) -> Result<()> {
        for table in Table::ALL {
            sqlx::query(table.create_sql())
                .execute(&mut self.conn)
                .await?;
        }
        Ok(())
    }

    /// Inserts every dataset stamped with `batch` and purges rows of older
    /// batches, committing once.
    #[tracing::instrument(skip_all, fields(batch = %batch))]
    pub async fn write_batch(&mut self, batch: BatchTimestamp, datasets: &[Dataset<'_>]) -> Result<()> {
        let stamp = batch.as_text();
        let mut tx = self.conn.begin().await?;

        for dataset in datasets {
            let table = dataset.table();
            match dataset {
                Dataset::Processed(series) => {
                    for point in series.points() {
                        sqlx::query(
                            "INSERT INTO tsa_data_processed (date, passengers, updated_at) VALUES ($1, $2, $3)",
                        )
                        .bind(point.date.format(DATE_FORMAT).to_string())
                        .bind(point.passengers)
                        .bind(stamp.clone())
                        .execute(&mut *tx)
                        .await?;
                    }
                }
                Dataset::Combined(series) => {
                    for row in series.rows() {
                        sqlx::query(
                            "INSERT INTO data_plus_prediction (date, passengers, mean, mean_se, mean_ci_lower, mean_ci_upper, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
                        )
                        .bind(row.date.format(DATE_FORMAT).to_string())
                        .bind(row.passengers)
                        .bind(row.mean)
                        .bind(row.mean_se)
                        .bind(row.mean_ci_lower)
                        .bind(row.mean_ci_upper)
                        .bind(stamp.clone())
                        .execute(&mut *tx)
                        .await?;
                    }
                }
            }

            let purged = sqlx::query(&format!("DELETE FROM {table} WHERE updated_at < $1"))
                .bind(stamp.clone())
                .execute(&mut *tx)
                .await?
                .rows_affected();
            info!(%table, inserted = dataset.len(), purged, "Table written");
        }

        tx.commit().await?;
        Ok(())
    }

    /// Every row of `data_plus_prediction`, ordered by date.
    pub async fn read_combined(&mut self) -> Result<Vec<CombinedRow>> {
        let rows = sqlx::query(
            "SELECT date, passengers, mean, mean_se, mean_ci_lower, mean_ci_upper FROM data_plus_prediction ORDER BY date",
        )
        .fetch_all(&mut self.conn)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(CombinedRow {
                    date: row_date(row)?,
                    passengers: row.try_get("passengers")?,
                    mean: row.try_get("mean")?,
                    mean_se: row.try_get("mean_se")?,
                    mean_ci_lower: row.try_get("mean_ci_lower")?,
                    mean_ci_upper: row.try_get("mean_ci_upper")?,
                })
            })
            .collect()
    }

    /// Every row of `tsa_data_processed`, ordered by date.
    pub async fn read_processed(&mut self) -> Result<Vec<DailyPoint>> {
        let rows = sqlx::query("SELECT date, passengers FROM tsa_data_processed ORDER BY date")
            .fetch_all(&mut self.conn)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(DailyPoint {
                    date: row_date(row)?,
                    passengers: row.try_get("passengers")?,
                })
            })
            .collect()
    }

    pub async fn count_rows(&mut self, table: Table) -> Result<i64> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {table}"))
            .fetch_one(&mut self.conn)
            .await?;
        Ok(row.try_get("n")?)
    }

    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}

fn row_date(row: &AnyRow) -> Result<NaiveDate> {
    let text: String = row.try_get("date")?;
    NaiveDate::parse_from_str(&text, DATE_FORMAT)
        .map_err(|e| PipelineError::InvalidSeries(format!("stored date '{text}': {e}")))
}
