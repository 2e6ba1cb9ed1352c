//! Error taxonomy for a forecasting run.
//!
//! Every stage returns [`PipelineError`]; the binary turns it into an
//! `anyhow::Error` at the process boundary so a failed run exits non-zero.

use chrono::NaiveDate;
use thiserror::Error;

use crate::forecast::ForecastError;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The feed could not be downloaded.
    #[error("feed request failed: {0}")]
    Fetch(#[from] reqwest::Error),

    /// The feed was downloaded but does not have the expected shape.
    #[error("malformed feed: {0}")]
    MalformedFeed(String),

    #[error("feed CSV could not be read: {0}")]
    Csv(#[from] csv::Error),

    /// The feed parsed but held no observations.
    #[error("feed contained no observations")]
    EmptyInput,

    #[error("invalid daily series: {0}")]
    InvalidSeries(String),

    /// Model fitting or forecasting failed.
    #[error(transparent)]
    Forecast(#[from] ForecastError),

    /// The forecast horizon does not contain the reference day.
    #[error("no forecast for {today}: horizon covers {first} to {last}")]
    TodayOutsideHorizon {
        today: NaiveDate,
        first: NaiveDate,
        last: NaiveDate,
    },

    #[error("band baseline needs at least {required} days before {cutoff}, got {actual}")]
    InsufficientBaseline {
        cutoff: NaiveDate,
        required: usize,
        actual: usize,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("render failed: {0}")]
    Render(String),

    /// Publishing failed. The database batch has already been committed.
    #[error("publish failed: {0}")]
    Publish(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
