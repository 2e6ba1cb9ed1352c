//! Forecasting of the daily passenger series.
//!
//! [`Forecaster`] fits a seasonal ARIMA model to a [`DailySeries`] and turns
//! the per-step output into dated [`ForecastRecord`]s. The estimator itself
//! lives in [`sarima`] and only needs the narrow `fit → forecast` contract.

pub mod optimizer;
pub mod sarima;

pub use sarima::{ForecastStep, SarimaModel, SarimaOrder, SarimaParams};

use crate::analyzers::types::{DailySeries, ForecastRecord};
use crate::error::{PipelineError, Result};
use chrono::{Days, NaiveDate};
use thiserror::Error;
use tracing::info;

/// Days forecast past the last observation.
pub const FORECAST_HORIZON: usize = 30;

#[derive(Debug, Error)]
pub enum ForecastError {
    /// Insufficient data points for the model orders
    #[error("Insufficient data: need at least {required} points, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// Invalid time series data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Convergence failure during optimization
    #[error("Optimization failed to converge after {iterations} iterations")]
    ConvergenceFailure { iterations: usize },

    /// Numerical computation error
    #[error("Numerical error: {0}")]
    NumericalError(String),
}

#[derive(Debug, Clone, Copy)]
pub struct Forecaster {
    order: SarimaOrder,
    horizon: usize,
}

impl Default for Forecaster {
    fn default() -> Self {
        Self::new(SarimaOrder::WEEKLY, FORECAST_HORIZON)
    }
}

impl Forecaster {
    pub fn new(order: SarimaOrder, horizon: usize) -> Self {
        Self { order, horizon }
    }

    /// Fits the model to `series` and forecasts the days after its last date.
    #[tracing::instrument(skip_all, fields(days = series.len(), horizon = self.horizon))]
    pub fn forecast(&self, series: &DailySeries) -> Result<Forecast> {
        let model = SarimaModel::fit(&series.values(), self.order)?;
        let steps = model.forecast(self.horizon)?;

        let last = series.last_date();
        let records = steps
            .into_iter()
            .zip(1u64..)
            .map(|(step, offset)| {
                let date = last.checked_add_days(Days::new(offset)).ok_or_else(|| {
                    PipelineError::InvalidSeries(format!("no calendar date {offset} days after {last}"))
                })?;
                Ok(ForecastRecord {
                    date,
                    mean: step.mean,
                    mean_se: step.std_error,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            iterations = model.iterations(),
            sigma2 = model.sigma2(),
            first = %last.succ_opt().unwrap_or(last),
            "Model fitted"
        );

        Ok(Forecast { records })
    }
}

/// Dated forecast for the days following the history.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    records: Vec<ForecastRecord>,
}

impl Forecast {
    pub fn records(&self) -> &[ForecastRecord] {
        &self.records
    }

    /// The forecast for `date`, which must fall inside the horizon.
    pub fn for_date(&self, date: NaiveDate) -> Result<&ForecastRecord> {
        self.records
            .iter()
            .find(|r| r.date == date)
            .ok_or_else(|| match (self.records.first(), self.records.last()) {
                (Some(first), Some(last)) => PipelineError::TodayOutsideHorizon {
                    today: date,
                    first: first.date,
                    last: last.date,
                },
                _ => PipelineError::Forecast(ForecastError::InvalidData(
                    "forecast horizon is empty".to_string(),
                )),
            })
    }
}
