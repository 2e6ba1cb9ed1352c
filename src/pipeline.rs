//! The scheduled job: feed → daily series → forecast → database → band →
//! gauge → post.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{info, warn};

use crate::analyzers::aggregate::aggregate_daily;
use crate::analyzers::band::{BandThresholds, CongestionBand, baseline_cutoff};
use crate::analyzers::types::{CombinedSeries, DailySeries, ForecastRecord};
use crate::config::Config;
use crate::error::Result;
use crate::fetch::HttpClient;
use crate::forecast::{Forecast, Forecaster, SarimaOrder};
use crate::loader::{load_source, parse_feed};
use crate::publish::Publisher;
use crate::render::Gauge;
use crate::store::{BatchTimestamp, Dataset, Store};

/// Calendar date at `now` in `tz`.
pub fn local_today(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Everything computed from one feed snapshot before anything is written.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub series: DailySeries,
    pub forecast: Forecast,
    pub today: NaiveDate,
    pub today_forecast: ForecastRecord,
    pub combined: CombinedSeries,
}

/// Parses, aggregates and forecasts `bytes`, then looks up today's forecast.
///
/// Fails before any side effect when today is outside the forecast horizon.
pub fn prepare(
    bytes: &[u8],
    today: NaiveDate,
    forecaster: &Forecaster,
    window_days: u64,
) -> Result<Prepared> {
    let observations = parse_feed(bytes)?;
    let series = aggregate_daily(&observations)?;
    let forecast = forecaster.forecast(&series)?;
    let today_forecast = *forecast.for_date(today)?;
    let combined = CombinedSeries::build(&series, forecast.records(), today, window_days);

    Ok(Prepared {
        series,
        forecast,
        today,
        today_forecast,
        combined,
    })
}

/// Band thresholds over history older than the trailing window, and the
/// band of `value`.
pub fn classify_today(
    series: &DailySeries,
    today: NaiveDate,
    window_days: u64,
    value: f64,
) -> Result<(BandThresholds, CongestionBand)> {
    let thresholds = BandThresholds::from_history(series, baseline_cutoff(today, window_days))?;
    Ok((thresholds, thresholds.classify(value)))
}

/// Outcome of a scheduled run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub batch: String,
    pub today: NaiveDate,
    pub history_days: usize,
    pub combined_rows: usize,
    pub today_forecast: ForecastRecord,
    pub thresholds: BandThresholds,
    pub band: CongestionBand,
    pub gauge_path: PathBuf,
    pub published: bool,
}

/// Runs the whole job once.
///
/// The database batch is committed before classification; a later render or
/// publish failure is returned but leaves the committed batch in place.
#[tracing::instrument(skip_all, fields(source = %config.feed_url))]
pub async fn run<C: HttpClient>(
    config: &Config,
    client: &C,
    publisher: Option<&dyn Publisher>,
    now: DateTime<Utc>,
) -> Result<RunReport> {
    let database_url = config.database()?.url()?;
    let today = local_today(config.timezone, now);
    let forecaster = Forecaster::new(SarimaOrder::WEEKLY, config.forecast_horizon);

    let bytes = load_source(client, &config.feed_url).await?;
    let prepared = prepare(&bytes, today, &forecaster, config.history_window_days)?;
    info!(
        %today,
        first = %prepared.series.first_date(),
        last = %prepared.series.last_date(),
        mean = prepared.today_forecast.mean,
        mean_se = prepared.today_forecast.mean_se,
        "Forecast ready"
    );

    let batch = BatchTimestamp::from_datetime(now);
    let mut store = Store::connect(&database_url).await?;
    store.ensure_schema().await?;
    store
        .write_batch(
            batch,
            &[
                Dataset::Processed(&prepared.series),
                Dataset::Combined(&prepared.combined),
            ],
        )
        .await?;
    store.close().await?;

    let (thresholds, band) = classify_today(
        &prepared.series,
        today,
        config.history_window_days,
        prepared.today_forecast.mean,
    )?;
    info!(%band, median = thresholds.median, std_dev = thresholds.std_dev, "Band classified");

    Gauge::new(thresholds, prepared.today_forecast.mean).render_png(&config.gauge_path)?;

    let published = match publisher {
        Some(publisher) => {
            publisher.publish(band.message(), &config.gauge_path).await?;
            true
        }
        None => {
            warn!("Publishing skipped");
            false
        }
    };

    Ok(RunReport {
        batch: batch.as_text(),
        today,
        history_days: prepared.series.len(),
        combined_rows: prepared.combined.len(),
        today_forecast: prepared.today_forecast,
        thresholds,
        band,
        gauge_path: config.gauge_path.clone(),
        published,
    })
}

/// Forecast and band for `source` without touching the database or posting.
#[derive(Debug, Clone, Serialize)]
pub struct DryRun {
    pub today: NaiveDate,
    pub forecast: Vec<ForecastRecord>,
    pub today_forecast: ForecastRecord,
    pub thresholds: BandThresholds,
    pub band: CongestionBand,
}

#[tracing::instrument(skip(config, client, now))]
pub async fn dry_run<C: HttpClient>(
    config: &Config,
    client: &C,
    source: &str,
    now: DateTime<Utc>,
) -> Result<DryRun> {
    let today = local_today(config.timezone, now);
    let forecaster = Forecaster::new(SarimaOrder::WEEKLY, config.forecast_horizon);

    let bytes = load_source(client, source).await?;
    let prepared = prepare(&bytes, today, &forecaster, config.history_window_days)?;
    let (thresholds, band) = classify_today(
        &prepared.series,
        today,
        config.history_window_days,
        prepared.today_forecast.mean,
    )?;

    Ok(DryRun {
        today,
        forecast: prepared.forecast.records().to_vec(),
        today_forecast: prepared.today_forecast,
        thresholds,
        band,
    })
}
