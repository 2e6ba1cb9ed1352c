//! CSV decoding for the TSA throughput feed.

use crate::analyzers::types::{Checkpoint, RawObservation};
use crate::error::{PipelineError, Result};
use crate::fetch::{HttpClient, fetch_bytes};
use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, info};

const DATE_COLUMN: &str = "Date";
const HOUR_COLUMN: &str = "Hour";

/// Loads feed bytes from a local file path or fetches them over HTTP.
#[tracing::instrument(skip(client), fields(source = %source))]
pub async fn load_source<C: HttpClient>(client: &C, source: &str) -> Result<Vec<u8>> {
    let bytes = if source.starts_with("http") {
        fetch_bytes(client, source).await?
    } else {
        std::fs::read(source)?
    };
    info!(bytes = bytes.len(), "Feed loaded");
    Ok(bytes)
}

/// Decodes the throughput CSV into one observation per row.
///
/// The `Date` column and all five checkpoint columns must be present; other
/// columns are ignored. Empty counts read as zero.
///
/// # Errors
///
/// Returns [`PipelineError::MalformedFeed`] for missing columns, unparsable
/// dates or negative counts.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<RawObservation>> {
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(bytes);
    let headers = rdr.headers()?.clone();

    let column = |name: &str| headers.iter().position(|h| h == name);
    let date_idx = column(DATE_COLUMN)
        .ok_or_else(|| PipelineError::MalformedFeed(format!("missing '{DATE_COLUMN}' column")))?;
    let hour_idx = column(HOUR_COLUMN);

    let mut checkpoint_idx = [0usize; 5];
    for (slot, checkpoint) in checkpoint_idx.iter_mut().zip(Checkpoint::ALL) {
        *slot = column(checkpoint.column()).ok_or_else(|| {
            PipelineError::MalformedFeed(format!("missing '{}' column", checkpoint.column()))
        })?;
    }

    let mut observations = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let date = parse_date(field(&record, date_idx))
            .ok_or_else(|| PipelineError::MalformedFeed(format!("line {line}: invalid date")))?;

        let mut counts = [0.0; 5];
        for (count, idx) in counts.iter_mut().zip(checkpoint_idx) {
            *count = parse_count(field(&record, idx)).ok_or_else(|| {
                PipelineError::MalformedFeed(format!(
                    "line {line}: invalid count '{}'",
                    field(&record, idx)
                ))
            })?;
        }

        let hour = hour_idx
            .map(|idx| field(&record, idx))
            .filter(|h| !h.is_empty())
            .map(str::to_string);

        observations.push(RawObservation { date, hour, counts });
    }

    debug!(rows = observations.len(), "Feed parsed");
    Ok(observations)
}

fn field(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("")
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    ["%Y-%m-%d", "%m/%d/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn parse_count(s: &str) -> Option<f64> {
    if s.is_empty() {
        return Some(0.0);
    }
    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Date,Hour,Airport,AUS AUS01,AUS AUS02,AUS AUS02E,AUS AUS02W,AUS AUS03";

    #[test]
    fn test_parse_rows() {
        let csv = format!("{HEADER}\n2024-05-01,05:00,AUS,10,20,30,40,50\n2024-05-01,06:00,AUS,1,2,3,4,5\n");
        let rows = parse_feed(csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(rows[0].hour.as_deref(), Some("05:00"));
        assert_eq!(rows[0].counts, [10.0, 20.0, 30.0, 40.0, 50.0]);
        assert_eq!(rows[1].total(), 15.0);
    }

    #[test]
    fn test_columns_are_found_by_name() {
        let csv = "AUS AUS03,AUS AUS02W,AUS AUS02E,AUS AUS02,AUS AUS01,Date\n5,4,3,2,1,05/02/2024\n";
        let rows = parse_feed(csv.as_bytes()).unwrap();

        assert_eq!(rows[0].counts, [1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert_eq!(rows[0].hour, None);
    }

    #[test]
    fn test_empty_counts_are_zero() {
        let csv = format!("{HEADER}\n2024-05-01,05:00,AUS,,20,,40.5,\n");
        let rows = parse_feed(csv.as_bytes()).unwrap();

        assert_eq!(rows[0].counts, [0.0, 20.0, 0.0, 40.5, 0.0]);
    }

    #[test]
    fn test_missing_checkpoint_column() {
        let csv = "Date,Hour,AUS AUS01,AUS AUS02,AUS AUS02E,AUS AUS02W\n2024-05-01,05:00,1,2,3,4\n";
        let err = parse_feed(csv.as_bytes()).unwrap_err();

        assert!(matches!(err, PipelineError::MalformedFeed(ref m) if m.contains("AUS AUS03")));
    }

    #[test]
    fn test_invalid_date() {
        let csv = format!("{HEADER}\nyesterday,05:00,AUS,1,2,3,4,5\n");
        assert!(matches!(
            parse_feed(csv.as_bytes()),
            Err(PipelineError::MalformedFeed(_))
        ));
    }

    #[test]
    fn test_negative_count() {
        let csv = format!("{HEADER}\n2024-05-01,05:00,AUS,1,-2,3,4,5\n");
        assert!(matches!(
            parse_feed(csv.as_bytes()),
            Err(PipelineError::MalformedFeed(_))
        ));
    }

    #[test]
    fn test_datetime_dates() {
        assert_eq!(
            parse_date("2024-05-01 00:00:00"),
            NaiveDate::from_ymd_opt(2024, 5, 1)
        );
        assert_eq!(parse_date("2024-13-01"), None);
    }

    #[test]
    fn test_header_only_is_empty() {
        let rows = parse_feed(HEADER.as_bytes()).unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_load_source_reads_local_file() {
        let path = std::env::temp_dir().join("aus_tsa_forecast_loader_test.csv");
        std::fs::write(&path, "Date\n").unwrap();

        let client = crate::fetch::BasicClient::new();
        let bytes = load_source(&client, path.to_str().unwrap()).await.unwrap();

        assert_eq!(bytes, b"Date\n");
        std::fs::remove_file(&path).unwrap();
    }
}
