use async_trait::async_trait;
use aus_tsa_forecast::analyzers::aggregate::aggregate_daily;
use aus_tsa_forecast::config::Config;
use aus_tsa_forecast::error::{PipelineError, Result};
use aus_tsa_forecast::fetch::BasicClient;
use aus_tsa_forecast::loader::parse_feed;
use aus_tsa_forecast::pipeline::run;
use aus_tsa_forecast::publish::Publisher;
use aus_tsa_forecast::store::{Store, Table};
use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Default)]
struct RecordingPublisher {
    posts: Mutex<Vec<(String, PathBuf)>>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, text: &str, image: &Path) -> Result<()> {
        self.posts
            .lock()
            .unwrap()
            .push((text.to_string(), image.to_path_buf()));
        Ok(())
    }
}

struct FailingPublisher;

#[async_trait]
impl Publisher for FailingPublisher {
    async fn publish(&self, _text: &str, _image: &Path) -> Result<()> {
        Err(PipelineError::Publish("rate limited".to_string()))
    }
}

struct Workspace {
    feed: PathBuf,
    database_url: String,
    gauge: PathBuf,
}

impl Workspace {
    fn new(name: &str, last: NaiveDate, days: u64) -> Self {
        let dir = std::env::temp_dir().join(format!("aus_tsa_forecast_it_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let mut csv = "Date,Hour,AUS AUS01,AUS AUS02,AUS AUS02E,AUS AUS02W,AUS AUS03\n".to_string();
        for back in (0..days).rev() {
            let date = last.checked_sub_days(Days::new(back)).unwrap();
            let weekday = (days - back) % 7;
            csv.push_str(&format!("{date},06:00,{},300,120,150,20\n", 400 + 90 * weekday));
            csv.push_str(&format!("{date},12:00,50,200,80,100,10\n"));
        }
        let feed = dir.join("feed.csv");
        std::fs::write(&feed, csv).unwrap();

        Self {
            feed,
            database_url: format!("sqlite://{}?mode=rwc", dir.join("tsa.db").display()),
            gauge: dir.join("gauge.png"),
        }
    }

    fn config(&self) -> Config {
        let vars: HashMap<&str, String> = HashMap::from([
            ("TSA_DATA_URL", self.feed.display().to_string()),
            ("DATABASE_URL", self.database_url.clone()),
            ("GAUGE_IMAGE_PATH", self.gauge.display().to_string()),
        ]);
        Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }
}

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_fixture_aggregates_to_daily_calendar() {
    let bytes = include_bytes!("fixtures/aus_sample.csv");
    let observations = parse_feed(bytes).expect("Failed to parse feed");
    let series = aggregate_daily(&observations).unwrap();

    assert_eq!(series.len(), 4);
    assert_eq!(series.values(), vec![1904.0, 1003.0, 0.0, 1875.0]);
    assert_eq!(series.get(date(2024, 3, 3)), Some(0.0));
}

#[tokio::test]
async fn test_scheduled_run_end_to_end() {
    // 18:00 UTC on May 1 is 13:00 in Austin; the feed ends the day before.
    let workspace = Workspace::new("end_to_end", date(2024, 4, 30), 200);
    let config = workspace.config();
    let publisher = RecordingPublisher::default();

    let report = run(&config, &BasicClient::new(), Some(&publisher), at(1, 18))
        .await
        .unwrap();

    assert_eq!(report.today, date(2024, 5, 1));
    assert_eq!(report.today_forecast.date, report.today);
    assert_eq!(report.history_days, 200);
    assert_eq!(report.combined_rows, 89 + 30);
    assert!(report.published);

    let posts = publisher.posts.lock().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, report.band.message());
    assert_eq!(posts[0].1, workspace.gauge);
    assert!(workspace.gauge.exists());

    let mut store = Store::connect(&workspace.database_url).await.unwrap();
    assert_eq!(store.count_rows(Table::TsaDataProcessed).await.unwrap(), 200);
    let rows = store.read_combined().await.unwrap();
    assert_eq!(rows.len(), report.combined_rows);
    let today_row = rows.iter().find(|r| r.date == report.today).unwrap();
    assert_eq!(today_row.mean, Some(report.today_forecast.mean));
    store.close().await.unwrap();
}

#[tokio::test]
async fn test_second_run_replaces_first_batch() {
    let workspace = Workspace::new("rerun", date(2024, 4, 30), 150);
    let config = workspace.config();

    run(&config, &BasicClient::new(), None, at(1, 15)).await.unwrap();
    let report = run(&config, &BasicClient::new(), None, at(1, 16)).await.unwrap();
    assert!(!report.published);

    let mut store = Store::connect(&workspace.database_url).await.unwrap();
    assert_eq!(store.count_rows(Table::TsaDataProcessed).await.unwrap(), 150);
    assert_eq!(
        store.count_rows(Table::DataPlusPrediction).await.unwrap(),
        report.combined_rows as i64
    );
    store.close().await.unwrap();
}

#[tokio::test]
async fn test_stale_feed_writes_nothing() {
    let workspace = Workspace::new("stale", date(2024, 3, 1), 150);
    let config = workspace.config();

    let result = run(&config, &BasicClient::new(), None, at(1, 18)).await;

    assert!(matches!(result, Err(PipelineError::TodayOutsideHorizon { .. })));
    assert!(!workspace.gauge.exists());
}

#[tokio::test]
async fn test_publish_failure_keeps_committed_batch() {
    let workspace = Workspace::new("publish_failure", date(2024, 4, 30), 150);
    let config = workspace.config();

    let result = run(&config, &BasicClient::new(), Some(&FailingPublisher), at(1, 18)).await;

    assert!(matches!(result, Err(PipelineError::Publish(_))));
    let mut store = Store::connect(&workspace.database_url).await.unwrap();
    assert_eq!(store.count_rows(Table::TsaDataProcessed).await.unwrap(), 150);
    store.close().await.unwrap();
}
