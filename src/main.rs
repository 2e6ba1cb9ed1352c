//! CLI entry point for the AUS checkpoint forecast.
//!
//! `run` is the scheduled job; `forecast` is a dry run against any CSV; the
//! remaining subcommands bootstrap the schema and serve the dashboard.

use anyhow::{Context, Result};
use aus_tsa_forecast::{
    config::Config,
    dashboard::{DashboardState, serve},
    fetch::BasicClient,
    infra::keys::{SsmKeyStore, resolve_secret},
    pipeline::{dry_run, run},
    publish::{Publisher, TwitterPublisher},
    store::Store,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "aus_tsa_forecast")]
#[command(about = "Forecasts daily AUS security checkpoint volume", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, forecast, store, classify and post today's outlook
    Run {
        /// Write the gauge but do not post it
        #[arg(long, default_value_t = false)]
        skip_publish: bool,
    },
    /// Forecast from a file or URL without touching the database
    Forecast {
        /// Path to file or URL to fetch (defaults to TSA_DATA_URL)
        #[arg(long, value_name = "FILE_OR_URL")]
        source: Option<String>,
    },
    /// Create the output tables if they do not exist
    InitSchema,
    /// Serve the password-gated dashboard
    Dashboard {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/aus_tsa_forecast.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("aus_tsa_forecast.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Run { skip_publish } => {
            let client = BasicClient::new();
            let publisher = if skip_publish {
                None
            } else {
                Some(TwitterPublisher::from_credentials(config.twitter()?.clone()))
            };

            let report = run(
                &config,
                &client,
                publisher.as_ref().map(|p| p as &dyn Publisher),
                Utc::now(),
            )
            .await?;

            info!(
                band = %report.band,
                published = report.published,
                report = %serde_json::to_string(&report)?,
                "Run complete"
            );
        }
        Commands::Forecast { source } => {
            let client = BasicClient::new();
            let source = source.unwrap_or_else(|| config.feed_url.clone());
            let outcome = dry_run(&config, &client, &source, Utc::now()).await?;

            info!(
                today = %outcome.today,
                band = %outcome.band,
                mean = outcome.today_forecast.mean,
                "Dry run complete"
            );
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::InitSchema => {
            let mut store = Store::connect(&config.database()?.url()?).await?;
            store.ensure_schema().await?;
            store.close().await?;
            info!("Schema ready");
        }
        Commands::Dashboard { bind } => {
            let secret = config
                .dashboard_secret
                .as_ref()
                .context("set DASHBOARD_PASSWORD_PARAM or DASHBOARD_PASSWORD")?;
            let aws = aws_config::load_from_env().await;
            let password = resolve_secret(secret, &SsmKeyStore::new(&aws)).await?;
            let state = DashboardState::new(&config.database()?.url()?, &password, config.timezone);

            serve(state, bind).await?;
        }
    }

    Ok(())
}
