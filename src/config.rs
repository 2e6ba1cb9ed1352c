//! Process configuration, read once from the environment.

use crate::error::{PipelineError, Result};
use crate::fetch::auth::OAuth1Credentials;
use crate::forecast::FORECAST_HORIZON;
use chrono_tz::Tz;
use reqwest::Url;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_FEED_URL: &str = "https://raw.githubusercontent.com/mikelor/TsaThroughput/main/data/processed/tsa/throughput/TsaThroughput.AUS.csv";
pub const DEFAULT_GAUGE_PATH: &str = "/tmp/tsa_plot.png";

/// Days of trailing history kept in the combined table and excluded from the
/// band baseline.
pub const HISTORY_WINDOW_DAYS: u64 = 90;

/// Airport-local time zone; "today" is the calendar date here.
pub const AIRPORT_TZ: Tz = chrono_tz::US::Central;

#[derive(Debug, Clone)]
pub struct Config {
    /// CSV feed location, `TSA_DATA_URL`. A local path is accepted too.
    pub feed_url: String,
    /// `None` when no `DB_*` variable is set.
    pub database: Option<DatabaseConfig>,
    /// `None` when no `TW_*` variable is set.
    pub twitter: Option<OAuth1Credentials>,
    pub timezone: Tz,
    pub history_window_days: u64,
    pub forecast_horizon: usize,
    /// Where the gauge PNG is written, `GAUGE_IMAGE_PATH`.
    pub gauge_path: PathBuf,
    /// Where the dashboard password comes from.
    pub dashboard_secret: Option<SecretSource>,
}

/// Postgres connection settings.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub user: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: Option<u16>,
    /// `DATABASE_URL`, used verbatim when present.
    pub url_override: Option<String>,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("url_override", &self.url_override.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl DatabaseConfig {
    pub fn url(&self) -> Result<String> {
        if let Some(url) = &self.url_override {
            return Ok(url.clone());
        }

        let invalid = || PipelineError::Config(format!("invalid database host '{}'", self.host));
        let mut url = Url::parse(&format!("postgres://{}", self.host)).map_err(|_| invalid())?;
        url.set_username(&self.user).map_err(|_| invalid())?;
        url.set_password(Some(&self.password))
            .map_err(|_| invalid())?;
        url.set_port(self.port).map_err(|_| invalid())?;
        url.set_path(&self.database);
        Ok(url.to_string())
    }
}

/// Location of a secret: an SSM parameter path or a literal value.
#[derive(Clone)]
pub enum SecretSource {
    Ssm(String),
    Literal(String),
}

impl fmt::Debug for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretSource::Ssm(path) => f.debug_tuple("Ssm").field(path).finish(),
            SecretSource::Literal(_) => f.debug_tuple("Literal").field(&"<redacted>").finish(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Blank values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database = if get("DATABASE_URL").is_some() {
            Some(DatabaseConfig {
                user: String::new(),
                password: String::new(),
                database: String::new(),
                host: String::new(),
                port: None,
                url_override: get("DATABASE_URL"),
            })
        } else {
            all_or_none(&get, &["DB_USER", "DB_PASSWORD", "DB_DATABASE", "DB_HOST"])?
                .map(|[user, password, database, host]| {
                    let port = get("DB_PORT")
                        .map(|p| {
                            p.parse::<u16>()
                                .map_err(|e| PipelineError::Config(format!("DB_PORT '{p}': {e}")))
                        })
                        .transpose()?;
                    Ok::<_, PipelineError>(DatabaseConfig {
                        user,
                        password,
                        database,
                        host,
                        port,
                        url_override: None,
                    })
                })
                .transpose()?
        };

        let twitter = all_or_none(
            &get,
            &[
                "TW_API_KEY",
                "TW_API_Key_Secret",
                "TW_ACCESS_TOKEN",
                "TW_ACCESS_TOKEN_SECRET",
            ],
        )?
        .map(|[consumer_key, consumer_secret, token, token_secret]| OAuth1Credentials {
            consumer_key,
            consumer_secret,
            token,
            token_secret,
        });

        let dashboard_secret = get("DASHBOARD_PASSWORD_PARAM")
            .map(SecretSource::Ssm)
            .or_else(|| get("DASHBOARD_PASSWORD").map(SecretSource::Literal));

        Ok(Self {
            feed_url: get("TSA_DATA_URL").unwrap_or_else(|| DEFAULT_FEED_URL.to_string()),
            database,
            twitter,
            timezone: AIRPORT_TZ,
            history_window_days: HISTORY_WINDOW_DAYS,
            forecast_horizon: FORECAST_HORIZON,
            gauge_path: get("GAUGE_IMAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_GAUGE_PATH)),
            dashboard_secret,
        })
    }

    pub fn database(&self) -> Result<&DatabaseConfig> {
        self.database.as_ref().ok_or_else(|| {
            PipelineError::Config(
                "database not configured: set DATABASE_URL or DB_USER, DB_PASSWORD, DB_DATABASE, DB_HOST"
                    .to_string(),
            )
        })
    }

    pub fn twitter(&self) -> Result<&OAuth1Credentials> {
        self.twitter.as_ref().ok_or_else(|| {
            PipelineError::Config(
                "publisher not configured: set TW_API_KEY, TW_API_Key_Secret, TW_ACCESS_TOKEN, TW_ACCESS_TOKEN_SECRET"
                    .to_string(),
            )
        })
    }
}

/// All `N` keys, or none of them. A partial set is an error naming the
/// missing keys.
fn all_or_none<const N: usize>(
    get: &impl Fn(&str) -> Option<String>,
    keys: &[&str; N],
) -> Result<Option<[String; N]>> {
    let values = keys.map(get);
    if values.iter().all(Option::is_none) {
        return Ok(None);
    }

    let missing: Vec<&str> = keys
        .iter()
        .zip(&values)
        .filter(|(_, v)| v.is_none())
        .map(|(k, _)| *k)
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::Config(format!(
            "missing {}",
            missing.join(", ")
        )));
    }

    Ok(Some(values.map(Option::unwrap_or_default)))
}
