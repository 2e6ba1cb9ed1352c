use super::client::HttpClient;
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct BasicClient(reqwest::Client);

impl BasicClient {
    /// Falls back to an untimed client, with a warning, if TLS setup fails.
    pub fn new() -> Self {
        match Self::try_new() {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "HTTP client without timeouts");
                Self(reqwest::Client::new())
            }
        }
    }

    pub fn try_new() -> reqwest::Result<Self> {
        reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map(Self)
    }
}

impl Default for BasicClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.0.execute(req).await
    }
}
