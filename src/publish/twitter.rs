use std::fmt::Display;
use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::Publisher;
use crate::error::{PipelineError, Result};
use crate::fetch::auth::{OAuth1, OAuth1Credentials};
use crate::fetch::{BasicClient, HttpClient};

pub const MEDIA_UPLOAD_URL: &str = "https://upload.twitter.com/1.1/media/upload.json";
pub const CREATE_POST_URL: &str = "https://api.twitter.com/2/tweets";

#[derive(Debug, Deserialize)]
struct MediaUpload {
    media_id_string: String,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    data: CreatedPostData,
}

#[derive(Debug, Deserialize)]
struct CreatedPostData {
    id: String,
}

fn publish_err(stage: &str, e: impl Display) -> PipelineError {
    PipelineError::Publish(format!("{stage}: {e}"))
}

/// Posts to X with user-context OAuth 1.0a: the image goes through the
/// v1.1 media upload, the message through the v2 create-post endpoint.
pub struct TwitterPublisher<C> {
    client: OAuth1<C>,
    builder: reqwest::Client,
    media_url: String,
    post_url: String,
}

impl TwitterPublisher<BasicClient> {
    pub fn from_credentials(credentials: OAuth1Credentials) -> Self {
        Self::new(BasicClient::new(), credentials)
    }
}

impl<C: HttpClient> TwitterPublisher<C> {
    pub fn new(inner: C, credentials: OAuth1Credentials) -> Self {
        Self {
            client: OAuth1::new(inner, credentials),
            builder: reqwest::Client::new(),
            media_url: MEDIA_UPLOAD_URL.to_string(),
            post_url: CREATE_POST_URL.to_string(),
        }
    }

    pub fn with_endpoints(mut self, media_url: &str, post_url: &str) -> Self {
        self.media_url = media_url.to_string();
        self.post_url = post_url.to_string();
        self
    }

    async fn upload_media(&self, image: &Path) -> Result<String> {
        let bytes = tokio::fs::read(image).await?;
        let file_name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "gauge.png".to_string());
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/png")
            .map_err(|e| publish_err("media upload", e))?;

        let req = self
            .builder
            .post(&self.media_url)
            .multipart(Form::new().part("media", part))
            .build()
            .map_err(|e| publish_err("media upload", e))?;

        let upload: MediaUpload = self
            .client
            .execute(req)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| publish_err("media upload", e))?
            .json()
            .await
            .map_err(|e| publish_err("media upload", e))?;
        Ok(upload.media_id_string)
    }

    async fn create_post(&self, text: &str, media_id: &str) -> Result<String> {
        let req = self
            .builder
            .post(&self.post_url)
            .json(&json!({
                "text": text,
                "media": { "media_ids": [media_id] },
            }))
            .build()
            .map_err(|e| publish_err("create post", e))?;

        let created: CreatedPost = self
            .client
            .execute(req)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| publish_err("create post", e))?
            .json()
            .await
            .map_err(|e| publish_err("create post", e))?;
        Ok(created.data.id)
    }
}

#[async_trait]
impl<C: HttpClient> Publisher for TwitterPublisher<C> {
    #[tracing::instrument(skip(self, image), fields(image = %image.display()))]
    async fn publish(&self, text: &str, image: &Path) -> Result<()> {
        let media_id = self.upload_media(image).await?;
        let post_id = self.create_post(text, &media_id).await?;
        info!(%media_id, %post_id, "Post published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
    use reqwest::{Method, Request, Response};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    struct Seen {
        method: Method,
        url: String,
        authorization: Option<String>,
        content_type: Option<String>,
    }

    struct MockClient {
        responses: Mutex<VecDeque<(u16, &'static str)>>,
        seen: Arc<Mutex<Vec<Seen>>>,
    }

    impl MockClient {
        fn new(responses: &[(u16, &'static str)]) -> (Self, Arc<Mutex<Vec<Seen>>>) {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let client = Self {
                responses: Mutex::new(responses.iter().copied().collect()),
                seen: seen.clone(),
            };
            (client, seen)
        }
    }

    #[async_trait]
    impl HttpClient for MockClient {
        async fn execute(&self, req: Request) -> reqwest::Result<Response> {
            let header = |name| {
                req.headers()
                    .get(name)
                    .and_then(|v: &reqwest::header::HeaderValue| v.to_str().ok())
                    .map(str::to_string)
            };
            self.seen.lock().unwrap().push(Seen {
                method: req.method().clone(),
                url: req.url().to_string(),
                authorization: header(AUTHORIZATION),
                content_type: header(CONTENT_TYPE),
            });

            let (status, body) = self.responses.lock().unwrap().pop_front().unwrap();
            let resp = axum::http::Response::builder()
                .status(status)
                .body(body.to_string())
                .unwrap();
            Ok(Response::from(resp))
        }
    }

    fn credentials() -> OAuth1Credentials {
        OAuth1Credentials {
            consumer_key: "ck".to_string(),
            consumer_secret: "cs".to_string(),
            token: "t".to_string(),
            token_secret: "ts".to_string(),
        }
    }

    fn image() -> std::path::PathBuf {
        let path = std::env::temp_dir().join("aus_tsa_forecast_publish_test.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();
        path
    }

    #[tokio::test]
    async fn test_upload_then_post() {
        let (client, seen) = MockClient::new(&[
            (200, r#"{"media_id": 42, "media_id_string": "42"}"#),
            (201, r#"{"data": {"id": "1001", "text": "hello"}}"#),
        ]);
        let publisher = TwitterPublisher::new(client, credentials());

        publisher.publish("hello", &image()).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].method, Method::POST);
        assert_eq!(seen[0].url, MEDIA_UPLOAD_URL);
        assert!(
            seen[0]
                .content_type
                .as_deref()
                .is_some_and(|c| c.starts_with("multipart/form-data"))
        );
        assert_eq!(seen[1].url, CREATE_POST_URL);
        assert_eq!(seen[1].content_type.as_deref(), Some("application/json"));
        assert!(
            seen.iter()
                .all(|s| s.authorization.as_deref().is_some_and(|a| a.starts_with("OAuth ")))
        );
    }

    #[tokio::test]
    async fn test_custom_endpoints() {
        let (client, seen) = MockClient::new(&[
            (200, r#"{"media_id_string": "7"}"#),
            (201, r#"{"data": {"id": "8"}}"#),
        ]);
        let publisher = TwitterPublisher::new(client, credentials())
            .with_endpoints("http://localhost:9000/upload", "http://localhost:9000/posts");

        publisher.publish("hello", &image()).await.unwrap();

        let urls: Vec<String> = seen.lock().unwrap().iter().map(|s| s.url.clone()).collect();
        assert_eq!(urls, ["http://localhost:9000/upload", "http://localhost:9000/posts"]);
    }

    #[tokio::test]
    async fn test_rejected_upload_stops_before_posting() {
        let (client, seen) = MockClient::new(&[(403, r#"{"errors": []}"#)]);
        let publisher = TwitterPublisher::new(client, credentials());

        let result = publisher.publish("hello", &image()).await;

        assert!(matches!(result, Err(PipelineError::Publish(ref m)) if m.starts_with("media upload")));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_image_fails() {
        let (client, seen) = MockClient::new(&[]);
        let publisher = TwitterPublisher::new(client, credentials());

        let result = publisher
            .publish("hello", Path::new("/nonexistent/aus_tsa_gauge.png"))
            .await;

        assert!(matches!(result, Err(PipelineError::Io(_))));
        assert!(seen.lock().unwrap().is_empty());
    }
}
