use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::Rng;
use rand::distributions::Alphanumeric;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Method, Url};
use sha1::Sha1;
use std::fmt;

/// Everything except RFC 3986 unreserved characters is escaped.
const RFC3986: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn encode(s: &str) -> String {
    utf8_percent_encode(s, RFC3986).to_string()
}

/// Consumer and access-token pairs for OAuth 1.0a user-context requests.
#[derive(Clone)]
pub struct OAuth1Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: String,
    pub token_secret: String,
}

impl fmt::Debug for OAuth1Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth1Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("token", &"<redacted>")
            .field("token_secret", &"<redacted>")
            .finish()
    }
}

impl OAuth1Credentials {
    /// `Authorization` header value for a request, HMAC-SHA1 signed.
    ///
    /// Query parameters of `url` take part in the signature; request bodies
    /// (JSON or multipart) do not.
    pub fn authorization(&self, method: &Method, url: &Url, nonce: &str, timestamp: i64) -> String {
        let timestamp = timestamp.to_string();
        let mut oauth = vec![
            ("oauth_consumer_key", self.consumer_key.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", timestamp.as_str()),
            ("oauth_token", self.token.as_str()),
            ("oauth_version", "1.0"),
        ];
        let signature = self.signature(method, url, &oauth);
        oauth.push(("oauth_signature", signature.as_str()));
        oauth.sort();

        let fields = oauth
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("OAuth {fields}")
    }

    fn signature(&self, method: &Method, url: &Url, oauth: &[(&str, &str)]) -> String {
        let base = signature_base(method, url, oauth);
        let key = format!(
            "{}&{}",
            encode(&self.consumer_secret),
            encode(&self.token_secret)
        );

        let mut mac =
            Hmac::<Sha1>::new_from_slice(key.as_bytes()).expect("OAuth1: HMAC takes any key length");
        mac.update(base.as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }
}

/// `METHOD&base-url&sorted-params`, each part percent-encoded.
fn signature_base(method: &Method, url: &Url, oauth: &[(&str, &str)]) -> String {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (encode(&k), encode(&v)))
        .collect();
    params.extend(oauth.iter().map(|(k, v)| (encode(k), encode(v))));
    params.sort();

    let param_string = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut base_url = url.clone();
    base_url.set_query(None);
    base_url.set_fragment(None);

    format!(
        "{}&{}&{}",
        method.as_str().to_ascii_uppercase(),
        encode(base_url.as_str()),
        encode(&param_string)
    )
}

/// An [`HttpClient`] wrapper that signs every request with OAuth 1.0a.
pub struct OAuth1<C> {
    pub inner: C,
    pub credentials: OAuth1Credentials,
}

impl<C> OAuth1<C> {
    pub fn new(inner: C, credentials: OAuth1Credentials) -> Self {
        Self { inner, credentials }
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for OAuth1<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let header =
            self.credentials
                .authorization(req.method(), req.url(), &nonce, Utc::now().timestamp());
        req.headers_mut().insert(
            AUTHORIZATION,
            HeaderValue::from_str(&header).expect("OAuth1: header is percent-encoded ASCII"),
        );
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference request from the X developer documentation on signing requests.
    fn credentials() -> OAuth1Credentials {
        OAuth1Credentials {
            consumer_key: "xvz1evFS4wEEPTGEFPHBog".to_string(),
            consumer_secret: "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw".to_string(),
            token: "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb".to_string(),
            token_secret: "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE".to_string(),
        }
    }

    fn reference_url() -> Url {
        let mut url = Url::parse("https://api.twitter.com/1.1/statuses/update.json").unwrap();
        url.query_pairs_mut()
            .append_pair("include_entities", "true")
            .append_pair("status", "Hello Ladies + Gentlemen, a signed OAuth request!");
        url
    }

    const NONCE: &str = "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg";
    const TIMESTAMP: &str = "1318622958";

    fn reference_oauth(creds: &OAuth1Credentials) -> Vec<(&str, &str)> {
        vec![
            ("oauth_consumer_key", creds.consumer_key.as_str()),
            ("oauth_nonce", NONCE),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", TIMESTAMP),
            ("oauth_token", creds.token.as_str()),
            ("oauth_version", "1.0"),
        ]
    }

    #[test]
    fn test_encode_reserved_characters() {
        assert_eq!(encode("Ladies + Gentlemen"), "Ladies%20%2B%20Gentlemen");
        assert_eq!(encode("a-b.c_d~e"), "a-b.c_d~e");
        assert_eq!(encode("!"), "%21");
    }

    #[test]
    fn test_signature_base_string() {
        let creds = credentials();
        let base = signature_base(&Method::POST, &reference_url(), &reference_oauth(&creds));

        assert_eq!(
            base,
            "POST&https%3A%2F%2Fapi.twitter.com%2F1.1%2Fstatuses%2Fupdate.json&include_entities%3Dtrue%26oauth_consumer_key%3Dxvz1evFS4wEEPTGEFPHBog%26oauth_nonce%3DkYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg%26oauth_signature_method%3DHMAC-SHA1%26oauth_timestamp%3D1318622958%26oauth_token%3D370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb%26oauth_version%3D1.0%26status%3DHello%2520Ladies%2520%252B%2520Gentlemen%252C%2520a%2520signed%2520OAuth%2520request%2521"
        );
    }

    #[test]
    fn test_reference_signature() {
        let creds = credentials();
        let signature = creds.signature(&Method::POST, &reference_url(), &reference_oauth(&creds));

        assert_eq!(signature, "hCtSmYh+iHYCEqBWrE7C7hYmtUk=");
    }

    #[test]
    fn test_authorization_header_fields() {
        let creds = credentials();
        let header = creds.authorization(
            &Method::POST,
            &reference_url(),
            NONCE,
            TIMESTAMP.parse().unwrap(),
        );

        assert!(header.starts_with("OAuth oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\""));
        assert!(header.contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\""));
        assert!(header.contains("oauth_version=\"1.0\""));
        assert!(!header.contains("include_entities"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", credentials());
        assert!(!rendered.contains("kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw"));
        assert!(rendered.contains("<redacted>"));
    }
}
