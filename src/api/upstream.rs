use std::time::Duration;

use reqwest::{
    Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::api::envelope::Envelope;
use crate::config::UpstreamConfig;
use crate::error::RelayError;

pub const CUSTOM_KEY_HEADER: &str = "X-Custom-Key";

/// Optional per-call additions to an upstream request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub auth_token: Option<String>,
    pub custom_key: Option<String>,
}

impl RequestOptions {
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn custom_key(mut self, key: impl Into<String>) -> Self {
        self.custom_key = Some(key.into());
        self
    }
}

/// HTTP client for the third-party JSON API.
///
/// Never fails: transport errors, non-2xx statuses and undecodable bodies are
/// all folded into the returned [`Envelope`].
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: Url,
}

impl UpstreamClient {
    pub fn new(cfg: &UpstreamConfig) -> Result<Self, RelayError> {
        let mut builder =
            reqwest::Client::builder().user_agent(concat!("relay-nexus/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = cfg.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build()?;
        Ok(Self::with_client(http, cfg.base_url.clone()))
    }

    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn get(&self, path: &str, options: RequestOptions) -> Envelope {
        self.send(Method::GET, path, None, options).await
    }

    pub async fn post(&self, path: &str, body: &Value, options: RequestOptions) -> Envelope {
        self.send(Method::POST, path, Some(body), options).await
    }

    /// Append `path` to the base URL, keeping any path prefix the base carries.
    pub fn url_for(&self, path: &str) -> Result<Url, url::ParseError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{base}/{path}"))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        options: RequestOptions,
    ) -> Envelope {
        let url = match self.url_for(path) {
            Ok(url) => url,
            Err(e) => return Envelope::error(500, format!("Invalid upstream url: {e}")),
        };
        debug!(method = %method, url = %url, "upstream request");

        let mut request = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, "application/json");
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        if let Some(token) = options.auth_token.as_deref().filter(|t| !t.is_empty()) {
            request = request.header(AUTHORIZATION, format!("Bearer: {token}"));
        }
        if let Some(key) = options.custom_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.header(CUSTOM_KEY_HEADER, key);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let resp = match request.send().await {
            Ok(resp) => resp,
            Err(e) => return Envelope::error(500, format!("Upstream request failed: {e}")),
        };

        let status = resp.status();
        let resp = match resp.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                debug!(status = status.as_u16(), "upstream returned error status");
                return Envelope::error(status.as_u16(), e.to_string());
            }
        };

        let bytes = match resp.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return not_json(e),
        };
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(data) => Envelope::ok(data),
            Err(e) => not_json(e),
        }
    }
}

fn not_json(cause: impl std::fmt::Display) -> Envelope {
    Envelope::error(500, format!("Response is not JSON convertible: {cause}"))
}

/// Percent-encode a value for use as a single URL path segment.
pub fn encode_path_segment(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> UpstreamClient {
        UpstreamClient::with_client(reqwest::Client::new(), Url::parse(base).unwrap())
    }

    #[test]
    fn url_for_keeps_base_path_prefix() {
        let c = client("http://example.com/api/v1/");
        assert_eq!(
            c.url_for("/json").unwrap().as_str(),
            "http://example.com/api/v1/json"
        );
        let c = client("http://example.com");
        assert_eq!(c.url_for("delay/3").unwrap().as_str(), "http://example.com/delay/3");
    }

    #[test]
    fn path_segments_are_encoded() {
        assert_eq!(encode_path_segment("3"), "3");
        assert_eq!(encode_path_segment("a b/c?d"), "a%20b%2Fc%3Fd");
        assert_eq!(encode_path_segment("1+1"), "1%2B1");
    }
}
