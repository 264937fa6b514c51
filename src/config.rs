use chrono::Duration;
use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use url::Url;

/// Runtime configuration, built once at startup and shared by reference.
///
/// Sources, lowest priority first:
/// - built-in defaults ([`Config::default`])
/// - `RELAY_*` environment variables, nested keys separated by `__`
///   (e.g. `RELAY_UPSTREAM__BASE_URL`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub listen_addr: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub loglevel: String,
    pub access_token_ttl_secs: i64,
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: Url,
    /// Request timeout; unset keeps the transport default.
    pub timeout_secs: Option<u64>,
    pub routes: UpstreamRoutes,
}

/// Upstream path suffixes, joined onto `base_url` per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamRoutes {
    pub simple_get: String,
    pub auth_get: String,
    pub params_get: String,
    /// Must contain a `{uri}` placeholder.
    pub dynamic_url_get: String,
    pub saved_get: String,
    pub updated_get: String,
    pub simple_post: String,
    pub auth_post: String,
    pub refresh_token: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            database_url: "sqlite:relay.db".to_string(),
            database_max_connections: 5,
            loglevel: "info".to_string(),
            access_token_ttl_secs: 120,
            upstream: UpstreamConfig::default(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://httpbin.org").expect("static default url is valid"),
            timeout_secs: None,
            routes: UpstreamRoutes::default(),
        }
    }
}

impl Default for UpstreamRoutes {
    fn default() -> Self {
        Self {
            simple_get: "/json".to_string(),
            auth_get: "/json".to_string(),
            params_get: "/json".to_string(),
            dynamic_url_get: "/delay/{uri}".to_string(),
            saved_get: "/json".to_string(),
            updated_get: "/json".to_string(),
            simple_post: "/post".to_string(),
            auth_post: "/post".to_string(),
            refresh_token: "/refresh".to_string(),
        }
    }
}

impl Config {
    /// Merge defaults with the process environment.
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed("RELAY_").split("__"))
    }

    pub fn access_token_ttl(&self) -> Duration {
        Duration::seconds(self.access_token_ttl_secs)
    }
}

/// Fixed status code to message table used for envelope details.
pub fn status_message(code: u16) -> &'static str {
    match code {
        200 => "Ok",
        400 => "Bad request",
        401 => "Unauthorized",
        404 => "Not found",
        500 => "Internal Server Error",
        _ => "Something went wrong",
    }
}
