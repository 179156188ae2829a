//! Authenticated HTTP client for the source API.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument};
use url::Url;

use caddis_shared::{Result, SyncConfig, SyncError};

use crate::auth::TokenExtractor;

/// User-Agent string for source requests.
const USER_AGENT: &str = concat!("caddis-sync/", env!("CARGO_PKG_VERSION"));

/// Login endpoint, relative to the base URL.
const LOGIN_PATH: &str = "v1/login";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Connection settings for [`SourceClient`].
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub base_url: Url,
    pub request_timeout: Duration,
    /// Minimum spacing between consecutive requests.
    pub page_delay: Duration,
}

impl From<&SyncConfig> for SourceSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            request_timeout: config.request_timeout,
            page_delay: config.page_delay,
        }
    }
}

// ---------------------------------------------------------------------------
// Pacing
// ---------------------------------------------------------------------------

/// Keeps consecutive requests at least `delay` apart.
#[derive(Debug)]
struct Pacer {
    delay: Duration,
    last: Mutex<Option<Instant>>,
}

impl Pacer {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            last: Mutex::new(None),
        }
    }

    async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.delay {
                tokio::time::sleep(self.delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

// ---------------------------------------------------------------------------
// SourceClient
// ---------------------------------------------------------------------------

/// Outcome of a page request.
#[derive(Debug)]
pub enum Fetched<T> {
    /// HTTP 404: the canonical exhaustion signal.
    NotFound,
    Body(T),
}

/// Bearer-authenticated client for the source API.
///
/// Requests are issued one at a time; all of them go through one pacer.
#[derive(Debug)]
pub struct SourceClient {
    http: Client,
    base_url: Url,
    pacer: Pacer,
}

impl SourceClient {
    /// Log in with `username`/`password` and return an authenticated client.
    #[instrument(skip_all, fields(base_url = %settings.base_url))]
    pub async fn login(settings: &SourceSettings, username: &str, password: &str) -> Result<Self> {
        let anonymous = build_http(settings, None)?;
        let pacer = Pacer::new(settings.page_delay);
        let url = join_endpoint(&settings.base_url, LOGIN_PATH)?;

        info!("authenticating with source API");
        pacer.wait().await;
        let response = anonymous
            .post(url.clone())
            .json(&serde_json::json!({ "usuario": username, "password": password }))
            .send()
            .await
            .map_err(|e| SyncError::Authentication(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Authentication(format!("{url}: HTTP {status}")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SyncError::Authentication(format!("{url}: unreadable response: {e}")))?;
        let token = TokenExtractor::new().extract(&body)?;

        info!("authenticated with source API");
        Ok(Self {
            http: build_http(settings, Some(&token))?,
            base_url: settings.base_url.clone(),
            pacer,
        })
    }

    /// Build a client around an already-issued token.
    pub fn with_token(settings: &SourceSettings, token: &str) -> Result<Self> {
        Ok(Self {
            http: build_http(settings, Some(token))?,
            base_url: settings.base_url.clone(),
            pacer: Pacer::new(settings.page_delay),
        })
    }

    /// Resolve an endpoint path and append query parameters.
    pub(crate) fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let mut url = join_endpoint(&self.base_url, path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// GET `url` and decode its JSON body; a 404 maps to [`Fetched::NotFound`].
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Fetched<T>> {
        self.pacer.wait().await;
        debug!(%url, "GET");

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Fetched::NotFound);
        }
        if !status.is_success() {
            return Err(SyncError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SyncError::Network(format!("{url}: body read failed: {e}")))?;

        serde_json::from_slice(&bytes)
            .map(Fetched::Body)
            .map_err(|e| SyncError::payload(format!("{url}: {e}")))
    }
}

/// Build a reqwest client with appropriate settings.
fn build_http(settings: &SourceSettings, token: Option<&str>) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(token) = token {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| SyncError::Authentication(format!("token is not a valid header: {e}")))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(settings.request_timeout)
        .build()
        .map_err(|e| SyncError::Network(format!("failed to build HTTP client: {e}")))
}

/// Join `path` under `base`, treating `base` as a directory.
fn join_endpoint(base: &Url, path: &str) -> Result<Url> {
    let mut dir = base.clone();
    if !dir.path().ends_with('/') {
        let with_slash = format!("{}/", dir.path());
        dir.set_path(&with_slash);
    }
    dir.join(path)
        .map_err(|e| SyncError::config(format!("invalid endpoint {path}: {e}")))
}
