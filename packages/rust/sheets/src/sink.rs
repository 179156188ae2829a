//! [`TableSink`] backed by the Google Sheets v4 REST API.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};
use url::Url;

use caddis_shared::{ColumnFormat, Result, SyncConfig, SyncError, Table, TableSink};

use crate::api::{
    BatchUpdate, BatchUpdateResponse, Request, Spreadsheet, ValueRange, sheet_range,
};

/// User-Agent string for Sheets requests.
const USER_AGENT: &str = concat!("caddis-sync/", env!("CARGO_PKG_VERSION"));

/// Longest error body kept in a sink error message.
const ERROR_BODY_LIMIT: usize = 512;

/// Connection settings for [`SheetsSink`].
#[derive(Debug, Clone)]
pub struct SheetsSettings {
    /// API root, e.g. `https://sheets.googleapis.com`.
    pub api_base: Url,
    pub spreadsheet_id: String,
    /// OAuth 2.0 access token with the spreadsheets scope.
    pub access_token: String,
    pub request_timeout: Duration,
}

impl SheetsSettings {
    pub fn from_config(config: &SyncConfig, access_token: String) -> Self {
        Self {
            api_base: config.sheets_api_base.clone(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            access_token,
            request_timeout: config.request_timeout,
        }
    }
}

/// Writes tables into one spreadsheet, one sheet (tab) per name.
pub struct SheetsSink {
    http: Client,
    api_base: Url,
    spreadsheet_id: String,
    /// Sheet title → numeric sheet id, filled on first use.
    sheet_ids: Mutex<HashMap<String, i64>>,
}

impl SheetsSink {
    pub fn new(settings: &SheetsSettings) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", settings.access_token))
            .map_err(|e| SyncError::config(format!("Sheets access token is not a valid header: {e}")))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| SyncError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base: settings.api_base.clone(),
            spreadsheet_id: settings.spreadsheet_id.clone(),
            sheet_ids: Mutex::new(HashMap::new()),
        })
    }

    /// `{base}/v4/spreadsheets/{id}{suffix}` followed by `extra` segments.
    fn url(&self, suffix: &str, extra: &[&str]) -> Result<Url> {
        let mut url = self.api_base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                SyncError::config(format!("invalid Sheets API base: {}", self.api_base))
            })?;
            segments
                .pop_if_empty()
                .push("v4")
                .push("spreadsheets")
                .push(&format!("{}{suffix}", self.spreadsheet_id))
                .extend(extra);
        }
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, what: &str, request: RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| SyncError::Sink(format!("{what}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(SyncError::Sink(format!("{what}: HTTP {status}: {body}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SyncError::Sink(format!("{what}: body read failed: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| SyncError::Sink(format!("{what}: unexpected response: {e}")))
    }

    /// Resolve `title` to its sheet id, creating the sheet when missing.
    async fn ensure_sheet(&self, title: &str) -> Result<i64> {
        if let Some(id) = self.cached_id(title) {
            return Ok(id);
        }

        let url = self.url("", &[])?;
        let spreadsheet: Spreadsheet = self
            .send(
                "get spreadsheet",
                self.http.get(url).query(&[("fields", "sheets.properties")]),
            )
            .await?;

        let id = match spreadsheet.find(title) {
            Some(id) => {
                info!(sheet = title, "found existing sheet");
                id
            }
            None => self.add_sheet(title).await?,
        };
        self.remember(title, id);
        Ok(id)
    }

    async fn add_sheet(&self, title: &str) -> Result<i64> {
        let url = self.url(":batchUpdate", &[])?;
        let body = BatchUpdate {
            requests: vec![Request::add_sheet(title)],
        };
        let response: BatchUpdateResponse = self
            .send("add sheet", self.http.post(url).json(&body))
            .await?;

        let id = response
            .replies
            .into_iter()
            .find_map(|reply| reply.add_sheet)
            .map(|sheet| sheet.properties.sheet_id)
            .ok_or_else(|| SyncError::Sink(format!("add sheet: no sheet id returned for '{title}'")))?;
        info!(sheet = title, sheet_id = id, "created sheet");
        Ok(id)
    }

    fn cached_id(&self, title: &str) -> Option<i64> {
        self.sheet_ids.lock().ok()?.get(title).copied()
    }

    fn remember(&self, title: &str, id: i64) {
        if let Ok(mut ids) = self.sheet_ids.lock() {
            ids.insert(title.to_string(), id);
        }
    }
}

#[async_trait]
impl TableSink for SheetsSink {
    #[instrument(skip_all, fields(sheet = sheet, rows = table.row_count()))]
    async fn replace(&self, sheet: &str, table: &Table) -> Result<()> {
        self.ensure_sheet(sheet).await?;
        let range = sheet_range(sheet);

        let clear_segment = format!("{range}:clear");
        let clear_url = self.url("", &["values", clear_segment.as_str()])?;
        let _: serde_json::Value = self
            .send("clear values", self.http.post(clear_url).json(&serde_json::json!({})))
            .await?;
        debug!(sheet, "cleared sheet");

        let update_url = self.url("", &["values", range.as_str()])?;
        let body = ValueRange::from_table(range, table);
        let _: serde_json::Value = self
            .send(
                "update values",
                self.http
                    .put(update_url)
                    .query(&[("valueInputOption", "RAW")])
                    .json(&body),
            )
            .await?;

        info!(sheet, rows = body.values.len(), "updated sheet");
        Ok(())
    }

    #[instrument(skip_all, fields(sheet = sheet, formats = formats.len()))]
    async fn apply_formats(&self, sheet: &str, formats: &[ColumnFormat]) -> Result<()> {
        if formats.is_empty() {
            return Ok(());
        }
        let sheet_id = self.ensure_sheet(sheet).await?;

        let url = self.url(":batchUpdate", &[])?;
        let body = BatchUpdate {
            requests: formats
                .iter()
                .map(|format| Request::column_format(sheet_id, format))
                .collect(),
        };
        let _: BatchUpdateResponse = self
            .send("apply formats", self.http.post(url).json(&body))
            .await?;

        info!(sheet, "applied column formats");
        Ok(())
    }

    fn name(&self) -> &str {
        "google-sheets"
    }
}
