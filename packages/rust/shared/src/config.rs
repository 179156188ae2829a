//! Application configuration for caddis-sync.
//!
//! Config is read from `--config <path>`, else `./caddis-sync.toml`, else
//! `~/.caddis-sync/caddis-sync.toml`. Environment variables override file
//! values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SyncError};
use crate::types::{PRICE_LISTS, PriceListId, all_price_list_ids};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "caddis-sync.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".caddis-sync";

// ---------------------------------------------------------------------------
// Config structs (matching caddis-sync.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Source API settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Destination spreadsheet settings.
    #[serde(default)]
    pub sheets: SheetsConfig,

    /// Extraction policies.
    #[serde(default)]
    pub sync: SyncPoliciesConfig,
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the source API, e.g. `https://api.caddis.com.ar`.
    #[serde(default)]
    pub base_url: String,

    /// Login user.
    #[serde(default)]
    pub username: String,

    /// Login password. Prefer `CADDIS_PASSWORD` over storing it here.
    #[serde(default)]
    pub password: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}

/// `[sheets]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    /// Target spreadsheet id.
    #[serde(default)]
    pub spreadsheet_id: String,

    /// Worksheet title that receives the table.
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,

    /// Name of the env var holding the OAuth access token (never store the token itself).
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,

    /// Sheets API root.
    #[serde(default = "default_sheets_api")]
    pub api_base_url: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            sheet_name: default_sheet_name(),
            access_token_env: default_access_token_env(),
            api_base_url: default_sheets_api(),
        }
    }
}

fn default_sheet_name() -> String {
    "Caddis Data".into()
}
fn default_access_token_env() -> String {
    "GOOGLE_OAUTH_ACCESS_TOKEN".into()
}
fn default_sheets_api() -> String {
    "https://sheets.googleapis.com".into()
}

/// `[sync]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPoliciesConfig {
    /// Price lists to fetch. Ids must belong to the published catalog.
    #[serde(default = "default_price_lists")]
    pub price_lists: Vec<u32>,

    /// Minimum ms between consecutive source requests.
    #[serde(default = "default_page_delay")]
    pub page_delay_ms: u64,
}

impl Default for SyncPoliciesConfig {
    fn default() -> Self {
        Self {
            price_lists: default_price_lists(),
            page_delay_ms: default_page_delay(),
        }
    }
}

fn default_price_lists() -> Vec<u32> {
    PRICE_LISTS.iter().map(|l| u32::from(l.id.get())).collect()
}
fn default_page_delay() -> u64 {
    500
}

impl AppConfig {
    /// Apply environment overrides using `lookup` (only set, non-empty values win).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("CADDIS_API_URL") {
            self.source.base_url = v;
        }
        if let Some(v) = get("CADDIS_USERNAME") {
            self.source.username = v;
        }
        if let Some(v) = get("CADDIS_PASSWORD") {
            self.source.password = v;
        }
        if let Some(v) = get("GOOGLE_SHEETS_ID") {
            self.sheets.spreadsheet_id = v;
        }
        if let Some(v) = get("PRICE_LISTS") {
            self.sync.price_lists = parse_price_list_csv(&v);
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_process_env(&mut self) {
        self.apply_env_overrides(|key| std::env::var(key).ok());
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.source.password.is_empty() {
            copy.source.password = "********".into();
        }
        copy
    }
}

/// Parse `"1, 2,x,33"` into `[1, 2, 33]`; non-numeric items are ignored.
fn parse_price_list_csv(raw: &str) -> Vec<u32> {
    raw.split(',')
        .map(str::trim)
        .filter_map(|item| item.parse::<u32>().ok())
        .collect()
}

// ---------------------------------------------------------------------------
// Sync config (runtime, validated)
// ---------------------------------------------------------------------------

/// Runtime configuration, validated from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub base_url: Url,
    pub username: String,
    pub password: String,
    pub request_timeout: Duration,
    pub page_delay: Duration,
    /// Lists to fetch, in catalog order, without duplicates.
    pub price_lists: Vec<PriceListId>,
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub sheets_api_base: Url,
    pub access_token_env: String,
}

impl SyncConfig {
    /// Validate an [`AppConfig`]. Fails before any network activity.
    pub fn from_app_config(config: &AppConfig) -> Result<Self> {
        let base_url = parse_http_url("source.base_url", &config.source.base_url)?;
        let username = required("source.username", &config.source.username)?;
        let password = required("source.password", &config.source.password)?;
        let spreadsheet_id = required("sheets.spreadsheet_id", &config.sheets.spreadsheet_id)?;
        let sheet_name = required("sheets.sheet_name", &config.sheets.sheet_name)?;
        let sheets_api_base = parse_http_url("sheets.api_base_url", &config.sheets.api_base_url)?;

        if config.source.request_timeout_secs == 0 {
            return Err(SyncError::config(
                "source.request_timeout_secs must be greater than zero",
            ));
        }

        Ok(Self {
            base_url,
            username,
            password,
            request_timeout: Duration::from_secs(config.source.request_timeout_secs),
            page_delay: Duration::from_millis(config.sync.page_delay_ms),
            price_lists: resolve_price_lists(&config.sync.price_lists)?,
            spreadsheet_id,
            sheet_name,
            sheets_api_base,
            access_token_env: config.sheets.access_token_env.clone(),
        })
    }

    /// Read the Sheets OAuth access token from the process environment.
    pub fn sheets_access_token(&self) -> Result<String> {
        self.sheets_access_token_with(|key| std::env::var(key).ok())
    }

    /// Read the Sheets OAuth access token through `lookup`.
    pub fn sheets_access_token_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<String> {
        let var_name = &self.access_token_env;
        match lookup(var_name) {
            Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            _ => Err(SyncError::config(format!(
                "Google Sheets access token not found. Set the {var_name} environment variable.\n\
                 For example: export {var_name}=$(gcloud auth print-access-token)"
            ))),
        }
    }
}

fn required(key: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SyncError::config(format!("missing required setting: {key}")));
    }
    Ok(trimmed.to_string())
}

fn parse_http_url(key: &str, value: &str) -> Result<Url> {
    let raw = required(key, value)?;
    let url = Url::parse(&raw).map_err(|e| SyncError::config(format!("{key}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SyncError::config(format!(
            "{key}: unsupported scheme '{other}', expected http or https"
        ))),
    }
}

/// Map configured ids onto the catalog. Empty selects every list.
fn resolve_price_lists(raw: &[u32]) -> Result<Vec<PriceListId>> {
    if raw.is_empty() {
        return Ok(all_price_list_ids());
    }

    let mut selected = Vec::with_capacity(raw.len());
    for &id in raw {
        let list = PriceListId::lookup(id).ok_or_else(|| {
            SyncError::config(format!("sync.price_lists: unknown price list id {id}"))
        })?;
        if !selected.contains(&list) {
            selected.push(list);
        }
    }
    selected.sort_by_key(|id| PRICE_LISTS.iter().position(|l| l.id == *id));
    Ok(selected)
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.caddis-sync/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| SyncError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.caddis-sync/caddis-sync.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config and apply environment overrides.
///
/// An explicit path must exist. Otherwise `./caddis-sync.toml` then the home
/// config are tried, and defaults are used if neither exists.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let mut config = match explicit {
        Some(path) => load_config_from(path)?,
        None => {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            let home = config_file_path().ok();
            match [Some(local), home].into_iter().flatten().find(|p| p.exists()) {
                Some(path) => load_config_from(&path)?,
                None => {
                    tracing::info!("config file not found, using defaults and environment");
                    AppConfig::default()
                }
            }
        }
    };

    config.apply_process_env();
    Ok(config)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SyncError::io(path, e))?;

    let config = toml::from_str(&content)
        .map_err(|e| SyncError::config(format!("failed to parse {}: {e}", path.display())))?;
    tracing::info!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Write a default config file to `path` (or the home config path).
/// Returns the path to the created file.
pub fn init_config(path: Option<&Path>) -> Result<PathBuf> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| SyncError::io(dir, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| SyncError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SyncError::io(&path, e))?;
    tracing::info!(path = %path.display(), "created default config file");

    Ok(path)
}
