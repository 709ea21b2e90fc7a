//! Application configuration for Sidequest.
//!
//! User config lives at `~/.sidequest/sidequest.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SidequestError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sidequest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sidequest";

// ---------------------------------------------------------------------------
// Config structs (matching sidequest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Request defaults applied when the caller leaves a field out.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// OpenRouter settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Generation call policy (timeouts, retries).
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Experience cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Experience source settings.
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// City used when a request names none.
    #[serde(default = "default_city")]
    pub city: String,

    #[serde(default = "default_budget_min")]
    pub budget_min: i64,

    #[serde(default = "default_budget_max")]
    pub budget_max: i64,

    #[serde(default = "default_party_size")]
    pub party_size: u32,

    #[serde(default = "default_true")]
    pub solo_preference: bool,

    /// One of `crowded`, `relatively_niche`, `super_niche`.
    #[serde(default = "default_crowd_preference")]
    pub crowd_preference: String,

    /// Day start in `HH:MM`.
    #[serde(default = "default_start_time")]
    pub start_time: String,

    #[serde(default = "default_available_hours")]
    pub available_hours: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            city: default_city(),
            budget_min: default_budget_min(),
            budget_max: default_budget_max(),
            party_size: default_party_size(),
            solo_preference: true,
            crowd_preference: default_crowd_preference(),
            start_time: default_start_time(),
            available_hours: default_available_hours(),
        }
    }
}

fn default_city() -> String {
    "Bangalore".into()
}
fn default_budget_min() -> i64 {
    200
}
fn default_budget_max() -> i64 {
    5000
}
fn default_party_size() -> u32 {
    1
}
fn default_crowd_preference() -> String {
    "relatively_niche".into()
}
fn default_start_time() -> String {
    "10:00".into()
}
fn default_available_hours() -> f64 {
    8.0
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for every stage.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// API root; the chat completions path is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            base_url: default_base_url(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "google/gemini-2.0-flash-001".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Upper bound on a single stage's generation call.
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,

    /// Attempts made for retryable failures (rate limits, network).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay; doubles on every retry.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: default_stage_timeout(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay(),
        }
    }
}

fn default_stage_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_delay() -> u64 {
    1000
}

/// `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Cities re-fetched by the background refresh worker.
    #[serde(default = "default_refresh_cities")]
    pub refresh_cities: Vec<String>,

    /// How long `stop` waits for the refresh worker to exit.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,

    /// Start the refresh worker when the cache is built.
    #[serde(default)]
    pub auto_refresh: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            refresh_interval_secs: default_refresh_interval(),
            refresh_cities: default_refresh_cities(),
            stop_timeout_secs: default_stop_timeout(),
            auto_refresh: false,
        }
    }
}

fn default_ttl() -> u64 {
    10 * 60
}
fn default_refresh_interval() -> u64 {
    10 * 60
}
fn default_refresh_cities() -> Vec<String> {
    vec![default_city()]
}
fn default_stop_timeout() -> u64 {
    5
}

/// `[sources]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Per-request HTTP timeout for live sources.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub reddit_enabled: bool,

    #[serde(default = "default_reddit_base_url")]
    pub reddit_base_url: String,

    #[serde(default = "default_subreddits")]
    pub subreddits: Vec<String>,

    /// Posts requested per subreddit search.
    #[serde(default = "default_reddit_limit")]
    pub reddit_limit: usize,

    /// Below this many scraped guide items the curated list is appended.
    #[serde(default = "default_guide_min_items")]
    pub guide_min_items: usize,

    /// Travel guide pages to scrape.
    #[serde(default = "default_guides")]
    pub guides: Vec<GuidePage>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            reddit_enabled: true,
            reddit_base_url: default_reddit_base_url(),
            subreddits: default_subreddits(),
            reddit_limit: default_reddit_limit(),
            guide_min_items: default_guide_min_items(),
            guides: default_guides(),
        }
    }
}

/// `[[sources.guides]]` entry: one scrapeable travel guide page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuidePage {
    /// Display name; its snake_case form becomes the source name.
    pub name: String,
    pub url: String,
    /// CSS selector matching one listing card.
    pub selector: String,
}

fn default_true() -> bool {
    true
}
fn default_request_timeout() -> u64 {
    10
}
fn default_reddit_base_url() -> String {
    "https://www.reddit.com".into()
}
fn default_subreddits() -> Vec<String> {
    vec!["bangalore".into()]
}
fn default_reddit_limit() -> usize {
    5
}
fn default_guide_min_items() -> usize {
    5
}
fn default_guides() -> Vec<GuidePage> {
    vec![
        GuidePage {
            name: "Karnataka Tourism".into(),
            url: "https://www.karnatakatourism.org/destinations/bengaluru/".into(),
            selector: ".destination-card, .attraction-item, article".into(),
        },
        GuidePage {
            name: "Thrillophilia Bangalore".into(),
            url: "https://www.thrillophilia.com/cities/bangalore/things-to-do".into(),
            selector: ".activity-card, .tour-card".into(),
        },
    ]
}

// ---------------------------------------------------------------------------
// Runtime options (derived from config)
// ---------------------------------------------------------------------------

/// Runtime pipeline options: merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Bound applied to every stage's generation call.
    pub stage_timeout: Duration,
    /// Max candidate listings handed to Discovery from the cache.
    pub max_candidates: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_secs(default_stage_timeout()),
            max_candidates: 15,
        }
    }
}

impl From<&AppConfig> for PipelineOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            stage_timeout: Duration::from_secs(config.generation.stage_timeout_secs),
            ..Self::default()
        }
    }
}

/// Runtime cache options.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub ttl: Duration,
    pub refresh_interval: Duration,
    pub refresh_cities: Vec<String>,
    pub stop_timeout: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

impl From<&CacheConfig> for CacheOptions {
    fn from(config: &CacheConfig) -> Self {
        Self {
            ttl: Duration::from_secs(config.ttl_secs),
            refresh_interval: Duration::from_secs(config.refresh_interval_secs),
            refresh_cities: config.refresh_cities.clone(),
            stop_timeout: Duration::from_secs(config.stop_timeout_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sidequest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SidequestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sidequest/sidequest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SidequestError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        SidequestError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SidequestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SidequestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SidequestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the OpenRouter API key from the env var named in the config.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.openrouter.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(SidequestError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}
