//! Application configuration for Prospector.
//!
//! User config lives at `~/.prospector/prospector.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets are never stored in the file: the file only names the environment
//! variables that hold them, and [`resolve_secrets`] reads those at start-up.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ProspectorError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "prospector.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".prospector";

// ---------------------------------------------------------------------------
// Config structs (matching prospector.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chat-completion endpoint settings.
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Homepage fetch settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Remote sheet settings.
    #[serde(default)]
    pub sheet: SheetConfig,

    /// Batch run settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// `[completion]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// OpenAI-compatible API root.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used for every stage.
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum number of attempts per prompt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Constant pause between attempts.
    #[serde(default = "default_backoff_seconds")]
    pub backoff_seconds: f64,

    /// Per-request timeout.
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            model: default_model(),
            max_retries: default_max_retries(),
            backoff_seconds: default_backoff_seconds(),
            timeout_secs: default_completion_timeout(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_max_retries() -> u32 {
    15
}
fn default_backoff_seconds() -> f64 {
    2.0
}
fn default_completion_timeout() -> u64 {
    60
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Request timeout for a single homepage fetch.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// User-Agent header sent with homepage requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_fetch_timeout() -> u64 {
    10
}
fn default_user_agent() -> String {
    concat!("Prospector/", env!("CARGO_PKG_VERSION")).into()
}

/// `[sheet]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetConfig {
    /// Name of the env var holding the sheet endpoint URL.
    #[serde(default = "default_endpoint_env")]
    pub endpoint_env: String,

    /// Name of the array field in the sheet payload.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Column holding the company website.
    #[serde(default = "default_url_column")]
    pub url_column: String,

    /// Rows per PUT request when pushing content back.
    #[serde(default = "default_update_batch_size")]
    pub update_batch_size: usize,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            endpoint_env: default_endpoint_env(),
            collection: default_collection(),
            url_column: default_url_column(),
            update_batch_size: default_update_batch_size(),
        }
    }
}

fn default_endpoint_env() -> String {
    "SHEETY_API".into()
}
fn default_collection() -> String {
    "targetCompanyData".into()
}
fn default_url_column() -> String {
    "companywebsite".into()
}
fn default_update_batch_size() -> usize {
    10
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Where the enriched CSV is written.
    #[serde(default = "default_output_path")]
    pub output_path: String,

    /// Records processed at once. 1 keeps the run strictly sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// What to do when a stage exhausts its retries.
    #[serde(default)]
    pub on_exhausted: ExhaustedPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            concurrency: default_concurrency(),
            on_exhausted: ExhaustedPolicy::default(),
        }
    }
}

fn default_output_path() -> String {
    "./data/output.csv".into()
}
fn default_concurrency() -> usize {
    1
}

/// Reaction to a completion stage that never produced content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustedPolicy {
    /// Keep the stages completed so far, mark the rest unresolved, continue.
    #[default]
    Isolate,
    /// Stop the whole run with an error.
    Abort,
}

impl AppConfig {
    /// Reject values the runtime views cannot represent.
    pub fn validate(&self) -> Result<()> {
        let backoff = self.completion.backoff_seconds;
        if !backoff.is_finite() || backoff < 0.0 {
            return Err(ProspectorError::config(format!(
                "completion.backoff_seconds must be a finite, non-negative number (got {backoff})"
            )));
        }
        if Duration::try_from_secs_f64(backoff).is_err() {
            return Err(ProspectorError::config(format!(
                "completion.backoff_seconds is too large (got {backoff})"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Runtime views (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Retry behaviour for completion calls: bounded attempts, constant backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Pause between attempts; does not grow.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for RetryPolicy {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.completion.max_retries.max(1),
            backoff: backoff_duration(config.completion.backoff_seconds),
        }
    }
}

/// Negative or NaN backoff means no pause; values no `Duration` can hold
/// fall back to the default.
fn backoff_duration(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds.max(0.0))
        .unwrap_or_else(|_| Duration::from_secs_f64(default_backoff_seconds()))
}

/// Runtime pipeline options.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Maximum records in flight.
    pub concurrency: usize,
    /// Reaction to exhausted completion retries.
    pub on_exhausted: ExhaustedPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for PipelineOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.pipeline.concurrency.max(1),
            on_exhausted: config.pipeline.on_exhausted,
        }
    }
}

/// Externally supplied secrets, read from the process environment once.
#[derive(Clone)]
pub struct Secrets {
    /// Tabular-data endpoint URL.
    pub sheet_endpoint: String,
    /// Model API key.
    pub api_key: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("sheet_endpoint", &self.sheet_endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.prospector/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ProspectorError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.prospector/prospector.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| ProspectorError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        ProspectorError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ProspectorError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ProspectorError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ProspectorError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read both secrets from the environment variables named in `config`.
pub fn resolve_secrets(config: &AppConfig) -> Result<Secrets> {
    resolve_secrets_with(config, |name| std::env::var(name).ok())
}

/// Like [`resolve_secrets`], with an injectable variable lookup.
pub fn resolve_secrets_with(
    config: &AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Secrets> {
    let require = |var_name: &str, what: &str| match lookup(var_name) {
        Some(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(ProspectorError::config(format!(
            "{what} not found. Set the {var_name} environment variable (or add it to .env)."
        ))),
    };

    Ok(Secrets {
        sheet_endpoint: require(&config.sheet.endpoint_env, "sheet endpoint")?,
        api_key: require(&config.completion.api_key_env, "model API key")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("SHEETY_API"));
        assert!(toml_str.contains("on_exhausted = \"isolate\""));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.completion.max_retries, 15);
        assert_eq!(parsed.sheet.update_batch_size, 10);
        assert_eq!(parsed.pipeline.concurrency, 1);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let toml_str = r#"
[completion]
model = "gpt-4o-mini"
backoff_seconds = 0.5

[pipeline]
on_exhausted = "abort"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.completion.model, "gpt-4o-mini");
        assert_eq!(config.completion.max_retries, 15);
        assert_eq!(config.fetch.timeout_secs, 10);
        assert_eq!(config.pipeline.on_exhausted, ExhaustedPolicy::Abort);
    }

    #[test]
    fn retry_policy_from_app_config() {
        let policy = RetryPolicy::from(&AppConfig::default());
        assert_eq!(policy.max_attempts, 15);
        assert_eq!(policy.backoff, Duration::from_secs(2));
    }

    #[test]
    fn zero_limits_are_clamped() {
        let mut config = AppConfig::default();
        config.completion.max_retries = 0;
        config.pipeline.concurrency = 0;
        assert_eq!(RetryPolicy::from(&config).max_attempts, 1);
        assert_eq!(PipelineOptions::from(&config).concurrency, 1);
    }

    #[test]
    fn unrepresentable_backoff_does_not_panic() {
        let config: AppConfig =
            toml::from_str("[completion]\nbackoff_seconds = inf").expect("parse");
        assert_eq!(RetryPolicy::from(&config).backoff, Duration::from_secs(2));
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.completion.backoff_seconds = -1.0;
        assert_eq!(RetryPolicy::from(&config).backoff, Duration::ZERO);
    }

    #[test]
    fn load_rejects_infinite_backoff() {
        let path = std::env::temp_dir().join(format!(
            "prospector_config_test_{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[completion]\nbackoff_seconds = inf\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        std::fs::remove_file(&path).ok();

        assert!(matches!(err, ProspectorError::Config { .. }));
        assert!(err.to_string().contains("backoff_seconds"));
    }

    #[test]
    fn secrets_resolved_from_named_vars() {
        let config = AppConfig::default();
        let secrets = resolve_secrets_with(&config, |name| match name {
            "SHEETY_API" => Some("https://sheet.test/rows".into()),
            "OPENAI_API_KEY" => Some(" sk-test ".into()),
            _ => None,
        })
        .expect("both secrets present");
        assert_eq!(secrets.sheet_endpoint, "https://sheet.test/rows");
        assert_eq!(secrets.api_key, "sk-test");
        assert!(!format!("{secrets:?}").contains("sk-test"));
    }

    #[test]
    fn missing_secret_names_the_variable() {
        let config = AppConfig::default();
        let err = resolve_secrets_with(&config, |name| {
            (name == "SHEETY_API").then(|| "https://sheet.test".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
