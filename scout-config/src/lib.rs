//! Loader for Domain Scout settings with YAML + environment overlays.
//!
//! Sources merge in order: built-in defaults, then each attached file or
//! inline YAML snippet, then `SCOUT__`-prefixed environment variables
//! (`SCOUT__CAPTURE__DEBOUNCE_MS=250` sets `capture.debounce_ms`). String
//! values may reference `${VAR}` and are expanded after merging.
//!
//! ```yaml
//! store:
//!   database_url: "sqlite://${HOME}/.local/share/domain-scout/scout.db?mode=rwc"
//! capture:
//!   debounce_ms: 1000
//! providers:
//!   openai:
//!     api_key: "${OPENAI_API_KEY}"
//!     model: "gpt-4o-mini"
//! logging:
//!   level: "info"
//!   format: "json"
//! ```
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const APP_DIR: &str = "domain-scout";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    pub version: Option<String>,
    pub store: StoreConfig,
    pub capture: CaptureConfig,
    pub http: HttpConfig,
    /// Keyed by provider id (`openai`, `gemini`, ...).
    pub providers: BTreeMap<String, ProviderConfig>,
    pub analysis: AnalysisConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Quiet period after a page change before re-extracting.
    pub debounce_ms: u64,
    /// Generic containers with more text than this are skipped.
    pub container_text_limit: usize,
    /// How often a watched page file is checked for changes.
    pub poll_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            container_text_limit: 1000,
            poll_interval_ms: 500,
        }
    }
}

impl CaptureConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout. Unset means no client-side timeout.
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// Seeded into the credential store at startup when present.
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// `text` or `json`.
    pub format: String,
    pub stderr: bool,
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            stderr: false,
            dir: None,
        }
    }
}

/// Problems the `config` crate cannot catch by shape alone.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigIssue {
    #[error("temperature must be within 0.0..=2.0, got {0}")]
    Temperature(f64),
    #[error("max_tokens must be positive")]
    MaxTokens,
    #[error("unknown log format: {0}")]
    LogFormat(String),
    #[error("store.database_url is empty")]
    DatabaseUrl,
}

impl ScoutConfig {
    pub fn validate(&self) -> Result<(), ConfigIssue> {
        if !(0.0..=2.0).contains(&self.analysis.temperature) {
            return Err(ConfigIssue::Temperature(self.analysis.temperature));
        }
        if self.analysis.max_tokens == 0 {
            return Err(ConfigIssue::MaxTokens);
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(ConfigIssue::LogFormat(self.logging.format.clone()));
        }
        if self.store.database_url.trim().is_empty() {
            return Err(ConfigIssue::DatabaseUrl);
        }
        Ok(())
    }

    /// Log directory with `~` expanded.
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.logging
            .dir
            .as_ref()
            .map(|d| PathBuf::from(shellexpand::tilde(&d.to_string_lossy()).into_owned()))
    }

    /// Render the effective configuration back to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// `sqlite://<data dir>/domain-scout/scout.db?mode=rwc`, falling back to the
/// working directory when no data dir is known.
pub fn default_database_url() -> String {
    let path = dirs::data_local_dir()
        .map(|d| d.join(APP_DIR).join("scout.db"))
        .unwrap_or_else(|| PathBuf::from("scout.db"));
    format!("sqlite://{}?mode=rwc", path.display())
}

/// `<config dir>/domain-scout/config.yaml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.yaml"))
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder over the `config` crate wiring (YAML + env overrides).
pub struct ScoutConfigLoader {
    files: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for ScoutConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoutConfigLoader {
    /// An empty loader; every field falls back to its default.
    ///
    /// ```
    /// use scout_config::ScoutConfigLoader;
    ///
    /// let cfg = ScoutConfigLoader::new()
    ///     .with_yaml_str("version: '1'\ncapture:\n  debounce_ms: 250")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(cfg.version.as_deref(), Some("1"));
    /// assert_eq!(cfg.capture.debounce_ms, 250);
    /// assert_eq!(cfg.capture.container_text_limit, 1000);
    /// assert_eq!(cfg.analysis.max_tokens, 1000);
    /// ```
    pub fn new() -> Self {
        Self {
            files: Config::builder(),
        }
    }

    /// Attach a YAML/TOML/JSON file; format is inferred from the suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.files = self
            .files
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Like [`with_file`](Self::with_file) but a missing file is skipped.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.files = self
            .files
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.files = self.files.add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Merge every source, expand `${VAR}` placeholders and deserialize.
    ///
    /// ```
    /// use scout_config::ScoutConfigLoader;
    ///
    /// unsafe { std::env::set_var("SCOUT_DOC_KEY", "sk-from-env"); }
    ///
    /// let cfg = ScoutConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// providers:
    ///   openai:
    ///     api_key: "${SCOUT_DOC_KEY}"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(cfg.providers["openai"].api_key.as_deref(), Some("sk-from-env"));
    /// assert_eq!(cfg.providers["openai"].model, None);
    ///
    /// unsafe { std::env::remove_var("SCOUT_DOC_KEY"); }
    /// ```
    pub fn load(self) -> Result<ScoutConfig, ConfigError> {
        let cfg = self
            .files
            .add_source(
                Environment::with_prefix("SCOUT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: ScoutConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        typed
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(typed)
    }
}
