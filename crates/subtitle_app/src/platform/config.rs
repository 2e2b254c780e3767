//! Application configuration.
//!
//! Precedence, lowest first: built-in defaults, the RON file, `ZHCONVERT_*`
//! environment variables, command-line flags.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use subtitle_engine::{
    ClientSettings, ConvertOptions, DEFAULT_API_BASE_URL, DEFAULT_CONVERTER,
    DEFAULT_JP_TEXT_STYLES,
};
use subtitle_proxy::{ProxySettings, DEFAULT_UPSTREAM};

use super::logging::LogDestination;

pub const DEFAULT_CONFIG_FILENAME: &str = "zhconvert.ron";

pub const ENV_API_BASE_URL: &str = "ZHCONVERT_API_BASE_URL";
pub const ENV_PROXY_BIND: &str = "ZHCONVERT_PROXY_BIND";
pub const ENV_UPSTREAM: &str = "ZHCONVERT_UPSTREAM";
pub const ENV_LOG_LEVEL: &str = "ZHCONVERT_LOG_LEVEL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Service base, or a proxy prefix such as `http://127.0.0.1:8788/api`.
    pub api_base_url: String,
    pub proxy_bind: String,
    pub proxy_upstream: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub converter: String,
    pub jp_text_styles: String,
    pub modules: BTreeMap<String, i32>,
    pub output_dir: PathBuf,
    pub log_destination: LogDestination,
    pub log_level: String,
    pub preferences_path: PathBuf,
    /// File the values were read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            proxy_bind: "127.0.0.1:8788".to_string(),
            proxy_upstream: DEFAULT_UPSTREAM.to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 60,
            converter: DEFAULT_CONVERTER.to_string(),
            jp_text_styles: DEFAULT_JP_TEXT_STYLES.to_string(),
            modules: BTreeMap::new(),
            output_dir: PathBuf::from("converted"),
            log_destination: LogDestination::Terminal,
            log_level: "info".to_string(),
            preferences_path: PathBuf::from("zhconvert-preferences.ron"),
            source: None,
        }
    }
}

impl AppConfig {
    /// Reads `explicit` if given (it must exist), otherwise `zhconvert.ron`
    /// in the working directory if present, then applies the environment.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILENAME);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };
        Ok(config.with_env(|key| std::env::var(key).ok()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = ron::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(Self {
            source: Some(path.to_path_buf()),
            ..config
        })
    }

    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(value) = lookup(ENV_API_BASE_URL) {
            self.api_base_url = value;
        }
        if let Some(value) = lookup(ENV_PROXY_BIND) {
            self.proxy_bind = value;
        }
        if let Some(value) = lookup(ENV_UPSTREAM) {
            self.proxy_upstream = value;
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            self.log_level = value;
        }
        self
    }

    pub fn log_level_filter(&self) -> Result<log::LevelFilter> {
        self.log_level
            .parse()
            .with_context(|| format!("invalid log level {:?}", self.log_level))
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.api_base_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn proxy_settings(&self) -> ProxySettings {
        ProxySettings {
            upstream_base: self.proxy_upstream.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            converter: self.converter.clone(),
            jp_text_styles: self.jp_text_styles.clone(),
            modules: self.modules.clone(),
        }
    }
}
