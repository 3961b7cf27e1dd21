use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{AnalyzerError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.twelvelabs.io/v1.3";

pub const API_KEY_ENV: &str = "TWELVELABS_API_KEY";
pub const INDEX_ID_ENV: &str = "TWELVELABS_INDEX_ID";
pub const BASE_URL_ENV: &str = "TWELVELABS_BASE_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// TwelveLabs API settings
    pub twelvelabs: TwelveLabsConfig,

    /// Job polling settings
    #[serde(default)]
    pub polling: PollingConfig,

    /// Media preparation settings
    #[serde(default)]
    pub media: MediaConfig,

    /// Source storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Analysis settings
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwelveLabsConfig {
    /// API key sent as `x-api-key`
    pub api_key: Option<String>,

    /// Index that recordings are indexed into
    pub index_id: Option<String>,

    /// API base URL including the version segment
    pub base_url: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Seconds between two status checks
    pub interval_secs: u64,

    /// Give up waiting on a job after this many seconds
    pub max_wait_secs: u64,

    /// Give up waiting on a job after this many status checks
    pub max_checks: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// ffmpeg binary used to transcode WebM recordings
    pub ffmpeg_path: String,

    /// Directory for transcoding scratch files (system temp dir if unset)
    pub temp_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory that object keys are resolved against
    pub root: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Prompt used when the caller does not supply one
    pub default_prompt: Option<String>,
}

/// Credentials required before any remote call is made
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: String,
    pub index_id: String,
}

impl Default for TwelveLabsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            index_id: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 300,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            max_wait_secs: 30 * 60,
            max_checks: 720,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            temp_dir: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            twelvelabs: TwelveLabsConfig::default(),
            polling: PollingConfig::default(),
            media: MediaConfig::default(),
            storage: StorageConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

impl Config {
    /// Load configuration from file (or defaults), then apply environment overrides
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = Self::resolve_path(path)?;

        let mut config = if config_path.exists() {
            let content = fs_err::read_to_string(&config_path).map_err(|e| {
                AnalyzerError::Config(format!("Failed to read config file: {}", e))
            })?;
            Self::from_yaml(&content)?
        } else {
            let config = Self::default();
            config.save(&config_path).await?;
            config
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| AnalyzerError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Save configuration to file
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .map_err(|e| AnalyzerError::Config(format!("Failed to serialize config: {}", e)))?;

        fs_err::write(path, content)?;
        Ok(())
    }

    /// Explicit path, else `./config.yaml`, else the per-user config directory
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }

        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().ok_or_else(|| {
            AnalyzerError::Config("Could not determine config directory".to_string())
        })?;

        Ok(config_dir.join("recording-analyzer").join("config.yaml"))
    }

    /// Environment variables win over the config file
    fn apply_env(&mut self) {
        if let Some(key) = non_blank_env(API_KEY_ENV) {
            self.twelvelabs.api_key = Some(key);
        }
        if let Some(index_id) = non_blank_env(INDEX_ID_ENV) {
            self.twelvelabs.index_id = Some(index_id);
        }
        if let Some(base_url) = non_blank_env(BASE_URL_ENV) {
            self.twelvelabs.base_url = base_url;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.twelvelabs.base_url).map_err(|e| {
            AnalyzerError::Config(format!(
                "Invalid TwelveLabs base URL '{}': {}",
                self.twelvelabs.base_url, e
            ))
        })?;

        if self.polling.interval_secs == 0 {
            return Err(AnalyzerError::Config(
                "polling.interval_secs must be greater than zero".to_string(),
            ));
        }

        if self.polling.max_checks == 0 {
            return Err(AnalyzerError::Config(
                "polling.max_checks must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// API key and index id, or a configuration error naming what is missing
    pub fn credentials(&self) -> Result<Credentials> {
        let api_key = non_blank(self.twelvelabs.api_key.as_deref())
            .ok_or_else(|| AnalyzerError::Config(format!("{} is not configured", API_KEY_ENV)))?;
        let index_id = non_blank(self.twelvelabs.index_id.as_deref())
            .ok_or_else(|| AnalyzerError::Config(format!("{} is not configured", INDEX_ID_ENV)))?;

        Ok(Credentials {
            api_key: api_key.to_string(),
            index_id: index_id.to_string(),
        })
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  API Key: {}", mask_secret(self.twelvelabs.api_key.as_deref()));
        println!(
            "  Index ID: {}",
            self.twelvelabs.index_id.as_deref().unwrap_or("(not set)")
        );
        println!("  Base URL: {}", self.twelvelabs.base_url);
        println!(
            "  Polling: every {}s, up to {}s / {} checks",
            self.polling.interval_secs, self.polling.max_wait_secs, self.polling.max_checks
        );
        println!("  ffmpeg: {}", self.media.ffmpeg_path);
        println!("  Storage Root: {}", self.storage.root.display());
        if self.analysis.default_prompt.is_some() {
            println!("  Default Prompt: (custom)");
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn non_blank_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn mask_secret(secret: Option<&str>) -> String {
    match non_blank(secret) {
        Some(s) if s.chars().count() > 4 => {
            let tail: String = s.chars().skip(s.chars().count() - 4).collect();
            format!("****{}", tail)
        }
        Some(_) => "****".to_string(),
        None => "(not set)".to_string(),
    }
}
