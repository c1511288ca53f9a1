use crate::clients::rate_limit::RateLimitSettings;
use crate::matching::EngineKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Upper bound for `matching.date_tolerance_days`, ten years.
const MAX_DATE_TOLERANCE_DAYS: i64 = 3650;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub anilist: AnilistConfig,

    pub jikan: JikanConfig,

    pub tvdb: TvdbConfig,

    pub matching: MatchingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    /// "pretty" or "json"
    pub log_format: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Directory holding cached catalog responses, one folder per franchise.
    pub data_dir: String,

    /// Directory the generated SQL files are written to.
    pub output_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            worker_threads: 2,
            data_dir: "./data".to_string(),
            output_dir: "./output".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnilistConfig {
    pub base_url: String,

    pub requests_per_minute: u32,

    pub burst: u32,

    pub min_interval_ms: u64,

    /// Request timeout in seconds (default: 30)
    pub request_timeout_seconds: u64,

    pub max_retries: u32,
}

impl Default for AnilistConfig {
    fn default() -> Self {
        Self {
            base_url: "https://graphql.anilist.co".to_string(),
            requests_per_minute: 60,
            burst: 1,
            min_interval_ms: 1000,
            request_timeout_seconds: 30,
            max_retries: 4,
        }
    }
}

impl AnilistConfig {
    #[must_use]
    pub const fn rate_limit(&self) -> RateLimitSettings {
        RateLimitSettings {
            requests_per_minute: self.requests_per_minute,
            burst: self.burst,
            min_interval: Duration::from_millis(self.min_interval_ms),
            max_retries: self.max_retries,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JikanConfig {
    pub base_url: String,

    pub requests_per_minute: u32,

    pub burst: u32,

    pub min_interval_ms: u64,

    pub request_timeout_seconds: u64,

    pub max_retries: u32,
}

impl Default for JikanConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.jikan.moe/v4".to_string(),
            requests_per_minute: 40,
            burst: 1,
            min_interval_ms: 1500,
            request_timeout_seconds: 30,
            max_retries: 4,
        }
    }
}

impl JikanConfig {
    #[must_use]
    pub const fn rate_limit(&self) -> RateLimitSettings {
        RateLimitSettings {
            requests_per_minute: self.requests_per_minute,
            burst: self.burst,
            min_interval: Duration::from_millis(self.min_interval_ms),
            max_retries: self.max_retries,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TvdbConfig {
    pub enabled: bool,

    pub base_url: String,

    pub api_key: String,

    /// How long a login token is reused before logging in again (default: 20)
    pub token_ttl_hours: u64,

    pub requests_per_minute: u32,

    pub burst: u32,

    pub min_interval_ms: u64,

    pub request_timeout_seconds: u64,

    pub max_retries: u32,
}

impl Default for TvdbConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api4.thetvdb.com/v4".to_string(),
            api_key: String::new(),
            token_ttl_hours: 20,
            requests_per_minute: 60,
            burst: 1,
            min_interval_ms: 500,
            request_timeout_seconds: 30,
            max_retries: 4,
        }
    }
}

impl TvdbConfig {
    #[must_use]
    pub const fn rate_limit(&self) -> RateLimitSettings {
        RateLimitSettings {
            requests_per_minute: self.requests_per_minute,
            burst: self.burst,
            min_interval: Duration::from_millis(self.min_interval_ms),
            max_retries: self.max_retries,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Fuzzy acceptance threshold for creators and voice actors.
    pub person_threshold: f64,

    pub character_threshold: f64,

    /// Studio names abbreviate inconsistently between catalogs, so this one is looser.
    pub company_threshold: f64,

    /// Tolerance used when comparing air-date ranges.
    pub date_tolerance_days: i64,

    /// Relation-graph hop limit.
    pub max_depth: usize,

    pub engine: EngineKind,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            person_threshold: 80.0,
            character_threshold: 80.0,
            company_threshold: 70.0,
            date_tolerance_days: 30,
            max_depth: 12,
            engine: EngineKind::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("franchise-sync").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".franchise-sync").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        let rates = [
            ("anilist", self.anilist.requests_per_minute, self.anilist.burst),
            ("jikan", self.jikan.requests_per_minute, self.jikan.burst),
            ("tvdb", self.tvdb.requests_per_minute, self.tvdb.burst),
        ];
        for (name, per_minute, burst) in rates {
            if per_minute == 0 || burst == 0 {
                anyhow::bail!("{name} requests_per_minute and burst must be > 0");
            }
        }

        let base_urls = [
            ("anilist", &self.anilist.base_url),
            ("jikan", &self.jikan.base_url),
            ("tvdb", &self.tvdb.base_url),
        ];
        for (name, base_url) in base_urls {
            url::Url::parse(base_url)
                .with_context(|| format!("Invalid {name} base_url: {base_url}"))?;
        }

        if self.tvdb.enabled && self.tvdb.api_key.trim().is_empty() {
            anyhow::bail!("TVDB API key cannot be empty when enabled");
        }

        let thresholds = [
            ("person_threshold", self.matching.person_threshold),
            ("character_threshold", self.matching.character_threshold),
            ("company_threshold", self.matching.company_threshold),
        ];
        for (name, value) in thresholds {
            if !(0.0..=100.0).contains(&value) {
                anyhow::bail!("matching.{name} must be between 0 and 100, got {value}");
            }
        }

        if !(0..=MAX_DATE_TOLERANCE_DAYS).contains(&self.matching.date_tolerance_days) {
            anyhow::bail!(
                "matching.date_tolerance_days must be between 0 and {MAX_DATE_TOLERANCE_DAYS}, got {}",
                self.matching.date_tolerance_days
            );
        }

        if self.matching.max_depth == 0 {
            anyhow::bail!("matching.max_depth must be > 0");
        }

        if !matches!(self.general.log_format.as_str(), "pretty" | "json") {
            anyhow::bail!(
                "general.log_format must be \"pretty\" or \"json\", got \"{}\"",
                self.general.log_format
            );
        }

        Ok(())
    }

    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.general.data_dir)
    }

    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.general.output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.anilist.requests_per_minute, 60);
        assert_eq!(config.jikan.requests_per_minute, 40);
        assert_eq!(config.jikan.min_interval_ms, 1500);
        assert_eq!(config.tvdb.token_ttl_hours, 20);
        assert!(!config.tvdb.enabled);
        assert!((config.matching.company_threshold - 70.0).abs() < f64::EPSILON);
        assert_eq!(config.matching.max_depth, 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[anilist]"));
        assert!(toml_str.contains("[matching]"));
        assert!(toml_str.contains("engine = \"token_sort\""));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [jikan]
            requests_per_minute = 20

            [matching]
            engine = "bigram"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.jikan.requests_per_minute, 20);
        assert_eq!(config.jikan.min_interval_ms, 1500);
        assert_eq!(config.matching.engine, EngineKind::Bigram);

        assert_eq!(config.anilist.base_url, "https://graphql.anilist.co");
    }

    #[test]
    fn test_validate_rejects_tvdb_without_key() {
        let mut config = Config::default();
        config.tvdb.enabled = true;
        assert!(config.validate().is_err());

        config.tvdb.api_key = "key".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let mut config = Config::default();
        config.jikan.base_url = "api.jikan.moe/v4".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_date_tolerance() {
        let mut config = Config::default();
        config.matching.date_tolerance_days = 1_000_000_000;
        assert!(config.validate().is_err());

        config.matching.date_tolerance_days = -1;
        assert!(config.validate().is_err());

        config.matching.date_tolerance_days = 3650;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = Config::default();
        config.matching.person_threshold = 120.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.general.data_dir = "/srv/franchises".to_string();
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.general.data_dir, "/srv/franchises");
    }
}
