//! CLI configuration, read from ~/.photograph/config.yaml.

use std::path::{Path, PathBuf};
use std::time::Duration;

use photograph_embed::EncoderConfig;
use photograph_pipeline::{DEFAULT_MAX_CONCURRENCY, PipelineConfig};
use photograph_projection::{DEFAULT_MAX_COMPONENTS, ProjectorConfig};
use serde::{Deserialize, Serialize};

/// Default base directory name under the home directory.
pub const DEFAULT_BASE_DIR: &str = ".photograph";
/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Default database path, relative to the base directory.
pub const DEFAULT_DB_PATH: &str = "data/photograph.redb";

/// CLI configuration. Zero and empty values mean "use the default".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path of the redb database file.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub db_path: String,

    #[serde(default)]
    pub encoder: EncoderSection,

    /// Cap on projection components at first fit.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub max_components: usize,

    /// Per-item encoder timeout in seconds.
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub encode_timeout: u64,

    /// Concurrent encoder calls per ingestion run.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub max_concurrency: usize,
}

/// Encoder service settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncoderSection {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub dimension: usize,

    #[serde(default)]
    pub normalize: bool,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

fn is_zero_u64(n: &u64) -> bool {
    *n == 0
}

impl Config {
    /// Gets the default base directory (~/.photograph).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_BASE_DIR))
    }

    /// Gets the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_dir().map(|dir| dir.join(DEFAULT_CONFIG_FILE))
    }

    /// Resolved database path.
    pub fn db_path(&self) -> anyhow::Result<PathBuf> {
        if !self.db_path.is_empty() {
            return Ok(expand_home(&self.db_path));
        }
        Self::default_dir()
            .map(|dir| dir.join(DEFAULT_DB_PATH))
            .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))
    }

    pub fn encoder_config(&self) -> EncoderConfig {
        let e = &self.encoder;
        EncoderConfig::default()
            .with_base_url(&e.base_url)
            .with_model(&e.model)
            .with_api_key(&e.api_key)
            .with_dimension(e.dimension)
            .with_normalize(e.normalize)
    }

    /// Projector settings for an encoder of dimension `dim`.
    pub fn projector_config(&self, dim: usize) -> ProjectorConfig {
        ProjectorConfig {
            dim,
            max_components: if self.max_components == 0 {
                DEFAULT_MAX_COMPONENTS
            } else {
                self.max_components
            },
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut cfg = PipelineConfig::default();
        if self.encode_timeout > 0 {
            cfg.encode_timeout = Duration::from_secs(self.encode_timeout);
        }
        cfg.max_concurrency = if self.max_concurrency == 0 {
            DEFAULT_MAX_CONCURRENCY
        } else {
            self.max_concurrency
        };
        cfg
    }
}

/// Loads configuration from `custom_path` or the default location.
/// A missing file yields the default configuration.
pub fn load_config(custom_path: Option<&str>) -> anyhow::Result<Config> {
    let path = match custom_path {
        Some(p) => PathBuf::from(p),
        None => Config::default_config_path()
            .ok_or_else(|| anyhow::anyhow!("cannot determine config path"))?,
    };
    if !path.exists() {
        if custom_path.is_some() {
            anyhow::bail!("config file {} not found", path.display());
        }
        return Ok(Config::default());
    }
    parse_config(&std::fs::read_to_string(&path)?)
}

fn parse_config(content: &str) -> anyhow::Result<Config> {
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => Path::new(path).to_path_buf(),
    }
}
