use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use food_monitor_core::session::FeatureFlags;

pub const DEFAULT_MODEL: &str = "gpt-5.2";
pub const DEFAULT_MAX_TOKENS: u32 = 400;
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Optional `config.json` in the data directory. Every key may be omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model: String,
    pub max_tokens: u32,
    pub api_url: String,
    pub features: FeatureFlags,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            api_url: DEFAULT_API_URL.to_string(),
            features: FeatureFlags::default(),
        }
    }
}

impl Settings {
    fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }
}

pub struct Config {
    pub db_path: PathBuf,
    pub settings: Settings,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("", "", "food-monitor")
            .context("Could not determine home directory")?;
        Self::from_dir(proj_dirs.data_dir())
    }

    pub fn from_dir(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("food-monitor.db");
        let settings = Settings::load_from(&data_dir.join("config.json"))?;

        Ok(Config { db_path, settings })
    }
}

/// The stored key wins; otherwise fall back to `OPENAI_API_KEY`.
pub fn resolve_api_key(stored: Option<String>) -> Option<String> {
    stored.or_else(|| {
        std::env::var(API_KEY_ENV)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    })
}
