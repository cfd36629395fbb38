use anyhow::Result;
use fusion_core::FusionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::constants::CONFIG_FILE_NAME;

/// Settings read from `config.toml`.
///
/// Client options sit below `FUSION_*` environment variables and command-line
/// flags; anything left unset falls back to the library defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Agent used by `chat` when `--agent` is not given
    pub default_agent: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_seconds: Option<f64>,
    pub max_retries: Option<u32>,
    pub enable_cache: Option<bool>,
    pub cache_ttl_seconds: Option<u64>,
    pub cache_max_size: Option<usize>,
    pub rate_limit_calls: Option<u32>,
    pub rate_limit_window_seconds: Option<u64>,
}

impl Config {
    pub fn load(base_path: &Path) -> Result<Config> {
        let config_path = base_path.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("invalid {}: {e}", config_path.display()))?;

        Ok(config)
    }

    pub fn save(&self, base_path: &Path) -> Result<()> {
        let config_path = base_path.join(CONFIG_FILE_NAME);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(config_path, content)?;
        Ok(())
    }

    /// Value of a `FUSION_*` variable as this file would set it
    fn lookup(&self, var: &str) -> Option<String> {
        match var {
            "FUSION_API_KEY" => self.api_key.clone(),
            "FUSION_BASE_URL" => self.base_url.clone(),
            "FUSION_TIMEOUT" => self.timeout_seconds.map(|v| v.to_string()),
            "FUSION_MAX_RETRIES" => self.max_retries.map(|v| v.to_string()),
            "FUSION_CACHE_ENABLED" => self.enable_cache.map(|v| v.to_string()),
            "FUSION_CACHE_TTL" => self.cache_ttl_seconds.map(|v| v.to_string()),
            "FUSION_CACHE_MAX_SIZE" => self.cache_max_size.map(|v| v.to_string()),
            "FUSION_RATE_LIMIT_CALLS" => self.rate_limit_calls.map(|v| v.to_string()),
            "FUSION_RATE_LIMIT_WINDOW" => self.rate_limit_window_seconds.map(|v| v.to_string()),
            _ => None,
        }
    }

    /// Merge the environment over this file into a client config
    pub fn client_config<F>(&self, env: F) -> Result<FusionConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = FusionConfig::from_lookup(|var| env(var).or_else(|| self.lookup(var)))?;
        Ok(config)
    }
}
