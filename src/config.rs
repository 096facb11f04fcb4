use std::{fs, path::Path, path::PathBuf, time::Duration};

use serde::Deserialize;

use crate::{ActchainError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// number of async worker threads, range [1, 32768), defaults to 16
    pub async_worker_thread_number: u16,
    /// chain monitor config
    pub monitor: MonitorConfig,
    /// secret store config
    pub secrets: SecretsConfig,
    /// llm provider config
    pub llm: LlmConfig,
    /// code action config
    pub code: CodeConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// seconds between two sweeps over the active chains
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// dotenv file the secrets are loaded from and written back to
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// sent as `X-Title` to openrouter
    pub app_name: Option<String>,
    /// sent as `HTTP-Referer` to openrouter
    pub app_url: Option<String>,
    /// azure openai `api-version` query parameter
    pub azure_api_version: String,
    /// per request timeout of the provider client
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CodeConfig {
    /// python interpreter binary
    pub python: String,
    /// bash binary
    pub bash: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            async_worker_thread_number: 16,
            monitor: MonitorConfig::default(),
            secrets: SecretsConfig::default(),
            llm: LlmConfig::default(),
            code: CodeConfig::default(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            app_name: None,
            app_url: None,
            azure_api_version: "2023-12-01-preview".to_string(),
            timeout_secs: 120,
        }
    }
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            python: "python".to_string(),
            bash: "bash".to_string(),
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref()).map_err(|e| ActchainError::Config(format!("failed to load config file {:?}: {}", path.as_ref(), e)))?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config = toml::from_str::<Config>(toml_str)?;
        if config.async_worker_thread_number == 0 {
            return Err(ActchainError::Config("async_worker_thread_number must be at least 1".to_string()));
        }
        Ok(config)
    }
}
