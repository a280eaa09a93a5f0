use core::fmt::{Debug, Display};

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "study-submissions.toml";
pub const ENV_PREFIX: &str = "STUDY_";

/// Bounds for the submission retry loop.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct AllocatorConfig {
    pub max_attempts: u32,
    /// Per request deadline in milliseconds, on top of `max_attempts`.
    pub deadline_ms: Option<u64>,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 32,
            deadline_ms: None,
        }
    }
}

/// Load shape used by the contention driver.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ContentionConfig {
    pub available_places: u32,
    pub requests: u32,
}

impl Default for ContentionConfig {
    fn default() -> Self {
        Self {
            available_places: 10,
            requests: 50,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    #[serde(default)]
    pub allocator: AllocatorConfig,
    #[serde(default)]
    pub contention: ContentionConfig,
}

#[derive(thiserror::Error)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Figment(#[from] figment::Error),
}

impl Debug for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

fn figment() -> Figment {
    Figment::new()
        .merge(Toml::file(CONFIG_FILE))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

pub fn get_config() -> Result<Config, ConfigError> {
    Ok(figment().extract()?)
}
