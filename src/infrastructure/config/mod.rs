//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use crate::application::errors::ConfigError;
use crate::application::messaging::RouterBuilder;

/// Bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub bot: BotConfig,
    pub router: RouterConfig,
    pub rate_limit: RateLimitConfig,
    pub adapters: AdaptersConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BotConfig {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RouterConfig {
    pub prefixes: Vec<String>,
    #[serde(default)]
    pub ignore_prefix_case: bool,
    #[serde(default)]
    pub bots_allowed: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RateLimitConfig {
    pub cooldown_ms: u64,
    pub cleanup_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AdaptersConfig {
    pub console: Option<ConsoleConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConsoleConfig {
    pub enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig {
                name: "chat-router".to_string(),
            },
            router: RouterConfig {
                prefixes: vec!["!".to_string()],
                ignore_prefix_case: true,
                bots_allowed: false,
            },
            rate_limit: RateLimitConfig {
                cooldown_ms: 5_000,
                cleanup_ms: 1_000,
            },
            adapters: AdaptersConfig {
                console: Some(ConsoleConfig {
                    enabled: true,
                }),
            },
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_env() -> Self {
        // Load from environment variables
        let mut config = Config::default();

        if let Ok(name) = std::env::var("BOT_NAME") {
            config.bot.name = name;
        }

        if let Ok(prefixes) = std::env::var("BOT_PREFIX") {
            let prefixes: Vec<String> = prefixes
                .split(',')
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            if !prefixes.is_empty() {
                config.router.prefixes = prefixes;
            }
        }

        config
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.router.prefixes.iter().any(String::is_empty) {
            return Err(ConfigError::InvalidValue("prefixes must not be empty strings".to_string()));
        }
        if self.rate_limit.cleanup_ms == 0 {
            return Err(ConfigError::InvalidValue("rate-limit.cleanup-ms must be positive".to_string()));
        }
        Ok(())
    }
}

impl RateLimitConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_ms)
    }
}

impl RouterConfig {
    /// Router builder preconfigured with these settings
    pub fn builder(&self) -> RouterBuilder {
        RouterBuilder::default()
            .prefixes(self.prefixes.iter().cloned())
            .ignore_prefix_case(self.ignore_prefix_case)
            .bots_allowed(self.bots_allowed)
    }
}
