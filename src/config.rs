use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ApiError, Result};

/// Service configuration, read from `config.toml` when present. Every field
/// has a default so the service runs without a config file.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";
        let mut config = if Path::new(config_path).exists() {
            let config_content = fs::read_to_string(config_path)?;
            toml::from_str(&config_content)?
        } else {
            Config::default()
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Environment variables take precedence over the config file.
    fn apply_env(&mut self) -> Result<()> {
        if let Ok(bind) = std::env::var("WINDPLANT_QA_BIND") {
            self.server.bind = bind;
        }
        if let Ok(port) = std::env::var("WINDPLANT_QA_PORT") {
            self.server.port = port.parse().map_err(|_| {
                ApiError::Config(format!("WINDPLANT_QA_PORT must be a port number, got '{port}'"))
            })?;
        }
        Ok(())
    }
}
