//! Configuration loading and management
//!
//! Handles parsing of `.slate.toml` configuration files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the configuration file at the ledger root
pub const CONFIG_FILE: &str = ".slate.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Tasks configuration
    #[serde(default)]
    pub tasks: TasksConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tasks: TasksConfig::default(),
        }
    }
}

/// Tasks configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Allowed task statuses
    #[serde(default = "default_statuses")]
    pub statuses: Vec<String>,

    /// Default status for new tasks
    #[serde(default = "default_status")]
    pub default_status: String,

    /// Statuses considered finished
    #[serde(default = "default_done_statuses")]
    pub done_statuses: Vec<String>,

    /// Maximum accepted title length in characters
    #[serde(default = "default_max_title_len")]
    pub max_title_len: usize,
}

fn default_statuses() -> Vec<String> {
    vec![
        "pending".to_string(),
        "in_progress".to_string(),
        "done".to_string(),
    ]
}

fn default_status() -> String {
    "pending".to_string()
}

fn default_done_statuses() -> Vec<String> {
    vec!["done".to_string()]
}

fn default_max_title_len() -> usize {
    125
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            statuses: default_statuses(),
            default_status: default_status(),
            done_statuses: default_done_statuses(),
            max_title_len: default_max_title_len(),
        }
    }
}

impl Config {
    /// Load configuration from a `.slate.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the ledger root, or return defaults
    pub fn load_from_root(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &PathBuf) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.tasks.validate()
    }
}

impl TasksConfig {
    fn validate(&self) -> Result<()> {
        if self.statuses.is_empty() {
            return Err(Error::InvalidConfig(
                "tasks.statuses cannot be empty".to_string(),
            ));
        }
        if !self.statuses.contains(&self.default_status) {
            return Err(Error::InvalidConfig(format!(
                "tasks.default_status '{}' is not in tasks.statuses",
                self.default_status
            )));
        }
        for status in &self.done_statuses {
            if !self.statuses.contains(status) {
                return Err(Error::InvalidConfig(format!(
                    "tasks.done_statuses entry '{status}' is not in tasks.statuses"
                )));
            }
        }
        if self.max_title_len == 0 {
            return Err(Error::InvalidConfig(
                "tasks.max_title_len must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
