//! Configuration loading, validation, and management for clive.
//!
//! Loads configuration from `<workspace>/.clive/config.toml`, then
//! `~/.clive/config.toml`, with environment variable overrides. Validates
//! all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// How the agent CLI is launched
    #[serde(default)]
    pub cli: CliConfig,

    /// Iteration loop settings
    #[serde(default, rename = "loop")]
    pub iteration: LoopConfig,

    /// Plan file settings
    #[serde(default)]
    pub plans: PlansConfig,

    /// Dispatcher settings
    #[serde(default)]
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Agent CLI executable
    #[serde(default = "default_binary")]
    pub binary: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<String>,

    /// MCP server configuration file passed through to the CLI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_config: Option<String>,

    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_binary() -> String {
    "claude".into()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            model: None,
            permission_mode: None,
            mcp_config: None,
            extra_args: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_max_iterations() -> u32 {
    10
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlansConfig {
    /// Directory for plan files, relative to the workspace root
    #[serde(default = "default_plans_dir")]
    pub dir: String,
}

fn default_plans_dir() -> String {
    ".clive/plans".into()
}

impl Default for PlansConfig {
    fn default() -> Self {
        Self {
            dir: default_plans_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Consecutive mistakes before `mistake-limit` fires
    #[serde(default = "default_mistake_limit")]
    pub mistake_limit: u32,
}

fn default_mistake_limit() -> u32 {
    5
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            mistake_limit: default_mistake_limit(),
        }
    }
}

impl AppConfig {
    /// Load configuration for a workspace.
    ///
    /// The workspace file wins over the user file. Environment variables
    /// override both:
    /// - `CLIVE_CLI_PATH`
    /// - `CLIVE_MODEL`
    /// - `CLIVE_MAX_ITERATIONS`
    pub fn load(workspace_root: &Path) -> Result<Self, ConfigError> {
        let workspace_file = workspace_root.join(".clive").join("config.toml");
        let path = if workspace_file.exists() {
            workspace_file
        } else {
            Self::config_dir().join("config.toml")
        };
        Self::load_from(&path)?.with_env_overrides()
    }

    /// Apply the `CLIVE_*` environment overrides and validate again.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        self.apply_env(|key| std::env::var(key).ok())?;
        self.validate()?;
        Ok(self)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(binary) = var("CLIVE_CLI_PATH") {
            self.cli.binary = binary;
        }
        if let Some(model) = var("CLIVE_MODEL") {
            self.cli.model = Some(model);
        }
        if let Some(max) = var("CLIVE_MAX_ITERATIONS") {
            self.iteration.max_iterations = max.parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "CLIVE_MAX_ITERATIONS must be a positive integer, got '{max}'"
                ))
            })?;
        }
        Ok(())
    }

    /// Get the user configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".clive")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iteration.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "loop.max_iterations must be at least 1".into(),
            ));
        }

        if self.agent.mistake_limit == 0 {
            return Err(ConfigError::ValidationError(
                "agent.mistake_limit must be at least 1".into(),
            ));
        }

        if self.plans.dir.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "plans.dir must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `clive config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
