use anyhow::{Context, Result};
use commander_core::{
    ChoreographyConfig, DeliveryConfig, HISTORY_CAPACITY, PollingConfig, TargetIdentity,
    TimingConfig,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CommanderConfig {
    #[serde(default)]
    pub target: TargetIdentity,
    #[serde(default)]
    pub choreography: ChoreographyConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub scripting: ScriptingConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScriptingConfig {
    /// osascript is killed after this many seconds
    #[serde(default = "default_script_timeout")]
    pub timeout_secs: u64,
}

fn default_script_timeout() -> u64 {
    30
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_script_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryConfig {
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
}

fn default_history_capacity() -> usize {
    HISTORY_CAPACITY
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
        }
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".commander")
}

impl CommanderConfig {
    /// Load from `custom_path`, or from `~/.commander/config.toml`. A missing
    /// default file means built-in defaults; a missing explicit file is an error.
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        match custom_path {
            Some(path) => Self::load_from(path),
            None => {
                let path = config_dir().join("config.toml");
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    debug!("No config at {}, using defaults", path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| {
            format!(
                "Failed to read config at {}. Run `commander init` first.",
                path.display()
            )
        })?;

        let expanded = expand_env_vars(&content);

        let config: Self = toml::from_str(&expanded)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;
        Ok(config)
    }

    /// The pipeline's view of this config
    pub fn delivery(&self) -> DeliveryConfig {
        DeliveryConfig {
            target: self.target.clone(),
            choreography: self.choreography.clone(),
            timing: self.timing.clone(),
            polling: self.polling.clone(),
        }
    }
}

/// Environment variables that may be expanded as `${NAME}` in config files
const ALLOWED_ENV_VARS: &[&str] = &["HOME", "USER"];

fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while pos < result.len() {
        let Some(start) = result[pos..].find("${") else {
            break;
        };
        let abs_start = pos + start;
        let Some(end) = result[abs_start..].find('}') else {
            break;
        };
        let var_name = result[abs_start + 2..abs_start + end].to_string();
        if ALLOWED_ENV_VARS.contains(&var_name.as_str()) {
            let value = std::env::var(&var_name).unwrap_or_default();
            result.replace_range(abs_start..abs_start + end + 1, &value);
            pos = abs_start + value.len();
        } else {
            pos = abs_start + end + 1;
        }
    }
    result
}
