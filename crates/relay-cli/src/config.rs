//! Configuration file support

use relay_a2a::A2aConfig;
use relay_agui::AgUiConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for relay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub a2a: A2aSection,
    pub ag_ui: AgUiSection,
}

/// `[a2a]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct A2aSection {
    /// Surface tool results, thinking and tool calls as artifacts
    pub include_internal_events: Option<bool>,
    /// Attach the final answer to the completed status when streaming
    pub complete_with_message: Option<bool>,
    pub run_timeout_secs: Option<u64>,
}

/// `[ag_ui]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgUiSection {
    pub emit_tool_call_args: Option<bool>,
    pub emit_state_events: Option<bool>,
    pub enable_reasoning: Option<bool>,
    pub run_timeout_secs: Option<u64>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("relay")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("RELAY_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "failed to parse config file");
                Self::default()
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read config file");
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Create the config file with the example content if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, example_config())?;
        Ok(path)
    }

    pub fn a2a_config(&self) -> A2aConfig {
        A2aConfig::new()
            .with_internal_events(self.a2a.include_internal_events.unwrap_or(false))
            .with_complete_message(self.a2a.complete_with_message.unwrap_or(false))
            .with_run_timeout(self.a2a.run_timeout_secs.map(Duration::from_secs))
    }

    pub fn ag_ui_config(&self) -> AgUiConfig {
        AgUiConfig::new()
            .with_tool_call_args(self.ag_ui.emit_tool_call_args.unwrap_or(false))
            .with_state_events(self.ag_ui.emit_state_events.unwrap_or(false))
            .with_reasoning(self.ag_ui.enable_reasoning.unwrap_or(false))
            .with_run_timeout(self.ag_ui.run_timeout_secs.map(Duration::from_secs))
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# relay configuration file
# Place at ~/.config/relay/config.toml (Linux/Mac) or %APPDATA%\relay\config.toml (Windows)
# or point RELAY_CONFIG_PATH at it. Command line flags override these values.

[a2a]
# Surface tool results (and, when streaming, thinking and tool calls) as artifacts
include_internal_events = false
# Attach the aggregated answer to the final "completed" status
complete_with_message = true
# Fail the task when the run takes longer than this
# run_timeout_secs = 300

[ag_ui]
# Send TOOL_CALL_ARGS after every TOOL_CALL_START
emit_tool_call_args = true
# Send STATE_SNAPSHOT at start and STATE_DELTA at finish
emit_state_events = false
# Stream thinking as REASONING_MESSAGE_* events
enable_reasoning = false
# run_timeout_secs = 300
"#
}
