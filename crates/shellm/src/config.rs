//! File configuration, read from `~/.config/shellm/config.toml`.
//!
//! A missing or unreadable file means defaults. Individual invalid
//! values are warned about and ignored; a bad config can never make the
//! translator fail to start.

use std::fs;
use std::path::PathBuf;

use crate::providers::registry::ProviderType;

#[derive(Debug, Clone)]
pub struct Config {
    /// Active provider for this run
    pub provider: ProviderType,
    /// Model override; None means the provider default
    pub model: Option<String>,
    /// How many lines of recent terminal history to include as context
    pub history_lines: usize,
    /// Maximum tool-call rounds before forcing a final answer
    pub max_rounds: usize,
    /// Line cap for the read_file tool
    pub max_file_lines: usize,
    /// Enable the debug trace file
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderType::Groq,
            model: None,
            history_lines: 20,
            max_rounds: 5,
            max_file_lines: 500,
            debug: false,
        }
    }
}

impl Config {
    /// Load configuration, merging the TOML file over the defaults.
    /// `path` overrides the default location (used by tests).
    pub fn load(path: Option<PathBuf>) -> Self {
        let mut config = Config::default();

        let Some(path) = path.or_else(default_path) else {
            return config;
        };
        let Ok(raw) = fs::read_to_string(&path) else {
            return config;
        };
        let table: toml::Table = match raw.parse() {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!("error reading config: {e}");
                return config;
            }
        };

        if let Some(section) = table.get("provider").and_then(|v| v.as_table()) {
            if let Some(primary) = section.get("primary") {
                match primary
                    .as_str()
                    .and_then(|s| s.parse::<ProviderType>().ok())
                {
                    Some(provider) => config.provider = provider,
                    None => tracing::warn!("unknown provider {primary}, ignoring"),
                }
            }
            if let Some(model) = section.get("model") {
                match model.as_str().map(str::trim).filter(|s| !s.is_empty()) {
                    Some(model) => config.model = Some(model.to_string()),
                    None => tracing::warn!("config 'model' must be a non-empty string, ignoring"),
                }
            }
        }

        if let Some(section) = table.get("context").and_then(|v| v.as_table()) {
            if let Some(value) = section.get("history_lines") {
                if let Some(value) = validated_int(value, "history_lines", 1) {
                    config.history_lines = value;
                }
            }
        }

        if let Some(section) = table.get("tools").and_then(|v| v.as_table()) {
            if let Some(value) = section.get("max_rounds") {
                if let Some(value) = validated_int(value, "max_rounds", 1) {
                    config.max_rounds = value;
                }
            }
            if let Some(value) = section.get("max_file_lines") {
                if let Some(value) = validated_int(value, "max_file_lines", 10) {
                    config.max_file_lines = value;
                }
            }
        }

        if let Some(section) = table.get("debug").and_then(|v| v.as_table()) {
            if let Some(enabled) = section.get("enabled").and_then(|v| v.as_bool()) {
                config.debug = enabled;
            }
        }

        config
    }
}

fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("shellm").join("config.toml"))
}

fn validated_int(value: &toml::Value, key: &str, minimum: i64) -> Option<usize> {
    match value.as_integer() {
        Some(v) if v >= minimum => Some(v as usize),
        Some(_) => {
            tracing::warn!("config '{key}' must be >= {minimum}, ignoring");
            None
        }
        None => {
            tracing::warn!("config '{key}' must be an integer, ignoring");
            None
        }
    }
}
