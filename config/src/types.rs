use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VshConfig {
    pub shell: ShellConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Prompt template; `{user}` and `{cwd}` are substituted.
    pub prompt: String,
    /// Account the session starts as.
    pub user: String,
    /// Host file for REPL history. `~` is expanded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_file: Option<String>,
    pub history_size: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: "{user}@vsh:{cwd}$ ".to_string(),
            user: "guest".to_string(),
            history_file: Some("~/.vsh_history".to_string()),
            history_size: 1000,
        }
    }
}

impl ShellConfig {
    #[must_use]
    pub fn render_prompt(&self, user: &str, cwd: &str) -> String {
        self.prompt.replace("{user}", user).replace("{cwd}", cwd)
    }

    #[must_use]
    pub fn history_path(&self) -> Option<PathBuf> {
        self.history_file.as_deref().map(crate::expand_path)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    #[default]
    File,
}

impl std::str::FromStr for StorageBackend {
    type Err = crate::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            other => Err(crate::ConfigError::InvalidValue(format!(
                "unknown storage backend '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// JSON state file for the `file` backend. `~` is expanded.
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let path = dirs::data_dir().map_or_else(
            || "./vsh-state.json".to_string(),
            |dir| dir.join("vsh/state.json").display().to_string(),
        );
        Self {
            backend: StorageBackend::File,
            path,
        }
    }
}

impl StorageConfig {
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        crate::expand_path(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Extra `EnvFilter` directives, e.g. `vsh::executor=debug`.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            format: LogFormat::Compact,
            filter: String::new(),
        }
    }
}

impl LoggingConfig {
    /// Directive string for an `EnvFilter`.
    #[must_use]
    pub fn directives(&self) -> String {
        if self.filter.is_empty() {
            self.level.as_str().to_string()
        } else {
            format!("{},{}", self.level.as_str(), self.filter)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Compact,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum nested alias expansions before giving up.
    pub alias_depth: usize,
    /// Maximum nesting of `run` inside scripts.
    pub script_depth: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            alias_depth: 10,
            script_depth: 8,
        }
    }
}
