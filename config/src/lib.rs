//! VSH Configuration System
//!
//! # Configuration Loading Priority
//!
//! 1. Compiled-in defaults
//! 2. `/etc/vsh/vsh.yaml` (system-wide)
//! 3. `~/.config/vsh/vsh.yaml` (user)
//! 4. `./vsh.yaml` (project-local)
//! 5. `VSH_CONFIG=/path/to/config.yaml` (explicit)
//! 6. Environment variables (highest priority)
//!
//! # Example Configuration
//!
//! ```yaml
//! shell:
//!   prompt: "{user}:{cwd}> "
//!   user: guest
//!   history_file: "~/.vsh_history"
//!
//! storage:
//!   backend: file
//!   path: "${HOME}/.local/share/vsh/state.json"
//!
//! logging:
//!   level: info
//!   format: compact
//!
//! limits:
//!   alias_depth: 10
//! ```

#![allow(missing_docs)]

mod error;
mod loader;
mod types;

use std::path::PathBuf;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use types::*;

/// Load configuration from default locations.
///
/// Searches for config files in order and merges them.
/// Environment variables override file values.
pub fn load() -> Result<VshConfig, ConfigError> {
    ConfigLoader::new().load()
}

/// Load configuration from a specific file.
pub fn load_from_file(path: &str) -> Result<VshConfig, ConfigError> {
    ConfigLoader::new().with_file(path).load()
}

/// Expand a leading `~` to the home directory.
#[must_use]
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = VshConfig::default();
        assert_eq!(config.shell.user, "guest");
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.limits.alias_depth, 10);
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = r#"
shell:
  user: root
"#;
        let config: VshConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.shell.user, "root");
        assert_eq!(config.shell.history_size, 1000); // default
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
shell:
  prompt: "[{user} {cwd}] "
  user: alice
  history_size: 50

storage:
  backend: memory
  path: /tmp/ignored.json

logging:
  level: debug
  format: full
  filter: "vsh::jobs=trace"

limits:
  alias_depth: 4
  script_depth: 2
"#;
        let config: VshConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.shell.render_prompt("alice", "/tmp"), "[alice /tmp] ");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Full);
        assert_eq!(config.logging.directives(), "debug,vsh::jobs=trace");
        assert_eq!(config.limits.script_depth, 2);
    }

    #[test]
    fn tilde_expands() {
        let expanded = expand_path("~/state.json");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert_eq!(expand_path("/abs/path"), PathBuf::from("/abs/path"));
    }

    #[test]
    fn storage_backend_parses() {
        assert_eq!("Memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert!("s3".parse::<StorageBackend>().is_err());
    }
}
