use crate::{ConfigError, VshConfig};
use regex::{Captures, Regex};
use std::path::PathBuf;
use std::sync::OnceLock;

pub struct ConfigLoader {
    explicit_file: Option<PathBuf>,
    search_paths: Vec<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        if let Some(home) = dirs::home_dir() {
            search_paths.push(home.join(".config/vsh/vsh.yaml"));
        }
        search_paths.push(PathBuf::from("./vsh.yaml"));

        #[cfg(unix)]
        search_paths.insert(0, PathBuf::from("/etc/vsh/vsh.yaml"));

        Self {
            explicit_file: None,
            search_paths,
        }
    }

    pub fn with_file(mut self, path: &str) -> Self {
        self.explicit_file = Some(PathBuf::from(path));
        self
    }

    /// Only the explicit file (if any) and environment overrides.
    pub fn without_search_paths(mut self) -> Self {
        self.search_paths.clear();
        self
    }

    pub fn load(&self) -> Result<VshConfig, ConfigError> {
        let mut config = VshConfig::default();

        if let Ok(env_path) = std::env::var("VSH_CONFIG") {
            config = self.parse_file(&PathBuf::from(env_path))?;
        } else if let Some(ref explicit) = self.explicit_file {
            config = self.parse_file(explicit)?;
        } else {
            for path in &self.search_paths {
                if path.exists() {
                    if let Ok(content) = std::fs::read_to_string(path) {
                        tracing::debug!(path = %path.display(), "merging config file");
                        config = self.merge_yaml(&config, &content)?;
                    }
                }
            }
        }

        self.apply_env_overrides(&mut config)?;
        Ok(config)
    }

    fn parse_file(&self, path: &PathBuf) -> Result<VshConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;
        self.parse_yaml(&content)
    }

    fn parse_yaml(&self, content: &str) -> Result<VshConfig, ConfigError> {
        let expanded = self.expand_env_vars(content);
        Ok(serde_yaml::from_str(&expanded)?)
    }

    fn merge_yaml(&self, base: &VshConfig, content: &str) -> Result<VshConfig, ConfigError> {
        let overlay = self.parse_yaml(content)?;
        Ok(self.merge_configs(base, &overlay))
    }

    /// Sections of `overlay` that differ from the defaults replace `base`'s.
    fn merge_configs(&self, base: &VshConfig, overlay: &VshConfig) -> VshConfig {
        let defaults = VshConfig::default();
        let mut result = base.clone();

        if overlay.shell != defaults.shell {
            result.shell = overlay.shell.clone();
        }
        if overlay.storage != defaults.storage {
            result.storage = overlay.storage.clone();
        }
        if overlay.logging != defaults.logging {
            result.logging = overlay.logging.clone();
        }
        if overlay.limits != defaults.limits {
            result.limits = overlay.limits;
        }

        result
    }

    fn expand_env_vars(&self, content: &str) -> String {
        static VAR: OnceLock<Option<Regex>> = OnceLock::new();
        let Some(re) = VAR.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").ok()) else {
            return content.to_string();
        };
        re.replace_all(content, |caps: &Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .to_string()
    }

    fn apply_env_overrides(&self, config: &mut VshConfig) -> Result<(), ConfigError> {
        if let Ok(user) = std::env::var("VSH_USER") {
            if !user.is_empty() {
                config.shell.user = user;
            }
        }
        if let Ok(state) = std::env::var("VSH_STATE") {
            if !state.is_empty() {
                config.storage.path = state;
            }
        }
        if let Ok(storage) = std::env::var("VSH_STORAGE") {
            config.storage.backend = storage.parse()?;
        }
        if let Ok(level) = std::env::var("VSH_LOG_LEVEL") {
            if let Ok(l) = serde_yaml::from_str(&level) {
                config.logging.level = l;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LogLevel, StorageBackend};
    use std::io::Write;

    #[test]
    fn expand_env_vars_works() {
        std::env::set_var("VSH_TEST_VAR_123", "hello");
        let loader = ConfigLoader::new();
        let result = loader.expand_env_vars("value: ${VSH_TEST_VAR_123}");
        assert_eq!(result, "value: hello");
        std::env::remove_var("VSH_TEST_VAR_123");
    }

    #[test]
    fn missing_env_var_becomes_empty() {
        let loader = ConfigLoader::new();
        let result = loader.expand_env_vars("value: ${NONEXISTENT_VAR_XYZ}");
        assert_eq!(result, "value: ");
    }

    #[test]
    fn merge_keeps_untouched_sections() {
        let loader = ConfigLoader::new();
        let mut base = VshConfig::default();
        base.limits.alias_depth = 3;
        let merged = loader
            .merge_yaml(&base, "logging:\n  level: debug\n")
            .unwrap();
        assert_eq!(merged.logging.level, LogLevel::Debug);
        assert_eq!(merged.limits.alias_depth, 3);
    }

    #[test]
    fn explicit_file_is_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "shell:\n  user: alice\nstorage:\n  backend: memory").unwrap();
        let config = ConfigLoader::new()
            .without_search_paths()
            .with_file(file.path().to_str().unwrap())
            .load()
            .unwrap();
        assert_eq!(config.shell.user, "alice");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn unreadable_explicit_file_errors() {
        let err = ConfigLoader::new()
            .with_file("/definitely/not/here.yaml")
            .load();
        assert!(matches!(err, Err(ConfigError::ReadFile { .. })));
    }

    #[test]
    fn env_overrides_config() {
        std::env::set_var("VSH_LOG_LEVEL", "trace");
        let mut config = VshConfig::default();
        ConfigLoader::new().apply_env_overrides(&mut config).unwrap();
        assert_eq!(config.logging.level, LogLevel::Trace);
        std::env::remove_var("VSH_LOG_LEVEL");
    }
}
