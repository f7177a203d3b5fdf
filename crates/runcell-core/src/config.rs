//! Runner configuration.
//!
//! Loaded from `runcell.yaml`, either at an explicit path or from the
//! runcell home directory when present. Every field has a default so an
//! absent file means a fully default configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core_types::{resolve_language, LanguageId};
use crate::errors::ConfigError;
use crate::session::runcell_home;

const CONFIG_FILE: &str = "runcell.yaml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Start every catalog runtime as soon as the runner is built.
    pub autostart: bool,
    /// Interpreter overrides keyed by language name (any name the
    /// catalog resolves). Values are interpreter binary paths.
    pub runtimes: HashMap<String, PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            autostart: true,
            runtimes: HashMap::new(),
        }
    }
}

impl RunnerConfig {
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ConfigError::Read {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
        Self::from_str(&content)
    }

    /// Loads from `explicit` when given (a missing file is then an
    /// error), otherwise from `<runcell home>/runcell.yaml` when that
    /// exists, otherwise defaults.
    pub async fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path).await;
        }
        if let Some(home) = runcell_home() {
            let path = home.join(CONFIG_FILE);
            if path.exists() {
                log::info!("Loading configuration from {}", path.display());
                return Self::from_file(&path).await;
            }
        }
        log::debug!("No configuration file found; using defaults");
        Ok(Self::default())
    }

    /// Every key in the runtimes section must resolve to a catalog
    /// language, and no two keys may name the same one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen: HashMap<LanguageId, &str> = HashMap::new();
        for key in self.runtimes.keys() {
            match resolve_language(key) {
                Some(language) => {
                    if let Some(previous) = seen.insert(language.id, key.as_str()) {
                        return Err(ConfigError::DuplicateOverride(
                            previous.to_string(),
                            key.clone(),
                        ));
                    }
                }
                None => return Err(ConfigError::UnknownLanguage(key.clone())),
            }
        }
        Ok(())
    }

    /// Configured interpreter path for `language`, if any.
    pub fn interpreter_for(&self, language: LanguageId) -> Option<PathBuf> {
        self.runtimes.iter().find_map(|(key, path)| {
            match resolve_language(key) {
                Some(entry) if entry.id == language => Some(path.clone()),
                _ => None,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = RunnerConfig::from_str("autostart: false\n").unwrap();
        assert!(!config.autostart);
        assert!(config.runtimes.is_empty());

        let config = RunnerConfig::from_str("runtimes: {}\n").unwrap();
        assert!(config.autostart);
    }

    #[test]
    fn runtime_keys_resolve_through_the_catalog() {
        let config = RunnerConfig::from_str(
            "runtimes:\n  node: /opt/node/bin/node\n  Python: /usr/local/bin/python3\n",
        )
        .unwrap();
        assert_eq!(
            config.interpreter_for(LanguageId::JavaScript),
            Some(PathBuf::from("/opt/node/bin/node"))
        );
        assert_eq!(
            config.interpreter_for(LanguageId::Python),
            Some(PathBuf::from("/usr/local/bin/python3"))
        );
    }

    #[test]
    fn unknown_runtime_keys_are_rejected() {
        let error = RunnerConfig::from_str("runtimes:\n  ruby: /usr/bin/ruby\n").unwrap_err();
        assert!(matches!(error, ConfigError::UnknownLanguage(key) if key == "ruby"));
    }

    #[test]
    fn two_keys_for_one_language_are_rejected() {
        let error = RunnerConfig::from_str(
            "runtimes:\n  python: /usr/bin/python3\n  python3: /usr/local/bin/python3\n",
        )
        .unwrap_err();
        assert!(matches!(error, ConfigError::DuplicateOverride(..)));
    }

    #[tokio::test]
    async fn explicit_path_must_exist() {
        let error = RunnerConfig::load(Some(Path::new("/no/such/runcell.yaml")))
            .await
            .unwrap_err();
        assert!(matches!(error, ConfigError::Read { .. }));
    }

    #[tokio::test]
    #[serial]
    async fn home_config_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join(CONFIG_FILE)).unwrap();
        writeln!(file, "autostart: false").unwrap();

        std::env::set_var("RUNCELL_HOME", dir.path());
        let config = RunnerConfig::load(None).await.unwrap();
        std::env::remove_var("RUNCELL_HOME");

        assert!(!config.autostart);
    }

    #[tokio::test]
    #[serial]
    async fn absent_home_config_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("RUNCELL_HOME", dir.path());
        let config = RunnerConfig::load(None).await.unwrap();
        std::env::remove_var("RUNCELL_HOME");

        assert!(config.autostart);
        assert!(config.runtimes.is_empty());
    }
}
