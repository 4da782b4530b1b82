//! Host configuration: where the state file lives, how it is encoded and
//! what the initial tree is.
//!
//! Stored as YAML (`sst.yaml`) in a config directory. Every field has a
//! default, so a missing or partial file is valid; unknown keys are
//! ignored.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::codec::Format;
use crate::error::StoreError;
use crate::value::Value;

pub const CONFIG_FILE: &str = "sst.yaml";


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// State file, relative to the config directory unless absolute.
    pub state_file: PathBuf,
    pub format: Format,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial: Option<Value>,
    pub log_level: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            state_file: PathBuf::from("settings.json"),
            format: Format::Json,
            initial: None,
            log_level: "warn".into(),
        }
    }
}

impl StoreConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<StoreConfig, StoreError> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StoreConfig::default()),
            Err(e) => Err(StoreError::Config(format!(
                "cannot read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Load `sst.yaml` from a config directory.
    pub fn load_from_dir(config_dir: &Path) -> Result<StoreConfig, StoreError> {
        Self::load(&config_dir.join(CONFIG_FILE))
    }

    pub fn parse(content: &str) -> Result<StoreConfig, StoreError> {
        if content.trim().is_empty() {
            return Ok(StoreConfig::default());
        }
        let config: StoreConfig = serde_yaml::from_str(content)
            .map_err(|e| StoreError::Config(format!("invalid config: {}", e)))?;
        if let Some(initial) = &config.initial {
            if !initial.is_map() {
                return Err(StoreError::Config(format!(
                    "initial must be a map, got {}",
                    initial.type_name()
                )));
            }
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| StoreError::Config(format!("cannot encode config: {}", e)))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Absolute location of the state file.
    pub fn resolve_state_file(&self, config_dir: &Path) -> PathBuf {
        if self.state_file.is_absolute() {
            self.state_file.clone()
        } else {
            config_dir.join(&self.state_file)
        }
    }

    /// The configured initial tree, or an empty map.
    pub fn initial_state(&self) -> Value {
        self.initial.clone().unwrap_or_else(Value::empty_map)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_empty_returns_defaults() {
        assert_eq!(StoreConfig::parse("").unwrap(), StoreConfig::default());
        assert_eq!(StoreConfig::parse("\n  \n").unwrap(), StoreConfig::default());
    }

    #[test]
    fn parse_partial_fills_defaults() {
        let config = StoreConfig::parse("format: yaml\nstate_file: prefs.yaml\n").unwrap();
        assert_eq!(config.format, Format::Yaml);
        assert_eq!(config.state_file, PathBuf::from("prefs.yaml"));
        assert_eq!(config.log_level, "warn");
        assert!(config.initial.is_none());
    }

    #[test]
    fn parse_initial_tree_keeps_order() {
        let text = "\
initial:
  theme: light
  editor:
    tab_size: 4
    wrap: false
";
        let config = StoreConfig::parse(text).unwrap();
        let initial = config.initial_state();
        assert_eq!(
            initial,
            json!({"theme": "light", "editor": {"tab_size": 4, "wrap": false}}).into()
        );
        let keys: Vec<&String> = initial.as_map().unwrap().keys().collect();
        assert_eq!(keys, vec!["theme", "editor"]);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config = StoreConfig::parse("something_else: 1\nlog_level: debug\n").unwrap();
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn non_map_initial_is_rejected() {
        let err = StoreConfig::parse("initial: [1, 2]\n").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn malformed_yaml_is_config_error() {
        assert!(matches!(
            StoreConfig::parse("format: [unclosed"),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn missing_file_returns_defaults() {
        let config = StoreConfig::load(Path::new("/nonexistent/sst/sst.yaml")).unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn resolve_state_file_relative_and_absolute() {
        let dir = Path::new("/home/u/.config/settings-store");
        let config = StoreConfig::default();
        assert_eq!(config.resolve_state_file(dir), dir.join("settings.json"));

        let config = StoreConfig {
            state_file: PathBuf::from("/var/lib/sst/state.yaml"),
            ..StoreConfig::default()
        };
        assert_eq!(
            config.resolve_state_file(dir),
            PathBuf::from("/var/lib/sst/state.yaml")
        );
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = std::env::temp_dir().join("settings_store_config_tests");
        let _ = fs::remove_dir_all(&dir);

        let config = StoreConfig {
            format: Format::Yaml,
            initial: Some(json!({"a": {"b": 1}}).into()),
            log_level: "info".into(),
            ..StoreConfig::default()
        };
        config.save(&dir.join(CONFIG_FILE)).unwrap();
        let loaded = StoreConfig::load_from_dir(&dir).unwrap();
        assert_eq!(loaded, config);

        let _ = fs::remove_dir_all(&dir);
    }
}
