//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/convind/config.toml)
//! 3. Environment variables (CONVIND_* prefix)
//!
//! Environment variables take precedence over config file values.
//!
//! ## Handler-sets
//!
//! Command handler-sets are declared in order; each rule matches on a MIME
//! type prefix and names the command that derives the artifact:
//!
//! ```toml
//! [[handler_sets]]
//! name = "wc"
//!
//! [[handler_sets.rules]]
//! mime_prefix = "text/"
//! command = ["wc"]
//! output = "text/plain"   # or "passthrough" to keep the source type
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::class::{CommandSetConfig, OutputMime, Rule};

/// Environment variable prefix
const ENV_PREFIX: &str = "CONVIND";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the content store
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory for derived artifacts
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Log destination (stderr when unset)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Command handler-sets, in registration order
    #[serde(default = "default_handler_sets")]
    pub handler_sets: Vec<CommandSetConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            cache_dir: default_cache_dir(),
            log_file: None,
            handler_sets: default_handler_sets(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (CONVIND_DATA_DIR, CONVIND_CACHE_DIR, CONVIND_LOG_FILE)
    /// 2. Config file (~/.config/convind/config.toml or CONVIND_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_dirs()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // CONVIND_DATA_DIR
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // CONVIND_CACHE_DIR
        if let Ok(val) = std::env::var(format!("{}_CACHE_DIR", ENV_PREFIX)) {
            self.cache_dir = PathBuf::from(val);
        }

        // CONVIND_LOG_FILE
        if let Ok(val) = std::env::var(format!("{}_LOG_FILE", ENV_PREFIX)) {
            self.log_file = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }
    }

    /// Ensure data and cache directories exist
    fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.cache_dir] {
            if !dir.exists() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create directory: {:?}", dir))?;
            }
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_file_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with CONVIND_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("convind")
            .join("config.toml")
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("convind")
        .join("data")
}

/// Get the default artifact cache directory
fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("convind")
}

/// Word counts for any text, and `file -` identification for everything
fn default_handler_sets() -> Vec<CommandSetConfig> {
    vec![
        CommandSetConfig {
            name: "wc".to_string(),
            rules: vec![Rule::prefix(
                "text/",
                ["wc"],
                OutputMime::Fixed("text/plain".to_string()),
            )],
        },
        CommandSetConfig {
            name: "file".to_string(),
            rules: vec![Rule::prefix(
                "",
                ["file", "-"],
                OutputMime::Fixed("text/plain".to_string()),
            )],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &["CONVIND_DATA_DIR", "CONVIND_CACHE_DIR", "CONVIND_LOG_FILE"];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.log_file.is_none());
        assert!(config.data_dir.ends_with("convind/data"));
        assert!(config.cache_dir.ends_with("convind"));

        let names: Vec<_> = config.handler_sets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["wc", "file"]);
    }

    #[test]
    fn test_env_override_dirs() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("CONVIND_DATA_DIR", "/tmp/convind-test/data");
        env::set_var("CONVIND_CACHE_DIR", "/tmp/convind-test/cache");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/convind-test/data"));
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/convind-test/cache"));
    }

    #[test]
    fn test_env_override_log_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("CONVIND_LOG_FILE", "/tmp/convind.log");
        config.apply_env_overrides();
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/convind.log")));

        // Empty string clears it
        env::set_var("CONVIND_LOG_FILE", "");
        config.apply_env_overrides();
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            data_dir: PathBuf::from("/data/convind"),
            cache_dir: PathBuf::from("/cache/convind"),
            log_file: None,
            handler_sets: default_handler_sets(),
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("handler_sets"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.data_dir, config.data_dir);
        assert_eq!(parsed.cache_dir, config.cache_dir);
        assert_eq!(parsed.handler_sets, config.handler_sets);
    }

    #[test]
    fn test_load_from_str_with_handler_sets() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"

            [[handler_sets]]
            name = "thumbnail"

            [[handler_sets.rules]]
            mime_prefix = "image/"
            command = ["convert", "-", "-thumbnail", "128x128", "png:-"]
            output = "image/png"

            [[handler_sets.rules]]
            mime_prefix = "text/"
            command = ["cat"]
            output = "passthrough"
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.handler_sets.len(), 1);

        let rules = &config.handler_sets[0].rules;
        assert_eq!(rules[0].command[0], "convert");
        assert_eq!(rules[0].output, OutputMime::Fixed("image/png".to_string()));
        assert_eq!(rules[1].output, OutputMime::Passthrough);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();

        env::set_var("CONVIND_DATA_DIR", temp_dir.path().join("data"));
        env::set_var("CONVIND_CACHE_DIR", temp_dir.path().join("cache"));

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();

        // Defaults when the file doesn't exist, directories created
        assert!(config.log_file.is_none());
        assert!(config.data_dir.is_dir());
        assert!(config.cache_dir.is_dir());
    }
}
