//! Configuration file discovery and value resolution
//!
//! Both services resolve settings in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "DJMX_CONFIG";

/// Logging section shared by both services' TOML files
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    CommandLine,
    Environment,
    ConfigFile,
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueSource::CommandLine => "command line",
            ValueSource::Environment => "environment",
            ValueSource::ConfigFile => "config file",
            ValueSource::Default => "default",
        };
        f.write_str(name)
    }
}

/// Locate the config file to load, if any
///
/// An explicit path (CLI or `DJMX_CONFIG`) is returned even if missing so the
/// caller reports it; discovered default locations must exist.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join("djmx").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/djmx/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load a TOML config, falling back to `T::default()` when no file is given
pub fn load_toml<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        debug!("No config file found, using built-in defaults");
        return Ok(T::default());
    };

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    let config = toml::from_str::<T>(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Resolve a secret from the environment, then the config file
///
/// Empty strings count as unset. Returns the value and its source; the value
/// itself is never logged.
pub fn resolve_secret(
    env_var_name: &str,
    config_value: Option<&str>,
) -> Option<(String, ValueSource)> {
    if let Ok(value) = std::env::var(env_var_name) {
        if !value.trim().is_empty() {
            return Some((value.trim().to_string(), ValueSource::Environment));
        }
    }

    config_value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| (v.to_string(), ValueSource::ConfigFile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[derive(Debug, Deserialize, Default)]
    struct SampleConfig {
        #[serde(default)]
        port: u16,
        #[serde(default)]
        logging: LoggingConfig,
    }

    #[test]
    fn test_load_toml_without_path_uses_default() {
        let config: SampleConfig = load_toml(None).unwrap();
        assert_eq!(config.port, 0);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_toml_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 6000\n[logging]\nlevel = \"debug\"").unwrap();

        let config: SampleConfig = load_toml(Some(file.path())).unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_toml_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();

        let result: Result<SampleConfig> = load_toml(Some(file.path()));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_toml_missing_explicit_file() {
        let result: Result<SampleConfig> = load_toml(Some(Path::new("/nonexistent/djmx.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_cli_path_wins() {
        let path = resolve_config_path(Some(Path::new("/tmp/explicit.toml")));
        assert_eq!(path, Some(PathBuf::from("/tmp/explicit.toml")));
    }

    #[test]
    #[serial]
    fn test_secret_prefers_environment() {
        std::env::set_var("DJMX_TEST_SECRET", "from-env");
        let resolved = resolve_secret("DJMX_TEST_SECRET", Some("from-file"));
        std::env::remove_var("DJMX_TEST_SECRET");

        assert_eq!(
            resolved,
            Some(("from-env".to_string(), ValueSource::Environment))
        );
    }

    #[test]
    #[serial]
    fn test_secret_falls_back_to_config_file() {
        std::env::set_var("DJMX_TEST_SECRET", "   ");
        let resolved = resolve_secret("DJMX_TEST_SECRET", Some("from-file"));
        std::env::remove_var("DJMX_TEST_SECRET");

        assert_eq!(
            resolved,
            Some(("from-file".to_string(), ValueSource::ConfigFile))
        );
        assert_eq!(resolve_secret("DJMX_TEST_SECRET", Some("")), None);
    }
}
