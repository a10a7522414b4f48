//! Configuration loading and schema definitions for xray-import.
//!
//! This module provides types and functions for loading configuration from
//! TOML files or strings. The schema defines the Xray connection, the import
//! target and the orchestration policy.

pub mod schema;

pub use schema::*;

use std::path::Path;

use anyhow::{Context, Result};

/// Loads xray-import configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read (e.g., doesn't exist or permission denied)
/// - The file contains invalid TOML syntax
/// - The configuration doesn't match the expected schema
///
/// # Example
///
/// ```no_run
/// use xray_import::config::load_config;
/// use std::path::Path;
///
/// let config = load_config(Path::new("xray-import.toml"))?;
/// println!("Parallelism: {}", config.options.import_parallelism);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

/// Loads xray-import configuration from a TOML string.
///
/// Useful for testing or generating configuration programmatically.
///
/// # Example
///
/// ```
/// use xray_import::config::load_config_str;
///
/// let config = load_config_str(r#"
///     [xray]
///     cloud = false
///     base_url = "https://jira.example.com"
///     username = "ci"
///     password = "token"
///
///     [import]
///     format = "junit"
///     paths = "reports/*.xml"
///
///     [options]
///     import_parallelism = 4
/// "#)?;
///
/// assert_eq!(config.options.import_parallelism, 4);
/// assert!(!config.xray.cloud);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn load_config_str(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
        [xray]
        username = "id"
        password = "secret"

        [import]
        format = "cucumber"
        paths = "features/*.json"
    "#;

    #[test]
    fn test_load_minimal_defaults() {
        let config = load_config_str(MINIMAL).unwrap();
        assert!(config.xray.cloud);
        assert_eq!(config.xray.timeout_secs, 60);
        assert_eq!(config.import.format, TestFormat::Cucumber);
        assert!(!config.options.combine_in_single_test_exec);
        assert!(config.options.fail_on_import_error);
        assert!(config.options.continue_on_import_error);
        assert_eq!(config.options.import_parallelism, 2);
        tokio_test::assert_ok!(config.validate());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.import.paths, "features/*.json");
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Path::new("/nonexistent/xray-import.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_unknown_format_rejected() {
        let content = MINIMAL.replace("cucumber", "mocha");
        assert!(load_config_str(&content).is_err());
    }

    #[test]
    fn test_test_execution_json_table() {
        let content = format!(
            "{}\ntest_execution_json = {{ fields = {{ summary = \"Nightly\" }} }}\n",
            MINIMAL
        );
        let config = load_config_str(&content).unwrap();
        let info = config.import.test_execution_json.unwrap();
        assert_eq!(info["fields"]["summary"], "Nightly");
    }

    #[test]
    fn test_validate_rejects_zero_parallelism() {
        let content = format!("{}\n[options]\nimport_parallelism = 0\n", MINIMAL);
        let config = load_config_str(&content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_server_requires_base_url() {
        let content = MINIMAL.replace("username", "cloud = false\nusername");
        let config = load_config_str(&content).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }
}
