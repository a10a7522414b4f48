//! Configuration schema definitions for xray-import.
//!
//! This module defines all configuration types that can be deserialized from
//! TOML configuration files. The schema uses serde for deserialization and
//! defaults so that a minimal file only needs credentials and a path pattern.
//!
//! # Schema Overview
//!
//! ```text
//! Config (root)
//! ├── XrayConfig        - Connection settings (cloud/server, credentials)
//! ├── ImportTarget      - What is imported and where it lands in Jira
//! │   └── TestFormat    - Result format, selects the import endpoint
//! └── ImportOptions     - Orchestration policy (parallelism, error handling)
//! ```

use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Root configuration structure for xray-import.
///
/// # TOML Structure
///
/// ```toml
/// [xray]
/// cloud = true
/// username = "${XRAY_CLIENT_ID}"
/// password = "${XRAY_CLIENT_SECRET}"
///
/// [import]
/// format = "junit"
/// paths = "reports/**/*.xml"
/// project_key = "PROJ"
///
/// [options]
/// combine_in_single_test_exec = true
/// import_parallelism = 4
/// ```
///
/// # Example
///
/// ```
/// use xray_import::config::Config;
///
/// let config: Config = toml::from_str(r#"
///     [xray]
///     username = "id"
///     password = "secret"
///
///     [import]
///     format = "junit"
///     paths = "target/*.xml"
/// "#).unwrap();
///
/// assert!(config.xray.cloud);
/// assert_eq!(config.options.import_parallelism, 2);
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Connection settings for the Xray instance.
    pub xray: XrayConfig,

    /// Import target: format, file patterns and Jira fields.
    pub import: ImportTarget,

    /// Orchestration policy (optional, has defaults).
    #[serde(default)]
    pub options: ImportOptions,
}

impl Config {
    /// Checks constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `options.import_parallelism` is zero
    /// - the server variant is selected without a `base_url`
    /// - `import.paths` is empty
    pub fn validate(&self) -> Result<()> {
        if self.options.import_parallelism == 0 {
            bail!("options.import_parallelism must be at least 1");
        }
        if !self.xray.cloud && self.xray.base_url.is_none() {
            bail!("xray.base_url is required when xray.cloud = false");
        }
        if self.import.paths.trim().is_empty() {
            bail!("import.paths must contain at least one pattern");
        }
        Ok(())
    }
}

/// Connection settings for Xray.
///
/// The `cloud` flag selects the importer variant once, at construction.
/// Credentials are client id / client secret for Xray Cloud and
/// username / password (or an empty username plus a personal access
/// token) for Xray Server / Data Center.
///
/// # Defaults
///
/// | Field | Default |
/// |-------|---------|
/// | `cloud` | `true` |
/// | `base_url` | None (Cloud uses `https://xray.cloud.getxray.app`) |
/// | `timeout_secs` | 60 |
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct XrayConfig {
    /// Use Xray Cloud (`true`) or Xray Server / Data Center (`false`).
    #[serde(default = "default_true")]
    pub cloud: bool,

    /// Base URL of the Xray instance.
    ///
    /// Required for Server. For Cloud it overrides the public endpoint.
    pub base_url: Option<String>,

    /// Client id (Cloud) or Jira username (Server).
    ///
    /// `${VAR}` references are expanded from the environment.
    #[serde(default)]
    pub username: String,

    /// Client secret (Cloud), password or personal access token (Server).
    ///
    /// `${VAR}` references are expanded from the environment.
    #[serde(default)]
    pub password: String,

    /// Timeout applied to every HTTP request, in seconds.
    ///
    /// Default: 60
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl XrayConfig {
    /// Returns the credentials with environment references expanded.
    ///
    /// # Example
    ///
    /// ```
    /// use xray_import::config::XrayConfig;
    ///
    /// let config = XrayConfig {
    ///     cloud: true,
    ///     base_url: None,
    ///     username: "plain-id".to_string(),
    ///     password: "plain-secret".to_string(),
    ///     timeout_secs: 60,
    /// };
    /// let creds = config.credentials().unwrap();
    /// assert_eq!(creds.username, "plain-id");
    /// ```
    pub fn credentials(&self) -> Result<Credentials> {
        let username = shellexpand::env(&self.username)
            .with_context(|| "Failed to expand xray.username".to_string())?
            .into_owned();
        let password = shellexpand::env(&self.password)
            .with_context(|| "Failed to expand xray.password".to_string())?
            .into_owned();

        Ok(Credentials { username, password })
    }
}

/// Resolved credentials for authenticating with Xray.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    60
}

/// Test result format understood by the Xray import API.
///
/// The format selects the import endpoint. `xray` is Xray's native JSON
/// format and is posted to the bare `/import/execution` endpoint; every
/// other format gets its own sub-path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestFormat {
    Xray,
    Cucumber,
    Behave,
    Junit,
    Testng,
    Nunit,
    Xunit,
    Robot,
}

impl TestFormat {
    /// Path of the import endpoint, relative to the API root.
    ///
    /// ```
    /// use xray_import::config::TestFormat;
    ///
    /// assert_eq!(TestFormat::Xray.endpoint(), "/import/execution");
    /// assert_eq!(TestFormat::Junit.endpoint(), "/import/execution/junit");
    /// ```
    pub fn endpoint(&self) -> String {
        match self {
            TestFormat::Xray => "/import/execution".to_string(),
            other => format!("/import/execution/{}", other.as_str()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TestFormat::Xray => "xray",
            TestFormat::Cucumber => "cucumber",
            TestFormat::Behave => "behave",
            TestFormat::Junit => "junit",
            TestFormat::Testng => "testng",
            TestFormat::Nunit => "nunit",
            TestFormat::Xunit => "xunit",
            TestFormat::Robot => "robot",
        }
    }
}

impl std::fmt::Display for TestFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What gets imported and which Jira entities the results attach to.
///
/// Empty strings are treated the same as missing values: they are not
/// sent to Xray.
///
/// # Example
///
/// ```toml
/// [import]
/// format = "junit"
/// paths = """
/// build/test-results/**/*.xml
/// !build/test-results/**/flaky-*.xml
/// """
/// project_key = "PROJ"
/// test_plan_key = "PROJ-42"
/// test_environments = "chrome;linux"
/// revision = "3f2a9c1"
/// fix_version = "1.4.0"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImportTarget {
    /// Format of the result files.
    pub format: TestFormat,

    /// Newline-separated glob patterns. A leading `!` excludes matches.
    pub paths: String,

    /// Existing test execution to import into.
    ///
    /// When set, no seed import is needed: every file is imported into
    /// this execution.
    #[serde(default)]
    pub test_exec_key: Option<String>,

    /// Jira project that new test executions are created in.
    #[serde(default)]
    pub project_key: Option<String>,

    /// Test plan to associate the execution with.
    #[serde(default)]
    pub test_plan_key: Option<String>,

    /// Semicolon-separated test environments.
    #[serde(default)]
    pub test_environments: Option<String>,

    /// Source code revision the tests ran against.
    #[serde(default)]
    pub revision: Option<String>,

    /// Fix version to assign to the execution.
    #[serde(default)]
    pub fix_version: Option<String>,

    /// Test execution issue fields, sent as the `info` part of a
    /// multipart import when a new execution is created.
    #[serde(default)]
    pub test_execution_json: Option<serde_json::Value>,
}

impl ImportTarget {
    /// The pre-configured test execution key, if any.
    pub fn preset_test_exec_key(&self) -> Option<String> {
        non_empty(&self.test_exec_key)
    }

    /// Query parameters for an import request.
    ///
    /// `test_exec_key` is the key known to the importer at request time,
    /// which may differ from the configured one after a seed import.
    /// Empty values are omitted.
    pub fn query_params(&self, test_exec_key: Option<&str>) -> Vec<(&'static str, String)> {
        let mut params = BTreeMap::new();
        let mut put = |name: &'static str, value: Option<String>| {
            if let Some(value) = value {
                params.insert(name, value);
            }
        };

        put("projectKey", non_empty(&self.project_key));
        put(
            "testExecKey",
            test_exec_key
                .filter(|k| !k.trim().is_empty())
                .map(str::to_string),
        );
        put("testPlanKey", non_empty(&self.test_plan_key));
        put("testEnvironments", non_empty(&self.test_environments));
        put("revision", non_empty(&self.revision));
        put("fixVersion", non_empty(&self.fix_version));

        params.into_iter().collect()
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Import orchestration policy.
///
/// # Defaults
///
/// | Field | Default |
/// |-------|---------|
/// | `combine_in_single_test_exec` | false |
/// | `fail_on_import_error` | true |
/// | `continue_on_import_error` | true |
/// | `import_parallelism` | 2 |
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImportOptions {
    /// Import the first file alone to create a test execution, then
    /// import every other file into that same execution.
    #[serde(default)]
    pub combine_in_single_test_exec: bool,

    /// Report the batch as failed when any import failed.
    #[serde(default = "default_true")]
    pub fail_on_import_error: bool,

    /// Keep importing after a failed import. When false, the first
    /// failure stops scheduling of further files.
    #[serde(default = "default_true")]
    pub continue_on_import_error: bool,

    /// Maximum number of imports in flight at once.
    #[serde(default = "default_import_parallelism")]
    pub import_parallelism: usize,
}

fn default_import_parallelism() -> usize {
    2
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            combine_in_single_test_exec: false,
            fail_on_import_error: true,
            continue_on_import_error: true,
            import_parallelism: default_import_parallelism(),
        }
    }
}
