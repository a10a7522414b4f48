//! Importer trait and implementations for the Xray import API.
//!
//! An [`Importer`] performs one unit of work for the orchestrator: it takes
//! the content of a single result file and imports it into Xray, returning
//! the key of the test execution the results landed in.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Importer                              │
//! │                                                              │
//! │  authenticate()            (once, before any import)         │
//! │  import(content, mime) ───► test execution key               │
//! │  set_test_exec_key(key)    (once, after a seed import)       │
//! └─────────────────────────────────────────────────────────────┘
//!            ▲                                   ▲
//!            │                                   │
//!      [`cloud::XrayCloud`]              [`server::XrayServer`]
//!      /api/v2, bearer token             /rest/raven/1.0, basic/PAT
//! ```
//!
//! The variant is chosen once from the `xray.cloud` flag. Everything else in
//! the crate only sees the trait.
//!
//! # Test Execution Key
//!
//! The key is the only mutable state an importer has, and it can only be
//! changed through `&mut self`. The orchestrator sets it between the seed
//! import and the fan-out, while it still holds exclusive access; during the
//! fan-out the importer is shared and the key is read-only.

pub mod cloud;
pub mod server;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::config::ImportTarget;

pub use cloud::XrayCloud;
pub use server::XrayServer;

/// Result type for importer operations.
pub type ImportResult<T> = Result<T, ImportError>;

/// Errors that can occur while talking to Xray.
///
/// - **Setup**: `Authentication`, `NotAuthenticated` abort the whole batch
/// - **Per file**: everything else is counted against a single file
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// Credentials were rejected or the token could not be obtained.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// An import was attempted before [`Importer::authenticate`] succeeded.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The request could not be sent or the response could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Xray answered with a non-success status.
    #[error("Import rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Xray answered with a body that could not be interpreted.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The result file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Importer-specific error not covered by other variants.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// A client that imports result files into a test execution.
///
/// # Example
///
/// ```no_run
/// use xray_import::config::load_config;
/// use xray_import::importer::{Importer, XrayCloud};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = load_config(std::path::Path::new("xray-import.toml"))?;
///     let mut importer = XrayCloud::new(&config.xray, config.import.clone())?;
///
///     importer.authenticate().await?;
///     let content = std::fs::read("target/junit.xml")?;
///     let key = importer.import(content, "application/xml").await?;
///     println!("Imported into {}", key);
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait Importer: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    /// Authenticates with Xray. Must succeed before any import.
    async fn authenticate(&mut self) -> ImportResult<()>;

    /// Imports one result file and returns the test execution key.
    ///
    /// An empty string means Xray accepted the file but reported no key.
    async fn import(&self, content: Vec<u8>, content_type: &str) -> ImportResult<String>;

    /// Directs all subsequent imports into the given test execution.
    fn set_test_exec_key(&mut self, key: String);
}

/// How the body of an import request is encoded.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RequestBody {
    /// Raw file content, with Jira fields passed as query parameters.
    Plain,
    /// Multipart form with the file and an `info` part describing the
    /// test execution issue to create.
    Multipart(serde_json::Value),
}

/// Picks the request encoding for the current state.
///
/// Test execution fields only matter while creating a new execution. Once
/// a key is known, imports go to the plain endpoint with `testExecKey` so
/// that they join the existing execution instead of creating another one.
pub(crate) fn request_body(target: &ImportTarget, test_exec_key: Option<&str>) -> RequestBody {
    match (&target.test_execution_json, test_exec_key) {
        (Some(info), None) => RequestBody::Multipart(info.clone()),
        _ => RequestBody::Plain,
    }
}

/// Builds a multipart form with the given part names.
pub(crate) fn multipart_form(
    file_part: &'static str,
    content: Vec<u8>,
    content_type: &str,
    info: &serde_json::Value,
) -> ImportResult<Form> {
    let results = Part::bytes(content)
        .file_name(file_part)
        .mime_str(content_type)?;
    let info = Part::text(info.to_string())
        .file_name("info.json")
        .mime_str("application/json")?;

    Ok(Form::new().part(file_part, results).part("info", info))
}

pub(crate) fn build_client(timeout_secs: u64) -> ImportResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("xray-import/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

pub(crate) fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Reads the body of a response, mapping non-success statuses to
/// [`ImportError::Rejected`].
pub(crate) async fn read_body(response: reqwest::Response) -> ImportResult<String> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ImportError::Rejected {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}
