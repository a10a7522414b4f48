//! Xray Server / Data Center importer.
//!
//! Uses basic authentication, or a personal access token sent as a bearer
//! token when `username` is empty. `authenticate` checks the credentials
//! against Jira before any import is attempted.
//!
//! # Example Configuration
//!
//! ```toml
//! [xray]
//! cloud = false
//! base_url = "https://jira.example.com"
//! username = ""
//! password = "${JIRA_PAT}"
//! ```

use anyhow::Context;
use async_trait::async_trait;
use reqwest::RequestBuilder;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::debug;

use super::{
    ImportError, ImportResult, Importer, RequestBody, build_client, multipart_form, read_body,
    request_body, trim_base_url,
};
use crate::config::{Credentials, ImportTarget, XrayConfig};

#[derive(Deserialize)]
struct ImportResponse {
    #[serde(rename = "testExecIssue")]
    test_exec_issue: Option<IssueRef>,
}

#[derive(Deserialize)]
struct IssueRef {
    key: Option<String>,
}

/// Importer for Xray Server and Data Center.
pub struct XrayServer {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    target: ImportTarget,
    authenticated: bool,
    test_exec_key: Option<String>,
}

impl XrayServer {
    /// Creates a Server importer from the connection settings.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is missing, the credentials reference
    /// unset environment variables or the HTTP client cannot be built.
    pub fn new(config: &XrayConfig, target: ImportTarget) -> anyhow::Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .map(trim_base_url)
            .context("xray.base_url is required for Xray Server")?;
        let test_exec_key = target.preset_test_exec_key();

        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base_url,
            credentials: config.credentials()?,
            target,
            authenticated: false,
            test_exec_key,
        })
    }

    fn auth_url(&self) -> String {
        format!("{}/rest/api/2/myself", self.base_url)
    }

    fn import_url(&self, multipart: bool) -> String {
        let suffix = if multipart { "/multipart" } else { "" };
        format!(
            "{}/rest/raven/1.0{}{}",
            self.base_url,
            self.target.format.endpoint(),
            suffix
        )
    }

    fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
        if self.credentials.username.is_empty() {
            request.bearer_auth(&self.credentials.password)
        } else {
            request.basic_auth(&self.credentials.username, Some(&self.credentials.password))
        }
    }
}

fn parse_import_response(body: &str) -> ImportResult<String> {
    let response: ImportResponse = serde_json::from_str(body)
        .map_err(|e| ImportError::InvalidResponse(format!("{}: {}", e, body)))?;
    Ok(response
        .test_exec_issue
        .and_then(|issue| issue.key)
        .unwrap_or_default())
}

#[async_trait]
impl Importer for XrayServer {
    fn name(&self) -> &'static str {
        "xray-server"
    }

    async fn authenticate(&mut self) -> ImportResult<()> {
        let response = self.with_auth(self.client.get(self.auth_url())).send().await?;
        read_body(response).await.map_err(|e| match e {
            ImportError::Rejected { status, body } => {
                ImportError::Authentication(format!("status {}: {}", status, body))
            }
            other => other,
        })?;

        self.authenticated = true;
        debug!("Verified Jira credentials for {}", self.base_url);
        Ok(())
    }

    async fn import(&self, content: Vec<u8>, content_type: &str) -> ImportResult<String> {
        if !self.authenticated {
            return Err(ImportError::NotAuthenticated);
        }
        let exec_key = self.test_exec_key.as_deref();

        let request = match request_body(&self.target, exec_key) {
            RequestBody::Plain => self
                .client
                .post(self.import_url(false))
                .query(&self.target.query_params(exec_key))
                .header(CONTENT_TYPE, content_type)
                .body(content),
            RequestBody::Multipart(info) => self
                .client
                .post(self.import_url(true))
                .multipart(multipart_form("file", content, content_type, &info)?),
        };

        let response = self.with_auth(request).send().await?;
        let body = read_body(response).await?;
        parse_import_response(&body)
    }

    fn set_test_exec_key(&mut self, key: String) {
        self.test_exec_key = Some(key);
    }
}
