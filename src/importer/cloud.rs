//! Xray Cloud importer.
//!
//! Authenticates with a client id / client secret pair against
//! `/api/v2/authenticate` and imports with the returned bearer token.
//!
//! # Example Configuration
//!
//! ```toml
//! [xray]
//! cloud = true
//! username = "${XRAY_CLIENT_ID}"
//! password = "${XRAY_CLIENT_SECRET}"
//! ```

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    ImportError, ImportResult, Importer, RequestBody, build_client, multipart_form, read_body,
    request_body, trim_base_url,
};
use crate::config::{Credentials, ImportTarget, XrayConfig};

/// Public endpoint of Xray Cloud.
pub const DEFAULT_CLOUD_URL: &str = "https://xray.cloud.getxray.app";

#[derive(Serialize)]
struct AuthRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Deserialize)]
struct ImportResponse {
    key: Option<String>,
}

/// Importer for Xray Cloud.
pub struct XrayCloud {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    target: ImportTarget,
    token: Option<String>,
    test_exec_key: Option<String>,
}

impl XrayCloud {
    /// Creates a Cloud importer from the connection settings.
    ///
    /// The pre-configured test execution key of `target`, if any, is used
    /// for every import.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials reference unset environment
    /// variables or the HTTP client cannot be built.
    pub fn new(config: &XrayConfig, target: ImportTarget) -> anyhow::Result<Self> {
        let base_url = trim_base_url(config.base_url.as_deref().unwrap_or(DEFAULT_CLOUD_URL));
        let test_exec_key = target.preset_test_exec_key();

        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base_url,
            credentials: config.credentials()?,
            target,
            token: None,
            test_exec_key,
        })
    }

    fn auth_url(&self) -> String {
        format!("{}/api/v2/authenticate", self.base_url)
    }

    fn import_url(&self, multipart: bool) -> String {
        let suffix = if multipart { "/multipart" } else { "" };
        format!("{}/api/v2{}{}", self.base_url, self.target.format.endpoint(), suffix)
    }
}

/// The token is returned as a JSON string literal.
fn parse_token(body: &str) -> ImportResult<String> {
    let token = serde_json::from_str::<String>(body)
        .unwrap_or_else(|_| body.trim().trim_matches('"').to_string());
    if token.is_empty() {
        return Err(ImportError::Authentication(
            "Xray returned an empty token".to_string(),
        ));
    }
    Ok(token)
}

fn parse_import_response(body: &str) -> ImportResult<String> {
    let response: ImportResponse = serde_json::from_str(body)
        .map_err(|e| ImportError::InvalidResponse(format!("{}: {}", e, body)))?;
    Ok(response.key.unwrap_or_default())
}

#[async_trait]
impl Importer for XrayCloud {
    fn name(&self) -> &'static str {
        "xray-cloud"
    }

    async fn authenticate(&mut self) -> ImportResult<()> {
        let request = AuthRequest {
            client_id: &self.credentials.username,
            client_secret: &self.credentials.password,
        };

        let response = self.client.post(self.auth_url()).json(&request).send().await?;
        let body = read_body(response).await.map_err(|e| match e {
            ImportError::Rejected { status, body } => {
                ImportError::Authentication(format!("status {}: {}", status, body))
            }
            other => other,
        })?;

        self.token = Some(parse_token(&body)?);
        debug!("Obtained Xray Cloud token");
        Ok(())
    }

    async fn import(&self, content: Vec<u8>, content_type: &str) -> ImportResult<String> {
        let token = self.token.as_deref().ok_or(ImportError::NotAuthenticated)?;
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
                .multipart(multipart_form("results", content, content_type, &info)?),
        };

        let response = request.bearer_auth(token).send().await?;
        let body = read_body(response).await?;
        parse_import_response(&body)
    }

    fn set_test_exec_key(&mut self, key: String) {
        self.test_exec_key = Some(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TestFormat;

    fn importer(format: TestFormat, base_url: Option<&str>) -> XrayCloud {
        let config = XrayConfig {
            cloud: true,
            base_url: base_url.map(str::to_string),
            username: "id".to_string(),
            password: "secret".to_string(),
            timeout_secs: 5,
        };
        let target = ImportTarget {
            format,
            paths: "*.xml".to_string(),
            test_exec_key: Some("PROJ-3".to_string()),
            project_key: None,
            test_plan_key: None,
            test_environments: None,
            revision: None,
            fix_version: None,
            test_execution_json: None,
        };
        XrayCloud::new(&config, target).unwrap()
    }

    #[test]
    fn test_urls() {
        let cloud = importer(TestFormat::Junit, None);
        assert_eq!(
            cloud.auth_url(),
            "https://xray.cloud.getxray.app/api/v2/authenticate"
        );
        assert_eq!(
            cloud.import_url(false),
            "https://xray.cloud.getxray.app/api/v2/import/execution/junit"
        );

        let cloud = importer(TestFormat::Xray, Some("https://eu.xray.cloud.getxray.app/"));
        assert_eq!(
            cloud.import_url(true),
            "https://eu.xray.cloud.getxray.app/api/v2/import/execution/multipart"
        );
    }

    #[test]
    fn test_preset_key_is_used() {
        let cloud = importer(TestFormat::Junit, None);
        assert_eq!(cloud.test_exec_key.as_deref(), Some("PROJ-3"));
    }

    #[test]
    fn test_parse_token() {
        assert_eq!(parse_token("\"abc.def\"").unwrap(), "abc.def");
        assert_eq!(parse_token("abc.def\n").unwrap(), "abc.def");
        assert!(matches!(
            parse_token("\"\""),
            Err(ImportError::Authentication(_))
        ));
    }

    #[test]
    fn test_parse_import_response() {
        let body = r#"{"id":"10200","key":"PROJ-12","self":"https://x/rest/api/2/issue/10200"}"#;
        assert_eq!(parse_import_response(body).unwrap(), "PROJ-12");
        assert_eq!(parse_import_response("{}").unwrap(), "");
        assert!(matches!(
            parse_import_response("<html>"),
            Err(ImportError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_import_requires_authentication() {
        let cloud = importer(TestFormat::Junit, None);
        let err = cloud
            .import(b"<testsuite/>".to_vec(), "application/xml")
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::NotAuthenticated));
    }
}
