//! DNAnexus API client utilities.
//!
//! This crate provides a lightweight client for the parts of the DNAnexus API
//! the WES bridge needs:
//!
//! - creating, uploading and closing files
//! - describing and running workflows
//!
//! The client is credential-free: every call takes the request's
//! [`SessionDescriptor`] and attaches its bearer token to that call only, so a
//! single [`DxClient`] (and its connection pool) can serve concurrent requests
//! made with different credentials.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use dxwes_api::{DxClient, DxPlatform, DEFAULT_API_BASE};
//! use dxwes_types::SessionDescriptor;
//!
//! async fn demo() -> Result<(), dxwes_api::DxApiError> {
//!     let client = DxClient::new(DEFAULT_API_BASE, Duration::from_secs(30))?;
//!     let session = SessionDescriptor::new("token", "project-xxxx");
//!     let file_id = client.new_file(&session, "reads.fastq", session.project_id()).await?;
//!     client.close_file(&session, &file_id).await?;
//!     Ok(())
//! }
//! ```

mod error;
mod platform;

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use async_trait::async_trait;
use dxwes_types::SessionDescriptor;
use dxwes_util::http::{describe_failed_response, parse_response_json_strict};
use reqwest::{Client, RequestBuilder, Url, header};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

pub use error::DxApiError;
pub use platform::{DxPlatform, WorkflowDescription};

/// Public API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.dnanexus.com";

/// Allowed base domains for non-local API endpoints. Subdomains are also allowed.
const ALLOWED_DX_DOMAINS: &[&str] = &["dnanexus.com"];
/// Hostnames allowed for local development regardless of scheme.
const LOCALHOST_DOMAINS: &[&str] = &["localhost", "127.0.0.1"];

#[derive(Debug, Clone)]
/// Thin wrapper around a configured `reqwest::Client` for DNAnexus API access.
pub struct DxClient {
    base_url: String,
    http: Client,
    user_agent: String,
}

/// Response of `/<file-id>/upload`: a pre-signed target for one part.
#[derive(Debug, Deserialize)]
struct UploadTarget {
    url: String,
    #[serde(default)]
    headers: HashMap<String, String>,
}

impl DxClient {
    /// Construct a client for `base_url`.
    ///
    /// Non-localhost hosts must use HTTPS and be within an allowed DNAnexus domain.
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, DxApiError> {
        validate_base_url(base_url)?;

        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(default_headers)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|error| DxApiError::network("client", error.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            user_agent: format!("dxwes/{}; {}", env!("CARGO_PKG_VERSION"), env::consts::OS),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build an authenticated `POST` for an API route.
    fn request(&self, session: &SessionDescriptor, route: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, route);
        debug!(%url, "building request");

        self.http
            .post(url)
            .header(header::USER_AGENT, &self.user_agent)
            .header(header::AUTHORIZATION, session.authorization_header())
    }

    /// Call an API route with a JSON body and return the parsed JSON response.
    async fn call(&self, session: &SessionDescriptor, route: &str, body: Value) -> Result<Value, DxApiError> {
        let response = self
            .request(session, route)
            .json(&body)
            .send()
            .await
            .map_err(|error| DxApiError::network(route, error.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|error| DxApiError::network(route, error.to_string()))?;

        if !status.is_success() {
            return Err(DxApiError::Status {
                route: route.to_string(),
                status: status.as_u16(),
                message: describe_failed_response(status, &text),
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        parse_response_json_strict(&text, Some(status)).map_err(|error| DxApiError::decode(route, error.to_string()))
    }
}

#[async_trait]
impl DxPlatform for DxClient {
    async fn new_file(&self, session: &SessionDescriptor, name: &str, project: &str) -> Result<String, DxApiError> {
        let route = "/file/new";
        let response = self.call(session, route, json!({ "name": name, "project": project })).await?;
        id_field(route, &response)
    }

    async fn upload_part(&self, session: &SessionDescriptor, file_id: &str, index: u32, data: Vec<u8>) -> Result<(), DxApiError> {
        let route = object_route(file_id, "upload")?;
        let response = self
            .call(session, &route, json!({ "index": index, "size": data.len() }))
            .await?;
        let target: UploadTarget =
            serde_json::from_value(response).map_err(|error| DxApiError::decode(route.as_str(), error.to_string()))?;

        // The target URL is pre-signed; the bearer token must not travel with the bytes.
        let mut put = self.http.put(&target.url).header(header::USER_AGENT, &self.user_agent);
        for (name, value) in &target.headers {
            put = put.header(name.as_str(), value.as_str());
        }
        let put_route = format!("{route} (part {index})");
        let response = put
            .body(data)
            .send()
            .await
            .map_err(|error| DxApiError::network(put_route.as_str(), error.without_url().to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DxApiError::Status {
                route: put_route,
                status: status.as_u16(),
                message: describe_failed_response(status, &text),
            });
        }
        Ok(())
    }

    async fn close_file(&self, session: &SessionDescriptor, file_id: &str) -> Result<(), DxApiError> {
        let route = object_route(file_id, "close")?;
        self.call(session, &route, json!({})).await?;
        Ok(())
    }

    async fn describe_workflow(&self, session: &SessionDescriptor, workflow_id: &str) -> Result<WorkflowDescription, DxApiError> {
        let route = object_route(workflow_id, "describe")?;
        let response = self.call(session, &route, json!({})).await?;
        serde_json::from_value(response).map_err(|error| DxApiError::decode(route, error.to_string()))
    }

    async fn run_workflow(
        &self,
        session: &SessionDescriptor,
        workflow_id: &str,
        input: &Value,
        project: &str,
    ) -> Result<String, DxApiError> {
        let route = object_route(workflow_id, "run")?;
        let response = self
            .call(session, &route, json!({ "input": input, "project": project }))
            .await?;
        id_field(&route, &response)
    }
}

/// Build `/<object-id>/<method>`, rejecting ids that would change the route.
fn object_route(object_id: &str, method: &str) -> Result<String, DxApiError> {
    let is_valid = !object_id.is_empty()
        && object_id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    if !is_valid {
        return Err(DxApiError::InvalidId { id: object_id.to_string() });
    }
    Ok(format!("/{object_id}/{method}"))
}

fn id_field(route: &str, response: &Value) -> Result<String, DxApiError> {
    response
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DxApiError::decode(route, "response has no 'id'"))
}

/// Validate that a base URL is acceptable for use by the client.
///
/// Rules:
/// - `localhost` or `127.0.0.1`: any scheme is allowed
/// - otherwise: scheme must be HTTPS, and host must be one of the allowed
///   DNAnexus domains or a subdomain thereof
pub fn validate_base_url(base: &str) -> Result<(), DxApiError> {
    let parsed_base_url = Url::parse(base).map_err(|error| DxApiError::InvalidBaseUrl {
        reason: format!("'{base}': {error}"),
    })?;

    let host_name = parsed_base_url.host_str().ok_or_else(|| DxApiError::InvalidBaseUrl {
        reason: format!("'{base}' must include a host"),
    })?;

    if LOCALHOST_DOMAINS
        .iter()
        .any(|&allowed| host_name.eq_ignore_ascii_case(allowed))
    {
        return Ok(());
    }

    if parsed_base_url.scheme() != "https" {
        return Err(DxApiError::InvalidBaseUrl {
            reason: format!("must use https for non-localhost hosts; got '{}://'", parsed_base_url.scheme()),
        });
    }

    let is_allowed_domain = ALLOWED_DX_DOMAINS.iter().any(|&allowed_domain| {
        host_name.eq_ignore_ascii_case(allowed_domain) || host_name.ends_with(&format!(".{allowed_domain}"))
    });
    if !is_allowed_domain {
        return Err(DxApiError::InvalidBaseUrl {
            reason: format!("host '{host_name}' is not allowed; must be one of {ALLOWED_DX_DOMAINS:?} or a subdomain, or localhost"),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn session() -> SessionDescriptor {
        SessionDescriptor::new("tok-123", "project-1")
    }

    fn client_for(server: &Server) -> DxClient {
        DxClient::new(&server.url(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn base_url_validation() {
        assert!(validate_base_url("https://api.dnanexus.com").is_ok());
        assert!(validate_base_url("https://staging.api.dnanexus.com").is_ok());
        assert!(validate_base_url("http://localhost:8080").is_ok());
        assert!(validate_base_url("http://api.dnanexus.com").is_err());
        assert!(validate_base_url("https://dnanexus.com.evil.example").is_err());
        assert!(validate_base_url("not a url").is_err());
    }

    #[test]
    fn object_route_rejects_path_injection() {
        assert_eq!(object_route("workflow-abc", "run").unwrap(), "/workflow-abc/run");
        assert!(matches!(object_route("", "run"), Err(DxApiError::InvalidId { .. })));
        assert!(matches!(object_route("../file/new", "run"), Err(DxApiError::InvalidId { .. })));
    }

    #[tokio::test]
    async fn new_file_sends_credential_and_project() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/file/new")
            .match_header("authorization", "Bearer tok-123")
            .match_body(Matcher::Json(json!({"name": "reads.txt", "project": "project-1"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "file-0001"}"#)
            .create_async()
            .await;

        let file_id = client_for(&server)
            .new_file(&session(), "reads.txt", "project-1")
            .await
            .unwrap();
        assert_eq!(file_id, "file-0001");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn upload_part_puts_bytes_to_presigned_url_without_credential() {
        let mut server = Server::new_async().await;
        let put_url = format!("{}/presigned/part-1", server.url());
        let upload = server
            .mock("POST", "/file-0001/upload")
            .match_body(Matcher::Json(json!({"index": 1, "size": 5})))
            .with_status(200)
            .with_body(json!({"url": put_url, "headers": {"x-upload-tag": "abc"}}).to_string())
            .create_async()
            .await;
        let put = server
            .mock("PUT", "/presigned/part-1")
            .match_header("x-upload-tag", "abc")
            .match_header("authorization", Matcher::Missing)
            .match_body("hello")
            .with_status(200)
            .create_async()
            .await;

        client_for(&server)
            .upload_part(&session(), "file-0001", 1, b"hello".to_vec())
            .await
            .unwrap();
        upload.assert_async().await;
        put.assert_async().await;
    }

    #[tokio::test]
    async fn run_workflow_passes_explicit_project() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/workflow-0001/run")
            .match_body(Matcher::Json(json!({"input": {"stage.x": 1}, "project": "project-9"})))
            .with_status(200)
            .with_body(r#"{"id": "analysis-0001"}"#)
            .create_async()
            .await;

        let id = client_for(&server)
            .run_workflow(&session(), "workflow-0001", &json!({"stage.x": 1}), "project-9")
            .await
            .unwrap();
        assert_eq!(id, "analysis-0001");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn describe_workflow_decodes_summary() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/workflow-0001/describe")
            .with_status(200)
            .with_body(r#"{"id": "workflow-0001", "name": "hello", "project": "project-1", "stages": []}"#)
            .create_async()
            .await;

        let description = client_for(&server)
            .describe_workflow(&session(), "workflow-0001")
            .await
            .unwrap();
        assert_eq!(description.id, "workflow-0001");
        assert_eq!(description.name.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn error_status_is_reported_with_hint() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/file/new")
            .with_status(401)
            .with_body(r#"{"error": {"type": "InvalidAuthentication", "message": "token rejected"}}"#)
            .create_async()
            .await;

        let error = client_for(&server)
            .new_file(&session(), "x", "project-1")
            .await
            .unwrap_err();
        assert_eq!(error.status(), Some(401));
        assert!(error.is_unauthorized());
        assert!(error.to_string().contains("Unauthorized"));
    }

    #[tokio::test]
    async fn missing_id_is_a_decode_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/file/new")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let error = client_for(&server)
            .new_file(&session(), "x", "project-1")
            .await
            .unwrap_err();
        assert!(matches!(error, DxApiError::Decode { .. }));
    }
}
