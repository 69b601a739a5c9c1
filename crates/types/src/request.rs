//! Inbound WES run requests and outbound responses.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Key inside `key_values` that names the target project.
pub const PROJECT_KEY: &str = "dx-project";

/// A single invocation as delivered by the gateway: extracted headers plus the request body.
#[derive(Debug, Clone, Deserialize)]
pub struct InvocationEvent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: HashMap<String, String>,
    #[serde(deserialize_with = "deserialize_run_request")]
    pub body: RunRequest,
}

/// Body of a WES `POST /workflows` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunRequest {
    /// Workflow document text.
    pub workflow_descriptor: String,
    /// Input bindings, usually a JSON-encoded object.
    pub workflow_params: WorkflowParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_type_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub key_values: HashMap<String, String>,
}

/// `workflow_params` as sent: either a JSON-encoded string or an inline object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkflowParams {
    Encoded(String),
    Inline(IndexMap<String, Value>),
}

impl Default for WorkflowParams {
    fn default() -> Self {
        WorkflowParams::Inline(IndexMap::new())
    }
}

/// Request bodies that cannot be interpreted.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("workflow_params is not valid JSON: {reason}")]
    InvalidParams { reason: String },

    #[error("workflow_params must be a JSON object")]
    ParamsNotObject,
}

impl WorkflowParams {
    /// Decode the raw input object, preserving the caller's key order.
    pub fn to_input_object(&self) -> Result<IndexMap<String, Value>, RequestError> {
        match self {
            WorkflowParams::Inline(map) => Ok(map.clone()),
            WorkflowParams::Encoded(text) => serde_json::from_str(text).map_err(|error| {
                if serde_json::from_str::<Value>(text).is_ok() {
                    RequestError::ParamsNotObject
                } else {
                    RequestError::InvalidParams { reason: error.to_string() }
                }
            }),
        }
    }
}

impl InvocationEvent {
    /// Look up a header by name, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Gateways in proxy mode forward the body as a JSON string.
#[derive(Deserialize)]
#[serde(untagged)]
enum RunRequestBody {
    Encoded(String),
    Decoded(Box<RunRequest>),
}

/// Gateways send `null` rather than `{}` for empty maps.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_run_request<'de, D>(deserializer: D) -> Result<RunRequest, D::Error>
where
    D: Deserializer<'de>,
{
    match RunRequestBody::deserialize(deserializer)? {
        RunRequestBody::Decoded(request) => Ok(*request),
        RunRequestBody::Encoded(text) => serde_json::from_str(&text).map_err(serde::de::Error::custom),
    }
}

/// The pipeline's only output: the id of the started execution.
///
/// WES calls this a workflow id; on the platform it is an analysis id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub workflow_id: String,
}

/// WES error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub msg: String,
    pub status_code: u16,
}
