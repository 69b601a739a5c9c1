//! The remote platform surface the pipeline depends on.

use async_trait::async_trait;
use dxwes_types::SessionDescriptor;
use serde::Deserialize;
use serde_json::Value;

use crate::DxApiError;

/// Summary returned when resolving a workflow id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkflowDescription {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
}

/// Operations on platform storage and workflows.
///
/// Every call takes the request's session explicitly; implementations must not
/// hold a credential of their own. Calls that create or run something in a
/// project also take the project explicitly so callers never depend on an
/// ambient project context.
#[async_trait]
pub trait DxPlatform: Send + Sync {
    /// Create an open, writable file named `name` in `project`; returns its id.
    async fn new_file(&self, session: &SessionDescriptor, name: &str, project: &str) -> Result<String, DxApiError>;

    /// Upload one part of an open file. Parts are numbered from 1.
    async fn upload_part(&self, session: &SessionDescriptor, file_id: &str, index: u32, data: Vec<u8>) -> Result<(), DxApiError>;

    /// Finalize an open file.
    async fn close_file(&self, session: &SessionDescriptor, file_id: &str) -> Result<(), DxApiError>;

    /// Resolve a workflow by id.
    async fn describe_workflow(&self, session: &SessionDescriptor, workflow_id: &str) -> Result<WorkflowDescription, DxApiError>;

    /// Start a run of `workflow_id` in `project`; returns the execution id.
    async fn run_workflow(
        &self,
        session: &SessionDescriptor,
        workflow_id: &str,
        input: &Value,
        project: &str,
    ) -> Result<String, DxApiError>;
}
