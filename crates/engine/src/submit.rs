//! Submits a compiled workflow for execution.

use dxwes_api::{DxApiError, DxPlatform};
use dxwes_types::{ExecutionRecord, SessionDescriptor};
use tracing::info;

use crate::compile::CompileOutput;
use crate::deadline::Deadline;
use crate::error::SubmissionError;

pub struct ExecutionSubmitter<'a> {
    platform: &'a dyn DxPlatform,
}

impl<'a> ExecutionSubmitter<'a> {
    pub fn new(platform: &'a dyn DxPlatform) -> Self {
        Self { platform }
    }

    /// Resolve the compiled workflow and run it in the session's project.
    ///
    /// The project is always passed explicitly to the run call.
    pub async fn submit(
        &self,
        compiled: &CompileOutput,
        session: &SessionDescriptor,
        deadline: &Deadline,
    ) -> Result<ExecutionRecord, SubmissionError> {
        let workflow_id = compiled.workflow_id.as_str();

        let description = deadline
            .bound(self.platform.describe_workflow(session, workflow_id))
            .await
            .map_err(|exceeded| SubmissionError::Timeout {
                operation: "describe workflow".to_string(),
                timeout_ms: exceeded.budget_ms,
            })?
            .map_err(|source| classify_describe_error(workflow_id, source))?;

        let execution_id = deadline
            .bound(
                self.platform
                    .run_workflow(session, &description.id, &compiled.inputs, session.project_id()),
            )
            .await
            .map_err(|exceeded| SubmissionError::Timeout {
                operation: "run workflow".to_string(),
                timeout_ms: exceeded.budget_ms,
            })?
            .map_err(|source| {
                if source.is_unauthorized() {
                    SubmissionError::Unauthorized { source }
                } else {
                    SubmissionError::Rejected {
                        workflow_id: workflow_id.to_string(),
                        source,
                    }
                }
            })?;

        info!(
            workflow_id,
            execution_id = %execution_id,
            project = %session.project_id(),
            "submitted workflow run"
        );
        Ok(ExecutionRecord {
            workflow_id: execution_id,
        })
    }
}

/// Only a 404/422 or a malformed id means the workflow does not exist.
fn classify_describe_error(workflow_id: &str, source: DxApiError) -> SubmissionError {
    if source.is_unauthorized() {
        return SubmissionError::Unauthorized { source };
    }
    let workflow_id = workflow_id.to_string();
    match source {
        DxApiError::InvalidId { .. } | DxApiError::Status { status: 404 | 422, .. } => {
            SubmissionError::UnknownWorkflow { workflow_id, source }
        }
        source => SubmissionError::Rejected { workflow_id, source },
    }
}
