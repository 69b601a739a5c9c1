//! WES response bodies shared by both front ends.

use std::fmt::Display;

use dxwes_engine::PipelineError;
use dxwes_types::{ErrorResponse, ExecutionRecord, InvocationEvent};
use dxwes_util::redact_sensitive;

pub fn pipeline_error_response(error: &PipelineError) -> ErrorResponse {
    ErrorResponse {
        msg: redact_sensitive(&error.to_string()),
        status_code: error.status_code(),
    }
}

pub fn bad_request(reason: impl Display) -> ErrorResponse {
    ErrorResponse {
        msg: redact_sensitive(&reason.to_string()),
        status_code: 400,
    }
}

/// Run the pipeline for `event` and shape the outcome as a WES body.
pub async fn respond(pipeline: &dxwes_engine::Pipeline, event: &InvocationEvent) -> Result<ExecutionRecord, ErrorResponse> {
    pipeline.run(event).await.map_err(|error| pipeline_error_response(&error))
}
