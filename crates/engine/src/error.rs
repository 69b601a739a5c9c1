//! Error types for each pipeline stage.
//!
//! Messages name the stage and carry the collaborator's message. They never
//! include the bearer credential: collaborator text is redacted before it is
//! stored here.

use dxwes_api::DxApiError;
use dxwes_types::RequestError;
use thiserror::Error;

/// Failure of a whole translation request.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("unauthorized: {0}")]
    Auth(#[from] AuthError),

    #[error("input localization: {0}")]
    Localization(#[from] LocalizationError),

    #[error("workflow compilation: {0}")]
    Compile(#[from] CompileError),

    #[error("workflow submission: {0}")]
    Submission(#[from] SubmissionError),
}

/// The request does not carry a usable credential or project.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingHeader,

    #[error("Authorization header is not a bearer credential")]
    MalformedHeader,

    #[error("missing '{key}' in key_values")]
    MissingProject { key: String },
}

#[derive(Debug, Error)]
pub enum LocalizationError {
    #[error("fetching input '{input}' from {url} failed: {reason}")]
    Fetch { input: String, url: String, reason: String },

    #[error("storing input '{input}' failed: {source}")]
    Storage {
        input: String,
        #[source]
        source: DxApiError,
    },

    #[error("localizing input '{input}' timed out after {timeout_ms}ms")]
    Timeout { input: String, timeout_ms: u64 },
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("could not start compiler '{program}': {reason}")]
    Spawn { program: String, reason: String },

    #[error("compiler failed (exit status {}): {stderr}", .status.map(|code| code.to_string()).unwrap_or_else(|| "none".into()))]
    Failed { status: Option<i32>, stderr: String },

    #[error("compiler did not write {file}")]
    MissingCompanion { file: String },

    #[error("compiler wrote an unreadable {file}: {reason}")]
    MalformedCompanion { file: String, reason: String },

    #[error("{operation}: {reason}")]
    Io { operation: String, reason: String },

    #[error("compiler timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("workflow '{workflow_id}' could not be resolved: {source}")]
    UnknownWorkflow {
        workflow_id: String,
        #[source]
        source: DxApiError,
    },

    #[error("platform refused the credential: {source}")]
    Unauthorized {
        #[source]
        source: DxApiError,
    },

    #[error("platform rejected submission of '{workflow_id}': {source}")]
    Rejected {
        workflow_id: String,
        #[source]
        source: DxApiError,
    },

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },
}

impl CompileError {
    pub fn io(operation: impl Into<String>, error: impl ToString) -> Self {
        Self::Io {
            operation: operation.into(),
            reason: error.to_string(),
        }
    }
}

impl PipelineError {
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            PipelineError::Localization(LocalizationError::Timeout { .. })
                | PipelineError::Compile(CompileError::Timeout { .. })
                | PipelineError::Submission(SubmissionError::Timeout { .. })
        )
    }

    /// HTTP status used when reporting this failure to a WES client.
    pub fn status_code(&self) -> u16 {
        if self.is_timeout() {
            return 504;
        }
        match self {
            PipelineError::InvalidRequest(_) => 400,
            PipelineError::Auth(_) => 401,
            PipelineError::Submission(SubmissionError::Unauthorized { .. }) => 403,
            PipelineError::Localization(_) | PipelineError::Submission(_) => 502,
            PipelineError::Compile(_) => 500,
        }
    }

    /// Short stage name for logs.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::InvalidRequest(_) => "request",
            PipelineError::Auth(_) => "bind",
            PipelineError::Localization(_) => "localize",
            PipelineError::Compile(_) => "compile",
            PipelineError::Submission(_) => "submit",
        }
    }
}
