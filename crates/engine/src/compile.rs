//! Workflow compilation through an external compiler process.
//!
//! The compiler (dxWDL) reads a workflow document and an inputs file, creates
//! an executable workflow on the platform, prints its id on stdout and writes
//! the platform-ready inputs next to the given inputs file. It talks to the
//! platform itself, so the session is handed to it through its environment.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use dxwes_types::{LocalizedInputMap, SessionDescriptor};
use dxwes_util::{append_search_path, redact_secret, truncate_preview};
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::deadline::Deadline;
use crate::error::CompileError;

/// Workflow document written into the scratch directory.
pub const WORKFLOW_FILE_NAME: &str = "workflow.wdl";
/// Localized inputs handed to the compiler.
pub const INPUTS_FILE_NAME: &str = "dx_inputs.json";
/// Inputs file the compiler writes back, derived from [`INPUTS_FILE_NAME`].
pub const COMPANION_FILE_NAME: &str = "dx_inputs.dx.json";

/// Environment variable carrying the serialized security context.
pub const SECURITY_CONTEXT_ENV: &str = "DX_SECURITY_CONTEXT";
/// Environment variable carrying the project context.
pub const PROJECT_CONTEXT_ENV: &str = "DX_PROJECT_CONTEXT_ID";

const STDERR_PREVIEW_LIMIT: usize = 2000;

/// Everything the compiler needs for one request.
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    pub document: &'a str,
    pub inputs: &'a LocalizedInputMap,
    pub session: &'a SessionDescriptor,
}

/// What a successful compilation produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutput {
    /// Id of the executable workflow created on the platform.
    pub workflow_id: String,
    /// Platform-ready inputs for the run call; always a JSON object.
    pub inputs: Value,
}

/// Turns a workflow document plus localized inputs into an executable workflow.
#[async_trait]
pub trait WorkflowCompiler: Send + Sync {
    async fn compile(&self, request: CompileRequest<'_>, deadline: &Deadline) -> Result<CompileOutput, CompileError>;
}

/// Runs the compiler as a child process in a request-scoped scratch directory.
#[derive(Debug, Clone)]
pub struct ProcessCompiler {
    program: PathBuf,
    jar_path: Option<PathBuf>,
    extra_args: Vec<String>,
    dx_helper_path: PathBuf,
    scratch_root: PathBuf,
}

impl ProcessCompiler {
    pub fn new(program: impl Into<PathBuf>, dx_helper_path: impl Into<PathBuf>, scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            jar_path: None,
            extra_args: Vec::new(),
            dx_helper_path: dx_helper_path.into(),
            scratch_root: scratch_root.into(),
        }
    }

    /// Run the program as `<program> -jar <jar_path> ...`.
    pub fn with_jar(mut self, jar_path: impl Into<PathBuf>) -> Self {
        self.jar_path = Some(jar_path.into());
        self
    }

    /// Extra arguments placed before the `compile` subcommand.
    pub fn with_extra_args(mut self, extra_args: Vec<String>) -> Self {
        self.extra_args = extra_args;
        self
    }

    /// Build the child command: arguments, working directory and a cleared environment.
    fn build_command(&self, document_path: &Path, inputs_path: &Path, working_dir: &Path, session: &SessionDescriptor) -> Command {
        let mut command = Command::new(&self.program);
        if let Some(jar_path) = &self.jar_path {
            command.arg("-jar").arg(jar_path);
        }
        command
            .args(&self.extra_args)
            .arg("compile")
            .arg(document_path)
            .arg("-inputs")
            .arg(inputs_path)
            .current_dir(working_dir)
            .env_clear()
            .envs(compiler_environment(
                session,
                &self.dx_helper_path,
                env::var("PATH").ok().as_deref(),
                env::var("PYTHONPATH").ok().as_deref(),
            ))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl WorkflowCompiler for ProcessCompiler {
    async fn compile(&self, request: CompileRequest<'_>, deadline: &Deadline) -> Result<CompileOutput, CompileError> {
        let start = Instant::now();
        // Removed on drop, on every exit path.
        let scratch = tempfile::Builder::new()
            .prefix("dxwes-")
            .tempdir_in(&self.scratch_root)
            .map_err(|error| CompileError::io("create scratch directory", error))?;

        let document_path = scratch.path().join(WORKFLOW_FILE_NAME);
        let inputs_path = scratch.path().join(INPUTS_FILE_NAME);
        tokio::fs::write(&document_path, request.document)
            .await
            .map_err(|error| CompileError::io("write workflow document", error))?;
        let inputs_json = serde_json::to_vec(request.inputs).map_err(|error| CompileError::io("serialize inputs", error))?;
        tokio::fs::write(&inputs_path, inputs_json)
            .await
            .map_err(|error| CompileError::io("write inputs file", error))?;

        let mut command = self.build_command(&document_path, &inputs_path, scratch.path(), request.session);
        debug!(program = %self.program.display(), scratch = %scratch.path().display(), "spawning compiler");
        let child = command.spawn().map_err(|error| CompileError::Spawn {
            program: self.program.display().to_string(),
            reason: error.to_string(),
        })?;

        // On timeout the child is dropped, which kills it.
        let output = deadline
            .bound(child.wait_with_output())
            .await
            .map_err(|exceeded| CompileError::Timeout {
                timeout_ms: exceeded.budget_ms,
            })?
            .map_err(|error| CompileError::io("wait for compiler", error))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = redact_secret(&String::from_utf8_lossy(&output.stderr), request.session.bearer_credential());

        if !output.status.success() || stdout.is_empty() {
            warn!(
                status = ?output.status.code(),
                duration_ms = start.elapsed().as_millis(),
                "compiler failed"
            );
            return Err(CompileError::Failed {
                status: output.status.code(),
                stderr: truncate_preview(&stderr, STDERR_PREVIEW_LIMIT),
            });
        }

        let inputs = read_companion(&scratch.path().join(COMPANION_FILE_NAME)).await?;
        info!(
            workflow_id = %stdout,
            duration_ms = start.elapsed().as_millis(),
            "compiled workflow"
        );
        Ok(CompileOutput {
            workflow_id: stdout,
            inputs,
        })
    }
}

/// Environment for the compiler process.
///
/// Carries the session in both forms the dx toolkit reads and extends the
/// inherited search paths so the compiler finds the `dx` helper shipped next to it:
/// `PATH` gains the helper's directory, `PYTHONPATH` the directory above that.
pub fn compiler_environment(
    session: &SessionDescriptor,
    dx_helper_path: &Path,
    inherited_path: Option<&str>,
    inherited_pythonpath: Option<&str>,
) -> Vec<(String, String)> {
    let helper_dir = dx_helper_path.parent().unwrap_or_else(|| Path::new(""));
    let toolkit_root = helper_dir.parent().unwrap_or_else(|| Path::new(""));

    vec![
        (SECURITY_CONTEXT_ENV.to_string(), session.security_context_json()),
        (PROJECT_CONTEXT_ENV.to_string(), session.project_id().to_string()),
        ("PATH".to_string(), append_search_path(inherited_path, helper_dir)),
        ("PYTHONPATH".to_string(), append_search_path(inherited_pythonpath, toolkit_root)),
    ]
}

async fn read_companion(path: &Path) -> Result<Value, CompileError> {
    let file = COMPANION_FILE_NAME.to_string();
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Err(CompileError::MissingCompanion { file }),
        Err(error) => return Err(CompileError::io(format!("read {file}"), error)),
    };
    let value: Value = serde_json::from_str(&content).map_err(|error| CompileError::MalformedCompanion {
        file: file.clone(),
        reason: error.to_string(),
    })?;
    if !value.is_object() {
        return Err(CompileError::MalformedCompanion {
            file,
            reason: "expected a JSON object".to_string(),
        });
    }
    Ok(value)
}
