//! In-memory collaborators shared by the engine's unit tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use dxwes_api::{DxApiError, DxPlatform, WorkflowDescription};
use dxwes_types::{LocalizedInputMap, SessionDescriptor};
use futures_util::StreamExt;
use serde_json::{Map, Value};

use crate::compile::{CompileOutput, CompileRequest, WorkflowCompiler};
use crate::deadline::Deadline;
use crate::error::CompileError;
use crate::localize::{ByteStream, FetchError, Fetcher};

pub fn session() -> SessionDescriptor {
    SessionDescriptor::new("token-1", "project-1")
}

pub fn localized(raw: Value) -> LocalizedInputMap {
    serde_json::from_value(raw).unwrap()
}

fn status_error(route: &str, status: u16) -> DxApiError {
    DxApiError::Status {
        route: route.to_string(),
        status,
        message: format!("HTTP {status}"),
    }
}

#[derive(Debug, Clone)]
pub struct RecordedFile {
    pub id: String,
    pub name: String,
    pub project: String,
    pub parts: Vec<(u32, Vec<u8>)>,
    pub closed: bool,
}

impl RecordedFile {
    pub fn contents(&self) -> Vec<u8> {
        let mut parts = self.parts.clone();
        parts.sort_by_key(|(index, _)| *index);
        parts.into_iter().flat_map(|(_, bytes)| bytes).collect()
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRun {
    pub workflow_id: String,
    pub input: Value,
    pub project: String,
    pub execution_id: String,
}

#[derive(Default)]
struct PlatformState {
    files: Vec<RecordedFile>,
    runs: Vec<RecordedRun>,
    described: Vec<String>,
    credentials: Vec<String>,
}

/// Platform double that records every call it receives.
#[derive(Default)]
pub struct RecordingPlatform {
    state: Mutex<PlatformState>,
    fail_uploads: bool,
    describe_status: Option<u16>,
    run_status: Option<u16>,
    stall_describe: bool,
    close_delay: Option<Duration>,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_uploads(mut self) -> Self {
        self.fail_uploads = true;
        self
    }

    pub fn with_describe_status(mut self, status: u16) -> Self {
        self.describe_status = Some(status);
        self
    }

    pub fn with_run_status(mut self, status: u16) -> Self {
        self.run_status = Some(status);
        self
    }

    /// `describe_workflow` never completes.
    pub fn stalling_describe(mut self) -> Self {
        self.stall_describe = true;
        self
    }

    /// `close_file` waits `delay` before closing.
    pub fn with_close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = Some(delay);
        self
    }

    pub fn files(&self) -> Vec<RecordedFile> {
        self.state.lock().unwrap().files.clone()
    }

    pub fn runs(&self) -> Vec<RecordedRun> {
        self.state.lock().unwrap().runs.clone()
    }

    pub fn described(&self) -> Vec<String> {
        self.state.lock().unwrap().described.clone()
    }

    /// Credentials seen on every call, in call order.
    pub fn credentials(&self) -> Vec<String> {
        self.state.lock().unwrap().credentials.clone()
    }

    fn record_credential(state: &mut PlatformState, session: &SessionDescriptor) {
        state.credentials.push(session.bearer_credential().to_string());
    }
}

#[async_trait]
impl DxPlatform for RecordingPlatform {
    async fn new_file(&self, session: &SessionDescriptor, name: &str, project: &str) -> Result<String, DxApiError> {
        let mut state = self.state.lock().unwrap();
        Self::record_credential(&mut state, session);
        let id = format!("file-{:04}", state.files.len() + 1);
        state.files.push(RecordedFile {
            id: id.clone(),
            name: name.to_string(),
            project: project.to_string(),
            parts: Vec::new(),
            closed: false,
        });
        Ok(id)
    }

    async fn upload_part(&self, session: &SessionDescriptor, file_id: &str, index: u32, data: Vec<u8>) -> Result<(), DxApiError> {
        let mut state = self.state.lock().unwrap();
        Self::record_credential(&mut state, session);
        if self.fail_uploads {
            return Err(status_error(&format!("/{file_id}/upload"), 500));
        }
        let file = state
            .files
            .iter_mut()
            .find(|file| file.id == file_id)
            .ok_or_else(|| status_error(&format!("/{file_id}/upload"), 404))?;
        file.parts.push((index, data));
        Ok(())
    }

    async fn close_file(&self, session: &SessionDescriptor, file_id: &str) -> Result<(), DxApiError> {
        if let Some(delay) = self.close_delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        Self::record_credential(&mut state, session);
        let file = state
            .files
            .iter_mut()
            .find(|file| file.id == file_id)
            .ok_or_else(|| status_error(&format!("/{file_id}/close"), 404))?;
        file.closed = true;
        Ok(())
    }

    async fn describe_workflow(&self, session: &SessionDescriptor, workflow_id: &str) -> Result<WorkflowDescription, DxApiError> {
        if self.stall_describe {
            std::future::pending::<()>().await;
        }
        let mut state = self.state.lock().unwrap();
        Self::record_credential(&mut state, session);
        state.described.push(workflow_id.to_string());
        if let Some(status) = self.describe_status {
            return Err(status_error(&format!("/{workflow_id}/describe"), status));
        }
        Ok(WorkflowDescription {
            id: workflow_id.to_string(),
            name: Some("translated".to_string()),
            project: Some(session.project_id().to_string()),
        })
    }

    async fn run_workflow(
        &self,
        session: &SessionDescriptor,
        workflow_id: &str,
        input: &Value,
        project: &str,
    ) -> Result<String, DxApiError> {
        let mut state = self.state.lock().unwrap();
        Self::record_credential(&mut state, session);
        if let Some(status) = self.run_status {
            return Err(status_error(&format!("/{workflow_id}/run"), status));
        }
        let execution_id = format!("analysis-{:04}", state.runs.len() + 1);
        state.runs.push(RecordedRun {
            workflow_id: workflow_id.to_string(),
            input: input.clone(),
            project: project.to_string(),
            execution_id: execution_id.clone(),
        });
        Ok(execution_id)
    }
}

enum CannedResponse {
    Body(Vec<u8>),
    /// Yields the bytes, then never ends.
    Stalled(Vec<u8>),
    Status(u16),
}

/// Fetcher serving canned bodies, split into small pieces to exercise buffering.
#[derive(Default)]
pub struct StaticFetcher {
    responses: HashMap<String, CannedResponse>,
    requested: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, body: &[u8]) -> Self {
        self.responses.insert(url.to_string(), CannedResponse::Body(body.to_vec()));
        self
    }

    pub fn with_stalled_body(mut self, url: &str, prefix: &[u8]) -> Self {
        self.responses.insert(url.to_string(), CannedResponse::Stalled(prefix.to_vec()));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.responses.insert(url.to_string(), CannedResponse::Status(status));
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<ByteStream, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        let pieces = |body: &[u8]| -> Vec<Result<Vec<u8>, FetchError>> { body.chunks(3).map(|piece| Ok(piece.to_vec())).collect() };
        match self.responses.get(url) {
            Some(CannedResponse::Body(body)) => Ok(futures_util::stream::iter(pieces(body)).boxed()),
            Some(CannedResponse::Stalled(prefix)) => Ok(futures_util::stream::iter(pieces(prefix))
                .chain(futures_util::stream::pending())
                .boxed()),
            Some(CannedResponse::Status(status)) => Err(FetchError::Status(*status)),
            None => Err(FetchError::Status(404)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompileCall {
    pub document: String,
    pub inputs: LocalizedInputMap,
    pub project: String,
    pub credential: String,
}

/// Compiler double: returns `workflow-NNNN` and prefixes every input key with `stage-0.`.
#[derive(Default)]
pub struct FakeCompiler {
    calls: Mutex<Vec<CompileCall>>,
    failure: Option<(i32, String)>,
}

impl FakeCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(status: i32, stderr: &str) -> Self {
        Self {
            failure: Some((status, stderr.to_string())),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<CompileCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkflowCompiler for FakeCompiler {
    async fn compile(&self, request: CompileRequest<'_>, _deadline: &Deadline) -> Result<CompileOutput, CompileError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(CompileCall {
            document: request.document.to_string(),
            inputs: request.inputs.clone(),
            project: request.session.project_id().to_string(),
            credential: request.session.bearer_credential().to_string(),
        });
        if let Some((status, stderr)) = &self.failure {
            return Err(CompileError::Failed {
                status: Some(*status),
                stderr: stderr.clone(),
            });
        }

        let inputs: Map<String, Value> = request
            .inputs
            .iter()
            .map(|(name, value)| (format!("stage-0.{name}"), value.clone()))
            .collect();
        Ok(CompileOutput {
            workflow_id: format!("workflow-{:04}", calls.len()),
            inputs: Value::Object(inputs),
        })
    }
}

/// What a [`FakeCompilerScript`] saw when it ran.
#[cfg(unix)]
pub struct ObservedCompile {
    pub project: String,
    pub security_context: String,
    pub document: String,
    pub inputs: String,
    pub path: String,
}

/// Shell script standing in for the compiler process.
///
/// It records its environment and the files it was pointed at, then behaves
/// according to the constructor used.
#[cfg(unix)]
pub struct FakeCompilerScript {
    root: tempfile::TempDir,
}

#[cfg(unix)]
impl FakeCompilerScript {
    pub fn succeeding(workflow_id: &str, companion: &str) -> Self {
        let script = Self::create();
        let companion_path = script.root.path().join("companion.json");
        std::fs::write(&companion_path, companion).unwrap();
        script.write_script(&format!(
            "{}cat '{}' > dx_inputs.dx.json\necho '{workflow_id}'\n",
            script.observe_lines(),
            companion_path.display()
        ));
        script
    }

    pub fn failing(status: i32, stderr: &str) -> Self {
        let script = Self::create();
        script.write_script(&format!("{}echo '{stderr}' >&2\nexit {status}\n", script.observe_lines()));
        script
    }

    pub fn without_companion(workflow_id: &str) -> Self {
        let script = Self::create();
        script.write_script(&format!("{}echo '{workflow_id}'\n", script.observe_lines()));
        script
    }

    pub fn sleeping(seconds: u64) -> Self {
        let script = Self::create();
        script.write_script(&format!("exec sleep {seconds}\n"));
        script
    }

    pub fn compiler(&self) -> crate::compile::ProcessCompiler {
        crate::compile::ProcessCompiler::new(self.script_path(), self.helper_dir().join("dx"), self.scratch_root())
    }

    pub fn helper_dir(&self) -> PathBuf {
        self.root.path().join("toolkit").join("bin")
    }

    pub fn scratch_root(&self) -> PathBuf {
        self.root.path().join("scratch")
    }

    pub fn observed(&self) -> ObservedCompile {
        let read = |name: &str| std::fs::read_to_string(self.observed_dir().join(name)).unwrap();
        ObservedCompile {
            project: read("project"),
            security_context: read("security_context"),
            document: read("document"),
            inputs: read("inputs"),
            path: read("path"),
        }
    }

    fn create() -> Self {
        let root = tempfile::tempdir().unwrap();
        for directory in ["toolkit/bin", "scratch", "observed", "bin"] {
            std::fs::create_dir_all(root.path().join(directory)).unwrap();
        }
        Self { root }
    }

    fn script_path(&self) -> PathBuf {
        self.root.path().join("bin").join("fake-compiler")
    }

    fn observed_dir(&self) -> PathBuf {
        self.root.path().join("observed")
    }

    /// Arguments arrive as `compile <document> -inputs <inputs>`.
    fn observe_lines(&self) -> String {
        let observed = self.observed_dir();
        let target = |name: &str| observed.join(name).display().to_string();
        format!(
            "printf '%s' \"$DX_PROJECT_CONTEXT_ID\" > '{}'\n\
             printf '%s' \"$DX_SECURITY_CONTEXT\" > '{}'\n\
             printf '%s' \"$PATH\" > '{}'\n\
             cat \"$2\" > '{}'\n\
             cat \"$4\" > '{}'\n",
            target("project"),
            target("security_context"),
            target("path"),
            target("document"),
            target("inputs"),
        )
    }

    fn write_script(&self, body: &str) {
        use std::os::unix::fs::PermissionsExt;

        let path = self.script_path();
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}
