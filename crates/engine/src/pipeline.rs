//! End-to-end translation of one WES run request into a platform execution.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use dxwes_api::{DxClient, DxPlatform};
use dxwes_types::{ExecutionRecord, InvocationEvent, classify_inputs};
use dxwes_util::resolve_path;
use tracing::{debug, info, warn};

use crate::binder::bind;
use crate::compile::{CompileRequest, ProcessCompiler, WorkflowCompiler};
use crate::config::ServiceConfig;
use crate::deadline::Deadline;
use crate::error::PipelineError;
use crate::localize::{Fetcher, HttpFetcher, InputLocalizer};
use crate::submit::ExecutionSubmitter;

/// The four stages wired to their collaborators.
///
/// Holds nothing request-specific; one instance serves any number of
/// concurrent requests.
#[derive(Clone)]
pub struct Pipeline {
    platform: Arc<dyn DxPlatform>,
    fetcher: Arc<dyn Fetcher>,
    compiler: Arc<dyn WorkflowCompiler>,
    request_timeout: Duration,
    upload_chunk_size: usize,
}

impl Pipeline {
    pub fn new(
        platform: Arc<dyn DxPlatform>,
        fetcher: Arc<dyn Fetcher>,
        compiler: Arc<dyn WorkflowCompiler>,
        request_timeout: Duration,
        upload_chunk_size: usize,
    ) -> Self {
        Self {
            platform,
            fetcher,
            compiler,
            request_timeout,
            upload_chunk_size,
        }
    }

    /// Build the production pipeline: HTTP platform client, HTTP fetcher and the compiler process.
    pub fn from_config(config: &ServiceConfig) -> anyhow::Result<Self> {
        let platform = DxClient::new(&config.api_base_url, config.connect_timeout()).context("creating platform client")?;
        let fetcher = HttpFetcher::new(config.connect_timeout()).context("creating fetch client")?;

        let current_dir = env::current_dir().context("resolving current directory")?;
        let program = if config.compiler.program.contains('/') {
            resolve_path(&config.compiler.program, &current_dir)
        } else {
            PathBuf::from(&config.compiler.program)
        };
        let mut compiler = ProcessCompiler::new(
            program,
            resolve_path(&config.compiler.dx_helper_path, &current_dir),
            config.scratch_root(),
        )
        .with_extra_args(config.compiler.extra_args.clone());
        if let Some(jar_path) = &config.compiler.jar_path {
            compiler = compiler.with_jar(resolve_path(jar_path, &current_dir));
        }

        Ok(Self::new(
            Arc::new(platform),
            Arc::new(fetcher),
            Arc::new(compiler),
            config.request_timeout(),
            config.upload_chunk_size,
        ))
    }

    /// Run bind, localize, compile and submit for one invocation.
    pub async fn run(&self, event: &InvocationEvent) -> Result<ExecutionRecord, PipelineError> {
        let start = Instant::now();
        let deadline = Deadline::after(self.request_timeout);

        let result = self.run_stages(event, &deadline).await;
        match &result {
            Ok(record) => info!(
                execution_id = %record.workflow_id,
                duration_ms = start.elapsed().as_millis(),
                "request completed"
            ),
            Err(error) => warn!(
                stage = error.stage(),
                status = error.status_code(),
                error = %error,
                duration_ms = start.elapsed().as_millis(),
                "request failed"
            ),
        }
        result
    }

    async fn run_stages(&self, event: &InvocationEvent, deadline: &Deadline) -> Result<ExecutionRecord, PipelineError> {
        // Nothing below may touch the network before the session is bound.
        let session = bind(event)?;
        info!(project = %session.project_id(), "bound request session");

        let raw_inputs = event.body.workflow_params.to_input_object()?;
        let inputs = classify_inputs(raw_inputs);
        let references = inputs.values().filter(|value| value.is_reference()).count();
        debug!(inputs = inputs.len(), references, "classified inputs");

        let localized = InputLocalizer::new(self.platform.as_ref(), self.fetcher.as_ref(), self.upload_chunk_size)
            .localize(inputs, &session, deadline)
            .await?;

        let compiled = self
            .compiler
            .compile(
                CompileRequest {
                    document: &event.body.workflow_descriptor,
                    inputs: &localized,
                    session: &session,
                },
                deadline,
            )
            .await?;

        let record = ExecutionSubmitter::new(self.platform.as_ref())
            .submit(&compiled, &session, deadline)
            .await?;
        Ok(record)
    }
}
