//! # dxwes engine
//!
//! Translates a GA4GH WES run request into a DNAnexus workflow execution.
//!
//! A request moves through four stages, strictly in order:
//!
//! 1. **`binder`**: pulls the bearer credential and target project out of the request
//! 2. **`localize`**: copies `https://` inputs into platform storage as `dx://` references
//! 3. **`compile`**: runs the workflow compiler against the document and localized inputs
//! 4. **`submit`**: starts the compiled workflow in the request's project
//!
//! [`Pipeline`] wires the stages to their collaborators and threads one
//! [`SessionDescriptor`](dxwes_types::SessionDescriptor) and one [`Deadline`]
//! through all of them.
//!
//! ## Usage
//!
//! ```no_run
//! use dxwes_engine::{Pipeline, load_config};
//! use dxwes_types::InvocationEvent;
//!
//! # async fn demo(event: InvocationEvent) -> anyhow::Result<()> {
//! let config = load_config()?;
//! let pipeline = Pipeline::from_config(&config)?;
//! let record = pipeline.run(&event).await?;
//! println!("{}", record.workflow_id);
//! # Ok(())
//! # }
//! ```

pub mod binder;
pub mod compile;
pub mod config;
pub mod deadline;
pub mod error;
pub mod localize;
pub mod pipeline;
pub mod submit;

#[cfg(test)]
mod test_support;

pub use binder::bind;
pub use compile::{CompileOutput, CompileRequest, ProcessCompiler, WorkflowCompiler, compiler_environment};
pub use config::{CompilerConfig, ConfigError, ServiceConfig, load_config, load_config_from_path};
pub use deadline::{Deadline, DeadlineExceeded};
pub use error::{AuthError, CompileError, LocalizationError, PipelineError, SubmissionError};
pub use localize::{Fetcher, HttpFetcher, InputLocalizer};
pub use pipeline::Pipeline;
pub use submit::ExecutionSubmitter;
