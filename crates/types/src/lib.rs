//! Shared types for the dxwes workspace.
//!
//! - [`request`]: inbound WES run requests and the outbound execution record
//! - [`session`]: the per-request credential and project scope
//! - [`inputs`]: classified and localized workflow inputs

pub mod inputs;
pub mod request;
pub mod session;

pub use inputs::{
    FETCH_SCHEME_PREFIX, InputBindingMap, InputValue, LocalizedInputMap, STORAGE_REFERENCE_PREFIX, classify_inputs,
    is_fetchable_reference, storage_reference,
};
pub use request::{ErrorResponse, ExecutionRecord, InvocationEvent, PROJECT_KEY, RequestError, RunRequest, WorkflowParams};
pub use session::SessionDescriptor;
