//! Single-event mode: read one invocation event, print one response body.

use std::process::ExitCode;

use anyhow::{Context, Result};
use dxwes_engine::Pipeline;
use dxwes_types::{ErrorResponse, ExecutionRecord, InvocationEvent};
use tokio::io::AsyncReadExt;

use crate::response::{bad_request, respond};

pub async fn run(pipeline: &Pipeline, source: &str) -> Result<ExitCode> {
    let raw = read_event(source).await?;
    match translate(pipeline, &raw).await {
        Ok(record) => {
            println!("{}", serde_json::to_string(&record)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(response) => {
            println!("{}", serde_json::to_string(&response)?);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn translate(pipeline: &Pipeline, raw: &str) -> Result<ExecutionRecord, ErrorResponse> {
    let event: InvocationEvent =
        serde_json::from_str(raw).map_err(|error| bad_request(format!("invalid invocation event: {error}")))?;
    respond(pipeline, &event).await
}

async fn read_event(source: &str) -> Result<String> {
    if source == "-" {
        let mut raw = String::new();
        tokio::io::stdin()
            .read_to_string(&mut raw)
            .await
            .context("reading event from stdin")?;
        return Ok(raw);
    }
    tokio::fs::read_to_string(source)
        .await
        .with_context(|| format!("reading event file {source}"))
}
