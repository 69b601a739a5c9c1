//! HTTP front end hosting the WES run endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use dxwes_engine::Pipeline;
use dxwes_types::{ErrorResponse, InvocationEvent, RunRequest};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::response::{bad_request, respond};

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";
pub const RUNS_ROUTE: &str = "/ga4gh/wes/v1/workflows";

/// Serve until Ctrl-C, then drain in-flight requests.
pub async fn run(pipeline: Pipeline, bind_address: &str) -> Result<()> {
    let address = resolve_bind_address(bind_address)?;
    let server = WesServer::new(address, Arc::new(pipeline)).start().await?;
    info!(address = %server.bound_address(), route = RUNS_ROUTE, "serving WES runs");

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("shutting down");
    server.stop().await
}

pub struct WesServer {
    bind_address: SocketAddr,
    pipeline: Arc<Pipeline>,
}

impl WesServer {
    pub fn new(bind_address: SocketAddr, pipeline: Arc<Pipeline>) -> Self {
        Self { bind_address, pipeline }
    }

    /// Bind the listener and start serving in the background.
    pub async fn start(self) -> Result<RunningWesServer> {
        let cancellation_token = CancellationToken::new();
        let listener = tokio::net::TcpListener::bind(self.bind_address)
            .await
            .with_context(|| format!("binding {}", self.bind_address))?;
        let bound_address = listener.local_addr()?;

        let server_handle = tokio::spawn({
            let shutdown = cancellation_token.child_token();
            let router = router(self.pipeline);
            async move {
                if let Err(error) = axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        shutdown.cancelled().await;
                    })
                    .await
                {
                    warn!(error = %error, "WES server stopped with an error");
                }
            }
        });

        Ok(RunningWesServer {
            bind_address: bound_address,
            cancellation_token,
            server_handle,
        })
    }
}

#[derive(Debug)]
pub struct RunningWesServer {
    bind_address: SocketAddr,
    cancellation_token: CancellationToken,
    server_handle: JoinHandle<()>,
}

impl RunningWesServer {
    pub fn bound_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Stop accepting connections and wait for the server task.
    pub async fn stop(self) -> Result<()> {
        self.cancellation_token.cancel();
        self.server_handle
            .await
            .map_err(|error| anyhow!("WES server task failed: {error}"))
    }
}

pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new().route(RUNS_ROUTE, post(submit_run)).with_state(pipeline)
}

pub fn resolve_bind_address(bind_address: &str) -> Result<SocketAddr> {
    bind_address
        .parse()
        .map_err(|error| anyhow!("invalid bind address '{bind_address}': {error}"))
}

async fn submit_run(State(pipeline): State<Arc<Pipeline>>, headers: HeaderMap, body: String) -> Response {
    let request: RunRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(error) => return error_reply(bad_request(format!("invalid run request: {error}"))),
    };
    let event = InvocationEvent {
        headers: collect_headers(&headers),
        body: request,
    };

    match respond(&pipeline, &event).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(response) => error_reply(response),
    }
}

/// Headers with non-UTF-8 values are dropped.
fn collect_headers(headers: &HeaderMap) -> std::collections::HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|value| (name.as_str().to_string(), value.to_string())))
        .collect()
}

fn error_reply(response: ErrorResponse) -> Response {
    let status = StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response)).into_response()
}
