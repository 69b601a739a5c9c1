//! Input localization: copies `https://` inputs into platform storage.
//!
//! Each reference is fetched, streamed into a new platform file in the
//! session's project in fixed-size parts, closed, and replaced by a
//! `dx://<file-id>` reference. Literals pass through untouched. Inputs are
//! processed one at a time in map order and the first failure aborts the whole
//! call. Files uploaded before a failure are left in place.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dxwes_api::{DxApiError, DxPlatform};
use dxwes_types::{InputBindingMap, InputValue, LocalizedInputMap, SessionDescriptor, storage_reference};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::{Client, Url};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::deadline::Deadline;
use crate::error::LocalizationError;

/// Default part size for uploads.
pub const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 1 << 24;

/// Closing a file gets at least this long, even once the request deadline has passed.
const CLOSE_GRACE: Duration = Duration::from_secs(10);

/// Body of a fetched reference, yielded in whatever pieces the transport produces.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, FetchError>>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("reading body: {0}")]
    Body(String),
}

/// Retrieves the bytes behind a reference URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ByteStream, FetchError>;
}

/// Streaming HTTP GET. No platform credential is ever sent to the remote host.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    pub fn new(connect_timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|error| FetchError::Network(error.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<ByteStream, FetchError> {
        let parsed = Url::parse(url).map_err(|error| FetchError::InvalidUrl(error.to_string()))?;
        let response = self
            .http
            .get(parsed)
            .send()
            .await
            .map_err(|error| FetchError::Network(error.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|error| FetchError::Body(error.without_url().to_string()))
            })
            .boxed())
    }
}

/// Copies reference inputs into platform storage.
pub struct InputLocalizer<'a> {
    platform: &'a dyn DxPlatform,
    fetcher: &'a dyn Fetcher,
    chunk_size: usize,
}

impl<'a> InputLocalizer<'a> {
    pub fn new(platform: &'a dyn DxPlatform, fetcher: &'a dyn Fetcher, chunk_size: usize) -> Self {
        Self {
            platform,
            fetcher,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Localize every input, returning a map with exactly the same keys in the same order.
    pub async fn localize(
        &self,
        inputs: InputBindingMap,
        session: &SessionDescriptor,
        deadline: &Deadline,
    ) -> Result<LocalizedInputMap, LocalizationError> {
        let mut localized = LocalizedInputMap::with_capacity(inputs.len());
        for (name, value) in inputs {
            let localized_value = match value {
                InputValue::Literal(literal) => literal,
                InputValue::Reference(url) => {
                    let file_id = self.localize_reference(&name, &url, session, deadline).await?;
                    Value::String(storage_reference(&file_id))
                }
            };
            localized.insert(name, localized_value);
        }
        Ok(localized)
    }

    async fn localize_reference(
        &self,
        input: &str,
        url: &str,
        session: &SessionDescriptor,
        deadline: &Deadline,
    ) -> Result<String, LocalizationError> {
        let start = Instant::now();
        let shown_url = display_url(url);
        let timeout = || LocalizationError::Timeout {
            input: input.to_string(),
            timeout_ms: deadline.budget_ms(),
        };

        let mut body = deadline
            .bound(self.fetcher.fetch(url))
            .await
            .map_err(|_| timeout())?
            .map_err(|error| LocalizationError::Fetch {
                input: input.to_string(),
                url: shown_url.clone(),
                reason: error.to_string(),
            })?;

        let file_name = file_name_for(url, input);
        let file_id = deadline
            .bound(self.platform.new_file(session, &file_name, session.project_id()))
            .await
            .map_err(|_| timeout())?
            .map_err(|source| LocalizationError::Storage {
                input: input.to_string(),
                source,
            })?;
        debug!(input, file_id = %file_id, file_name = %file_name, project = %session.project_id(), "created platform file");

        let uploaded = self
            .stream_into_file(input, &shown_url, &file_id, &mut body, session, deadline)
            .await;
        // Release the stream before closing so the remote connection is not held open.
        drop(body);

        match uploaded {
            Ok(total_bytes) => {
                self.close_with_grace(session, &file_id, deadline)
                    .await
                    .map_err(|_| timeout())?
                    .map_err(|source| LocalizationError::Storage {
                        input: input.to_string(),
                        source,
                    })?;
                info!(
                    input,
                    file_id = %file_id,
                    bytes = total_bytes,
                    duration_ms = start.elapsed().as_millis(),
                    "localized input"
                );
                Ok(file_id)
            }
            Err(error) => {
                match self.close_with_grace(session, &file_id, deadline).await {
                    Ok(Ok(())) => debug!(input, file_id = %file_id, "closed partially uploaded file"),
                    Ok(Err(close_error)) => warn!(input, file_id = %file_id, error = %close_error, "closing partially uploaded file failed"),
                    Err(_) => warn!(input, file_id = %file_id, "closing partially uploaded file timed out"),
                }
                Err(error)
            }
        }
    }

    /// Close `file_id` within the remaining budget, but never with less than [`CLOSE_GRACE`].
    async fn close_with_grace(
        &self,
        session: &SessionDescriptor,
        file_id: &str,
        deadline: &Deadline,
    ) -> Result<Result<(), DxApiError>, tokio::time::error::Elapsed> {
        tokio::time::timeout(deadline.remaining().max(CLOSE_GRACE), self.platform.close_file(session, file_id)).await
    }

    /// Stream `body` into `file_id` in parts of `chunk_size` bytes; returns the byte count.
    async fn stream_into_file(
        &self,
        input: &str,
        shown_url: &str,
        file_id: &str,
        body: &mut ByteStream,
        session: &SessionDescriptor,
        deadline: &Deadline,
    ) -> Result<u64, LocalizationError> {
        let mut buffer: Vec<u8> = Vec::new();
        let mut part_index: u32 = 1;
        let mut total_bytes: u64 = 0;

        while let Some(piece) = deadline.bound(body.next()).await.map_err(|_| LocalizationError::Timeout {
            input: input.to_string(),
            timeout_ms: deadline.budget_ms(),
        })? {
            let piece = piece.map_err(|error| LocalizationError::Fetch {
                input: input.to_string(),
                url: shown_url.to_string(),
                reason: error.to_string(),
            })?;
            total_bytes += piece.len() as u64;
            buffer.extend_from_slice(&piece);

            while buffer.len() >= self.chunk_size {
                let remainder = buffer.split_off(self.chunk_size);
                let part = std::mem::replace(&mut buffer, remainder);
                self.upload_part(input, file_id, part_index, part, session, deadline).await?;
                part_index += 1;
            }
        }

        if !buffer.is_empty() {
            self.upload_part(input, file_id, part_index, buffer, session, deadline).await?;
        }
        Ok(total_bytes)
    }

    async fn upload_part(
        &self,
        input: &str,
        file_id: &str,
        index: u32,
        part: Vec<u8>,
        session: &SessionDescriptor,
        deadline: &Deadline,
    ) -> Result<(), LocalizationError> {
        let size = part.len();
        deadline
            .bound(self.platform.upload_part(session, file_id, index, part))
            .await
            .map_err(|_| LocalizationError::Timeout {
                input: input.to_string(),
                timeout_ms: deadline.budget_ms(),
            })?
            .map_err(|source| LocalizationError::Storage {
                input: input.to_string(),
                source,
            })?;
        debug!(input, file_id, index, size, "uploaded part");
        Ok(())
    }
}

/// Name for the platform file: the URL's last non-empty path segment, else the input name.
pub fn file_name_for(url: &str, input: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|segments| segments.filter(|segment| !segment.is_empty()).last().map(str::to_string))
        })
        .unwrap_or_else(|| input.to_string())
}

/// URL without query or fragment, safe to log even when the query carries a signature.
fn display_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}
