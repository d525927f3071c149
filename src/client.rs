//! Chat service client abstraction
//!
//! The controller only needs one capability from the transport: open a
//! request and hand back the reply as a stream of byte chunks.

mod error;
mod http;

pub use error::{ClientError, ClientErrorKind};
pub use http::HttpChatClient;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Reply body as it arrives off the wire
pub type ByteStream = BoxStream<'static, Result<Bytes, ClientError>>;

/// Outbound request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
}

impl ChatRequest {
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

/// Opens streaming chat requests
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// POST `request` to `url` and return the reply body stream.
    ///
    /// # Errors
    ///
    /// Connection failures and non-success statuses fail the call; errors
    /// while reading are yielded by the stream itself.
    async fn open(&self, url: &str, request: &ChatRequest) -> Result<ByteStream, ClientError>;
}

#[async_trait]
impl<T: ChatClient + ?Sized> ChatClient for Arc<T> {
    async fn open(&self, url: &str, request: &ChatRequest) -> Result<ByteStream, ClientError> {
        (**self).open(url, request).await
    }
}

/// Logging wrapper for chat clients
pub struct LoggingClient<C> {
    inner: C,
}

impl<C: ChatClient> LoggingClient<C> {
    #[must_use]
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<C: ChatClient> ChatClient for LoggingClient<C> {
    async fn open(&self, url: &str, request: &ChatRequest) -> Result<ByteStream, ClientError> {
        let start = std::time::Instant::now();
        let result = self.inner.open(url, request).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::info!(
                    url = %url,
                    duration_ms = %duration.as_millis(),
                    prompt_len = request.prompt.len(),
                    "Chat stream opened"
                );
            }
            Err(e) => {
                tracing::error!(
                    url = %url,
                    duration_ms = %duration.as_millis(),
                    kind = ?e.kind,
                    error = %e.message,
                    "Chat stream failed to open"
                );
            }
        }

        result
    }
}
