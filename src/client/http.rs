//! HTTP implementation of the chat client

use super::{ByteStream, ChatClient, ChatRequest, ClientError, ClientErrorKind};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::Client;
use std::time::Duration;

/// Longest error body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// reqwest-backed chat client
#[derive(Clone)]
pub struct HttpChatClient {
    client: Client,
}

impl HttpChatClient {
    /// Build a client with the given connect timeout.
    ///
    /// No overall request timeout is set: replies stream for as long as the
    /// service keeps generating.
    ///
    /// # Errors
    ///
    /// Fails when the TLS backend cannot be initialized.
    pub fn new(connect_timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ClientError::unknown(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn classify_error(status: reqwest::StatusCode, body: &str) -> ClientError {
        let body: String = body.chars().take(MAX_ERROR_BODY).collect();
        match ClientErrorKind::from_status(status.as_u16()) {
            ClientErrorKind::RateLimit => ClientError::rate_limit(format!("Rate limited: {body}")),
            ClientErrorKind::ServerError => {
                ClientError::server_error(format!("Server error: {body}"))
            }
            ClientErrorKind::InvalidRequest => {
                ClientError::invalid_request(format!("Invalid request: {body}"))
            }
            kind @ (ClientErrorKind::Network | ClientErrorKind::Unknown) => {
                ClientError::new(kind, format!("HTTP {status}: {body}"))
            }
        }
    }
}

fn request_error(e: &reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::network(format!("Request timeout: {e}"))
    } else if e.is_connect() {
        ClientError::network(format!("Connection failed: {e}"))
    } else {
        ClientError::unknown(format!("Request failed: {e}"))
    }
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn open(&self, url: &str, request: &ChatRequest) -> Result<ByteStream, ClientError> {
        let response = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| request_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_error(status, &body));
        }

        let stream = response
            .bytes_stream()
            .map_err(|e| ClientError::network(format!("Failed to read response: {e}")));

        Ok(stream.boxed())
    }
}
