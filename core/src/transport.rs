//! Blocking transports.

use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};

/// Executes one request/response round-trip. Implementations must not retry.
pub trait Transport {
    /// Build the transport the client creates on first use.
    fn from_config(config: &ClientConfig) -> Self
    where
        Self: Sized;

    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

/// ureq-backed transport.
///
/// Built without ureq's decompression features, so bodies are never
/// negotiated or decoded as gzip/deflate.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(config: &ClientConfig) -> Self {
        // 4xx/5xx are returned as data; the client interprets status codes.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(config.timeout()))
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn from_config(config: &ClientConfig) -> Self {
        Self::new(config)
    }

    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(url = %request.url, bytes = request.body.len(), "sending request");

        let mut builder = self.agent.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let mut response = builder
            .send(request.body.as_bytes())
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        debug!(status, bytes = body.len(), "received response");

        Ok(HttpResponse { status, body })
    }
}
