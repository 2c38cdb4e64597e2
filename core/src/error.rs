//! Error types for the blog API client.
//!
//! # Design
//! Remote faults get a dedicated variant carrying the service's own code and
//! message, because callers routinely branch on them (unknown item, bad
//! password). Failures to reach the service at all land in `Transport`;
//! a reachable server answering with a non-2xx status lands in `Http`.
//! `Validation` is only ever produced before a request leaves the process.

use thiserror::Error;

/// Errors returned by every client operation. None of them are retried.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never completed: DNS, connect, TLS, timeout, I/O.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server answered with a non-2xx HTTP status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The service returned an XML-RPC fault.
    #[error("Error {code} : {message}")]
    Fault { code: i64, message: String },

    /// A required argument is missing or out of range.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The response body is not a well-formed XML-RPC response.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl ApiError {
    pub fn is_fault(&self) -> bool {
        matches!(self, ApiError::Fault { .. })
    }

    /// Remote fault code, if this is a fault.
    pub fn fault_code(&self) -> Option<i64> {
        match self {
            ApiError::Fault { code, .. } => Some(*code),
            _ => None,
        }
    }
}
