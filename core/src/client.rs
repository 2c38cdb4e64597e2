//! Stateless request builder and response parser for the XML-RPC endpoint.
//!
//! # Design
//! `RpcClient` holds only the endpoint URL. The handshake and every API call
//! are split into a `build_*` method producing an `HttpRequest` and a
//! `parse_*` method consuming an `HttpResponse`; `LjPoster` runs the
//! round-trip in between. Keeping I/O out of this type makes the wire
//! format testable with canned responses.

use std::collections::BTreeMap;

use crate::auth::{AuthContext, Challenge};
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::params::{PreparedCall, METHOD_GET_CHALLENGE};
use crate::types::PostResult;
use crate::value::Value;
use crate::xmlrpc;

/// Namespace prefixed to every method name.
pub const METHOD_PREFIX: &str = "LJ.XMLRPC.";

pub fn method_name(method: &str) -> String {
    format!("{METHOD_PREFIX}{method}")
}

#[derive(Debug, Clone)]
pub struct RpcClient {
    endpoint: String,
}

impl RpcClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// `getchallenge` with an empty parameter struct.
    pub fn build_challenge(&self) -> HttpRequest {
        let body = xmlrpc::encode_call(
            &method_name(METHOD_GET_CHALLENGE),
            &[Value::Struct(BTreeMap::new())],
        );
        HttpRequest::post_xml(&self.endpoint, body)
    }

    pub fn parse_challenge(&self, response: HttpResponse) -> Result<Challenge, ApiError> {
        let result = self.parse_call(response)?;
        result
            .get("challenge")
            .and_then(Value::as_str)
            .map(Challenge::new)
            .ok_or_else(|| ApiError::Deserialization("getchallenge response without challenge".to_string()))
    }

    /// Encode `call` with the auth fields of `auth` merged in.
    pub fn build_call(&self, call: PreparedCall, auth: &AuthContext) -> HttpRequest {
        let PreparedCall { method, mut params } = call;
        auth.apply(&mut params);
        let body = xmlrpc::encode_call(&method_name(method), &[Value::Struct(params)]);
        HttpRequest::post_xml(&self.endpoint, body)
    }

    pub fn parse_call(&self, response: HttpResponse) -> Result<PostResult, ApiError> {
        check_status(&response)?;
        match xmlrpc::decode_response(&response.body)? {
            Value::Struct(members) => Ok(PostResult::new(members)),
            other => Err(ApiError::Deserialization(format!("expected a struct result, got {other:?}"))),
        }
    }
}

/// Map non-2xx status codes to `ApiError::Http`.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if (200..300).contains(&response.status) {
        return Ok(());
    }
    Err(ApiError::Http {
        status: response.status,
        body: response.body.clone(),
    })
}
