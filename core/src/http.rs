//! HTTP exchange described as plain data.
//!
//! # Design
//! `RpcClient` builds `HttpRequest` values and parses `HttpResponse` values
//! without touching the network; a `Transport` performs the round-trip in
//! between. Every XML-RPC call is a `POST` to the same endpoint, so a
//! request is just URL, headers and body.

/// Headers sent with every call. Compression is refused outright: differing
/// deflate implementations on either end corrupt bodies.
pub const DEFAULT_HEADERS: [(&str, &str); 3] = [
    ("content-type", "text/xml"),
    ("accept-encoding", "identity"),
    ("user-agent", concat!("ljposter/", env!("CARGO_PKG_VERSION"))),
];

/// A `POST` request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpRequest {
    pub fn post_xml(url: &str, body: String) -> Self {
        Self {
            url: url.to_string(),
            headers: DEFAULT_HEADERS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body,
        }
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}
