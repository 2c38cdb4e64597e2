//! Client for a blog service spoken to over XML-RPC with challenge-response
//! authentication.
//!
//! # Overview
//! `LjPoster` exposes create, edit, delete and fetch operations. Each call
//! fetches a single-use challenge, proves knowledge of the secret with an
//! MD5 response, and sends one XML-RPC request. Remote faults come back as
//! `ApiError::Fault`.
//!
//! # Design
//! - `xmlrpc` and `value` are the wire codec; `params` turns typed inputs
//!   into per-method parameter structs; `auth` derives the auth fields.
//! - `RpcClient` builds `HttpRequest` values and parses `HttpResponse`
//!   values without I/O; a `Transport` does the round-trip.
//! - No retries, no caching of challenges, one request in flight per client.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod params;
pub mod poster;
pub mod transport;
pub mod types;
pub mod value;
pub mod xmlrpc;

pub use auth::{AuthContext, Challenge};
pub use client::RpcClient;
pub use config::ClientConfig;
pub use error::ApiError;
pub use http::{HttpRequest, HttpResponse};
pub use params::MOST_RECENT_POST_ID;
pub use poster::LjPoster;
pub use transport::{Transport, UreqTransport};
pub use types::{LineEndings, PostDraft, PostResult, ReturnLineEndings, SelectType, Security};
pub use value::{PostParams, Value};
