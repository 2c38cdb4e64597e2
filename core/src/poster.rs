//! Blog operations over the challenge-response protocol.
//!
//! # Design
//! Every public call runs the same sequence: build and validate the
//! parameters, fetch a fresh challenge, derive the auth fields into a
//! call-scoped `AuthContext`, then send the request. Nothing from one call's
//! handshake survives into the next. The transport is created on first use
//! and reused for later calls; it carries connection settings only.
//!
//! `LjPoster` is `!Sync`: one call at a time per instance. Use one instance
//! per thread for parallel work.

use std::cell::OnceCell;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info_span, warn};

use crate::auth::AuthContext;
use crate::client::RpcClient;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::params::{self, PreparedCall};
use crate::transport::{Transport, UreqTransport};
use crate::types::{LineEndings, PostDraft, PostResult, ReturnLineEndings};

/// Client for creating, editing, deleting and fetching posts.
pub struct LjPoster<T = UreqTransport> {
    config: ClientConfig,
    rpc: RpcClient,
    transport: OnceCell<T>,
}

impl LjPoster<UreqTransport> {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport_cell(config, OnceCell::new())
    }
}

impl<T: Transport> LjPoster<T> {
    /// Use `transport` instead of building one from the config.
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self::with_transport_cell(config, OnceCell::from(transport))
    }

    fn with_transport_cell(config: ClientConfig, transport: OnceCell<T>) -> Self {
        let rpc = RpcClient::new(config.endpoint());
        Self { config, rpc, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Line endings of text sent with later create/edit calls.
    pub fn set_line_endings(&mut self, line_endings: LineEndings) {
        self.config.set_line_endings(line_endings);
    }

    /// Line endings of text returned by later fetch calls.
    pub fn set_return_line_endings(&mut self, line_endings: ReturnLineEndings) {
        self.config.set_return_line_endings(line_endings);
    }

    /// Publish a new post. Tags and options on `draft` are not sent.
    pub fn create_post(&self, draft: &PostDraft) -> Result<PostResult, ApiError> {
        self.call(params::create_post(draft, self.config.line_endings()))
    }

    /// Replace subject, body, date, security, tags and options of `item_id`.
    pub fn edit_post(&self, item_id: i64, draft: &PostDraft) -> Result<PostResult, ApiError> {
        self.call(params::edit_post(item_id, draft, self.config.line_endings())?)
    }

    pub fn delete_post(&self, item_id: i64) -> Result<PostResult, ApiError> {
        self.call(params::delete_post(item_id)?)
    }

    /// Fetch one post; the most recent one when `item_id` is `None`.
    pub fn get_post_by_id(&self, item_id: Option<i64>) -> Result<PostResult, ApiError> {
        self.call(params::post_by_id(item_id, self.config.return_line_endings())?)
    }

    /// Fetch all posts of `date`, today by default.
    pub fn get_posts_for_date(&self, date: Option<NaiveDate>) -> Result<PostResult, ApiError> {
        self.call(params::posts_for_date(date, self.config.return_line_endings()))
    }

    /// Fetch the latest `count` posts, optionally only those before `before`.
    pub fn get_last_n_posts(&self, count: u32, before: Option<NaiveDateTime>) -> Result<PostResult, ApiError> {
        self.call(params::last_n_posts(count, before, self.config.return_line_endings())?)
    }

    /// Fetch posts changed since `last_sync`, or all posts.
    pub fn get_sync_items(&self, last_sync: Option<NaiveDateTime>) -> Result<PostResult, ApiError> {
        self.call(params::sync_items(last_sync, self.config.return_line_endings()))
    }

    fn transport(&self) -> &T {
        self.transport.get_or_init(|| {
            debug!(endpoint = %self.config.endpoint(), "creating transport");
            T::from_config(&self.config)
        })
    }

    /// Fetch a challenge and derive this call's auth fields.
    fn handshake(&self) -> Result<AuthContext, ApiError> {
        let response = self.transport().execute(&self.rpc.build_challenge())?;
        let challenge = self.rpc.parse_challenge(response)?;
        debug!("challenge received");
        Ok(AuthContext::new(self.config.login(), challenge, self.config.secret()))
    }

    fn call(&self, call: PreparedCall) -> Result<PostResult, ApiError> {
        let span = info_span!("api_call", method = call.method);
        let _guard = span.enter();

        let auth = self.handshake()?;
        let request = self.rpc.build_call(call, &auth);
        let result = self
            .transport()
            .execute(&request)
            .and_then(|response| self.rpc.parse_call(response));
        if let Err(ApiError::Fault { code, message }) = &result {
            warn!(code, %message, "service returned a fault");
        }
        result
    }
}

impl<T> std::fmt::Debug for LjPoster<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LjPoster")
            .field("config", &self.config)
            .field("transport_ready", &self.transport.get().is_some())
            .finish()
    }
}
