//! Typed inputs and results for blog operations.
//!
//! # Design
//! Inputs are strongly typed so that the parameter builder can only emit
//! values the service understands. Results stay an opaque struct: the
//! service's response schema is passed through to the caller untouched,
//! with a few accessors for the fields nearly every caller reads.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::value::Value;

/// Who may read a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    #[default]
    Public,
    Private,
    /// Visible to the friend groups selected by the bit mask.
    UseMask(u32),
}

impl Security {
    pub fn as_str(&self) -> &'static str {
        match self {
            Security::Public => "public",
            Security::Private => "private",
            Security::UseMask(_) => "usemask",
        }
    }
}

/// Line-ending convention of text sent to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEndings {
    #[default]
    Unix,
    Pc,
    Mac,
}

impl LineEndings {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEndings::Unix => "unix",
            LineEndings::Pc => "pc",
            LineEndings::Mac => "mac",
        }
    }
}

/// Line-ending convention of text returned by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnLineEndings {
    #[default]
    Unix,
    Pc,
    Mac,
    /// Line breaks replaced by spaces.
    Space,
    /// Line breaks replaced by " ... ".
    Dot,
}

impl ReturnLineEndings {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnLineEndings::Unix => "unix",
            ReturnLineEndings::Pc => "pc",
            ReturnLineEndings::Mac => "mac",
            ReturnLineEndings::Space => "space",
            ReturnLineEndings::Dot => "dot",
        }
    }
}

/// Query mode of `getevents`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectType {
    One,
    Day,
    LastN,
    SyncItems,
}

impl SelectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectType::One => "one",
            SelectType::Day => "day",
            SelectType::LastN => "lastn",
            SelectType::SyncItems => "syncitems",
        }
    }
}

/// Content of a post to create or to replace an existing one with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostDraft {
    pub subject: String,
    pub content: String,
    /// Post time; the current local time when `None`.
    pub datetime: Option<NaiveDateTime>,
    pub tags: Vec<String>,
    /// Extra post properties such as `opt_nocomments`.
    pub options: BTreeMap<String, Value>,
    pub security: Security,
}

impl PostDraft {
    pub fn new(subject: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn at(mut self, datetime: NaiveDateTime) -> Self {
        self.datetime = Some(datetime);
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    pub fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }
}

/// Decoded response struct of a successful call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PostResult(BTreeMap<String, Value>);

impl PostResult {
    pub fn new(members: BTreeMap<String, Value>) -> Self {
        Self(members)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }

    pub fn item_id(&self) -> Option<i64> {
        self.get("itemid").and_then(Value::as_i64)
    }

    pub fn anum(&self) -> Option<i64> {
        self.get("anum").and_then(Value::as_i64)
    }

    pub fn url(&self) -> Option<&str> {
        self.get("url").and_then(Value::as_str)
    }

    /// Posts returned by a fetch; empty when the response carries none.
    pub fn events(&self) -> &[Value] {
        self.get("events").and_then(Value::as_array).unwrap_or(&[])
    }
}
