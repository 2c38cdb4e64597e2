//! Per-operation parameter builders.
//!
//! # Design
//! Each builder validates its typed input first and only then assembles the
//! parameter set, so a rejected call never yields a half-filled map and
//! never reaches the network. Every builder returns the wire method name
//! alongside its parameters: deletion has no method of its own and travels
//! as an `editevent` carrying only an item id.
//!
//! Date fields are strings formatted the way the service's reference client
//! sends them. Posting and editing name the month `mon`; retrieval names it
//! `month`. The service tells the two parameter sets apart by these names.

use std::collections::BTreeMap;

use chrono::{Local, NaiveDate, NaiveDateTime};

use crate::error::ApiError;
use crate::types::{LineEndings, PostDraft, ReturnLineEndings, SelectType, Security};
use crate::value::{PostParams, Value};

pub const METHOD_GET_CHALLENGE: &str = "getchallenge";
pub const METHOD_POST_EVENT: &str = "postevent";
pub const METHOD_EDIT_EVENT: &str = "editevent";
pub const METHOD_GET_EVENTS: &str = "getevents";

/// Item id that asks `getevents` for the most recently created post.
pub const MOST_RECENT_POST_ID: i64 = -1;

/// Timestamp format for `beforedate` and `lastsync`.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Method name plus parameters, ready for auth injection.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCall {
    pub method: &'static str,
    pub params: PostParams,
}

impl PreparedCall {
    fn new(method: &'static str, params: PostParams) -> Self {
        Self { method, params }
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn insert(params: &mut PostParams, key: &str, value: impl Into<Value>) {
    params.insert(key.to_string(), value.into());
}

/// `year`/`day` plus the month under `mon` (posting) or `month` (retrieval).
fn set_date(params: &mut PostParams, date: NaiveDate, month_key: &str) {
    insert(params, "year", date.format("%Y").to_string());
    insert(params, month_key, date.format("%m").to_string());
    insert(params, "day", date.format("%d").to_string());
}

fn set_time(params: &mut PostParams, datetime: NaiveDateTime) {
    // Hour unpadded, minutes padded.
    insert(params, "hour", datetime.format("%-H").to_string());
    insert(params, "min", datetime.format("%M").to_string());
}

fn set_security(params: &mut PostParams, security: Security) {
    insert(params, "security", security.as_str());
    if let Security::UseMask(mask) = security {
        insert(params, "allowmask", mask);
    }
}

fn set_content(params: &mut PostParams, draft: &PostDraft, line_endings: LineEndings) {
    let datetime = draft.datetime.unwrap_or_else(now);
    set_date(params, datetime.date(), "mon");
    set_time(params, datetime);
    insert(params, "event", draft.content.as_str());
    insert(params, "subject", draft.subject.as_str());
    insert(params, "lineendings", line_endings.as_str());
    set_security(params, draft.security);
}

fn require_item_id(item_id: i64) -> Result<(), ApiError> {
    if item_id <= 0 {
        return Err(ApiError::Validation(format!("itemid must be positive, got {item_id}")));
    }
    Ok(())
}

/// `postevent`. Tags and extra options on the draft are not sent: new posts
/// go out without `props`, which are only attached by [`edit_post`].
pub fn create_post(draft: &PostDraft, line_endings: LineEndings) -> PreparedCall {
    let mut params = PostParams::new();
    set_content(&mut params, draft, line_endings);
    PreparedCall::new(METHOD_POST_EVENT, params)
}

/// `editevent` replacing the post `item_id`, with tags and options under
/// `props`.
pub fn edit_post(item_id: i64, draft: &PostDraft, line_endings: LineEndings) -> Result<PreparedCall, ApiError> {
    require_item_id(item_id)?;

    let mut params = PostParams::new();
    insert(&mut params, "itemid", item_id);
    set_content(&mut params, draft, line_endings);

    let mut props = BTreeMap::new();
    if !draft.tags.is_empty() {
        props.insert("taglist".to_string(), Value::from(draft.tags.join(",")));
    }
    // Options win over the tag list on a key clash.
    props.extend(draft.options.iter().map(|(k, v)| (k.clone(), v.clone())));
    params.insert("props".to_string(), Value::Struct(props));

    Ok(PreparedCall::new(METHOD_EDIT_EVENT, params))
}

/// Deletion: an `editevent` with nothing but the item id.
pub fn delete_post(item_id: i64) -> Result<PreparedCall, ApiError> {
    require_item_id(item_id)?;
    let mut params = PostParams::new();
    insert(&mut params, "itemid", item_id);
    Ok(PreparedCall::new(METHOD_EDIT_EVENT, params))
}

fn get_events(select: SelectType, line_endings: ReturnLineEndings) -> PostParams {
    let mut params = PostParams::new();
    insert(&mut params, "selecttype", select.as_str());
    insert(&mut params, "lineendings", line_endings.as_str());
    params
}

/// Single post by id; `None` asks for the most recent post.
pub fn post_by_id(item_id: Option<i64>, line_endings: ReturnLineEndings) -> Result<PreparedCall, ApiError> {
    let item_id = item_id.unwrap_or(MOST_RECENT_POST_ID);
    if item_id != MOST_RECENT_POST_ID {
        require_item_id(item_id)?;
    }
    let mut params = get_events(SelectType::One, line_endings);
    insert(&mut params, "itemid", item_id);
    Ok(PreparedCall::new(METHOD_GET_EVENTS, params))
}

/// All posts of one day; today when `date` is `None`.
pub fn posts_for_date(date: Option<NaiveDate>, line_endings: ReturnLineEndings) -> PreparedCall {
    let mut params = get_events(SelectType::Day, line_endings);
    set_date(&mut params, date.unwrap_or_else(|| now().date()), "month");
    PreparedCall::new(METHOD_GET_EVENTS, params)
}

/// The latest `count` posts, optionally only those before `before`.
pub fn last_n_posts(
    count: u32,
    before: Option<NaiveDateTime>,
    line_endings: ReturnLineEndings,
) -> Result<PreparedCall, ApiError> {
    // The service caps `howmany` itself; only an empty request is rejected.
    if count == 0 {
        return Err(ApiError::Validation("howmany must be at least 1".to_string()));
    }
    let mut params = get_events(SelectType::LastN, line_endings);
    insert(&mut params, "howmany", count);
    if let Some(before) = before {
        insert(&mut params, "beforedate", before.format(DATETIME_FORMAT).to_string());
    }
    Ok(PreparedCall::new(METHOD_GET_EVENTS, params))
}

/// Posts created or changed since `last_sync`, or all of them.
pub fn sync_items(last_sync: Option<NaiveDateTime>, line_endings: ReturnLineEndings) -> PreparedCall {
    let mut params = get_events(SelectType::SyncItems, line_endings);
    if let Some(last_sync) = last_sync {
        insert(&mut params, "lastsync", last_sync.format(DATETIME_FORMAT).to_string());
    }
    PreparedCall::new(METHOD_GET_EVENTS, params)
}
