//! In-memory stand-in for the blog service's XML-RPC endpoint.
//!
//! Implements `getchallenge`, `postevent`, `editevent` and `getevents` under
//! the `LJ.XMLRPC.` namespace with single-use challenges and the MD5
//! challenge-response check. Wire types are defined here independently of
//! the client crate.

pub mod xml;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use tokio::{net::TcpListener, sync::Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use xml::Value;

pub const RPC_PATH: &str = "/interface/xmlrpc";
pub const DEFAULT_USERS: &[(&str, &str)] = &[("test", "test")];

const FAULT_INVALID_USER: i64 = 100;
const FAULT_INVALID_PASSWORD: i64 = 101;
const FAULT_INVALID_CHALLENGE: i64 = 105;
const FAULT_BAD_PARAMS: i64 = 203;
const FAULT_UNKNOWN_METHOD: i64 = 300;
const FAULT_NO_SUCH_ITEM: i64 = 302;

/// Most posts a last-N query returns.
const MAX_LAST_N: i64 = 50;

#[derive(Clone, Debug)]
pub struct Post {
    pub itemid: i64,
    pub anum: i64,
    pub subject: String,
    pub event: String,
    pub eventtime: NaiveDateTime,
    pub security: String,
    pub props: BTreeMap<String, Value>,
}

#[derive(Default)]
pub struct Journal {
    users: HashMap<String, String>,
    challenges: HashSet<String>,
    posts: BTreeMap<i64, Post>,
    next_id: i64,
    handshakes: usize,
}

impl Journal {
    /// Number of challenges issued so far.
    pub fn handshakes(&self) -> usize {
        self.handshakes
    }

    pub fn posts(&self) -> impl Iterator<Item = &Post> {
        self.posts.values()
    }
}

pub type Db = Arc<Mutex<Journal>>;

type Outcome = Result<Value, (i64, String)>;

pub fn app() -> Router {
    app_with_users(DEFAULT_USERS)
}

pub fn app_with_users(users: &[(&str, &str)]) -> Router {
    router(db_with_users(users))
}

pub fn db_with_users(users: &[(&str, &str)]) -> Db {
    let journal = Journal {
        users: users.iter().map(|(u, p)| (u.to_string(), p.to_string())).collect(),
        next_id: 1,
        ..Journal::default()
    };
    Arc::new(Mutex::new(journal))
}

/// Router over an existing journal, so tests can inspect server state.
pub fn router(db: Db) -> Router {
    Router::new().route(RPC_PATH, post(handle_rpc)).with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn handle_rpc(State(db): State<Db>, body: String) -> Response {
    let (method, params) = match xml::parse_call(&body) {
        Ok(call) => call,
        Err(e) => return (StatusCode::BAD_REQUEST, e).into_response(),
    };
    debug!(%method, "rpc call");

    let empty = Value::Struct(BTreeMap::new());
    let args = params.first().unwrap_or(&empty);
    let mut journal = db.lock().await;

    let outcome = match method.strip_prefix("LJ.XMLRPC.") {
        Some("getchallenge") => Ok(issue_challenge(&mut journal)),
        Some(name @ ("postevent" | "editevent" | "getevents")) => {
            authenticate(&mut journal, args).and_then(|()| match name {
                "postevent" => post_event(&mut journal, args),
                "editevent" => edit_event(&mut journal, args),
                _ => get_events(&journal, args),
            })
        }
        _ => Err((FAULT_UNKNOWN_METHOD, format!("Unknown method: {method}"))),
    };

    let xml = match outcome {
        Ok(value) => xml::response(&value),
        Err((code, message)) => {
            warn!(code, %message, "fault");
            xml::fault(code, &message)
        }
    };
    ([(header::CONTENT_TYPE, "text/xml")], xml).into_response()
}

fn md5_hex(data: impl AsRef<[u8]>) -> String {
    format!("{:x}", md5::compute(data))
}

fn issue_challenge(journal: &mut Journal) -> Value {
    let now = Local::now().timestamp();
    let challenge = format!("c0:{now}:0:60:{}", Uuid::new_v4().simple());
    journal.challenges.insert(challenge.clone());
    journal.handshakes += 1;

    let mut m = BTreeMap::new();
    m.insert("auth_scheme".to_string(), Value::Str("c0".to_string()));
    m.insert("challenge".to_string(), Value::Str(challenge));
    m.insert("server_time".to_string(), Value::Int(now));
    m.insert("expire_time".to_string(), Value::Int(now + 60));
    Value::Struct(m)
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn int_arg(args: &Value, key: &str) -> Option<i64> {
    args.get(key).and_then(Value::as_int)
}

fn bad_params(what: &str) -> (i64, String) {
    (FAULT_BAD_PARAMS, format!("Client error: Invalid parameters: {what}"))
}

fn authenticate(journal: &mut Journal, args: &Value) -> Result<(), (i64, String)> {
    let user = str_arg(args, "username").unwrap_or_default();
    let password = journal
        .users
        .get(user)
        .cloned()
        .ok_or((FAULT_INVALID_USER, format!("Invalid username: {user}")))?;
    if str_arg(args, "auth_method") != Some("challenge") {
        return Err(bad_params("auth_method"));
    }
    let challenge = str_arg(args, "auth_challenge").unwrap_or_default();
    // Single use: a challenge is consumed even when the response is wrong.
    if !journal.challenges.remove(challenge) {
        return Err((FAULT_INVALID_CHALLENGE, "Client error: Challenge expired or reused".to_string()));
    }
    let expected = md5_hex(format!("{challenge}{}", md5_hex(&password)));
    if str_arg(args, "auth_response") != Some(expected.as_str()) {
        return Err((FAULT_INVALID_PASSWORD, "Invalid password".to_string()));
    }
    Ok(())
}

fn post_time(args: &Value) -> Result<NaiveDateTime, (i64, String)> {
    let date = NaiveDate::from_ymd_opt(
        int_arg(args, "year").ok_or_else(|| bad_params("year"))? as i32,
        int_arg(args, "mon").ok_or_else(|| bad_params("mon"))? as u32,
        int_arg(args, "day").ok_or_else(|| bad_params("day"))? as u32,
    )
    .ok_or_else(|| bad_params("date"))?;
    date.and_hms_opt(
        int_arg(args, "hour").unwrap_or(0) as u32,
        int_arg(args, "min").unwrap_or(0) as u32,
        0,
    )
    .ok_or_else(|| bad_params("time"))
}

fn props_arg(args: &Value) -> BTreeMap<String, Value> {
    match args.get("props") {
        Some(Value::Struct(m)) => m.clone(),
        _ => BTreeMap::new(),
    }
}

fn url_for(post: &Post) -> String {
    format!("https://mock.example/{}.html", post.itemid * 256 + post.anum)
}

fn item_reply(post: &Post) -> Value {
    let mut m = BTreeMap::new();
    m.insert("itemid".to_string(), Value::Int(post.itemid));
    m.insert("anum".to_string(), Value::Int(post.anum));
    m.insert("url".to_string(), Value::Str(url_for(post)));
    Value::Struct(m)
}

fn post_event(journal: &mut Journal, args: &Value) -> Outcome {
    let event = str_arg(args, "event").ok_or_else(|| bad_params("event"))?;
    let itemid = journal.next_id;
    let post = Post {
        itemid,
        anum: (itemid * 37) % 256,
        subject: str_arg(args, "subject").unwrap_or_default().to_string(),
        event: event.to_string(),
        eventtime: post_time(args)?,
        security: str_arg(args, "security").unwrap_or("public").to_string(),
        props: props_arg(args),
    };
    journal.next_id += 1;
    let reply = item_reply(&post);
    journal.posts.insert(itemid, post);
    Ok(reply)
}

/// An `editevent` with no or empty `event` deletes the post.
fn edit_event(journal: &mut Journal, args: &Value) -> Outcome {
    let itemid = int_arg(args, "itemid").ok_or_else(|| bad_params("itemid"))?;
    if !journal.posts.contains_key(&itemid) {
        return Err((FAULT_NO_SUCH_ITEM, "Client error: Can't edit post from requested journal".to_string()));
    }

    let event = str_arg(args, "event").unwrap_or_default();
    if event.is_empty() {
        let mut m = BTreeMap::new();
        if let Some(post) = journal.posts.remove(&itemid) {
            m.insert("itemid".to_string(), Value::Int(post.itemid));
            m.insert("anum".to_string(), Value::Int(post.anum));
        }
        return Ok(Value::Struct(m));
    }

    let eventtime = post_time(args)?;
    let post = journal
        .posts
        .get_mut(&itemid)
        .ok_or((FAULT_NO_SUCH_ITEM, "Client error: Can't edit post from requested journal".to_string()))?;
    post.event = event.to_string();
    post.subject = str_arg(args, "subject").unwrap_or_default().to_string();
    post.eventtime = eventtime;
    post.security = str_arg(args, "security").unwrap_or("public").to_string();
    post.props = props_arg(args);
    Ok(item_reply(post))
}

fn event_value(post: &Post) -> Value {
    let mut m = BTreeMap::new();
    m.insert("itemid".to_string(), Value::Int(post.itemid));
    m.insert("anum".to_string(), Value::Int(post.anum));
    m.insert("subject".to_string(), Value::Str(post.subject.clone()));
    m.insert("event".to_string(), Value::Str(post.event.clone()));
    m.insert(
        "eventtime".to_string(),
        Value::Str(post.eventtime.format("%Y-%m-%d %H:%M:%S").to_string()),
    );
    m.insert("security".to_string(), Value::Str(post.security.clone()));
    m.insert("url".to_string(), Value::Str(url_for(post)));
    m.insert("props".to_string(), Value::Struct(post.props.clone()));
    Value::Struct(m)
}

fn get_events(journal: &Journal, args: &Value) -> Outcome {
    let selected: Vec<&Post> = match str_arg(args, "selecttype") {
        Some("one") => {
            let itemid = int_arg(args, "itemid").ok_or_else(|| bad_params("itemid"))?;
            let post = if itemid == -1 {
                journal.posts.values().next_back()
            } else {
                journal.posts.get(&itemid)
            };
            post.into_iter().collect()
        }
        Some("day") => {
            if args.get("mon").is_some() {
                return Err(bad_params("mon is not accepted by getevents; use month"));
            }
            let year = int_arg(args, "year").ok_or_else(|| bad_params("year"))?;
            let month = int_arg(args, "month").ok_or_else(|| bad_params("month"))?;
            let day = int_arg(args, "day").ok_or_else(|| bad_params("day"))?;
            journal
                .posts
                .values()
                .filter(|p| {
                    let t = p.eventtime;
                    i64::from(t.year()) == year && i64::from(t.month()) == month && i64::from(t.day()) == day
                })
                .collect()
        }
        Some("lastn") => {
            let howmany = int_arg(args, "howmany").unwrap_or(20);
            if howmany < 1 {
                return Err(bad_params("howmany"));
            }
            let howmany = howmany.min(MAX_LAST_N);
            let before = match str_arg(args, "beforedate") {
                Some(s) => Some(
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map_err(|_| bad_params("beforedate"))?,
                ),
                None => None,
            };
            let mut posts: Vec<&Post> = journal
                .posts
                .values()
                .filter(|p| before.map_or(true, |b| p.eventtime < b))
                .collect();
            posts.sort_by(|a, b| b.eventtime.cmp(&a.eventtime).then(b.itemid.cmp(&a.itemid)));
            posts.truncate(howmany as usize);
            posts
        }
        Some("syncitems") => {
            let since = match str_arg(args, "lastsync") {
                Some(s) => Some(
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map_err(|_| bad_params("lastsync"))?,
                ),
                None => None,
            };
            journal
                .posts
                .values()
                .filter(|p| since.map_or(true, |t| p.eventtime >= t))
                .collect()
        }
        _ => return Err(bad_params("selecttype")),
    };

    let mut m = BTreeMap::new();
    m.insert(
        "events".to_string(),
        Value::Array(selected.into_iter().map(event_value).collect()),
    );
    Ok(Value::Struct(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, Value)]) -> Value {
        Value::Struct(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    fn s(v: &str) -> Value {
        Value::Str(v.to_string())
    }

    fn journal() -> Journal {
        Journal {
            next_id: 1,
            ..Journal::default()
        }
    }

    fn new_post(journal: &mut Journal, subject: &str, day: &str) -> i64 {
        let reply = post_event(
            journal,
            &args(&[
                ("subject", s(subject)),
                ("event", s(subject)),
                ("year", s("2022")),
                ("mon", s("02")),
                ("day", s(day)),
                ("hour", s("9")),
                ("min", s("05")),
            ]),
        )
        .unwrap();
        reply.get("itemid").and_then(Value::as_int).unwrap()
    }

    #[test]
    fn challenge_is_single_use() {
        let mut j = journal();
        j.users.insert("u".to_string(), "p".to_string());
        let c = issue_challenge(&mut j);
        let challenge = c.get("challenge").and_then(Value::as_str).unwrap().to_string();
        let response = md5_hex(format!("{challenge}{}", md5_hex("p")));
        let auth = args(&[
            ("username", s("u")),
            ("auth_method", s("challenge")),
            ("auth_challenge", s(&challenge)),
            ("auth_response", s(&response)),
        ]);
        assert!(authenticate(&mut j, &auth).is_ok());
        assert_eq!(authenticate(&mut j, &auth).unwrap_err().0, FAULT_INVALID_CHALLENGE);
    }

    #[test]
    fn wrong_password_is_rejected() {
        let mut j = journal();
        j.users.insert("u".to_string(), "p".to_string());
        let c = issue_challenge(&mut j);
        let challenge = c.get("challenge").and_then(Value::as_str).unwrap().to_string();
        let auth = args(&[
            ("username", s("u")),
            ("auth_method", s("challenge")),
            ("auth_challenge", s(&challenge)),
            ("auth_response", s("0000")),
        ]);
        assert_eq!(authenticate(&mut j, &auth).unwrap_err().0, FAULT_INVALID_PASSWORD);
    }

    #[test]
    fn edit_without_event_deletes() {
        let mut j = journal();
        let id = new_post(&mut j, "a", "17");
        edit_event(&mut j, &args(&[("itemid", Value::Int(id))])).unwrap();
        assert_eq!(j.posts().count(), 0);
        assert_eq!(
            edit_event(&mut j, &args(&[("itemid", Value::Int(id))])).unwrap_err().0,
            FAULT_NO_SUCH_ITEM
        );
    }

    #[test]
    fn day_query_requires_long_month_name() {
        let mut j = journal();
        new_post(&mut j, "a", "17");
        new_post(&mut j, "b", "18");
        let found = get_events(
            &j,
            &args(&[("selecttype", s("day")), ("year", s("2022")), ("month", s("02")), ("day", s("17"))]),
        )
        .unwrap();
        assert_eq!(found.get("events").map(|e| matches!(e, Value::Array(v) if v.len() == 1)), Some(true));

        let err = get_events(
            &j,
            &args(&[("selecttype", s("day")), ("year", s("2022")), ("mon", s("02")), ("day", s("17"))]),
        )
        .unwrap_err();
        assert_eq!(err.0, FAULT_BAD_PARAMS);
    }

    #[test]
    fn lastn_orders_newest_first_and_honours_beforedate() {
        let mut j = journal();
        new_post(&mut j, "a", "16");
        new_post(&mut j, "b", "17");
        new_post(&mut j, "c", "18");
        let subjects = |v: Value| -> Vec<String> {
            match v.get("events") {
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(|e| e.get("subject").and_then(Value::as_str).map(str::to_string))
                    .collect(),
                _ => Vec::new(),
            }
        };
        let all = get_events(&j, &args(&[("selecttype", s("lastn")), ("howmany", Value::Int(2))])).unwrap();
        assert_eq!(subjects(all), vec!["c", "b"]);

        let before = get_events(
            &j,
            &args(&[
                ("selecttype", s("lastn")),
                ("howmany", Value::Int(5)),
                ("beforedate", s("2022-02-18 00:00:00")),
            ]),
        )
        .unwrap();
        assert_eq!(subjects(before), vec!["b", "a"]);

        let capped = get_events(&j, &args(&[("selecttype", s("lastn")), ("howmany", Value::Int(100))])).unwrap();
        assert_eq!(subjects(capped), vec!["c", "b", "a"]);
    }

    #[test]
    fn syncitems_filters_on_lastsync() {
        let mut j = journal();
        new_post(&mut j, "a", "16");
        new_post(&mut j, "b", "17");
        new_post(&mut j, "c", "18");
        let count = |v: Value| match v.get("events") {
            Some(Value::Array(items)) => items.len(),
            _ => 0,
        };
        let all = get_events(&j, &args(&[("selecttype", s("syncitems"))])).unwrap();
        assert_eq!(count(all), 3);
        let since = get_events(
            &j,
            &args(&[("selecttype", s("syncitems")), ("lastsync", s("2022-02-17 09:05:00"))]),
        )
        .unwrap();
        assert_eq!(count(since), 2);
        let bad = get_events(&j, &args(&[("selecttype", s("syncitems")), ("lastsync", s("yesterday"))]));
        assert_eq!(bad.unwrap_err().0, FAULT_BAD_PARAMS);
    }
}
