//! Minimal XML-RPC reading and writing for the mock service.

use std::collections::BTreeMap;

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
}

impl Value {
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Struct(m) => m.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integers arrive either typed or as decimal strings.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Node {
    name: String,
    children: Vec<Node>,
    text: String,
}

impl Node {
    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }
}

fn parse_tree(xml: &str) -> Result<Node, String> {
    let mut reader = Reader::from_str(xml);
    let mut stack = vec![Node {
        name: String::new(),
        children: Vec::new(),
        text: String::new(),
    }];
    loop {
        let node = |name: &[u8]| Node {
            name: String::from_utf8_lossy(name).into_owned(),
            children: Vec::new(),
            text: String::new(),
        };
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => stack.push(node(e.name().as_ref())),
            Event::Empty(e) => {
                let n = node(e.name().as_ref());
                stack.last_mut().ok_or("empty stack")?.children.push(n);
            }
            Event::End(_) => {
                let done = stack.pop().ok_or("unbalanced")?;
                stack.last_mut().ok_or("unbalanced")?.children.push(done);
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                stack.last_mut().ok_or("empty stack")?.text.push_str(&text);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    let doc = stack.pop().filter(|_| stack.is_empty()).ok_or("truncated document")?;
    doc.children.into_iter().next().ok_or_else(|| "empty document".to_string())
}

fn value_of(node: &Node) -> Result<Value, String> {
    let Some(typed) = node.children.first() else {
        return Ok(Value::Str(node.text.clone()));
    };
    match typed.name.as_str() {
        "int" | "i4" | "i8" => typed.text.trim().parse().map(Value::Int).map_err(|_| "bad int".to_string()),
        "boolean" => Ok(Value::Bool(typed.text.trim() == "1")),
        "string" => Ok(Value::Str(typed.text.clone())),
        "array" => typed
            .child("data")
            .map(|d| d.children.iter().map(value_of).collect::<Result<Vec<_>, _>>())
            .unwrap_or(Ok(Vec::new()))
            .map(Value::Array),
        "struct" => {
            let mut members = BTreeMap::new();
            for m in typed.children.iter().filter(|c| c.name == "member") {
                let name = m.child("name").ok_or("member without name")?.text.clone();
                let value = value_of(m.child("value").ok_or("member without value")?)?;
                members.insert(name, value);
            }
            Ok(Value::Struct(members))
        }
        other => Err(format!("unsupported type {other}")),
    }
}

/// Parse a `<methodCall>` into its method name and parameters.
pub fn parse_call(xml: &str) -> Result<(String, Vec<Value>), String> {
    let root = parse_tree(xml)?;
    if root.name != "methodCall" {
        return Err(format!("unexpected root <{}>", root.name));
    }
    let method = root.child("methodName").ok_or("missing methodName")?.text.trim().to_string();
    let params = match root.child("params") {
        Some(p) => p
            .children
            .iter()
            .filter_map(|param| param.child("value"))
            .map(value_of)
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    Ok((method, params))
}

fn write_value(out: &mut String, v: &Value) {
    out.push_str("<value>");
    match v {
        Value::Int(i) => out.push_str(&format!("<int>{i}</int>")),
        Value::Bool(b) => out.push_str(&format!("<boolean>{}</boolean>", u8::from(*b))),
        Value::Str(s) => out.push_str(&format!("<string>{}</string>", escape(s.as_str()).replace('\r', "&#13;"))),
        Value::Array(items) => {
            out.push_str("<array><data>");
            items.iter().for_each(|i| write_value(out, i));
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (k, v) in members {
                out.push_str(&format!("<member><name>{}</name>", escape(k.as_str())));
                write_value(out, v);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

pub fn response(v: &Value) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<methodResponse><params><param>");
    write_value(&mut out, v);
    out.push_str("</param></params></methodResponse>\n");
    out
}

pub fn fault(code: i64, message: &str) -> String {
    let mut members = BTreeMap::new();
    members.insert("faultCode".to_string(), Value::Int(code));
    members.insert("faultString".to_string(), Value::Str(message.to_string()));
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<methodResponse><fault>");
    write_value(&mut out, &Value::Struct(members));
    out.push_str("</fault></methodResponse>\n");
    out
}
