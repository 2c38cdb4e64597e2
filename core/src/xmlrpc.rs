//! XML-RPC wire codec.
//!
//! # Design
//! Encoding writes the document directly into a `String`; the shapes are
//! small and fixed. Decoding first folds the quick-xml event stream into a
//! minimal element tree and then interprets that tree, which keeps the
//! value grammar (`struct`/`member`/`array`/`data`) readable and lets a
//! fault be recognised before any payload is touched.

use std::collections::BTreeMap;

use base64::Engine;
use chrono::NaiveDateTime;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ApiError;
use crate::value::{Value, ISO8601_FORMAT};

/// Serialize a `<methodCall>` document.
pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<methodCall><methodName>");
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        write_value(&mut out, param);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>\n");
    out
}

fn write_value(out: &mut String, value: &Value) {
    out.push_str("<value>");
    match value {
        // `<int>` is 32-bit; wider values go out as the `<i8>` extension.
        Value::Int(i) if i32::try_from(*i).is_ok() => {
            out.push_str("<int>");
            out.push_str(&i.to_string());
            out.push_str("</int>");
        }
        Value::Int(i) => {
            out.push_str("<i8>");
            out.push_str(&i.to_string());
            out.push_str("</i8>");
        }
        Value::Bool(b) => out.push_str(if *b { "<boolean>1</boolean>" } else { "<boolean>0</boolean>" }),
        Value::String(s) => {
            out.push_str("<string>");
            out.push_str(&escape_text(s));
            out.push_str("</string>");
        }
        Value::Double(d) => {
            out.push_str("<double>");
            out.push_str(&d.to_string());
            out.push_str("</double>");
        }
        Value::DateTime(dt) => {
            out.push_str("<dateTime.iso8601>");
            out.push_str(&dt.format(ISO8601_FORMAT).to_string());
            out.push_str("</dateTime.iso8601>");
        }
        Value::Base64(bytes) => {
            out.push_str("<base64>");
            out.push_str(&base64::engine::general_purpose::STANDARD.encode(bytes));
            out.push_str("</base64>");
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item);
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name.as_str()));
                out.push_str("</name>");
                write_value(out, member);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

/// Escape character data. Carriage returns become `&#13;`: a conforming
/// parser folds literal `\r\n` and `\r` into `\n`, which would silently turn
/// `pc` and `mac` line endings into `unix` ones.
fn escape_text(text: &str) -> String {
    escape(text).replace('\r', "&#13;")
}

/// Parse a `<methodResponse>` document.
///
/// A `<fault>` response becomes `ApiError::Fault` and its payload is never
/// decoded as a result.
pub fn decode_response(body: &str) -> Result<Value, ApiError> {
    let root = parse_document(body)?;
    if root.name != "methodResponse" {
        return Err(malformed(format!("expected <methodResponse>, found <{}>", root.name)));
    }

    if let Some(fault) = root.child("fault") {
        return Err(decode_fault(fault));
    }

    let value = root
        .child("params")
        .and_then(|p| p.child("param"))
        .and_then(|p| p.child("value"))
        .ok_or_else(|| malformed("response has neither <params> nor <fault>"))?;
    decode_value(value)
}

fn decode_fault(fault: &Element) -> ApiError {
    let decoded = match fault.child("value").map(decode_value) {
        Some(Ok(v)) => v,
        Some(Err(e)) => return e,
        None => return malformed("<fault> without <value>"),
    };
    // A fault that carries code 0 is still a fault; the code is reported as-is.
    let code = decoded.get("faultCode").and_then(Value::as_i64).unwrap_or(-1);
    let message = decoded
        .get("faultString")
        .and_then(Value::as_str)
        .unwrap_or("?")
        .to_string();
    ApiError::Fault { code, message }
}

fn decode_value(el: &Element) -> Result<Value, ApiError> {
    // An untyped <value> is a string, whitespace included.
    let Some(typed) = el.children.first() else {
        return Ok(Value::String(el.text.clone()));
    };
    let text = typed.text.trim();
    match typed.name.as_str() {
        "int" | "i4" | "i8" => text
            .parse()
            .map(Value::Int)
            .map_err(|_| malformed(format!("bad integer {text:?}"))),
        "boolean" => match text {
            "1" | "true" => Ok(Value::Bool(true)),
            "0" | "false" => Ok(Value::Bool(false)),
            other => Err(malformed(format!("bad boolean {other:?}"))),
        },
        "string" => Ok(Value::String(typed.text.clone())),
        "double" => text
            .parse()
            .map(Value::Double)
            .map_err(|_| malformed(format!("bad double {text:?}"))),
        "dateTime.iso8601" => NaiveDateTime::parse_from_str(text, ISO8601_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
            .map(Value::DateTime)
            .map_err(|_| malformed(format!("bad dateTime {text:?}"))),
        "base64" => {
            let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            base64::engine::general_purpose::STANDARD
                .decode(compact)
                .map(Value::Base64)
                .map_err(|e| malformed(format!("bad base64: {e}")))
        }
        "array" => {
            let data = typed.child("data").ok_or_else(|| malformed("<array> without <data>"))?;
            data.children
                .iter()
                .filter(|c| c.name == "value")
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        "struct" => {
            let mut members = BTreeMap::new();
            for member in typed.children.iter().filter(|c| c.name == "member") {
                let name = member.child("name").ok_or_else(|| malformed("<member> without <name>"))?;
                let value = member.child("value").ok_or_else(|| malformed("<member> without <value>"))?;
                members.insert(name.text.clone(), decode_value(value)?);
            }
            Ok(Value::Struct(members))
        }
        other => Err(malformed(format!("unsupported value type <{other}>"))),
    }
}

fn malformed(msg: impl Into<String>) -> ApiError {
    ApiError::Deserialization(msg.into())
}

// ---------------------------------------------------------------------------
// Element tree
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Element {
    name: String,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn new(name: &[u8]) -> Self {
        Self {
            name: String::from_utf8_lossy(name).into_owned(),
            children: Vec::new(),
            text: String::new(),
        }
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Fold the event stream into a tree and return the document element.
fn parse_document(xml: &str) -> Result<Element, ApiError> {
    let mut reader = Reader::from_str(xml);
    let mut stack = vec![Element::new(b"")];

    loop {
        let event = reader
            .read_event()
            .map_err(|e| malformed(format!("XML error at {}: {e}", reader.buffer_position())))?;
        match event {
            Event::Start(e) => stack.push(Element::new(e.name().as_ref())),
            Event::Empty(e) => {
                let el = Element::new(e.name().as_ref());
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(el);
                }
            }
            Event::End(_) => {
                if stack.len() < 2 {
                    return Err(malformed("unbalanced closing tag"));
                }
                if let Some(el) = stack.pop() {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(el);
                    }
                }
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| malformed(format!("bad text: {e}")))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(malformed("unexpected end of document"));
    }
    stack
        .pop()
        .and_then(|doc| doc.children.into_iter().next())
        .ok_or_else(|| malformed("empty document"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(value: &str) -> String {
        format!(
            "<?xml version=\"1.0\"?>\n<methodResponse>\n  <params>\n    <param>\n      {value}\n    </param>\n  </params>\n</methodResponse>\n"
        )
    }

    #[test]
    fn encode_call_writes_typed_struct() {
        let mut params = BTreeMap::new();
        params.insert("subject".to_string(), Value::from("a < b & c"));
        params.insert("ver".to_string(), Value::from(1));
        params.insert("opt_nocomments".to_string(), Value::from(true));
        let xml = encode_call("LJ.XMLRPC.postevent", &[Value::Struct(params)]);

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<methodName>LJ.XMLRPC.postevent</methodName>"));
        assert!(xml.contains("<member><name>subject</name><value><string>a &lt; b &amp; c</string></value></member>"));
        assert!(xml.contains("<member><name>ver</name><value><int>1</int></value></member>"));
        assert!(xml.contains("<value><boolean>1</boolean></value>"));
    }

    #[test]
    fn encode_call_writes_nested_array_in_struct() {
        let mut props = BTreeMap::new();
        props.insert("taglist".to_string(), Value::from("a,b"));
        let mut params = BTreeMap::new();
        params.insert("props".to_string(), Value::Struct(props));
        params.insert("ids".to_string(), Value::Array(vec![Value::from(1), Value::from(2)]));
        let xml = encode_call("m", &[Value::Struct(params)]);
        assert!(xml.contains(
            "<name>ids</name><value><array><data><value><int>1</int></value><value><int>2</int></value></data></array></value>"
        ));
        assert!(xml.contains("<name>props</name><value><struct><member><name>taglist</name>"));
    }

    #[test]
    fn encode_keeps_carriage_returns_as_char_refs() {
        let xml = encode_call("m", &[Value::from("a\r\nb\rc")]);
        assert!(xml.contains("<string>a&#13;\nb&#13;c</string>"));
        assert!(!xml.contains('\r'));
    }

    #[test]
    fn decode_expands_carriage_return_refs() {
        let body = response("<value><string>a&#13;\nb</string></value>");
        assert_eq!(decode_response(&body).unwrap(), Value::String("a\r\nb".to_string()));
    }

    #[test]
    fn encode_uses_i8_outside_32_bit_range() {
        let xml = encode_call(
            "m",
            &[
                Value::Int(i64::from(i32::MAX)),
                Value::Int(i64::from(i32::MIN)),
                Value::Int(5_000_000_000),
                Value::Int(-5_000_000_000),
            ],
        );
        assert!(xml.contains("<int>2147483647</int>"));
        assert!(xml.contains("<int>-2147483648</int>"));
        assert!(xml.contains("<i8>5000000000</i8>"));
        assert!(xml.contains("<i8>-5000000000</i8>"));
    }

    #[test]
    fn encode_call_without_params() {
        let xml = encode_call("LJ.XMLRPC.getchallenge", &[]);
        assert!(xml.contains("<params></params>"));
    }

    #[test]
    fn decode_struct_response() {
        let body = response(
            r#"<value><struct>
                <member><name>itemid</name><value><int>12</int></value></member>
                <member><name>anum</name><value><i4>200</i4></value></member>
                <member><name>url</name><value><string>https://u.example/12.html</string></value></member>
                <member><name>note</name><value>untyped text</value></member>
            </struct></value>"#,
        );
        let v = decode_response(&body).unwrap();
        assert_eq!(v.get("itemid"), Some(&Value::Int(12)));
        assert_eq!(v.get("anum"), Some(&Value::Int(200)));
        assert_eq!(v.get("url").and_then(Value::as_str), Some("https://u.example/12.html"));
        assert_eq!(v.get("note").and_then(Value::as_str), Some("untyped text"));
    }

    #[test]
    fn decode_preserves_string_whitespace_and_entities() {
        let body = response("<value><string>  two  spaces &amp; more </string></value>");
        assert_eq!(
            decode_response(&body).unwrap(),
            Value::String("  two  spaces & more ".to_string())
        );
    }

    #[test]
    fn decode_array_base64_and_datetime() {
        let body = response(
            r#"<value><array><data>
                <value><base64>0L/RgNC40LLQtdGC</base64></value>
                <value><dateTime.iso8601>20220217T10:30:00</dateTime.iso8601></value>
                <value><boolean>0</boolean></value>
                <value><double>1.5</double></value>
                <value><string/></value>
            </data></array></value>"#,
        );
        let v = decode_response(&body).unwrap();
        let items = v.as_array().unwrap();
        assert_eq!(items[0].as_str(), Some("привет"));
        assert_eq!(
            items[1],
            Value::DateTime(
                chrono::NaiveDate::from_ymd_opt(2022, 2, 17)
                    .unwrap()
                    .and_hms_opt(10, 30, 0)
                    .unwrap()
            )
        );
        assert_eq!(items[2], Value::Bool(false));
        assert_eq!(items[3], Value::Double(1.5));
        assert_eq!(items[4], Value::String(String::new()));
    }

    #[test]
    fn decode_fault_skips_payload() {
        let body = r#"<?xml version="1.0"?>
<methodResponse><fault><value><struct>
  <member><name>faultCode</name><value><int>101</int></value></member>
  <member><name>faultString</name><value><string>Invalid password</string></value></member>
</struct></value></fault></methodResponse>"#;
        let err = decode_response(body).unwrap_err();
        match err {
            ApiError::Fault { code, message } => {
                assert_eq!(code, 101);
                assert_eq!(message, "Invalid password");
            }
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_malformed_documents() {
        for body in [
            "not xml at all",
            "<methodResponse><params></methodResponse>",
            "<methodCall></methodCall>",
            "<methodResponse></methodResponse>",
            "",
        ] {
            let err = decode_response(body).unwrap_err();
            assert!(matches!(err, ApiError::Deserialization(_)), "{body:?} -> {err:?}");
        }
    }

    #[test]
    fn decode_rejects_unknown_value_type() {
        let body = response("<value><nil/></value>");
        assert!(matches!(decode_response(&body), Err(ApiError::Deserialization(_))));
    }
}
