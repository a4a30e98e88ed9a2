//! Canonical JSON serialization for hashing
//!
//! Produces a deterministic byte form of any JSON value, independent of map
//! ordering in memory:
//!
//! - object keys sorted lexicographically by their UTF-8 bytes
//! - no insignificant whitespace
//! - strings escape only `"`, `\` and control characters; control characters
//!   without a short escape are written as `\u00xx` (lowercase hex)
//! - non-ASCII characters are emitted verbatim
//! - numbers use serde_json's shortest round-trip representation
//!
//! Changing any of these rules changes every stored history hash.

use serde_json::Value;
use std::fmt::Write;

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Serialize a JSON value canonically
///
/// # Examples
///
/// ```
/// use metanode_core::utils::to_canonical_string;
/// use serde_json::json;
///
/// let value = json!({"b": 1, "a": [true, null]});
/// assert_eq!(to_canonical_string(&value), r#"{"a":[true,null],"b":1}"#);
/// ```
pub fn to_canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            let _ = write!(out, "{}", n);
        }
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, &map[key.as_str()]);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let b = c as u8;
                out.push_str("\\u00");
                out.push(HEX[(b >> 4) as usize] as char);
                out.push(HEX[(b & 0x0f) as usize] as char);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_sorted_at_every_depth() {
        let value = json!({"z": [1, {"y": "q\"\n", "x": null}], "a": true});
        assert_eq!(
            to_canonical_string(&value),
            r#"{"a":true,"z":[1,{"x":null,"y":"q\"\n"}]}"#
        );
    }

    #[test]
    fn test_control_characters_use_lowercase_unicode_escape() {
        let value = json!("a\u{1f}b\u{08}");
        assert_eq!(to_canonical_string(&value), r#""a\u001fb\b""#);
    }

    #[test]
    fn test_non_ascii_is_verbatim() {
        let value = json!({"name": "Größe/µ"});
        assert_eq!(to_canonical_string(&value), r#"{"name":"Größe/µ"}"#);
    }

    #[test]
    fn test_node_document_vector() {
        let value = json!({
            "id": "n1", "ver": 1, "ns": "test", "node_type": "sample",
            "meta": {"b": 2, "a": "x"}, "linkage": {},
            "acl": {"read": ["all"], "write": ["all"]}
        });
        assert_eq!(
            to_canonical_string(&value),
            r#"{"acl":{"read":["all"],"write":["all"]},"id":"n1","linkage":{},"meta":{"a":"x","b":2},"node_type":"sample","ns":"test","ver":1}"#
        );
    }
}
