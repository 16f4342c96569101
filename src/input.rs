//! Input parsing: NDJSON lines into Values.
//!
//! `Value` deserializes straight from `serde_json` through its own visitor,
//! so object key order survives (no intermediate map) and integer literals
//! stay `Int` while anything with a fraction or exponent becomes `Float`.
//!
//! serde_json's own recursion limit (128) is disabled; the visitor enforces
//! [`MAX_DEPTH`] instead, the same nesting limit jq and simdjson accept.

use serde::de::{self, Deserialize, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};
use std::fmt;

use crate::value::Value;

/// Deepest array/object nesting accepted in one JSON text.
pub const MAX_DEPTH: usize = 1024;

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        Nested { depth: 0 }.deserialize(deserializer)
    }
}

/// Seed carrying the number of containers already open around the value.
#[derive(Clone, Copy)]
struct Nested {
    depth: usize,
}

impl Nested {
    fn enter<E: de::Error>(self) -> Result<Nested, E> {
        if self.depth >= MAX_DEPTH {
            return Err(E::custom(format_args!("exceeds depth limit of {MAX_DEPTH}")));
        }
        Ok(Nested { depth: self.depth + 1 })
    }
}

impl<'de> DeserializeSeed<'de> for Nested {
    type Value = Value;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for Nested {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_bool<E>(self, b: bool) -> Result<Value, E> {
        Ok(Value::Bool(b))
    }

    fn visit_i64<E>(self, n: i64) -> Result<Value, E> {
        Ok(Value::Int(n))
    }

    fn visit_u64<E>(self, n: u64) -> Result<Value, E> {
        // Past i64::MAX the nearest double is the best we can do.
        Ok(i64::try_from(n).map_or(Value::Float(n as f64), Value::Int))
    }

    fn visit_f64<E>(self, f: f64) -> Result<Value, E> {
        Ok(Value::Float(f))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<Value, E> {
        Ok(Value::String(s.to_owned()))
    }

    fn visit_string<E>(self, s: String) -> Result<Value, E> {
        Ok(Value::String(s))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let inner = self.enter::<A::Error>()?;
        let mut arr = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(v) = seq.next_element_seed(inner)? {
            arr.push(v);
        }
        Ok(Value::Array(arr))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let inner = self.enter::<A::Error>()?;
        let mut obj = Value::Object(Vec::with_capacity(map.size_hint().unwrap_or(0)));
        while let Some(k) = map.next_key::<String>()? {
            let v = map.next_value_seed(inner)?;
            // Duplicate keys: last one wins, first position is kept.
            obj.insert(k, v);
        }
        Ok(obj)
    }
}

fn from_json<'a, R: serde_json::de::Read<'a>>(
    mut de: serde_json::Deserializer<R>,
) -> Result<Value, serde_json::Error> {
    de.disable_recursion_limit();
    let value = Value::deserialize(&mut de)?;
    de.end()?;
    Ok(value)
}

/// Parse one NDJSON line. Surrounding whitespace (including the `\r` of a
/// CRLF line ending) is ignored. Returns `Ok(None)` for a blank line.
pub fn parse_line(line: &[u8]) -> Result<Option<Value>, serde_json::Error> {
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        return Ok(None);
    }
    from_json(serde_json::Deserializer::from_slice(trimmed)).map(Some)
}

/// Parse a standalone JSON text (used by `fromjson`).
pub fn parse_str(text: &str) -> Result<Value, serde_json::Error> {
    from_json(serde_json::Deserializer::from_str(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Value {
        parse_line(s.as_bytes()).unwrap().unwrap()
    }

    #[test]
    fn preserves_key_order() {
        assert_eq!(
            parse(r#"{"z":1,"a":2,"m":3}"#),
            Value::Object(vec![
                ("z".into(), Value::Int(1)),
                ("a".into(), Value::Int(2)),
                ("m".into(), Value::Int(3)),
            ])
        );
    }

    #[test]
    fn int_float_distinction() {
        assert_eq!(parse("42"), Value::Int(42));
        assert_eq!(parse("-7"), Value::Int(-7));
        assert_eq!(parse("1.0"), Value::Float(1.0));
        assert_eq!(parse("1e2"), Value::Float(100.0));
    }

    #[test]
    fn huge_integer_becomes_float() {
        assert_eq!(parse("9223372036854775808"), Value::Float(9223372036854775808.0));
        assert_eq!(parse("9223372036854775807"), Value::Int(i64::MAX));
    }

    #[test]
    fn duplicate_keys_last_wins() {
        assert_eq!(
            parse(r#"{"a":1,"b":2,"a":3}"#),
            Value::Object(vec![("a".into(), Value::Int(3)), ("b".into(), Value::Int(2))])
        );
    }

    #[test]
    fn blank_and_crlf_lines() {
        assert_eq!(parse_line(b"   ").unwrap(), None);
        assert_eq!(parse_line(b"").unwrap(), None);
        assert_eq!(parse_line(b"{\"a\":1}\r").unwrap().unwrap().get("a"), Some(&Value::Int(1)));
    }

    #[test]
    fn malformed_line_is_error() {
        assert!(parse_line(b"{\"a\":").is_err());
        assert!(parse_line(b"not json").is_err());
        assert!(parse_line(b"1 2").is_err());
    }

    fn nested_arrays(depth: usize) -> String {
        format!("{}{}", "[".repeat(depth), "]".repeat(depth))
    }

    #[test]
    fn nesting_past_serde_default_limit() {
        let v = parse(&nested_arrays(200));
        let mut depth = 0;
        let mut cur = &v;
        while let Value::Array(items) = cur {
            depth += 1;
            match items.first() {
                Some(inner) => cur = inner,
                None => break,
            }
        }
        assert_eq!(depth, 200);
    }

    #[test]
    fn nesting_limit_is_an_error() {
        // Test threads get a small stack; the binary parses on the main thread.
        std::thread::Builder::new()
            .stack_size(64 << 20)
            .spawn(|| {
                assert!(parse_line(nested_arrays(MAX_DEPTH).as_bytes()).is_ok());
                let text = format!("{{\"a\":{}}}", nested_arrays(MAX_DEPTH));
                let err = parse_line(text.as_bytes()).unwrap_err();
                assert!(err.to_string().contains("depth limit"), "{err}");
                assert!(parse_str(&text).is_err());
            })
            .unwrap()
            .join()
            .unwrap();
    }
}
