/// JSON output formatting.
///
/// Writes `Value` directly to a `Write` sink with no intermediate `String`
/// allocation. Uses `itoa` for integers and `ryu` for floats. Output is
/// always compact (one value per line), which is what NDJSON consumers expect.
use std::io::{self, Write};

use crate::value::Value;

/// Output formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Compact single-line JSON.
    #[default]
    Compact,
    /// Raw string output (`-r`): strings without quotes.
    Raw,
}

/// Configuration for output formatting.
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    pub mode: OutputMode,
}

/// Format a value as compact JSON (for error messages, `tostring`, etc).
pub fn format_compact(value: &Value) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_compact(&mut buf, value);
    String::from_utf8(buf).unwrap_or_default()
}

/// Write a value to the output sink, followed by a newline.
pub fn write_value<W: Write>(w: &mut W, value: &Value, config: &OutputConfig) -> io::Result<()> {
    match (config.mode, value) {
        (OutputMode::Raw, Value::String(s)) => w.write_all(s.as_bytes())?,
        _ => write_compact(w, value)?,
    }
    w.write_all(b"\n")
}

/// Write a value as compact JSON with no trailing newline.
pub fn write_compact<W: Write>(w: &mut W, value: &Value) -> io::Result<()> {
    match value {
        Value::Null => w.write_all(b"null"),
        Value::Bool(b) => w.write_all(if *b { b"true" } else { b"false" }),
        Value::Int(n) => {
            let mut buf = itoa::Buffer::new();
            w.write_all(buf.format(*n).as_bytes())
        }
        Value::Float(f) => write_float(w, *f),
        Value::String(s) => write_json_string(w, s),
        Value::Array(arr) => {
            w.write_all(b"[")?;
            for (i, v) in arr.iter().enumerate() {
                if i > 0 {
                    w.write_all(b",")?;
                }
                write_compact(w, v)?;
            }
            w.write_all(b"]")
        }
        Value::Object(obj) => {
            w.write_all(b"{")?;
            for (i, (k, v)) in obj.iter().enumerate() {
                if i > 0 {
                    w.write_all(b",")?;
                }
                write_json_string(w, k)?;
                w.write_all(b":")?;
                write_compact(w, v)?;
            }
            w.write_all(b"}")
        }
    }
}

/// Write a JSON-escaped string (with surrounding quotes).
pub fn write_json_string<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    w.write_all(b"\"")?;
    let bytes = s.as_bytes();
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        let escape: &[u8] = match b {
            b'"' => b"\\\"",
            b'\\' => b"\\\\",
            b'\n' => b"\\n",
            b'\r' => b"\\r",
            b'\t' => b"\\t",
            b'\x08' => b"\\b",
            b'\x0c' => b"\\f",
            0..=0x1f | 0x7f => {
                if start < i {
                    w.write_all(&bytes[start..i])?;
                }
                write!(w, "\\u{:04x}", b)?;
                start = i + 1;
                continue;
            }
            _ => continue,
        };
        if start < i {
            w.write_all(&bytes[start..i])?;
        }
        w.write_all(escape)?;
        start = i + 1;
    }
    if start < bytes.len() {
        w.write_all(&bytes[start..])?;
    }
    w.write_all(b"\"")
}

/// Write a float, keeping it visibly a float.
///
/// Integral floats keep their `.0` suffix so `1.0` never round-trips into the
/// integer `1`. NaN prints as `null`; infinities clamp to the largest finite
/// double like jq does. Positive exponents get an explicit `+` (`1e+20`).
fn write_float<W: Write>(w: &mut W, f: f64) -> io::Result<()> {
    if f.is_nan() {
        return w.write_all(b"null");
    }
    let f = if f.is_infinite() {
        f64::MAX.copysign(f)
    } else {
        f
    };
    let mut buf = ryu::Buffer::new();
    let s = buf.format_finite(f);
    match s.find('e') {
        Some(e_pos) if !s[e_pos + 1..].starts_with('-') => {
            w.write_all(&s.as_bytes()[..=e_pos])?;
            w.write_all(b"+")?;
            w.write_all(&s.as_bytes()[e_pos + 1..])
        }
        _ => w.write_all(s.as_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compact(v: &Value) -> String {
        let mut buf = Vec::new();
        write_value(&mut buf, v, &OutputConfig::default()).unwrap();
        String::from_utf8(buf).unwrap().trim_end().to_string()
    }

    fn raw(v: &Value) -> String {
        let config = OutputConfig {
            mode: OutputMode::Raw,
        };
        let mut buf = Vec::new();
        write_value(&mut buf, v, &config).unwrap();
        String::from_utf8(buf).unwrap().trim_end().to_string()
    }

    #[test]
    fn compact_scalars() {
        assert_eq!(compact(&Value::Null), "null");
        assert_eq!(compact(&Value::Bool(true)), "true");
        assert_eq!(compact(&Value::Bool(false)), "false");
        assert_eq!(compact(&Value::Int(-1)), "-1");
        assert_eq!(compact(&Value::Int(i64::MAX)), "9223372036854775807");
    }

    #[test]
    fn float_keeps_fraction_marker() {
        assert_eq!(compact(&Value::Float(3.14)), "3.14");
        assert_eq!(compact(&Value::Float(1.0)), "1.0");
        assert_eq!(compact(&Value::Float(-100.0)), "-100.0");
    }

    #[test]
    fn float_exponent_gets_plus_sign() {
        assert_eq!(compact(&Value::Float(1e20)), "1e+20");
        assert_eq!(compact(&Value::Float(1.5e-7)), "1.5e-7");
        assert_eq!(
            compact(&Value::Float(9223372036854775808.0)),
            "9.223372036854776e+18"
        );
    }

    #[test]
    fn float_non_finite() {
        assert_eq!(compact(&Value::Float(f64::NAN)), "null");
        assert_eq!(
            compact(&Value::Float(f64::INFINITY)),
            "1.7976931348623157e+308"
        );
        assert_eq!(
            compact(&Value::Float(f64::NEG_INFINITY)),
            "-1.7976931348623157e+308"
        );
    }

    #[test]
    fn string_escaping() {
        assert_eq!(
            compact(&Value::String("a\"b\\c\nd\u{1}".into())),
            r#""a\"b\\c\nd\u0001""#
        );
        assert_eq!(compact(&Value::String("héllo".into())), "\"héllo\"");
    }

    #[test]
    fn object_preserves_insertion_order() {
        let v = Value::Object(vec![
            ("b".into(), Value::Int(2)),
            ("a".into(), Value::Array(vec![Value::Int(1), Value::Null])),
        ]);
        assert_eq!(compact(&v), r#"{"b":2,"a":[1,null]}"#);
    }

    #[test]
    fn raw_output() {
        assert_eq!(raw(&Value::String("hello world".into())), "hello world");
        assert_eq!(raw(&Value::Int(42)), "42");
        assert_eq!(raw(&Value::Array(vec![Value::String("x".into())])), r#"["x"]"#);
    }

    #[test]
    fn format_compact_has_no_newline() {
        assert_eq!(format_compact(&Value::Object(vec![])), "{}");
    }
}
