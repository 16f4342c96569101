use crate::filter::eval::{collect, delete};
use crate::filter::value_ops::{describe, value_contains};
use crate::filter::{EvalError, Filter};
use crate::input::parse_str;
use crate::output::format_compact;
use crate::value::Value;

use super::{Builtin, for_each_arg, required};

pub(super) fn call(
    builtin: Builtin,
    args: &[Filter],
    input: &Value,
    output: &mut dyn FnMut(Value) -> Result<(), EvalError>,
) -> Result<(), EvalError> {
    match builtin {
        Builtin::Length => output(length(input)?),
        Builtin::Type => output(Value::String(input.type_name().to_string())),
        Builtin::Empty => Ok(()),
        Builtin::Error => Err(error_from(input)),
        Builtin::ErrorWith => for_each_arg(args.first(), input, &mut |msg| Err(error_from(&msg))),
        Builtin::Keys | Builtin::KeysUnsorted => {
            output(keys(input, builtin == Builtin::Keys)?)
        }
        Builtin::Values => {
            if matches!(input, Value::Null) {
                Ok(())
            } else {
                output(input.clone())
            }
        }
        Builtin::Has => for_each_arg(args.first(), input, &mut |key| {
            output(Value::Bool(has(input, &key)?))
        }),
        Builtin::Contains => for_each_arg(args.first(), input, &mut |needle| {
            output(Value::Bool(value_contains(input, &needle)?))
        }),
        Builtin::Del => output(delete(required(args.first())?, input)?),
        Builtin::ToEntries => output(Value::Array(to_entries(input)?)),
        Builtin::FromEntries => output(from_entries(input)?),
        Builtin::WithEntries => {
            let f = required(args.first())?;
            let entries = to_entries(input)?;
            let mut mapped = Vec::with_capacity(entries.len());
            for entry in &entries {
                mapped.extend(collect(f, entry)?);
            }
            output(from_entries(&Value::Array(mapped))?)
        }
        Builtin::ToString => output(match input {
            Value::String(_) => input.clone(),
            _ => Value::String(format_compact(input)),
        }),
        Builtin::ToNumber => output(to_number(input)?),
        Builtin::ToJson => output(Value::String(format_compact(input))),
        Builtin::FromJson => match input {
            Value::String(s) => match parse_str(s) {
                Ok(v) => output(v),
                Err(e) => Err(EvalError::Runtime(format!("{e} (while parsing '{s}')"))),
            },
            _ => Err(EvalError::Runtime(format!(
                "{} cannot be parsed as JSON",
                describe(input)
            ))),
        },
        _ => Err(EvalError::Unsupported(format!("{builtin:?}"))),
    }
}

/// `error` and `error(msg)`: a string becomes the message as-is; anything
/// else is rendered as JSON.
fn error_from(v: &Value) -> EvalError {
    match v {
        Value::String(s) => EvalError::Runtime(s.clone()),
        other => EvalError::Runtime(format!("{} (not a string)", format_compact(other))),
    }
}

fn length(v: &Value) -> Result<Value, EvalError> {
    Ok(match v {
        Value::Null => Value::Int(0),
        Value::Bool(_) => {
            return Err(EvalError::Runtime(format!("{} has no length", describe(v))));
        }
        Value::Int(n) => n.checked_abs().map_or(Value::Float((*n as f64).abs()), Value::Int),
        Value::Float(f) => Value::Float(f.abs()),
        Value::String(s) => Value::Int(s.chars().count() as i64),
        Value::Array(a) => Value::Int(a.len() as i64),
        Value::Object(o) => Value::Int(o.len() as i64),
    })
}

fn keys(v: &Value, sorted: bool) -> Result<Value, EvalError> {
    match v {
        Value::Object(obj) => {
            let mut keys: Vec<&String> = obj.iter().map(|(k, _)| k).collect();
            if sorted {
                keys.sort();
            }
            Ok(Value::Array(keys.into_iter().map(|k| Value::String(k.clone())).collect()))
        }
        Value::Array(arr) => Ok(Value::Array((0..arr.len() as i64).map(Value::Int).collect())),
        _ => Err(EvalError::Runtime(format!("{} has no keys", describe(v)))),
    }
}

fn has(v: &Value, key: &Value) -> Result<bool, EvalError> {
    match (v, key) {
        (Value::Object(_), Value::String(k)) => Ok(v.get(k).is_some()),
        (Value::Array(arr), Value::Int(_) | Value::Float(_)) => {
            let i = key.as_f64().unwrap_or(-1.0);
            Ok(i >= 0.0 && i < arr.len() as f64)
        }
        _ => Err(EvalError::Runtime(format!(
            "Cannot check whether {} has a {} key",
            v.type_name(),
            key.type_name()
        ))),
    }
}

fn to_entries(v: &Value) -> Result<Vec<Value>, EvalError> {
    match v {
        Value::Object(obj) => Ok(obj
            .iter()
            .map(|(k, v)| {
                Value::Object(vec![
                    ("key".into(), Value::String(k.clone())),
                    ("value".into(), v.clone()),
                ])
            })
            .collect()),
        _ => Err(EvalError::Runtime(format!("{} has no keys", describe(v)))),
    }
}

/// Accepts `key`/`k`/`name`/`Name`/`K`/`Key` for the key and `value`/`v`
/// for the value. Non-string keys are rendered as JSON.
fn from_entries(v: &Value) -> Result<Value, EvalError> {
    let Value::Array(entries) = v else {
        return Err(EvalError::Runtime(format!("Cannot iterate over {}", describe(v))));
    };
    let null = Value::Null;
    let mut obj = Value::Object(Vec::with_capacity(entries.len()));
    for entry in entries {
        if !matches!(entry, Value::Object(_)) {
            return Err(EvalError::Runtime(format!(
                "Cannot index {} with \"key\"",
                entry.type_name()
            )));
        }
        let key = ["key", "k", "name", "Name", "K", "Key"]
            .iter()
            .filter_map(|name| entry.get(name))
            .find(|k| k.is_truthy())
            .unwrap_or(&null);
        let key = match key {
            Value::String(s) => s.clone(),
            other => format_compact(other),
        };
        let value = match entry.get("value") {
            Some(value) => value.clone(),
            None => entry.get("v").cloned().unwrap_or(Value::Null),
        };
        obj.insert(key, value);
    }
    Ok(obj)
}

fn to_number(v: &Value) -> Result<Value, EvalError> {
    match v {
        Value::Int(_) | Value::Float(_) => Ok(v.clone()),
        Value::String(s) => parse_number(s)
            .ok_or_else(|| EvalError::Runtime(format!("Cannot parse '{s}' as JSON"))),
        _ => Err(EvalError::Runtime(format!(
            "{} cannot be parsed as a number",
            describe(v)
        ))),
    }
}

/// A JSON number literal, nothing more: no whitespace, `nan` or `inf`.
fn parse_number(s: &str) -> Option<Value> {
    let valid = !s.is_empty()
        && s.bytes().any(|b| b.is_ascii_digit())
        && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E'));
    if !valid {
        return None;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::Int(i));
    }
    s.parse::<f64>().ok().map(Value::Float)
}

#[cfg(test)]
mod tests {
    use crate::filter::eval::collect;
    use crate::filter::parse;
    use crate::input::parse_line;
    use crate::output::format_compact;

    fn run(expr: &str, input: &str) -> Result<Vec<String>, String> {
        let filter = parse(expr).unwrap();
        let input = parse_line(input.as_bytes()).unwrap().unwrap();
        collect(&filter, &input)
            .map(|vs| vs.iter().map(format_compact).collect())
            .map_err(|e| e.to_string())
    }

    fn ok(expr: &str, input: &str) -> Vec<String> {
        run(expr, input).unwrap()
    }

    #[test]
    fn length() {
        assert_eq!(ok("length", r#""héllo""#), ["5"]);
        assert_eq!(ok("length", "[1,2]"), ["2"]);
        assert_eq!(ok("length", r#"{"a":1}"#), ["1"]);
        assert_eq!(ok("length", "null"), ["0"]);
        assert_eq!(ok("length", "-3"), ["3"]);
        assert_eq!(ok("length", "-1.5"), ["1.5"]);
        assert_eq!(run("length", "true").unwrap_err(), "boolean (true) has no length");
    }

    #[test]
    fn type_names() {
        assert_eq!(
            ok("[.[] | type]", r#"[null,true,1,1.5,"s",[],{}]"#),
            [r#"["null","boolean","number","number","string","array","object"]"#]
        );
    }

    #[test]
    fn keys_sorted_and_unsorted() {
        assert_eq!(ok("keys", r#"{"b":1,"a":2}"#), [r#"["a","b"]"#]);
        assert_eq!(ok("keys_unsorted", r#"{"b":1,"a":2}"#), [r#"["b","a"]"#]);
        assert_eq!(ok("keys", "[5,6]"), ["[0,1]"]);
        assert!(run("keys", "1").is_err());
    }

    #[test]
    fn has_and_contains() {
        assert_eq!(ok(r#"has("a")"#, r#"{"a":null}"#), ["true"]);
        assert_eq!(ok(r#"has("b")"#, r#"{"a":null}"#), ["false"]);
        assert_eq!(ok("has(1)", "[0,1]"), ["true"]);
        assert_eq!(ok("has(2)", "[0,1]"), ["false"]);
        assert!(run("has(0)", r#"{"a":1}"#).is_err());
        assert_eq!(ok(r#"contains("bar")"#, r#""foobar""#), ["true"]);
        assert_eq!(ok(r#"contains({a: [1]})"#, r#"{"a":[1,2],"b":3}"#), ["true"]);
    }

    #[test]
    fn values_drops_null() {
        assert_eq!(ok("[.[] | values]", "[1,null,false]"), ["[1,false]"]);
    }

    #[test]
    fn del_paths() {
        assert_eq!(ok("del(.a)", r#"{"a":1,"b":2}"#), [r#"{"b":2}"#]);
        assert_eq!(ok("del(.[0, 2])", "[1,2,3,4]"), ["[2,4]"]);
        assert_eq!(ok("del(.[] | select(. > 1))", "[1,2,3,1]"), ["[1,1]"]);
        assert_eq!(ok("del(.a.b)", r#"{"a":{"b":1,"c":2}}"#), [r#"{"a":{"c":2}}"#]);
        assert_eq!(ok("del(.missing)", r#"{"a":1}"#), [r#"{"a":1}"#]);
        assert_eq!(ok("del(.[1:3])", "[0,1,2,3]"), ["[0,3]"]);
        assert_eq!(ok("del(.)", "[1]"), ["null"]);
    }

    #[test]
    fn entries() {
        assert_eq!(
            ok("to_entries", r#"{"a":1,"b":2}"#),
            [r#"[{"key":"a","value":1},{"key":"b","value":2}]"#]
        );
        assert_eq!(
            ok("from_entries", r#"[{"key":"a","value":1},{"k":"b","v":2},{"name":1,"value":3}]"#),
            [r#"{"a":1,"b":2,"1":3}"#]
        );
    }

    #[test]
    fn with_entries_maps_each_entry() {
        assert_eq!(
            ok(r#"with_entries(select(.value > 1))"#, r#"{"a":1,"b":2}"#),
            [r#"{"b":2}"#]
        );
        assert_eq!(
            ok(r#"with_entries({key: .value | tostring, value: .key})"#, r#"{"a":1}"#),
            [r#"{"1":"a"}"#]
        );
    }

    #[test]
    fn conversions() {
        assert_eq!(ok("tostring", "1"), [r#""1""#]);
        assert_eq!(ok("tostring", r#""x""#), [r#""x""#]);
        assert_eq!(ok("tostring", r#"{"a":[1]}"#), [r#""{\"a\":[1]}""#]);
        assert_eq!(ok("tonumber", r#""12""#), ["12"]);
        assert_eq!(ok("tonumber", r#""1.5""#), ["1.5"]);
        assert_eq!(ok("tonumber", "7"), ["7"]);
        assert!(run("tonumber", r#""abc""#).is_err());
        assert!(run("tonumber", r#"" 1""#).is_err());
        assert!(run("tonumber", r#""nan""#).is_err());
        assert_eq!(ok("tojson", r#"[1,"a"]"#), [r#""[1,\"a\"]""#]);
        assert_eq!(ok("fromjson", r#""{\"a\":1}""#), [r#"{"a":1}"#]);
        assert!(run("fromjson", r#""{""#).is_err());
    }

    #[test]
    fn empty_and_error() {
        assert!(ok("empty", "1").is_empty());
        assert_eq!(ok("[.[] | empty]", "[1,2]"), ["[]"]);
        assert_eq!(run(r#"error("boom")"#, "null").unwrap_err(), "boom");
        assert_eq!(run("error", r#""msg""#).unwrap_err(), "msg");
        assert_eq!(run("error", r#"{"a":1}"#).unwrap_err(), r#"{"a":1} (not a string)"#);
    }

    #[test]
    fn argument_builtins_without_argument_fail() {
        let input = parse_line(br#"{"a":1}"#).unwrap().unwrap();
        for builtin in [super::Builtin::Del, super::Builtin::WithEntries] {
            let mut outputs = Vec::new();
            let err = super::call(builtin, &[], &input, &mut |v| {
                outputs.push(v);
                Ok(())
            })
            .unwrap_err();
            assert_eq!(err.to_string(), "missing builtin argument");
            assert!(outputs.is_empty());
        }
    }
}
