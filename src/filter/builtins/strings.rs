use crate::filter::value_ops::{describe, split_string};
use crate::filter::{EvalError, Filter};
use crate::output::format_compact;
use crate::value::Value;

use super::{Builtin, for_each_arg};

pub(super) fn call(
    builtin: Builtin,
    args: &[Filter],
    input: &Value,
    output: &mut dyn FnMut(Value) -> Result<(), EvalError>,
) -> Result<(), EvalError> {
    match builtin {
        Builtin::Split => for_each_arg(args.first(), input, &mut |sep| match (input, &sep) {
            (Value::String(s), Value::String(sep)) => output(split_string(s, sep)),
            _ => Err(EvalError::runtime("split input and separator must be strings")),
        }),
        Builtin::Join => for_each_arg(args.first(), input, &mut |sep| output(join(input, &sep)?)),
        Builtin::AsciiUpcase | Builtin::AsciiDowncase => match input {
            Value::String(s) => output(Value::String(if builtin == Builtin::AsciiUpcase {
                s.to_ascii_uppercase()
            } else {
                s.to_ascii_lowercase()
            })),
            _ => Err(EvalError::Runtime(format!(
                "{} input must be a string",
                if builtin == Builtin::AsciiUpcase { "ascii_upcase" } else { "ascii_downcase" }
            ))),
        },
        Builtin::StartsWith | Builtin::EndsWith => {
            let name = if builtin == Builtin::StartsWith { "startswith" } else { "endswith" };
            for_each_arg(args.first(), input, &mut |affix| match (input, &affix) {
                (Value::String(s), Value::String(a)) => output(Value::Bool(
                    if builtin == Builtin::StartsWith {
                        s.starts_with(a.as_str())
                    } else {
                        s.ends_with(a.as_str())
                    },
                )),
                _ => Err(EvalError::Runtime(format!("{name}() requires string inputs"))),
            })
        }
        Builtin::LtrimStr | Builtin::RtrimStr => {
            for_each_arg(args.first(), input, &mut |affix| {
                let trimmed = match (input, &affix) {
                    (Value::String(s), Value::String(a)) => {
                        let stripped = if builtin == Builtin::LtrimStr {
                            s.strip_prefix(a.as_str())
                        } else {
                            s.strip_suffix(a.as_str())
                        };
                        stripped.map(|rest| Value::String(rest.to_string()))
                    }
                    _ => None,
                };
                // Non-strings and non-matches pass through unchanged
                output(trimmed.unwrap_or_else(|| input.clone()))
            })
        }
        _ => Err(EvalError::Unsupported(format!("{builtin:?}"))),
    }
}

/// `join(sep)`: null joins as the empty string, numbers and booleans as
/// their JSON text. Nested arrays and objects are an error.
fn join(input: &Value, sep: &Value) -> Result<Value, EvalError> {
    let Value::String(sep) = sep else {
        return Err(EvalError::Runtime(format!(
            "{} cannot be used as a join separator",
            describe(sep)
        )));
    };
    let items: Vec<&Value> = match input {
        Value::Array(arr) => arr.iter().collect(),
        Value::Object(obj) => obj.iter().map(|(_, v)| v).collect(),
        Value::Null => Vec::new(),
        _ => {
            return Err(EvalError::Runtime(format!("Cannot iterate over {}", describe(input))));
        }
    };
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        match item {
            Value::Null => {}
            Value::String(s) => out.push_str(s),
            Value::Bool(_) | Value::Int(_) | Value::Float(_) => out.push_str(&format_compact(item)),
            _ => {
                return Err(EvalError::Runtime(format!("Cannot join with {}", item.type_name())));
            }
        }
    }
    Ok(Value::String(out))
}
