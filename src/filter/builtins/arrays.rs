use std::cmp::Ordering;

use crate::filter::eval::{children, collect, eval, first_output, index_value};
use crate::filter::value_ops::{arith_values, compare_values, describe, sort_values, values_equal};
use crate::filter::{BinOp, EvalError, Filter};
use crate::value::Value;

use super::{Builtin, for_each_arg, required};

pub(super) fn call(
    builtin: Builtin,
    args: &[Filter],
    input: &Value,
    output: &mut dyn FnMut(Value) -> Result<(), EvalError>,
) -> Result<(), EvalError> {
    match builtin {
        Builtin::Add => {
            let mut acc = Value::Null;
            for v in children(input)? {
                acc = arith_values(&acc, BinOp::Add, v)?;
            }
            output(acc)
        }
        Builtin::Min | Builtin::Max => {
            let arr = as_array(input, "sorted")?;
            let keyed: Vec<(Value, &Value)> = arr.iter().map(|v| (v.clone(), v)).collect();
            output(extreme(keyed, builtin == Builtin::Max))
        }
        Builtin::MinBy | Builtin::MaxBy => {
            let arr = as_array(input, "sorted")?;
            let keyed = keyed_by(arr, args.first())?;
            output(extreme(keyed, builtin == Builtin::MaxBy))
        }
        Builtin::Sort => {
            let mut arr = as_array(input, "sorted")?.to_vec();
            sort_values(&mut arr);
            output(Value::Array(arr))
        }
        Builtin::SortBy => {
            let arr = as_array(input, "sorted")?;
            let mut keyed = keyed_by(arr, args.first())?;
            keyed.sort_by(|a, b| compare_values(&a.0, &b.0));
            output(Value::Array(keyed.into_iter().map(|(_, v)| v.clone()).collect()))
        }
        Builtin::Unique => {
            let mut arr = as_array(input, "sorted")?.to_vec();
            sort_values(&mut arr);
            arr.dedup_by(|a, b| values_equal(a, b));
            output(Value::Array(arr))
        }
        Builtin::UniqueBy => {
            let groups = grouped(as_array(input, "sorted")?, args.first())?;
            output(Value::Array(
                groups
                    .into_iter()
                    .filter_map(|g| g.into_iter().next())
                    .collect(),
            ))
        }
        Builtin::GroupBy => {
            let groups = grouped(as_array(input, "grouped")?, args.first())?;
            output(Value::Array(groups.into_iter().map(Value::Array).collect()))
        }
        Builtin::Map => {
            let f = required(args.first())?;
            let mut result = Vec::new();
            for item in children(input)? {
                eval(f, item, &mut |v| {
                    result.push(v);
                    Ok(())
                })?;
            }
            output(Value::Array(result))
        }
        Builtin::MapValues => output(map_values(input, required(args.first())?)?),
        Builtin::Flatten => output(flatten(input, f64::INFINITY)?),
        Builtin::FlattenDepth => for_each_arg(args.first(), input, &mut |depth| {
            let depth = match depth.as_f64() {
                Some(d) if d < 0.0 => {
                    return Err(EvalError::runtime("flatten depth must not be negative"));
                }
                Some(d) => d,
                None => return Err(EvalError::runtime("flatten depth must be a number")),
            };
            output(flatten(input, depth)?)
        }),
        Builtin::Reverse => output(match input {
            Value::Array(arr) => Value::Array(arr.iter().rev().cloned().collect()),
            Value::String(s) => Value::String(s.chars().rev().collect()),
            Value::Null => Value::Array(Vec::new()),
            _ => return Err(EvalError::Runtime(format!("Cannot reverse {}", describe(input)))),
        }),
        Builtin::First | Builtin::Last => {
            let idx = Value::Int(if builtin == Builtin::First { 0 } else { -1 });
            match index_value(input, &idx)? {
                Some(v) => output(v),
                None => Ok(()),
            }
        }
        Builtin::FirstOf => match first_output(required(args.first())?, input)? {
            Some(v) => output(v),
            None => Ok(()),
        },
        Builtin::LastOf => match collect(required(args.first())?, input)?.pop() {
            Some(v) => output(v),
            None => Ok(()),
        },
        Builtin::Any | Builtin::All => {
            let items = children(input)?;
            output(Value::Bool(if builtin == Builtin::Any {
                items.iter().any(|v| v.is_truthy())
            } else {
                items.iter().all(|v| v.is_truthy())
            }))
        }
        Builtin::AnyOf | Builtin::AllOf => {
            let f = required(args.first())?;
            let want_any = builtin == Builtin::AnyOf;
            // any: start false, flip on the first truthy; all: the reverse
            let mut result = !want_any;
            for item in children(input)? {
                eval(f, item, &mut |v| {
                    if v.is_truthy() == want_any {
                        result = want_any;
                    }
                    Ok(())
                })?;
            }
            output(Value::Bool(result))
        }
        _ => Err(EvalError::Unsupported(format!("{builtin:?}"))),
    }
}

fn as_array<'a>(v: &'a Value, verb: &str) -> Result<&'a [Value], EvalError> {
    match v {
        Value::Array(arr) => Ok(arr.as_slice()),
        _ => Err(EvalError::Runtime(format!(
            "{} cannot be {verb}, as it is not an array",
            describe(v)
        ))),
    }
}

/// Pair each element with its `[f]` key.
fn keyed_by<'a>(
    arr: &'a [Value],
    f: Option<&Filter>,
) -> Result<Vec<(Value, &'a Value)>, EvalError> {
    let f = required(f)?;
    let mut keyed = Vec::with_capacity(arr.len());
    for v in arr {
        keyed.push((Value::Array(collect(f, v)?), v));
    }
    Ok(keyed)
}

/// Minimum keeps the first of equal keys, maximum the last.
fn extreme(keyed: Vec<(Value, &Value)>, max: bool) -> Value {
    let mut best: Option<(Value, &Value)> = None;
    for (key, v) in keyed {
        let replace = match &best {
            None => true,
            Some((best_key, _)) => {
                let ord = compare_values(&key, best_key);
                if max {
                    ord != Ordering::Less
                } else {
                    ord == Ordering::Less
                }
            }
        };
        if replace {
            best = Some((key, v));
        }
    }
    best.map_or(Value::Null, |(_, v)| v.clone())
}

/// Stable sort by `[f]`, then split into runs of equal keys.
fn grouped(arr: &[Value], f: Option<&Filter>) -> Result<Vec<Vec<Value>>, EvalError> {
    let mut keyed = keyed_by(arr, f)?;
    keyed.sort_by(|a, b| compare_values(&a.0, &b.0));
    let mut groups: Vec<Vec<Value>> = Vec::new();
    let mut last_key: Option<Value> = None;
    for (key, v) in keyed {
        let same = last_key.as_ref().is_some_and(|k| values_equal(k, &key));
        match groups.last_mut() {
            Some(group) if same => group.push(v.clone()),
            _ => {
                groups.push(vec![v.clone()]);
                last_key = Some(key);
            }
        }
    }
    Ok(groups)
}

/// `.[] |= f`: each value becomes the first output of `f`; values where `f`
/// produces nothing are removed.
fn map_values(input: &Value, f: &Filter) -> Result<Value, EvalError> {
    match input {
        Value::Array(arr) => {
            let mut result = Vec::with_capacity(arr.len());
            for v in arr {
                if let Some(mapped) = first_output(f, v)? {
                    result.push(mapped);
                }
            }
            Ok(Value::Array(result))
        }
        Value::Object(obj) => {
            let mut result = Vec::with_capacity(obj.len());
            for (k, v) in obj {
                if let Some(mapped) = first_output(f, v)? {
                    result.push((k.clone(), mapped));
                }
            }
            Ok(Value::Object(result))
        }
        Value::Null => Ok(Value::Null),
        _ => Err(EvalError::Runtime(format!("Cannot iterate over {}", describe(input)))),
    }
}

fn flatten(input: &Value, depth: f64) -> Result<Value, EvalError> {
    fn go(items: &[Value], depth: f64, out: &mut Vec<Value>) {
        for item in items {
            match item {
                Value::Array(inner) if depth > 0.0 => go(inner, depth - 1.0, out),
                _ => out.push(item.clone()),
            }
        }
    }
    let arr = as_array(input, "flattened")?;
    let mut out = Vec::new();
    go(arr, depth, &mut out);
    Ok(Value::Array(out))
}
