/// jq filter evaluator: produces zero or more output Values per input.
///
/// Uses generator semantics: each filter operation calls `output` for
/// each result, avoiding intermediate Vec allocations. An error returned by
/// `output` (a downstream failure) propagates unchanged; `?` and `//` only
/// suppress errors raised inside their own operand.
use super::builtins::{call_builtin, lookup_native};
use super::value_ops::{
    arith_values, compare_op, delete_paths, describe, resolve_index, slice_bounds,
};
use super::{BinOp, EvalError, Filter, PathStep};
use crate::value::Value;

/// Evaluate a filter against an input value, calling `output` for each result.
pub fn eval(
    filter: &Filter,
    input: &Value,
    output: &mut dyn FnMut(Value) -> Result<(), EvalError>,
) -> Result<(), EvalError> {
    match filter {
        Filter::Identity => output(input.clone()),

        Filter::Field(name) => match input {
            Value::Object(_) => output(input.get(name).cloned().unwrap_or(Value::Null)),
            Value::Null => output(Value::Null),
            _ => Ok(()),
        },

        Filter::Path(steps) => eval_steps(steps, input, output),

        Filter::Index(base, idx) => {
            // The index expression sees the original input, not `base`'s result.
            let indices = collect(idx, input)?;
            eval(base, input, &mut |b| {
                for i in &indices {
                    if let Some(v) = index_value(&b, i)? {
                        output(v)?;
                    }
                }
                Ok(())
            })
        }

        Filter::Iterate(base) => eval(base, input, &mut |b| iterate(&b, output)),

        Filter::Slice(base, from, to) => {
            let froms = slice_arg(from.as_deref(), input)?;
            let tos = slice_arg(to.as_deref(), input)?;
            eval(base, input, &mut |b| {
                for t in &tos {
                    for f in &froms {
                        output(slice_value(&b, f, t)?)?;
                    }
                }
                Ok(())
            })
        }

        Filter::Select(pred) => {
            if first_output(pred, input)?.is_some_and(|v| v.is_truthy()) {
                output(input.clone())
            } else {
                Ok(())
            }
        }

        Filter::ObjectConstruct(pairs) => {
            let mut current = Vec::with_capacity(pairs.len());
            build_object(pairs, &mut current, input, output)
        }

        Filter::ArrayConstruct(elems) => {
            let mut items = Vec::new();
            for elem in elems {
                eval(elem, input, &mut |v| {
                    items.push(v);
                    Ok(())
                })?;
            }
            output(Value::Array(items))
        }

        Filter::Literal(v) => output(v.clone()),

        Filter::Pipe(left, right) => {
            eval(left, input, &mut |intermediate| eval(right, &intermediate, output))
        }

        Filter::Comma(items) => {
            for item in items {
                eval(item, input, output)?;
            }
            Ok(())
        }

        Filter::If(cond, then_branch, else_branch) => eval(cond, input, &mut |c| {
            if c.is_truthy() {
                eval(then_branch, input, output)
            } else {
                eval(else_branch, input, output)
            }
        }),

        Filter::Alternative(left, right) => {
            let mut any_truthy = false;
            suppress_errors(left, input, &mut |v| {
                if v.is_truthy() {
                    any_truthy = true;
                    output(v)
                } else {
                    Ok(())
                }
            })?;
            if any_truthy {
                Ok(())
            } else {
                eval(right, input, output)
            }
        }

        Filter::BinaryOp(BinOp::And, left, right) => eval(left, input, &mut |l| {
            if !l.is_truthy() {
                return output(Value::Bool(false));
            }
            eval(right, input, &mut |r| output(Value::Bool(r.is_truthy())))
        }),

        Filter::BinaryOp(BinOp::Or, left, right) => eval(left, input, &mut |l| {
            if l.is_truthy() {
                return output(Value::Bool(true));
            }
            eval(right, input, &mut |r| output(Value::Bool(r.is_truthy())))
        }),

        Filter::BinaryOp(op, left, right) => {
            // jq order: right operand outermost, left innermost.
            let rights = collect(right, input)?;
            let lefts = collect(left, input)?;
            for r in &rights {
                for l in &lefts {
                    let v = if op.is_comparison() {
                        Value::Bool(compare_op(l, *op, r))
                    } else {
                        arith_values(l, *op, r)?
                    };
                    output(v)?;
                }
            }
            Ok(())
        }

        Filter::Not(inner) => eval(inner, input, &mut |v| output(Value::Bool(!v.is_truthy()))),

        Filter::Neg(inner) => eval(inner, input, &mut |v| match v.negate() {
            Some(n) => output(n),
            None => Err(EvalError::Runtime(format!("{} cannot be negated", describe(&v)))),
        }),

        Filter::Try(inner) => suppress_errors(inner, input, output),

        Filter::Call(name, args) => match lookup_native(name, args.len()) {
            Some(builtin) => call_builtin(builtin, args, input, output),
            None => Err(EvalError::Unsupported(format!("{name}/{}", args.len()))),
        },

        Filter::Recurse => Err(EvalError::Unsupported("..".into())),
        Filter::Var(name) => Err(EvalError::Unsupported(format!("${name}"))),
        Filter::Bind(..) => Err(EvalError::Unsupported("variable binding".into())),
        Filter::Reduce(..) => Err(EvalError::Unsupported("reduce".into())),
        Filter::Foreach(..) => Err(EvalError::Unsupported("foreach".into())),
        Filter::Def { .. } => Err(EvalError::Unsupported("def".into())),
        Filter::TryCatch(..) => Err(EvalError::Unsupported("try/catch".into())),
        Filter::Label(..) | Filter::Break(_) => Err(EvalError::Unsupported("label/break".into())),
        Filter::Assign(..) => Err(EvalError::Unsupported("assignment".into())),
        Filter::Format(name, _) => Err(EvalError::Unsupported(format!("@{name}"))),
        Filter::StringInterp(_) => Err(EvalError::Unsupported("string interpolation".into())),
        Filter::Import(..) => Err(EvalError::Unsupported("modules".into())),
    }
}

/// Collect every output of `filter` into a Vec.
pub fn collect(filter: &Filter, input: &Value) -> Result<Vec<Value>, EvalError> {
    let mut out = Vec::new();
    eval(filter, input, &mut |v| {
        out.push(v);
        Ok(())
    })?;
    Ok(out)
}

/// The first output of `filter`, if any. Later outputs are still evaluated
/// (and may still fail) but are discarded.
pub(super) fn first_output(filter: &Filter, input: &Value) -> Result<Option<Value>, EvalError> {
    let mut first = None;
    eval(filter, input, &mut |v| {
        if first.is_none() {
            first = Some(v);
        }
        Ok(())
    })?;
    Ok(first)
}

/// Run `filter`, ending its output silently at the first error it raises.
/// Errors raised by `output` itself still propagate.
fn suppress_errors(
    filter: &Filter,
    input: &Value,
    output: &mut dyn FnMut(Value) -> Result<(), EvalError>,
) -> Result<(), EvalError> {
    let mut downstream = None;
    let result = eval(filter, input, &mut |v| {
        output(v).map_err(|e| {
            downstream = Some(e.clone());
            e
        })
    });
    match (result, downstream) {
        (Err(_), Some(d)) => Err(d),
        _ => Ok(()),
    }
}

fn eval_steps(
    steps: &[PathStep],
    input: &Value,
    output: &mut dyn FnMut(Value) -> Result<(), EvalError>,
) -> Result<(), EvalError> {
    let Some((step, rest)) = steps.split_first() else {
        return output(input.clone());
    };
    match step {
        PathStep::Field(name) => match input {
            Value::Object(_) => match input.get(name) {
                Some(v) => eval_steps(rest, v, output),
                None => eval_steps(rest, &Value::Null, output),
            },
            Value::Null => eval_steps(rest, &Value::Null, output),
            _ => Ok(()),
        },
        PathStep::Index(i) => match input {
            Value::Array(arr) => match resolve_index(arr.len(), *i) {
                Some(idx) => eval_steps(rest, &arr[idx], output),
                None => Ok(()),
            },
            Value::Null => eval_steps(rest, &Value::Null, output),
            _ => Ok(()),
        },
        PathStep::Iterate => match input {
            Value::Array(arr) => {
                for v in arr {
                    eval_steps(rest, v, output)?;
                }
                Ok(())
            }
            Value::Object(obj) => {
                for (_, v) in obj {
                    eval_steps(rest, v, output)?;
                }
                Ok(())
            }
            Value::Null => Ok(()),
            _ => Err(cannot_iterate(input)),
        },
    }
}

fn cannot_iterate(v: &Value) -> EvalError {
    EvalError::Runtime(format!("Cannot iterate over {}", describe(v)))
}

/// `.[]`: array elements or object values; nothing for null.
pub(super) fn iterate(
    input: &Value,
    output: &mut dyn FnMut(Value) -> Result<(), EvalError>,
) -> Result<(), EvalError> {
    match input {
        Value::Array(arr) => {
            for v in arr {
                output(v.clone())?;
            }
            Ok(())
        }
        Value::Object(obj) => {
            for (_, v) in obj {
                output(v.clone())?;
            }
            Ok(())
        }
        Value::Null => Ok(()),
        _ => Err(cannot_iterate(input)),
    }
}

/// The children `.[]` would produce, borrowed.
pub(super) fn children(input: &Value) -> Result<Vec<&Value>, EvalError> {
    match input {
        Value::Array(arr) => Ok(arr.iter().collect()),
        Value::Object(obj) => Ok(obj.iter().map(|(_, v)| v).collect()),
        Value::Null => Ok(Vec::new()),
        _ => Err(cannot_iterate(input)),
    }
}

/// `base[idx]`. `None` means no output: a missing array element, or an
/// index whose type does not fit the base.
pub(super) fn index_value(base: &Value, idx: &Value) -> Result<Option<Value>, EvalError> {
    Ok(match (base, idx) {
        (Value::Object(_), Value::String(k)) => Some(base.get(k).cloned().unwrap_or(Value::Null)),
        (Value::Array(arr), Value::Int(_) | Value::Float(_)) => {
            let i = idx.as_f64().map_or(0, |f| f.floor() as i64);
            resolve_index(arr.len(), i).map(|i| arr[i].clone())
        }
        (Value::Array(_) | Value::String(_) | Value::Null, Value::Object(_)) => {
            let bound = |name: &str| idx.get(name).cloned().unwrap_or(Value::Null);
            Some(slice_value(base, &bound("start"), &bound("end"))?)
        }
        (Value::Null, Value::String(_) | Value::Int(_) | Value::Float(_) | Value::Null) => {
            Some(Value::Null)
        }
        _ => None,
    })
}

fn slice_arg(arg: Option<&Filter>, input: &Value) -> Result<Vec<Value>, EvalError> {
    match arg {
        Some(f) => collect(f, input),
        None => Ok(vec![Value::Null]),
    }
}

fn slice_bound(v: &Value) -> Result<Option<f64>, EvalError> {
    match v {
        Value::Null => Ok(None),
        Value::Int(_) | Value::Float(_) => Ok(v.as_f64()),
        _ => Err(EvalError::runtime(
            "Start and end indices of an array slice must be numbers",
        )),
    }
}

pub(super) fn slice_value(base: &Value, from: &Value, to: &Value) -> Result<Value, EvalError> {
    let (from, to) = (slice_bound(from)?, slice_bound(to)?);
    match base {
        Value::Array(arr) => {
            let (start, end) = slice_bounds(arr.len(), from, to);
            Ok(Value::Array(arr[start..end].to_vec()))
        }
        Value::String(s) => {
            // Slices count code points, not bytes
            let len = s.chars().count();
            let (start, end) = slice_bounds(len, from, to);
            Ok(Value::String(s.chars().skip(start).take(end - start).collect()))
        }
        Value::Null => Ok(Value::Null),
        _ => Err(EvalError::Runtime(format!("Cannot index {} with object", base.type_name()))),
    }
}

/// Object construction is a cartesian product over every key and value
/// output, in pair order.
fn build_object(
    pairs: &[(Filter, Filter)],
    current: &mut Vec<(String, Value)>,
    input: &Value,
    output: &mut dyn FnMut(Value) -> Result<(), EvalError>,
) -> Result<(), EvalError> {
    let Some(((key_filter, val_filter), rest)) = pairs.split_first() else {
        let mut obj = Value::Object(Vec::with_capacity(current.len()));
        for (k, v) in current.iter() {
            obj.insert(k.clone(), v.clone());
        }
        return output(obj);
    };
    eval(key_filter, input, &mut |k| {
        let key = match k {
            Value::String(key) => key,
            other => {
                return Err(EvalError::Runtime(format!(
                    "Object keys must be strings, got {}",
                    describe(&other)
                )));
            }
        };
        eval(val_filter, input, &mut |v| {
            current.push((key.clone(), v));
            let result = build_object(rest, current, input, output);
            current.pop();
            result
        })
    })
}

// ---------------------------------------------------------------------------
// Path expressions (`del`)
// ---------------------------------------------------------------------------

/// Every path `filter` addresses in `input`, in output order. Each path is a
/// list of keys, indices and `{"start","end"}` slice objects.
pub(super) fn collect_paths(filter: &Filter, input: &Value) -> Result<Vec<Vec<Value>>, EvalError> {
    let mut paths = Vec::new();
    let mut prefix = Vec::new();
    eval_paths(filter, input, &mut prefix, &mut |path, _| {
        paths.push(path.to_vec());
        Ok(())
    })?;
    Ok(paths)
}

type PathOutput<'a> = dyn FnMut(&[Value], &Value) -> Result<(), EvalError> + 'a;

fn eval_paths(
    filter: &Filter,
    current: &Value,
    prefix: &mut Vec<Value>,
    output: &mut PathOutput<'_>,
) -> Result<(), EvalError> {
    match filter {
        Filter::Identity => output(&prefix[..], current),

        Filter::Field(name) => path_step(current, &Value::String(name.clone()), prefix, output),

        Filter::Path(steps) => path_steps(steps, current, prefix, output),

        Filter::Index(base, idx) => {
            let indices = collect(idx, current)?;
            eval_paths(base, current, prefix, &mut |p, v| {
                let mut path = p.to_vec();
                for i in &indices {
                    path_step(v, i, &mut path, output)?;
                }
                Ok(())
            })
        }

        Filter::Iterate(base) => eval_paths(base, current, prefix, &mut |p, v| {
            let mut path = p.to_vec();
            path_iterate(v, &mut path, output)
        }),

        Filter::Slice(base, from, to) => {
            let froms = slice_arg(from.as_deref(), current)?;
            let tos = slice_arg(to.as_deref(), current)?;
            eval_paths(base, current, prefix, &mut |p, v| {
                let mut path = p.to_vec();
                for t in &tos {
                    for f in &froms {
                        let slice = Value::Object(vec![
                            ("start".into(), f.clone()),
                            ("end".into(), t.clone()),
                        ]);
                        path_step(v, &slice, &mut path, output)?;
                    }
                }
                Ok(())
            })
        }

        Filter::Select(pred) => {
            if first_output(pred, current)?.is_some_and(|v| v.is_truthy()) {
                output(&prefix[..], current)
            } else {
                Ok(())
            }
        }

        Filter::Pipe(left, right) => eval_paths(left, current, prefix, &mut |p, v| {
            let mut path = p.to_vec();
            eval_paths(right, v, &mut path, output)
        }),

        Filter::Comma(items) => {
            for item in items {
                eval_paths(item, current, prefix, output)?;
            }
            Ok(())
        }

        Filter::If(cond, then_branch, else_branch) => {
            for c in collect(cond, current)? {
                let branch = if c.is_truthy() { then_branch } else { else_branch };
                eval_paths(branch, current, prefix, output)?;
            }
            Ok(())
        }

        Filter::Try(inner) => {
            let mut downstream = None;
            let result = eval_paths(inner, current, prefix, &mut |p, v| {
                output(p, v).map_err(|e| {
                    downstream = Some(e.clone());
                    e
                })
            });
            match (result, downstream) {
                (Err(_), Some(d)) => Err(d),
                _ => Ok(()),
            }
        }

        Filter::Call(name, args) if args.is_empty() => match name.as_str() {
            "empty" => Ok(()),
            "first" => path_step(current, &Value::Int(0), prefix, output),
            "last" => path_step(current, &Value::Int(-1), prefix, output),
            _ => Err(invalid_path(current)),
        },

        _ => Err(invalid_path(current)),
    }
}

fn invalid_path(v: &Value) -> EvalError {
    EvalError::Runtime(format!("Invalid path expression with result {}", v.short_desc()))
}

fn path_steps(
    steps: &[PathStep],
    current: &Value,
    prefix: &mut Vec<Value>,
    output: &mut PathOutput<'_>,
) -> Result<(), EvalError> {
    let Some((step, rest)) = steps.split_first() else {
        return output(&prefix[..], current);
    };
    let mut next = |p: &[Value], v: &Value| {
        let mut path = p.to_vec();
        path_steps(rest, v, &mut path, output)
    };
    match step {
        PathStep::Field(name) => path_step(current, &Value::String(name.clone()), prefix, &mut next),
        PathStep::Index(i) => path_step(current, &Value::Int(*i), prefix, &mut next),
        PathStep::Iterate => path_iterate(current, prefix, &mut next),
    }
}

/// One indexing step in path mode. A missing element still has a path
/// (its value is null), so `del(.missing)` is a no-op rather than an error.
fn path_step(
    current: &Value,
    key: &Value,
    prefix: &mut Vec<Value>,
    output: &mut PathOutput<'_>,
) -> Result<(), EvalError> {
    let value = match (current, key) {
        (Value::Null, _) => Value::Null,
        (Value::Object(_), Value::String(k)) => current.get(k).cloned().unwrap_or(Value::Null),
        (Value::Array(arr), Value::Int(_) | Value::Float(_)) => {
            let i = key.as_f64().map_or(0, |f| f.floor() as i64);
            resolve_index(arr.len(), i).map_or(Value::Null, |i| arr[i].clone())
        }
        (Value::Array(_), Value::Object(_)) => {
            let bound = |name: &str| key.get(name).cloned().unwrap_or(Value::Null);
            slice_value(current, &bound("start"), &bound("end"))?
        }
        _ => return Ok(()),
    };
    prefix.push(key.clone());
    let result = output(&prefix[..], &value);
    prefix.pop();
    result
}

fn path_iterate(
    current: &Value,
    prefix: &mut Vec<Value>,
    output: &mut PathOutput<'_>,
) -> Result<(), EvalError> {
    match current {
        Value::Array(arr) => {
            for (i, v) in arr.iter().enumerate() {
                prefix.push(Value::Int(i as i64));
                let result = output(&prefix[..], v);
                prefix.pop();
                result?;
            }
            Ok(())
        }
        Value::Object(obj) => {
            for (k, v) in obj {
                prefix.push(Value::String(k.clone()));
                let result = output(&prefix[..], v);
                prefix.pop();
                result?;
            }
            Ok(())
        }
        Value::Null => Ok(()),
        _ => Err(cannot_iterate(current)),
    }
}

/// `del(f)`: remove every path `f` addresses.
pub(super) fn delete(filter: &Filter, input: &Value) -> Result<Value, EvalError> {
    let paths = collect_paths(filter, input)?;
    delete_paths(input.clone(), paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse;
    use crate::input::parse_line;
    use crate::output::format_compact;

    fn json(s: &str) -> Value {
        parse_line(s.as_bytes()).unwrap().unwrap()
    }

    fn run(expr: &str, input: &str) -> Result<Vec<String>, EvalError> {
        let filter = parse(expr).unwrap();
        let values = collect(&filter, &json(input))?;
        Ok(values.iter().map(format_compact).collect())
    }

    fn ok(expr: &str, input: &str) -> Vec<String> {
        run(expr, input).unwrap()
    }

    #[test]
    fn identity_and_fields() {
        assert_eq!(ok(".", r#"{"b":1,"a":2}"#), [r#"{"b":1,"a":2}"#]);
        assert_eq!(ok(".a", r#"{"a":{"b":1}}"#), [r#"{"b":1}"#]);
        assert_eq!(ok(".a.b", r#"{"a":{"b":1}}"#), ["1"]);
        assert_eq!(ok(".missing", r#"{"a":1}"#), ["null"]);
        assert_eq!(ok(".a", "null"), ["null"]);
        assert_eq!(ok(".a.b.c", "null"), ["null"]);
    }

    #[test]
    fn field_on_non_object_is_no_output() {
        assert!(ok(".a", "5").is_empty());
        assert!(ok(".a.b", r#"{"a":[1]}"#).is_empty());
        assert!(ok(".[0]", r#"{"a":1}"#).is_empty());
    }

    #[test]
    fn indexing() {
        assert_eq!(ok(".[0]", "[1,2,3]"), ["1"]);
        assert_eq!(ok(".[-1]", "[1,2,3]"), ["3"]);
        assert!(ok(".[10]", "[1,2,3]").is_empty());
        assert_eq!(ok(r#".["a"]"#, r#"{"a":1}"#), ["1"]);
        assert_eq!(ok(".[.i]", r#"{"i":"i"}"#), [r#""i""#]);
        assert_eq!(ok(".a[.n]", r#"{"a":[5,6],"n":1}"#), ["6"]);
        assert_eq!(ok(".[1.7]", "[1,2,3]"), ["2"]);
    }

    #[test]
    fn iterate() {
        assert_eq!(ok(".[]", "[1,2]"), ["1", "2"]);
        assert_eq!(ok(".[]", r#"{"a":1,"b":2}"#), ["1", "2"]);
        assert!(ok(".[]", "null").is_empty());
        assert_eq!(ok(".items[].id", r#"{"items":[{"id":1},{"id":2}]}"#), ["1", "2"]);
        let err = run(".[]", "5").unwrap_err();
        assert_eq!(err.to_string(), "Cannot iterate over number (5)");
    }

    #[test]
    fn slices() {
        assert_eq!(ok(".[1:3]", "[0,1,2,3]"), ["[1,2]"]);
        assert_eq!(ok(".[:-1]", "[0,1,2]"), ["[0,1]"]);
        assert_eq!(ok(".[2:]", r#""héllo""#), [r#""llo""#]);
        assert_eq!(ok(".[1:2]", "null"), ["null"]);
        assert!(run(".[1:2]", "5").is_err());
    }

    #[test]
    fn pipe_and_comma() {
        assert_eq!(ok(".a | .b", r#"{"a":{"b":2}}"#), ["2"]);
        assert_eq!(ok(".a, .b", r#"{"a":1,"b":2}"#), ["1", "2"]);
        assert_eq!(ok("[.[] | . * 2]", "[1,2,3]"), ["[2,4,6]"]);
    }

    #[test]
    fn select() {
        assert_eq!(ok("select(.age > 30)", r#"{"age":31}"#), [r#"{"age":31}"#]);
        assert!(ok("select(.age > 30)", r#"{"age":30}"#).is_empty());
        assert_eq!(ok(".[] | select(. != null)", "[1,null,2]"), ["1", "2"]);
        // Only the first predicate output decides
        assert_eq!(ok("select(true, false)", "1"), ["1"]);
        assert!(ok("select(false, true)", "1").is_empty());
    }

    #[test]
    fn object_construction() {
        assert_eq!(ok("{name: .n, n: 1}", r#"{"n":"x"}"#), [r#"{"name":"x","n":1}"#]);
        assert_eq!(
            ok("{a: (1,2), b: (3,4)}", "null"),
            [r#"{"a":1,"b":3}"#, r#"{"a":1,"b":4}"#, r#"{"a":2,"b":3}"#, r#"{"a":2,"b":4}"#]
        );
        assert_eq!(ok("{(.k): 1}", r#"{"k":"z"}"#), [r#"{"z":1}"#]);
        assert!(run("{(.k): 1}", r#"{"k":1}"#).is_err());
        assert_eq!(ok("{a: 1, a: 2}", "null"), [r#"{"a":2}"#]);
    }

    #[test]
    fn array_construction() {
        assert_eq!(ok("[.a, .b]", r#"{"a":1,"b":2}"#), ["[1,2]"]);
        assert_eq!(ok("[]", "null"), ["[]"]);
        assert_eq!(ok("[.[] | select(. > 1)]", "[1,2,3]"), ["[2,3]"]);
    }

    #[test]
    fn binary_operator_order() {
        assert_eq!(ok("(1,2) + (10,20)", "null"), ["11", "12", "21", "22"]);
        assert_eq!(ok("(1,2) < (2,1)", "null"), ["true", "false", "false", "false"]);
    }

    #[test]
    fn boolean_operators_short_circuit() {
        assert_eq!(ok("false and error(\"x\")", "null"), ["false"]);
        assert_eq!(ok("true or error(\"x\")", "null"), ["true"]);
        assert_eq!(ok("(true, false) and true", "null"), ["true", "false"]);
        assert_eq!(ok(".a and .b", r#"{"a":1,"b":null}"#), ["false"]);
    }

    #[test]
    fn arithmetic() {
        assert_eq!(ok(".a + .b", r#"{"a":1,"b":2}"#), ["3"]);
        assert_eq!(ok(".a - 1", r#"{"a":1.5}"#), ["0.5"]);
        assert_eq!(ok(".a * 2", r#"{"a":1.5}"#), ["3"]);
        assert_eq!(ok("-.a", r#"{"a":2}"#), ["-2"]);
        assert!(run(r#".a + "x""#, r#"{"a":1}"#).is_err());
        assert!(run("-.a", r#"{"a":"x"}"#).is_err());
    }

    #[test]
    fn if_then_else() {
        assert_eq!(ok(r#"if . > 1 then "big" else "small" end"#, "2"), [r#""big""#]);
        assert_eq!(ok(r#"if . > 1 then "big" elif . > 0 then "one" else "none" end"#, "1"), [r#""one""#]);
        assert_eq!(ok("if false then 1 end", "7"), ["7"]);
        assert_eq!(ok("if (true, false) then 1 else 2 end", "null"), ["1", "2"]);
    }

    #[test]
    fn alternative() {
        assert_eq!(ok(".a // 1", r#"{"a":null}"#), ["1"]);
        assert_eq!(ok(".a // 1", r#"{"a":false}"#), ["1"]);
        assert_eq!(ok(".a // 1", r#"{"a":0}"#), ["0"]);
        assert_eq!(ok("(null, 2, false, 3) // 9", "null"), ["2", "3"]);
        assert_eq!(ok(".[] // 9", "5"), ["9"]);
        assert!(run(r#"null // error("x")"#, "null").is_err());
    }

    #[test]
    fn try_suppresses_only_its_own_errors() {
        assert!(ok(".[]?", "5").is_empty());
        assert_eq!(ok("[.[] | tonumber?]", r#"["1","x","2"]"#), ["[1,2]"]);
        assert_eq!(ok("try error(\"x\")", "null"), Vec::<String>::new());
        // An error downstream of `?` is not caught by it
        assert!(run(".a? | error", r#"{"a":"boom"}"#).is_err());
    }

    #[test]
    fn not_and_negation() {
        assert_eq!(ok("not", "null"), ["true"]);
        assert_eq!(ok(".a | not", r#"{"a":1}"#), ["false"]);
        assert_eq!(ok("[.[] | not]", "[true,false,0]"), ["[false,true,false]"]);
    }

    #[test]
    fn wrapper_only_constructs_are_unsupported() {
        for expr in [".. | .a?", "reduce .[] as $x (0; . + $x)", "@base64", "$__loc__"] {
            let err = run(expr, "[1]").unwrap_err();
            assert!(matches!(err, EvalError::Unsupported(_)), "{expr}: {err}");
        }
        assert!(matches!(run("test(\"a\")", r#""a""#).unwrap_err(), EvalError::Unsupported(_)));
    }

    #[test]
    fn path_collection() {
        let filter = parse(".a, .b[0], .c[]").unwrap();
        let paths = collect_paths(&filter, &json(r#"{"a":1,"b":[2],"c":{"x":3}}"#)).unwrap();
        assert_eq!(
            paths,
            vec![
                vec![Value::String("a".into())],
                vec![Value::String("b".into()), Value::Int(0)],
                vec![Value::String("c".into()), Value::String("x".into())],
            ]
        );
    }

    #[test]
    fn select_paths() {
        let filter = parse(".[] | select(. > 1)").unwrap();
        let paths = collect_paths(&filter, &json("[1,2,3]")).unwrap();
        assert_eq!(paths, vec![vec![Value::Int(1)], vec![Value::Int(2)]]);
    }

    #[test]
    fn invalid_path_expression() {
        let filter = parse("1").unwrap();
        assert!(collect_paths(&filter, &json("{}")).is_err());
    }
}
