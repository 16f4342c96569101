//! Pure value operations shared by the evaluator and the builtins: the total
//! order, equality, arithmetic, containment and path deletion.
//!
//! [`compare_values`] is the one ordering primitive. Comparison operators,
//! `sort`, `sort_by`, `group_by`, `unique`, `min`/`max` and friends all go
//! through it.
use std::cmp::Ordering;

use super::{BinOp, EvalError};
use crate::value::Value;

// ---------------------------------------------------------------------------
// Ordering and equality
// ---------------------------------------------------------------------------

/// jq total ordering: null < false < true < numbers < strings < arrays < objects
fn type_order(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(false) => 1,
        Value::Bool(true) => 2,
        Value::Int(_) | Value::Float(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

/// Total order over values.
///
/// Numbers compare by mathematical value regardless of `Int`/`Float`
/// (`1 == 1.0`), exactly even past 2^53. NaN sorts below every other number.
/// Arrays compare lexicographically. Objects compare their sorted key lists
/// first, then their values in key order.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    let (lt, rt) = (type_order(left), type_order(right));
    if lt != rt {
        return lt.cmp(&rt);
    }
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Float(a), Value::Float(b)) => cmp_f64(*a, *b),
        (Value::Int(a), Value::Float(b)) => cmp_int_float(*a, *b),
        (Value::Float(a), Value::Int(b)) => cmp_int_float(*b, *a).reverse(),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => {
            for (av, bv) in a.iter().zip(b.iter()) {
                match compare_values(av, bv) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            a.len().cmp(&b.len())
        }
        (Value::Object(a), Value::Object(b)) => {
            let mut ak: Vec<&(String, Value)> = a.iter().collect();
            let mut bk: Vec<&(String, Value)> = b.iter().collect();
            ak.sort_by(|x, y| x.0.cmp(&y.0));
            bk.sort_by(|x, y| x.0.cmp(&y.0));
            let keys = ak.iter().map(|e| &e.0).cmp(bk.iter().map(|e| &e.0));
            if keys != Ordering::Equal {
                return keys;
            }
            for (ea, eb) in ak.iter().zip(bk.iter()) {
                match compare_values(&ea.1, &eb.1) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            Ordering::Equal
        }
        // Same type tag with no payload to compare: null/null, bool/bool
        _ => Ordering::Equal,
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Exact comparison of an integer with a float, without rounding the
/// integer through `f64`.
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    const TWO_63: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() {
        return Ordering::Greater;
    }
    if f >= TWO_63 {
        return Ordering::Less;
    }
    if f < -TWO_63 {
        return Ordering::Greater;
    }
    let t = f.trunc();
    match i.cmp(&(t as i64)) {
        Ordering::Equal if f > t => Ordering::Less,
        Ordering::Equal if f < t => Ordering::Greater,
        other => other,
    }
}

pub fn values_equal(left: &Value, right: &Value) -> bool {
    compare_values(left, right) == Ordering::Equal
}

/// Evaluate a comparison operator.
pub fn compare_op(left: &Value, op: BinOp, right: &Value) -> bool {
    let ord = compare_values(left, right);
    match op {
        BinOp::Eq => ord == Ordering::Equal,
        BinOp::Ne => ord != Ordering::Equal,
        BinOp::Lt => ord == Ordering::Less,
        BinOp::Le => ord != Ordering::Greater,
        BinOp::Gt => ord == Ordering::Greater,
        BinOp::Ge => ord != Ordering::Less,
        _ => false,
    }
}

/// Stable sort by the total order.
pub fn sort_values(values: &mut [Value]) {
    values.sort_by(compare_values);
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

/// jq's `type (value)` rendering used in error messages.
pub fn describe(v: &Value) -> String {
    format!("{} ({})", v.type_name(), v.short_desc())
}

fn binary_error(left: &Value, right: &Value, what: &str) -> EvalError {
    EvalError::Runtime(format!("{} and {} {what}", describe(left), describe(right)))
}

/// Canonical form of a computed number: integral results that fit print as
/// integers (`1.5 + 1.5` is `3`, as in jq); everything else is `Float`.
/// Only values read from input or written as literals keep a `1.0` form.
pub fn f64_to_value(f: f64) -> Value {
    // Strict upper bound: i64::MAX as f64 rounds up to 2^63, which does not fit.
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Value::Int(f as i64)
    } else {
        Value::Float(f)
    }
}

const MAX_REPEAT_BYTES: u64 = 100_000_000;

pub fn arith_values(left: &Value, op: BinOp, right: &Value) -> Result<Value, EvalError> {
    match op {
        BinOp::Add => match (left, right) {
            (Value::Null, other) | (other, Value::Null) => Ok(other.clone()),
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
            (Value::Array(a), Value::Array(b)) => {
                let mut result = Vec::with_capacity(a.len() + b.len());
                result.extend_from_slice(a);
                result.extend_from_slice(b);
                Ok(Value::Array(result))
            }
            (Value::Object(_), Value::Object(b)) => {
                // Shallow merge: right-hand keys win
                let mut result = left.clone();
                for (k, v) in b {
                    result.insert(k.clone(), v.clone());
                }
                Ok(result)
            }
            (Value::Int(_), Value::Int(_)) => left
                .add(right)
                .ok_or_else(|| binary_error(left, right, "cannot be added")),
            _ => match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => Ok(f64_to_value(a + b)),
                _ => Err(binary_error(left, right, "cannot be added")),
            },
        },
        BinOp::Sub => match (left, right) {
            (Value::Int(a), Value::Int(b)) => Ok(a
                .checked_sub(*b)
                .map_or_else(|| Value::Float(*a as f64 - *b as f64), Value::Int)),
            (Value::Array(a), Value::Array(b)) => Ok(Value::Array(
                a.iter()
                    .filter(|v| !b.iter().any(|bv| values_equal(v, bv)))
                    .cloned()
                    .collect(),
            )),
            _ => match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => Ok(f64_to_value(a - b)),
                _ => Err(binary_error(left, right, "cannot be subtracted")),
            },
        },
        BinOp::Mul => match (left, right) {
            (Value::Int(a), Value::Int(b)) => Ok(a
                .checked_mul(*b)
                .map_or_else(|| Value::Float(*a as f64 * *b as f64), Value::Int)),
            (Value::Object(_), Value::Object(_)) => Ok(deep_merge(left, right)),
            (Value::String(s), n @ (Value::Int(_) | Value::Float(_)))
            | (n @ (Value::Int(_) | Value::Float(_)), Value::String(s)) => {
                repeat_string(s, n.as_f64().unwrap_or(0.0))
            }
            _ => match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => Ok(f64_to_value(a * b)),
                _ => Err(binary_error(left, right, "cannot be multiplied")),
            },
        },
        BinOp::Div => match (left, right) {
            (Value::String(s), Value::String(sep)) => Ok(split_string(s, sep)),
            _ => match (left.as_f64(), right.as_f64()) {
                (Some(_), Some(b)) if b == 0.0 => Err(binary_error(
                    left,
                    right,
                    "cannot be divided because the divisor is zero",
                )),
                (Some(a), Some(b)) => Ok(match (left, right) {
                    // Exact integer quotients skip the f64 round trip
                    (Value::Int(x), Value::Int(y)) if x.checked_rem(*y) == Some(0) => {
                        x.checked_div(*y).map_or(Value::Float(a / b), Value::Int)
                    }
                    _ => f64_to_value(a / b),
                }),
                _ => Err(binary_error(left, right, "cannot be divided")),
            },
        },
        BinOp::Mod => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => {
                // Both sides truncate to integers first, like jq
                let (x, y) = (a as i64, b as i64);
                if y == 0 {
                    return Err(binary_error(
                        left,
                        right,
                        "cannot be divided because the divisor is zero",
                    ));
                }
                Ok(Value::Int(x.checked_rem(y).unwrap_or(0)))
            }
            _ => Err(binary_error(left, right, "cannot be divided")),
        },
        _ => Err(EvalError::runtime(format!("{op:?} is not an arithmetic operator"))),
    }
}

/// `"ab" * n`: `n` copies (rounded up); zero or negative gives `null`.
fn repeat_string(s: &str, n: f64) -> Result<Value, EvalError> {
    if n.is_nan() || n <= 0.0 {
        return Ok(Value::Null);
    }
    let count = n.ceil() as u64;
    if count.saturating_mul(s.len() as u64) > MAX_REPEAT_BYTES {
        return Err(EvalError::runtime("Repeat string result too long"));
    }
    Ok(Value::String(s.repeat(count as usize)))
}

pub fn split_string(s: &str, sep: &str) -> Value {
    if s.is_empty() {
        return Value::Array(Vec::new());
    }
    if sep.is_empty() {
        return Value::Array(s.chars().map(|c| Value::String(c.to_string())).collect());
    }
    Value::Array(s.split(sep).map(|p| Value::String(p.to_string())).collect())
}

fn deep_merge(a: &Value, b: &Value) -> Value {
    let mut result = a.clone();
    if let (Value::Object(slots), Value::Object(b_obj)) = (&mut result, b) {
        for (k, bv) in b_obj {
            match slots.iter_mut().find(|(ek, _)| ek == k) {
                Some(existing) if matches!((&existing.1, bv), (Value::Object(_), Value::Object(_))) => {
                    existing.1 = deep_merge(&existing.1, bv);
                }
                Some(existing) => existing.1 = bv.clone(),
                None => slots.push((k.clone(), bv.clone())),
            }
        }
    }
    result
}

// ---------------------------------------------------------------------------
// Containment
// ---------------------------------------------------------------------------

/// jq `contains`: substring for strings, recursive subset for arrays and
/// objects, equality for everything else. Mismatched types are an error.
pub fn value_contains(haystack: &Value, needle: &Value) -> Result<bool, EvalError> {
    if haystack.type_name() != needle.type_name() {
        return Err(binary_error(
            haystack,
            needle,
            "cannot have their containment checked",
        ));
    }
    Ok(contains_same_type(haystack, needle))
}

fn contains_same_type(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::String(h), Value::String(n)) => h.contains(n.as_str()),
        (Value::Array(h), Value::Array(n)) => n.iter().all(|nv| {
            h.iter()
                .any(|hv| hv.type_name() == nv.type_name() && contains_same_type(hv, nv))
        }),
        (Value::Object(_), Value::Object(n)) => n.iter().all(|(nk, nv)| {
            haystack
                .get(nk)
                .is_some_and(|hv| hv.type_name() == nv.type_name() && contains_same_type(hv, nv))
        }),
        _ => values_equal(haystack, needle),
    }
}

// ---------------------------------------------------------------------------
// Indexing helpers
// ---------------------------------------------------------------------------

/// Resolve a possibly-negative array index. `None` when out of range.
pub fn resolve_index(len: usize, idx: i64) -> Option<usize> {
    let i = if idx < 0 { len as i64 + idx } else { idx };
    (0..len as i64).contains(&i).then_some(i as usize)
}

/// Slice bounds as jq computes them: negative counts from the end, floats
/// round outward, the result is clamped and never inverted.
pub fn slice_bounds(len: usize, from: Option<f64>, to: Option<f64>) -> (usize, usize) {
    let clamp = |v: f64| -> usize {
        let v = if v < 0.0 { len as f64 + v } else { v };
        v.clamp(0.0, len as f64) as usize
    };
    let start = from.map_or(0, |f| clamp(f.floor()));
    let end = to.map_or(len, |t| clamp(t.ceil()));
    (start, end.max(start))
}

// ---------------------------------------------------------------------------
// Path deletion
// ---------------------------------------------------------------------------

/// Delete every path in `paths` from `value` at once.
///
/// Path components are strings (object keys), numbers (array indices) or
/// `{"start": s, "end": e}` objects (array slices). Paths are removed from the
/// greatest down, so deleting one array element never shifts another pending
/// deletion.
pub fn delete_paths(mut value: Value, mut paths: Vec<Vec<Value>>) -> Result<Value, EvalError> {
    if paths.iter().any(|p| p.is_empty()) {
        return Ok(Value::Null);
    }
    paths.sort_by(|a, b| compare_path(b, a));
    paths.dedup_by(|a, b| compare_path(a, b) == Ordering::Equal);
    for path in &paths {
        delete_path(&mut value, path)?;
    }
    Ok(value)
}

fn compare_path(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match compare_values(x, y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

fn delete_path(value: &mut Value, path: &[Value]) -> Result<(), EvalError> {
    let Some((key, rest)) = path.split_first() else {
        return Ok(());
    };
    match (value, key) {
        (Value::Null, _) => Ok(()),
        (Value::Object(obj), Value::String(k)) => {
            if rest.is_empty() {
                obj.retain(|(ek, _)| ek != k);
            } else if let Some((_, child)) = obj.iter_mut().find(|(ek, _)| ek == k) {
                delete_path(child, rest)?;
            }
            Ok(())
        }
        (Value::Array(arr), Value::Int(_) | Value::Float(_)) => {
            let idx = key.as_f64().map_or(0, |f| f.floor() as i64);
            if let Some(i) = resolve_index(arr.len(), idx) {
                if rest.is_empty() {
                    arr.remove(i);
                } else {
                    delete_path(&mut arr[i], rest)?;
                }
            }
            Ok(())
        }
        (Value::Array(arr), Value::Object(_)) if rest.is_empty() => {
            let bound = |name: &str| key.get(name).and_then(Value::as_f64);
            let (start, end) = slice_bounds(arr.len(), bound("start"), bound("end"));
            arr.drain(start..end);
            Ok(())
        }
        (target, _) => Err(EvalError::Runtime(format!(
            "Cannot delete field at index {} of {}",
            key.short_desc(),
            target.type_name()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
