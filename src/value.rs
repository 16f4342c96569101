/// JSON value representation.
///
/// Uses `Int(i64)` for integers alongside `Float(f64)` so that integer-looking
/// input stays integral through the pipeline. `Object` uses
/// `Vec<(String, Value)>` to preserve key insertion order (matching jq).
/// Keys are kept unique by [`Value::insert`]; every constructor in this crate
/// goes through it or builds from an already-unique source.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(Vec<(String, Value)>),
}

impl Value {
    /// Returns the jq type name string.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::Float(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Returns true if the value is "truthy" in jq semantics.
    /// Only `false` and `null` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }

    /// Look up an object key. Returns `None` for missing keys and non-objects.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(obj) => obj.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Insert into an object, replacing the value in place if the key exists.
    /// No-op on non-objects.
    pub fn insert(&mut self, key: String, value: Value) {
        if let Value::Object(obj) = self {
            match obj.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => obj.push((key, value)),
            }
        }
    }

    /// Short compact rendering for error messages, truncated like jq's
    /// `number (1.5)` / `string ("abc...")` descriptions.
    pub fn short_desc(&self) -> String {
        const MAX: usize = 11;
        let full = crate::output::format_compact(self);
        if full.len() <= MAX {
            return full;
        }
        let mut end = MAX - 3;
        while !full.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &full[..end])
    }

    /// Numeric addition with overflow promotion: `i64` results that do not fit
    /// become the nearest `f64` instead of wrapping or panicking.
    /// Returns `None` when either side is not a number.
    pub fn add(&self, other: &Value) -> Option<Value> {
        Some(match (self, other) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(*b)
                .map_or_else(|| Value::Float(*a as f64 + *b as f64), Value::Int),
            (Value::Int(a), Value::Float(b)) => Value::Float(*a as f64 + b),
            (Value::Float(a), Value::Int(b)) => Value::Float(a + *b as f64),
            (Value::Float(a), Value::Float(b)) => Value::Float(a + b),
            _ => return None,
        })
    }

    /// Numeric negation. `-i64::MIN` does not fit and is promoted to `f64`.
    pub fn negate(&self) -> Option<Value> {
        Some(match self {
            Value::Int(n) => n
                .checked_neg()
                .map_or_else(|| Value::Float(-(*n as f64)), Value::Int),
            Value::Float(f) => Value::Float(-f),
            _ => return None,
        })
    }

    /// `self + 1`, promoting `i64::MAX + 1` to `f64`.
    pub fn incr(&self) -> Option<Value> {
        self.add(&Value::Int(1))
    }

    /// `self - 1`, promoting `i64::MIN - 1` to `f64`.
    pub fn decr(&self) -> Option<Value> {
        self.add(&Value::Int(-1))
    }

    /// Numeric value as `f64`, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}
