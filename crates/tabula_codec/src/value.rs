//! Dynamic CBOR value type.

use std::fmt;

/// A dynamic CBOR value.
///
/// `Value` is what a record looks like without its Rust type: the
/// type-agnostic viewer prints it, `Update` merges two of them, and index
/// keys are built from its [`Display`](fmt::Display) form.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer; `i128` covers the whole CBOR range `-2^64 ..= 2^64 - 1`.
    Integer(i128),
    /// Floating point number.
    Float(f64),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Text string (UTF-8).
    Text(String),
    /// Array of values.
    Array(Vec<Value>),
    /// Map of key-value pairs in encounter order.
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true for the zero value of the value's kind.
    ///
    /// Maps are zero when every entry is zero, so a struct whose fields
    /// were all left at their defaults counts as zero too.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Integer(n) => *n == 0,
            Value::Float(f) => *f == 0.0,
            Value::Bytes(b) => b.is_empty(),
            Value::Text(s) => s.is_empty(),
            Value::Array(a) => a.is_empty(),
            Value::Map(m) => m.iter().all(|(_, v)| v.is_zero()),
        }
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a float, if it is one.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get this value as a map, if it is one.
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a text key in this map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_text() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Returns a copy of `self` with every non-zero entry of `patch`
    /// written over the matching entry.
    ///
    /// Same as [`merge_patch`](Self::merge_patch) with no defaults.
    #[must_use]
    pub fn merge_non_zero(&self, patch: &Value) -> Value {
        self.merge_patch(patch, &Value::Null)
    }

    /// Returns a copy of `self` with the entries `patch` actually sets
    /// written over the matching entries.
    ///
    /// A patch entry is skipped when it is zero or equal to the entry under
    /// the same key in `defaults`, usually the encoded `Default` of the
    /// record type. Only keys already present in `self` are considered, and
    /// nested maps are merged entry by entry against their own defaults.
    #[must_use]
    pub fn merge_patch(&self, patch: &Value, defaults: &Value) -> Value {
        match (self, patch) {
            (Value::Map(base), Value::Map(_)) => Value::Map(
                base.iter()
                    .map(|(k, v)| {
                        let default = entry(defaults, k);
                        let replacement = entry(patch, k)
                            .filter(|pv| !pv.is_zero() && Some(*pv) != default);
                        match replacement {
                            Some(pv) => {
                                (k.clone(), v.merge_patch(pv, default.unwrap_or(&Value::Null)))
                            }
                            None => (k.clone(), v.clone()),
                        }
                    })
                    .collect(),
            ),
            (_, p) if !p.is_zero() && p != defaults => p.clone(),
            (base, _) => base.clone(),
        }
    }
}

/// Looks up `key` in a map value.
fn entry<'a>(map: &'a Value, key: &Value) -> Option<&'a Value> {
    match map {
        Value::Map(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
        _ => None,
    }
}

/// Writes the space-separated elements of a sequence, `[a b c]` style.
fn write_seq<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str("]")
}

/// Formats a value the way it appears inside an index key.
///
/// Equal logical values format identically regardless of the Rust type
/// they came from: `23u32`, `23i64` and `"23"` all render as `23`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("<nil>"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bytes(b) => write_seq(f, b),
            Value::Text(s) => f.write_str(s),
            Value::Array(a) => write_seq(f, a),
            Value::Map(m) => {
                f.write_str("map[")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{k}:{v}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::Integer(i128::from(n))
                }
            }
        )*
    };
}

from_integer!(i8, i16, i32, i64, u8, u16, u32, u64);

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        // usize is at most 64 bits on every supported target.
        Value::Integer(n as i128)
    }
}

impl From<isize> for Value {
    fn from(n: isize) -> Self {
        Value::Integer(n as i128)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(f64::from(x))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Text(s.clone())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}
