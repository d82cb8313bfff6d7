use core::fmt::{self, Display};
use std::hash::{DefaultHasher, Hash, Hasher};

use indexmap::IndexMap;

/// Object values keep insertion order so that validation walks properties in
/// document order and error lists stay reproducible.
pub type Object = IndexMap<String, DynValue>;

/// A dynamically typed value, covering the seven JSON types.
///
/// Equality is structural with numeric widening: `Int(5)` equals `Num(5.0)`,
/// and objects compare independently of key order. [`DynValue::stable_hash`]
/// is consistent with that equality.
#[derive(Debug, Clone, Default)]
pub enum DynValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Num(f64),
    Str(String),
    Array(Vec<DynValue>),
    Object(Object),
}

/// JSON type classification used by the `type` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JsonType::Null => "null",
            JsonType::Boolean => "boolean",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::String => "string",
            JsonType::Array => "array",
            JsonType::Object => "object",
        };
        f.write_str(name)
    }
}

impl DynValue {
    /// Classify this value for the `type` keyword.
    ///
    /// A float with no fractional part classifies as `integer`; the schema
    /// side decides how far that widening reaches.
    pub fn json_type(&self) -> JsonType {
        match self {
            DynValue::Null => JsonType::Null,
            DynValue::Bool(_) => JsonType::Boolean,
            DynValue::Int(_) => JsonType::Integer,
            DynValue::Num(n) => {
                if n.fract() == 0.0 {
                    JsonType::Integer
                } else {
                    JsonType::Number
                }
            }
            DynValue::Str(_) => JsonType::String,
            DynValue::Array(_) => JsonType::Array,
            DynValue::Object(_) => JsonType::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DynValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DynValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view over both integer and float values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DynValue::Int(i) => Some(*i as f64),
            DynValue::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// Integer view; accepts floats that are mathematically integral, the
    /// lenient coercion schema keywords like `minLength: 3.0` rely on.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DynValue::Int(i) => Some(*i),
            DynValue::Num(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DynValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[DynValue]> {
        match self {
            DynValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            DynValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Number of elements for arrays, `-1` for everything else.
    pub fn array_len(&self) -> i64 {
        match self {
            DynValue::Array(items) => items.len() as i64,
            _ => -1,
        }
    }

    /// Element at `index` for arrays; `None` out of bounds or for non-arrays.
    pub fn array_get(&self, index: usize) -> Option<&DynValue> {
        match self {
            DynValue::Array(items) => items.get(index),
            _ => None,
        }
    }

    /// Member lookup for objects; `None` for non-objects.
    pub fn get(&self, key: &str) -> Option<&DynValue> {
        match self {
            DynValue::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Whether an object value carries `key`.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// A stable 64-bit structural hash, consistent with `PartialEq`:
    /// equal values (including `Int`/`Num` widening and object key order)
    /// hash identically. Used as the rule-cache key.
    pub fn stable_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.feed_hash(&mut hasher);
        hasher.finish()
    }

    fn feed_hash<H: Hasher>(&self, hasher: &mut H) {
        match self {
            DynValue::Null => 0u8.hash(hasher),
            DynValue::Bool(b) => {
                1u8.hash(hasher);
                b.hash(hasher);
            }
            DynValue::Int(i) => {
                2u8.hash(hasher);
                i.hash(hasher);
            }
            DynValue::Num(n) => {
                // Integral floats hash like the corresponding Int so that
                // Int(5) and Num(5.0) collapse to one cache entry.
                if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n <= i64::MAX as f64 {
                    2u8.hash(hasher);
                    (*n as i64).hash(hasher);
                } else {
                    3u8.hash(hasher);
                    n.to_bits().hash(hasher);
                }
            }
            DynValue::Str(s) => {
                4u8.hash(hasher);
                s.hash(hasher);
            }
            DynValue::Array(items) => {
                5u8.hash(hasher);
                items.len().hash(hasher);
                for item in items {
                    item.feed_hash(hasher);
                }
            }
            DynValue::Object(map) => {
                // Commutative combine: object equality ignores key order, so
                // the hash must as well.
                6u8.hash(hasher);
                map.len().hash(hasher);
                let mut combined: u64 = 0;
                for (key, value) in map {
                    let mut entry = DefaultHasher::new();
                    key.hash(&mut entry);
                    value.feed_hash(&mut entry);
                    combined = combined.wrapping_add(entry.finish());
                }
                combined.hash(hasher);
            }
        }
    }
}

impl PartialEq for DynValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DynValue::Null, DynValue::Null) => true,
            (DynValue::Bool(a), DynValue::Bool(b)) => a == b,
            (DynValue::Int(a), DynValue::Int(b)) => a == b,
            (DynValue::Num(a), DynValue::Num(b)) => a == b,
            (DynValue::Int(a), DynValue::Num(b)) | (DynValue::Num(b), DynValue::Int(a)) => {
                *a as f64 == *b
            }
            (DynValue::Str(a), DynValue::Str(b)) => a == b,
            (DynValue::Array(a), DynValue::Array(b)) => a == b,
            (DynValue::Object(a), DynValue::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, value)| b.get(key) == Some(value))
            }
            _ => false,
        }
    }
}

impl Display for DynValue {
    /// Compact JSON-like rendering, used in error messages.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynValue::Null => f.write_str("null"),
            DynValue::Bool(b) => write!(f, "{b}"),
            DynValue::Int(i) => write!(f, "{i}"),
            DynValue::Num(n) => write!(f, "{n}"),
            DynValue::Str(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            DynValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            DynValue::Object(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "\"{key}\": {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for DynValue {
    fn from(b: bool) -> Self {
        DynValue::Bool(b)
    }
}

impl From<i64> for DynValue {
    fn from(i: i64) -> Self {
        DynValue::Int(i)
    }
}

impl From<f64> for DynValue {
    fn from(n: f64) -> Self {
        DynValue::Num(n)
    }
}

impl From<&str> for DynValue {
    fn from(s: &str) -> Self {
        DynValue::Str(s.to_string())
    }
}

impl From<String> for DynValue {
    fn from(s: String) -> Self {
        DynValue::Str(s)
    }
}

impl From<Vec<DynValue>> for DynValue {
    fn from(items: Vec<DynValue>) -> Self {
        DynValue::Array(items)
    }
}

impl From<Object> for DynValue {
    fn from(map: Object) -> Self {
        DynValue::Object(map)
    }
}
