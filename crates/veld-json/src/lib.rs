//! Conversion between [`serde_json::Value`] and [`DynValue`].
//!
//! The schema engine is parser-agnostic and consumes only `DynValue`; this
//! crate is the bridge for hosts whose documents arrive as JSON. Conversion
//! is lossless for everything JSON can express, with one caveat: unsigned
//! integers above `i64::MAX` fall back to `f64`.

use thiserror::Error;
use veld_value::value::Object;
use veld_value::DynValue;

/// Errors from [`parse`].
#[derive(Debug, Error)]
pub enum JsonError {
    #[error("failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Parse a JSON document string straight into a [`DynValue`].
pub fn parse(input: &str) -> Result<DynValue, JsonError> {
    let value: serde_json::Value = serde_json::from_str(input)?;
    Ok(from_json(&value))
}

/// Convert a parsed [`serde_json::Value`] into a [`DynValue`].
pub fn from_json(value: &serde_json::Value) -> DynValue {
    match value {
        serde_json::Value::Null => DynValue::Null,
        serde_json::Value::Bool(b) => DynValue::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                DynValue::Int(i)
            } else {
                // u64 beyond i64::MAX or a true float.
                DynValue::Num(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => DynValue::Str(s.clone()),
        serde_json::Value::Array(items) => {
            DynValue::Array(items.iter().map(from_json).collect())
        }
        serde_json::Value::Object(map) => {
            let mut object = Object::with_capacity(map.len());
            for (key, value) in map {
                object.insert(key.clone(), from_json(value));
            }
            DynValue::Object(object)
        }
    }
}

/// Convert a [`DynValue`] back into a [`serde_json::Value`].
///
/// Non-finite floats have no JSON representation and map to `null`.
pub fn to_json(value: &DynValue) -> serde_json::Value {
    match value {
        DynValue::Null => serde_json::Value::Null,
        DynValue::Bool(b) => serde_json::Value::Bool(*b),
        DynValue::Int(i) => serde_json::Value::Number((*i).into()),
        DynValue::Num(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        DynValue::Str(s) => serde_json::Value::String(s.clone()),
        DynValue::Array(items) => {
            serde_json::Value::Array(items.iter().map(to_json).collect())
        }
        DynValue::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                out.insert(key.clone(), to_json(value));
            }
            serde_json::Value::Object(out)
        }
    }
}
