//! Call parameter values.
//!
//! Parameters are resolved into [`ParamValue`] once, when a call enters the client, so the
//! encoder only ever dispatches over a closed set of kinds.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered mapping of parameter names to values. A key that is not present is absent
/// from the call, a key mapped to [`ParamValue::Null`] is sent with an empty value.
pub type ParamMap = IndexMap<String, ParamValue>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<ParamValue>),
    Map(ParamMap),
}

impl ParamValue {
    /// Name of the value kind, as reported by encoding errors.
    pub fn kind(&self) -> &'static str {
        match self {
            ParamValue::Null => "null",
            ParamValue::Bool(_) => "boolean",
            ParamValue::Int(_) | ParamValue::Float(_) => "number",
            ParamValue::String(_) => "string",
            ParamValue::Array(_) => "array",
            ParamValue::Map(_) => "mapping",
        }
    }

    pub fn as_map(&self) -> Option<&ParamMap> {
        match self {
            ParamValue::Map(map) => Some(map),
            _ => None,
        }
    }
}

/// Merges `overlay` on top of `base`: keys of `overlay` win, nested mappings present on both
/// sides are merged recursively, any other value replaces the base value wholesale.
pub fn merge_params(base: &ParamMap, overlay: &ParamMap) -> ParamMap {
    let mut merged = base.clone();
    for (key, value) in overlay {
        let next = match (merged.get(key), value) {
            (Some(ParamValue::Map(inner)), ParamValue::Map(overlay_inner)) => ParamValue::Map(merge_params(inner, overlay_inner)),
            _ => value.clone(),
        };
        merged.insert(key.clone(), next);
    }
    merged
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

macro_rules! from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ParamValue {
                fn from(value: $t) -> Self {
                    ParamValue::Int(value as i64)
                }
            }
        )*
    };
}

from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(value) => ParamValue::Int(value),
            Err(_) => ParamValue::Float(value as f64),
        }
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        ParamValue::Float(value as f64)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ParamValue::Null, Into::into)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(value: Vec<T>) -> Self {
        ParamValue::Array(value.into_iter().map(Into::into).collect())
    }
}

impl From<ParamMap> for ParamValue {
    fn from(value: ParamMap) -> Self {
        ParamValue::Map(value)
    }
}

impl From<serde_json::Value> for ParamValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => ParamValue::Null,
            Value::Bool(b) => ParamValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ParamValue::Int(i),
                None => ParamValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => ParamValue::String(s),
            Value::Array(items) => ParamValue::Array(items.into_iter().map(Into::into).collect()),
            Value::Object(entries) => ParamValue::Map(entries.into_iter().map(|(k, v)| (k, v.into())).collect()),
        }
    }
}

/// Builds a [`ParamMap`] from `key => value` pairs.
///
/// ```
/// use batchwire_client::params;
/// let params = params! { "page" => 2, "tags" => vec!["a", "b"] };
/// assert_eq!(params.len(), 2);
/// ```
#[macro_export]
macro_rules! params {
    () => { $crate::value::ParamMap::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::value::ParamMap::new();
        $( map.insert(($key).to_string(), $crate::value::ParamValue::from($value)); )+
        map
    }};
}
