//! In-memory value tree for model object fields.
//!
//! [`Data`] mirrors JSON with one extra variant, [`Data::Object`], holding a
//! reconstructed [`ModelObject`]. Children are owned, so a value graph is
//! always a tree and can never contain a cycle.

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};

use crate::ModelObject;

/// Insertion-ordered field bag.
pub type Fields = IndexMap<String, Data>;

/// A field value: plain JSON data or a nested model object.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Data {
    /// JSON `null`; also what absent fields read as.
    #[default]
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON number, kept in its wire representation.
    Number(Number),
    /// JSON string.
    String(String),
    /// Ordered list; items may themselves be model objects.
    List(Vec<Data>),
    /// Untagged JSON object, in insertion order.
    Map(Fields),
    /// A registered model object decoded from a tagged JSON object.
    Object(Box<ModelObject>),
}

impl Data {
    /// Converts JSON without consulting a type registry; every object stays a
    /// plain [`Data::Map`].
    pub fn plain(json: Value) -> Self {
        match json {
            Value::Null => Data::Null,
            Value::Bool(b) => Data::Bool(b),
            Value::Number(n) => Data::Number(n),
            Value::String(s) => Data::String(s),
            Value::Array(items) => Data::List(items.into_iter().map(Data::plain).collect()),
            Value::Object(map) => {
                Data::Map(map.into_iter().map(|(k, v)| (k, Data::plain(v))).collect())
            }
        }
    }

    /// Emits the wire form. Nested model objects carry their type tag.
    pub fn to_json(&self) -> Value {
        match self {
            Data::Null => Value::Null,
            Data::Bool(b) => Value::Bool(*b),
            Data::Number(n) => Value::Number(n.clone()),
            Data::String(s) => Value::String(s.clone()),
            Data::List(items) => Value::Array(items.iter().map(Data::to_json).collect()),
            Data::Map(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Data::Object(object) => object.to_json(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Data::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Data::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Data::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Data::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Data::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Data]> {
        match self {
            Data::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Fields> {
        match self {
            Data::Map(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ModelObject> {
        match self {
            Data::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut ModelObject> {
        match self {
            Data::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<ModelObject> {
        match self {
            Data::Object(object) => Some(*object),
            _ => None,
        }
    }

    /// Renders a string or number as a key; anything else has no key form.
    pub(crate) fn key_string(&self) -> Option<String> {
        match self {
            Data::String(s) if !s.is_empty() => Some(s.clone()),
            Data::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl Serialize for Data {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<&str> for Data {
    fn from(value: &str) -> Self {
        Data::String(value.to_string())
    }
}

impl From<String> for Data {
    fn from(value: String) -> Self {
        Data::String(value)
    }
}

impl From<bool> for Data {
    fn from(value: bool) -> Self {
        Data::Bool(value)
    }
}

impl From<i64> for Data {
    fn from(value: i64) -> Self {
        Data::Number(value.into())
    }
}

impl From<u64> for Data {
    fn from(value: u64) -> Self {
        Data::Number(value.into())
    }
}

impl From<usize> for Data {
    fn from(value: usize) -> Self {
        Data::Number((value as u64).into())
    }
}

impl From<f64> for Data {
    /// Non-finite floats have no JSON form and become [`Data::Null`].
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Data::Null, Data::Number)
    }
}

impl From<Vec<Data>> for Data {
    fn from(value: Vec<Data>) -> Self {
        Data::List(value)
    }
}

impl From<Fields> for Data {
    fn from(value: Fields) -> Self {
        Data::Map(value)
    }
}

impl From<ModelObject> for Data {
    fn from(value: ModelObject) -> Self {
        Data::Object(Box::new(value))
    }
}

impl<T: Into<Data>> From<Option<T>> for Data {
    fn from(value: Option<T>) -> Self {
        value.map_or(Data::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_conversion_keeps_shape_and_order() {
        let json = json!({ "z": 1, "a": [true, null, "s"], "m": { "_t": "post" } });
        let data = Data::plain(json.clone());
        assert_eq!(data.to_json(), json);
        let keys: Vec<_> = data.as_map().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn non_finite_float_becomes_null() {
        assert!(Data::from(f64::NAN).is_null());
        assert_eq!(Data::from(1.5).as_f64(), Some(1.5));
    }

    #[test]
    fn key_string_accepts_strings_and_numbers() {
        assert_eq!(Data::from("a").key_string().as_deref(), Some("a"));
        assert_eq!(Data::from(7_i64).key_string().as_deref(), Some("7"));
        assert_eq!(Data::from("").key_string(), None);
        assert_eq!(Data::Null.key_string(), None);
    }
}
