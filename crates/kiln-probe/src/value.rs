//! Object values the probe type-checks.

use std::collections::BTreeMap;

use crate::realm::TypeToken;

/// A value produced by expression evaluation. `Null` is a legal result and is
/// type-checked like any other value (always "not an instance").
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Null,
    Object(ObjectValue),
}

impl Value {
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Null => None,
            Value::Object(object) => object.fields.get(name),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Object(object) => write!(f, "{}", object.type_token),
        }
    }
}

/// An object instance: its runtime type identity plus named fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectValue {
    pub type_token: TypeToken,
    pub fields: BTreeMap<String, Value>,
}

impl ObjectValue {
    pub fn new(type_token: TypeToken) -> Self {
        Self {
            type_token,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }
}
