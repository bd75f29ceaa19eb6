//! A closed interpreter for probe expressions.
//!
//! The grammar is deliberately small: `root(/field)*`, where `root` names a
//! context binding and each `field` is a property lookup on the preceding
//! object. Evaluation is total: a missing binding or field yields `Null`
//! rather than an error.

use std::collections::BTreeMap;

use crate::value::Value;

/// Evaluate a property-path expression against named context bindings.
pub fn evaluate(expression: &str, contexts: &BTreeMap<&str, &Value>) -> Value {
    let mut segments = expression.split('/');

    let Some(root) = segments.next() else {
        return Value::Null;
    };
    let Some(mut current) = contexts.get(root).copied() else {
        return Value::Null;
    };

    for segment in segments {
        match current.field(segment) {
            Some(value) => current = value,
            None => return Value::Null,
        }
    }

    current.clone()
}

/// The key under which an expression's result is recorded: path separators
/// become dots.
pub fn result_key(expression: &str) -> String {
    expression.replace('/', ".")
}
