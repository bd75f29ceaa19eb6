//! Explicit loading contexts.
//!
//! A [`Realm`] models one class-loading context: the isolation boundary that
//! decides which type definitions count as identical. Two realms may both
//! define a type with the same qualified name; the resulting [`TypeToken`]s
//! are still distinct because identity is `(realm, name)`, never name alone.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::value::Value;

static NEXT_REALM_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identity of a loading context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RealmId(u64);

impl std::fmt::Display for RealmId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "realm#{}", self.0)
    }
}

/// The identity of a type as loaded from a particular realm.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeToken {
    pub realm: RealmId,
    pub name: String,
}

impl std::fmt::Display for TypeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.realm)
    }
}

#[derive(Debug, Error)]
#[error("type `{name}` not found in realm `{realm}`")]
pub struct TypeResolutionError {
    pub name: String,
    pub realm: String,
}

/// One loading context: a named table of type definitions.
#[derive(Debug)]
pub struct Realm {
    id: RealmId,
    name: String,
    /// Type name -> optional supertype name (resolved within this realm).
    types: HashMap<String, Option<String>>,
}

impl Realm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: RealmId(NEXT_REALM_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            types: HashMap::new(),
        }
    }

    pub fn id(&self) -> RealmId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Define a type in this realm. The supertype name, when given, is looked
    /// up in this realm only.
    pub fn define(&mut self, name: &str, super_name: Option<&str>) {
        self.types
            .insert(name.to_string(), super_name.map(str::to_string));
    }

    /// Load a type by qualified name using *this* realm's table only.
    pub fn load(&self, qualified_name: &str) -> Result<TypeToken, TypeResolutionError> {
        if !self.types.contains_key(qualified_name) {
            return Err(TypeResolutionError {
                name: qualified_name.to_string(),
                realm: self.name.clone(),
            });
        }
        Ok(TypeToken {
            realm: self.id,
            name: qualified_name.to_string(),
        })
    }

    /// `true` iff `runtime` was loaded from this realm and is `target` or one
    /// of its subtypes. Tokens from other realms never match, even when the
    /// qualified names agree.
    pub fn assignable(&self, target: &TypeToken, runtime: &TypeToken) -> bool {
        if target.realm != self.id || runtime.realm != self.id {
            return false;
        }

        // The type table comes from external config and may contain
        // supertype cycles; stop at the first revisited name.
        let mut seen = HashSet::new();
        let mut current = Some(runtime.name.as_str());
        while let Some(name) = current {
            if name == target.name {
                return true;
            }
            if !seen.insert(name) {
                return false;
            }
            current = self.types.get(name).and_then(|s| s.as_deref());
        }
        false
    }

    /// Instance check for evaluated values: `Null` is never an instance.
    pub fn is_instance(&self, target: &TypeToken, value: &Value) -> bool {
        match value {
            Value::Null => false,
            Value::Object(object) => self.assignable(target, &object.type_token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ObjectValue;

    #[test]
    fn load_uses_only_the_local_table() {
        let mut realm = Realm::new("probe");
        realm.define("org.example.Component", None);

        assert!(realm.load("org.example.Component").is_ok());
        let err = realm.load("org.example.Missing").unwrap_err();
        assert_eq!(err.name, "org.example.Missing");
        assert_eq!(err.realm, "probe");
    }

    #[test]
    fn same_name_in_two_realms_is_not_the_same_type() {
        let mut host = Realm::new("host");
        host.define("org.example.Component", None);
        let mut probe = Realm::new("probe");
        probe.define("org.example.Component", None);

        let target = probe.load("org.example.Component").unwrap();
        let host_token = host.load("org.example.Component").unwrap();

        assert_ne!(target, host_token);
        assert!(!probe.assignable(&target, &host_token));
        assert!(probe.assignable(&target, &target));
    }

    #[test]
    fn assignable_walks_supertype_chain_within_the_realm() {
        let mut realm = Realm::new("probe");
        realm.define("Base", None);
        realm.define("Middle", Some("Base"));
        realm.define("Leaf", Some("Middle"));

        let base = realm.load("Base").unwrap();
        let leaf = realm.load("Leaf").unwrap();

        assert!(realm.assignable(&base, &leaf));
        assert!(!realm.assignable(&leaf, &base));
    }

    #[test]
    fn cyclic_supertype_chain_terminates() {
        let mut realm = Realm::new("probe");
        realm.define("A", Some("B"));
        realm.define("B", Some("A"));
        realm.define("C", None);

        let target = realm.load("C").unwrap();
        let a = realm.load("A").unwrap();
        let b = realm.load("B").unwrap();

        // Neither A nor B reaches C; the walk must give up instead of
        // cycling A -> B -> A forever.
        assert!(!realm.assignable(&target, &a));
        assert!(!realm.assignable(&target, &b));

        // Matches inside the cycle are still found.
        assert!(realm.assignable(&a, &a));
        assert!(realm.assignable(&a, &b));
    }

    #[test]
    fn null_is_never_an_instance() {
        let mut realm = Realm::new("probe");
        realm.define("Base", None);
        let base = realm.load("Base").unwrap();

        assert!(!realm.is_instance(&base, &Value::Null));
        let object = ObjectValue::new(base.clone());
        assert!(realm.is_instance(&base, &Value::Object(object)));
    }
}
