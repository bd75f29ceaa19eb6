//! External configuration surface for the `kiln_probe` binary.
//!
//! The JSON config declares everything the probe needs before execution: the
//! output path, the target type name, expressions, the host and probe realm
//! type tables, the project object graph, and injected components. Objects
//! reference a realm by name; their type tokens are resolved at load time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::probe::ProbeConfig;
use crate::realm::{Realm, TypeResolutionError};
use crate::value::{ObjectValue, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeSpec {
    pub output_file: PathBuf,
    pub class_name: String,
    #[serde(default)]
    pub object_expressions: Vec<String>,
    #[serde(default)]
    pub host_types: Vec<TypeSpec>,
    #[serde(default)]
    pub probe_types: Vec<TypeSpec>,
    #[serde(default)]
    pub project: Option<ObjectSpec>,
    #[serde(default)]
    pub components: Vec<ObjectSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeSpec {
    pub name: String,
    #[serde(default)]
    pub super_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSpec {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub realm: RealmRef,
    /// `null` fields deserialize to `None` and become `Value::Null`.
    #[serde(default)]
    pub fields: BTreeMap<String, Option<ObjectSpec>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RealmRef {
    #[default]
    Host,
    Probe,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read probe config {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse probe config {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    TypeResolution(#[from] TypeResolutionError),
}

/// A fully resolved probe world: both realms plus the objects built against
/// them.
#[derive(Debug)]
pub struct LoadedSpec {
    pub host: Realm,
    pub probe: Realm,
    pub config: ProbeConfig,
    pub project: Value,
    pub components: Vec<ObjectValue>,
}

pub fn load(path: &Path) -> Result<LoadedSpec, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let spec: ProbeSpec = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    resolve(spec)
}

pub fn resolve(spec: ProbeSpec) -> Result<LoadedSpec, ConfigError> {
    let mut host = Realm::new("host");
    for ty in &spec.host_types {
        host.define(&ty.name, ty.super_name.as_deref());
    }
    let mut probe = Realm::new("probe");
    for ty in &spec.probe_types {
        probe.define(&ty.name, ty.super_name.as_deref());
    }

    let project = match &spec.project {
        Some(object) => Value::Object(build_object(object, &host, &probe)?),
        None => Value::Null,
    };
    let components = spec
        .components
        .iter()
        .map(|object| build_object(object, &host, &probe))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LoadedSpec {
        host,
        probe,
        config: ProbeConfig {
            output_file: spec.output_file,
            class_name: spec.class_name,
            object_expressions: spec.object_expressions,
        },
        project,
        components,
    })
}

fn build_object(
    spec: &ObjectSpec,
    host: &Realm,
    probe: &Realm,
) -> Result<ObjectValue, TypeResolutionError> {
    let realm = match spec.realm {
        RealmRef::Host => host,
        RealmRef::Probe => probe,
    };
    let mut object = ObjectValue::new(realm.load(&spec.type_name)?);
    for (name, field) in &spec.fields {
        let value = match field {
            Some(nested) => Value::Object(build_object(nested, host, probe)?),
            None => Value::Null,
        };
        object.fields.insert(name.clone(), value);
    }
    Ok(object)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_objects_against_the_named_realm() {
        let spec: ProbeSpec = serde_json::from_str(
            r#"{
                "outputFile": "out.properties",
                "className": "org.example.Component",
                "objectExpressions": ["project", "project/build"],
                "hostTypes": [
                    { "name": "org.example.Project" },
                    { "name": "org.example.Build" }
                ],
                "probeTypes": [{ "name": "org.example.Component" }],
                "project": {
                    "type": "org.example.Project",
                    "fields": {
                        "build": { "type": "org.example.Build" },
                        "parent": null
                    }
                },
                "components": [
                    { "type": "org.example.Component", "realm": "probe" }
                ]
            }"#,
        )
        .unwrap();

        let loaded = resolve(spec).unwrap();
        assert_eq!(loaded.config.class_name, "org.example.Component");
        assert_eq!(loaded.config.object_expressions.len(), 2);

        let Value::Object(project) = &loaded.project else {
            panic!("expected project object");
        };
        assert_eq!(project.type_token.realm, loaded.host.id());
        assert_eq!(project.fields["parent"], Value::Null);

        assert_eq!(loaded.components.len(), 1);
        assert_eq!(loaded.components[0].type_token.realm, loaded.probe.id());
    }

    #[test]
    fn undefined_object_type_is_a_config_error() {
        let spec: ProbeSpec = serde_json::from_str(
            r#"{
                "outputFile": "out.properties",
                "className": "org.example.Component",
                "probeTypes": [{ "name": "org.example.Component" }],
                "project": { "type": "org.example.Undefined" }
            }"#,
        )
        .unwrap();

        let err = resolve(spec).unwrap_err();
        assert!(matches!(err, ConfigError::TypeResolution(_)));
    }
}
