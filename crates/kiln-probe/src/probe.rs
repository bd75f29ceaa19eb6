//! The instanceof probe: resolve the target type from the probe's own realm,
//! type-check configured expressions and injected components, and persist the
//! results as a properties file.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use thiserror::Error;

use crate::expr::{evaluate, result_key};
use crate::realm::{Realm, TypeResolutionError};
use crate::value::{ObjectValue, Value};

/// Marker prefixed to every diagnostic line so log scraping can isolate probe
/// output from the surrounding build noise.
pub const LOG_MARKER: &str = "[KILN-IT-LOG]";

/// Header comment written at the top of the output file.
pub const OUTPUT_HEADER: &str = "KILN-IT-LOG";

/// Externally supplied probe parameters. Absence of expressions and
/// components is legal and yields an empty (header-only) result file.
#[derive(Debug, Clone, Default)]
pub struct ProbeConfig {
    /// Where the instance-check records are written.
    pub output_file: PathBuf,
    /// Qualified name of the reference type, resolved from the probe's realm.
    pub class_name: String,
    /// Expressions denoting the objects to type-check.
    pub object_expressions: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to load type `{}`", .0.name)]
    TypeResolution(#[source] TypeResolutionError),

    #[error("output file could not be created: {}", path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ProbeError>;

/// One probe execution. Strictly linear: resolve the target type, evaluate
/// expressions, check components, then write the output file in one shot.
/// Any failure before the final write aborts with no output file produced.
#[derive(Debug)]
pub struct InstanceofProbe<'a> {
    realm: &'a Realm,
    config: ProbeConfig,
    project: Value,
    components: Vec<ObjectValue>,
}

impl<'a> InstanceofProbe<'a> {
    pub fn new(realm: &'a Realm, config: ProbeConfig) -> Self {
        Self {
            realm,
            config,
            project: Value::Null,
            components: Vec::new(),
        }
    }

    /// The project object bound under both `project` and `pom` during
    /// expression evaluation.
    pub fn with_project(mut self, project: Value) -> Self {
        self.project = project;
        self
    }

    /// Injected component instances, keyed in the output by their runtime
    /// type name.
    pub fn with_components(mut self, components: Vec<ObjectValue>) -> Self {
        self.components = components;
        self
    }

    pub fn execute(&self) -> Result<()> {
        tracing::info!(
            target: "kiln.probe",
            "{LOG_MARKER} Loading type {}",
            self.config.class_name
        );
        let target = self
            .realm
            .load(&self.config.class_name)
            .map_err(ProbeError::TypeResolution)?;
        tracing::info!(target: "kiln.probe", "{LOG_MARKER} Loaded type from {}", target.realm);

        let mut records = BTreeMap::new();

        if !self.config.object_expressions.is_empty() {
            let mut contexts = BTreeMap::new();
            contexts.insert("project", &self.project);
            contexts.insert("pom", &self.project);

            for expression in &self.config.object_expressions {
                tracing::info!(
                    target: "kiln.probe",
                    "{LOG_MARKER} Evaluating expression {expression}"
                );
                let object = evaluate(expression, &contexts);
                tracing::info!(target: "kiln.probe", "{LOG_MARKER} Checking object {object}");
                if let Value::Object(object) = &object {
                    tracing::info!(
                        target: "kiln.probe",
                        "{LOG_MARKER}   Loaded type {} from {}",
                        object.type_token.name,
                        object.type_token.realm
                    );
                }
                records.insert(
                    result_key(expression),
                    self.realm.is_instance(&target, &object).to_string(),
                );
            }
        }

        for component in &self.components {
            tracing::info!(
                target: "kiln.probe",
                "{LOG_MARKER} Checking component {}",
                component.type_token
            );
            records.insert(
                component.type_token.name.clone(),
                self.realm
                    .assignable(&target, &component.type_token)
                    .to_string(),
            );
        }

        let path = &self.config.output_file;
        tracing::info!(
            target: "kiln.probe",
            "{LOG_MARKER} Creating output file {}",
            path.display()
        );

        let text = kiln_properties::serialize(&records, OUTPUT_HEADER);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| ProbeError::OutputWrite {
                    path: path.clone(),
                    source,
                })?;
            }
        }
        let mut file = File::create(path).map_err(|source| ProbeError::OutputWrite {
            path: path.clone(),
            source,
        })?;
        file.write_all(text.as_bytes())
            .map_err(|source| ProbeError::OutputWrite {
                path: path.clone(),
                source,
            })?;
        // The payload is fully written at this point; a failing flush/close
        // must not override a result that already succeeded.
        let _ = file.flush();
        drop(file);

        tracing::info!(
            target: "kiln.probe",
            "{LOG_MARKER} Created output file {}",
            path.display()
        );
        Ok(())
    }
}
