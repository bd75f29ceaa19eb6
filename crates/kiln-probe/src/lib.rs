//! Class-identity probe.
//!
//! Checks whether objects supplied by the enclosing build are
//! assignment-compatible with a reference type resolved from the probe's own
//! loading context, and records the results as a properties file for the
//! harness to assert on. Loading contexts are modeled as explicit [`Realm`]s:
//! a type's identity is its realm plus its name, so the same qualified name
//! in two realms never unifies.

pub mod config;
mod expr;
mod probe;
mod realm;
mod value;

pub use expr::{evaluate, result_key};
pub use probe::{InstanceofProbe, ProbeConfig, ProbeError, LOG_MARKER, OUTPUT_HEADER};
pub use realm::{Realm, RealmId, TypeResolutionError, TypeToken};
pub use value::{ObjectValue, Value};
