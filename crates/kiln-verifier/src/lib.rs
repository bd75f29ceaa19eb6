//! Integration-test harness for external build-tool invocations.
//!
//! The harness extracts a fixture project into an isolated working directory,
//! renders its `@token@` templates, invokes Maven with per-test CLI options,
//! and checks the outcome: exit status plus an error-free-log scan for
//! success, and "unexpected success is the defect" for failure-expecting
//! tests. The build tool itself is an external collaborator reached only
//! through its CLI, its log, and the file system.

mod filter;
mod fixtures;
mod verifier;

pub use filter::{filter_file, FilterProperties};
pub use fixtures::extract_fixture;
pub use verifier::{InvocationResult, Verifier, VerifierConfig, ERROR_MARKERS};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("fixture `{id}` not found under {}", root.display())]
    FixtureNotFound { id: String, root: PathBuf },

    #[error("template {}: {reason}", path.display())]
    Template { path: PathBuf, reason: String },

    #[error("build succeeded although failure was expected\nlog:\n{log}")]
    UnexpectedSuccess { log: String },

    #[error("build failed (exit code {code:?}, timed_out={timed_out})\nlog:\n{log}")]
    UnexpectedFailure {
        code: Option<i32>,
        timed_out: bool,
        log: String,
    },

    #[error("build log contains error markers\nlog:\n{log}")]
    ErrorsInLog { log: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VerifierError>;
