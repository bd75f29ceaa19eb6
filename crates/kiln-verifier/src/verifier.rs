//! The invocation driver: composes CLI options, launches the build tool, and
//! checks/asserts on the outcome.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;

use kiln_process::{CommandRunner, CommandSpec, DefaultCommandRunner, RunOptions};

use crate::{filter_file, FilterProperties, Result, VerifierError};

/// Log lines containing any of these mark a build as failed even when the
/// exit status is zero.
pub const ERROR_MARKERS: &[&str] = &["[ERROR]", "[FATAL]"];

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Path to the Maven executable (defaults to `mvn` in `PATH`).
    pub mvn_path: PathBuf,
    /// Local repository that `delete_artifacts` prunes stale artifacts from.
    pub local_repo: PathBuf,
    /// Invocation options. Blocking with no timeout by default.
    pub run: RunOptions,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            mvn_path: PathBuf::from("mvn"),
            local_repo: default_local_repo(),
            run: RunOptions::default(),
        }
    }
}

fn default_local_repo() -> PathBuf {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(".m2/repository")
}

/// Outcome of one build invocation: exit status plus the combined log.
/// Ephemeral; exists only to be checked.
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub status: ExitStatus,
    pub timed_out: bool,
    pub log: String,
}

impl InvocationResult {
    /// `true` when the child exited normally with status zero. Says nothing
    /// about error markers in the log; see [`Verifier::check_success`].
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.success()
    }
}

/// Drives one fixture project through an external build invocation.
#[derive(Debug)]
pub struct Verifier {
    working_dir: PathBuf,
    config: VerifierConfig,
    runner: Arc<dyn CommandRunner>,
    cli_options: Vec<String>,
}

impl Verifier {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self::with_runner(
            working_dir,
            VerifierConfig::default(),
            Arc::new(DefaultCommandRunner::default()),
        )
    }

    pub fn with_runner(
        working_dir: impl Into<PathBuf>,
        config: VerifierConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            working_dir: working_dir.into(),
            config,
            runner,
            cli_options: Vec::new(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Accumulate a CLI option passed before the goals, e.g. `--settings`
    /// then `settings.xml`.
    pub fn add_cli_option(&mut self, option: impl Into<String>) {
        self.cli_options.push(option.into());
    }

    /// Filter properties every fixture template can rely on: the working
    /// directory path and its `file:` URL.
    #[must_use]
    pub fn default_filter_properties(&self) -> FilterProperties {
        let mut props = FilterProperties::new();
        props.set("basedir", self.working_dir.display().to_string());
        props.set("baseurl", file_url(&self.working_dir));
        props
    }

    /// Render `template` (relative to the working directory) into `output`.
    pub fn filter_file(
        &self,
        template: impl AsRef<Path>,
        output: impl AsRef<Path>,
        properties: &FilterProperties,
    ) -> Result<()> {
        filter_file(
            &self.working_dir.join(template.as_ref()),
            &self.working_dir.join(output.as_ref()),
            properties,
        )
    }

    /// Remove the group's subtree from the local repository so the build
    /// cannot succeed by reusing stale cached artifacts. A missing subtree is
    /// fine.
    pub fn delete_artifacts(&self, group_id: &str) -> Result<()> {
        let dir = self.config.local_repo.join(group_id.replace('.', "/"));
        tracing::debug!(
            target: "kiln.verifier",
            path = %dir.display(),
            group = group_id,
            "deleting cached artifacts"
        );
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Launch the build tool in the working directory with the accumulated
    /// CLI options followed by `goals`. Blocks until the child terminates.
    /// A non-zero exit is surfaced via the result, not as an error.
    pub fn invoke(&self, goals: &[&str]) -> Result<InvocationResult> {
        let mut args = self.cli_options.clone();
        args.extend(goals.iter().map(|g| g.to_string()));

        let command = CommandSpec::new(&self.working_dir, &self.config.mvn_path, &args);
        tracing::info!(target: "kiln.verifier", command = %command, "invoking build tool");

        let result = self
            .runner
            .run(&self.working_dir, &self.config.mvn_path, &args)?;
        Ok(InvocationResult {
            status: result.status,
            timed_out: result.timed_out,
            log: result.output.combined(),
        })
    }

    /// Succeeding means a zero exit *and* an error-free log.
    pub fn check_success(&self, result: &InvocationResult) -> Result<()> {
        if !result.success() {
            return Err(VerifierError::UnexpectedFailure {
                code: result.status.code(),
                timed_out: result.timed_out,
                log: result.log.clone(),
            });
        }
        self.verify_error_free_log(result)
    }

    /// A failure-expecting check: unexpected success is itself the reported
    /// defect. A zero exit still counts as a failure when the log carries
    /// error markers.
    pub fn check_failure(&self, result: &InvocationResult) -> Result<()> {
        if result.success() && self.verify_error_free_log(result).is_ok() {
            return Err(VerifierError::UnexpectedSuccess {
                log: result.log.clone(),
            });
        }
        Ok(())
    }

    /// Scan the captured log for [`ERROR_MARKERS`], independent of exit
    /// status.
    pub fn verify_error_free_log(&self, result: &InvocationResult) -> Result<()> {
        let has_errors = result
            .log
            .lines()
            .any(|line| ERROR_MARKERS.iter().any(|marker| line.contains(marker)));
        if has_errors {
            return Err(VerifierError::ErrorsInLog {
                log: result.log.clone(),
            });
        }
        Ok(())
    }

    /// Abort the test unless the invocation succeeded with an error-free log.
    #[track_caller]
    pub fn assert_success(&self, result: &InvocationResult) {
        if let Err(err) = self.check_success(result) {
            panic!("{err}");
        }
    }

    /// Abort the test unless the invocation failed.
    #[track_caller]
    pub fn assert_failure(&self, result: &InvocationResult) {
        if let Err(err) = self.check_failure(result) {
            panic!("{err}");
        }
    }

    /// Read a properties file (relative to the working directory), typically
    /// one produced by an in-build probe step.
    pub fn load_properties(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<kiln_properties::PropertiesFile> {
        let text = fs::read_to_string(self.working_dir.join(path.as_ref()))?;
        Ok(kiln_properties::parse(&text))
    }
}

fn file_url(path: &Path) -> String {
    let text = path.display().to_string().replace('\\', "/");
    if text.starts_with('/') {
        format!("file://{text}")
    } else {
        format!("file:///{text}")
    }
}
