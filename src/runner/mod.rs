//! Test runs: executing one test case against one subject file.
//!
//! A run always produces a [`TestRunResult`]. Nothing a subject does (crash,
//! hang, garbage output, missing interpreter) escapes as an error; it is
//! classified into a [`Status`] instead.

use crate::status::Status;
use crate::testcase::{substitute_filename, TestCase, TestKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod io;
pub mod process;
mod script;

pub use io::judge_output;
pub use process::{ExecLimits, ProcessOutput};
pub use script::{parse_script_report, ScriptReport};

/// Runner trait for executing a test case against a subject.
pub trait Runner: Send + Sync {
    /// Execute `case` against `subject`. Never fails; problems become statuses.
    fn run(&self, subject: &str, case: &TestCase) -> TestRunResult;

    /// Get a human-readable name for this runner.
    fn name(&self) -> &str;
}

/// Read-only execution settings shared by every test run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub timeout: Duration,
    pub hard_timeout: Duration,
    pub spawn_retries: u32,
    pub interpreters: InterpreterMap,
    /// Directory subjects and scripts run in; the current one if unset.
    pub working_dir: Option<PathBuf>,
}

impl RunSettings {
    pub fn limits(&self) -> ExecLimits {
        ExecLimits {
            timeout: self.timeout,
            hard_timeout: self.hard_timeout,
            spawn_retries: self.spawn_retries,
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        crate::config::Config::default().run_settings()
    }
}

/// Maps subject file extensions to the command that runs them.
#[derive(Debug, Clone, Default)]
pub struct InterpreterMap {
    by_extension: BTreeMap<String, String>,
    fallback: Option<String>,
}

impl InterpreterMap {
    pub fn new(by_extension: BTreeMap<String, String>, fallback: Option<String>) -> Self {
        Self {
            by_extension,
            fallback,
        }
    }

    /// Command line that runs `filename`, if any interpreter applies.
    pub fn command_for(&self, filename: &str) -> Option<String> {
        let ext = Path::new(filename).extension().and_then(|e| e.to_str());
        ext.and_then(|ext| self.by_extension.get(ext))
            .or(self.fallback.as_ref())
            .map(|template| substitute_filename(template, filename))
    }
}

/// Outcome of one test run, with everything needed to explain it.
#[derive(Debug, Clone, Serialize)]
pub struct TestRunResult {
    pub subject: String,
    pub suite: String,
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub kind: &'static str,
    pub status: Status,
    /// Summary slot contributed to the report; a status char, or the literal
    /// summary of a script test.
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl TestRunResult {
    /// A result for `case` against `subject`, classified as `status`.
    pub fn new(subject: &str, case: &TestCase, status: Status) -> Self {
        Self {
            subject: subject.to_string(),
            suite: case.id.suite.clone(),
            index: case.id.index,
            name: case.name.clone(),
            kind: case.kind.name(),
            status,
            summary: status.summary_char().to_string(),
            command: None,
            input: None,
            expected_output: None,
            match_pattern: None,
            stdout: None,
            stderr: None,
            exit_code: None,
            error: None,
            feedback: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Reclassify the result, resetting the summary slot to the status char.
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self.summary = status.summary_char().to_string();
        self
    }

    /// Attach captured process output.
    pub fn with_output(mut self, output: &ProcessOutput) -> Self {
        self.stdout = Some(output.stdout.clone());
        self.stderr = Some(output.stderr.clone());
        self.exit_code = output.exit_code;
        self.elapsed = output.elapsed;
        self
    }

    /// Attach an error message explaining the status.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }
}

/// Runner that executes subjects as real subprocesses.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    settings: RunSettings,
}

impl ProcessRunner {
    pub fn new(settings: RunSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }
}

impl Runner for ProcessRunner {
    fn run(&self, subject: &str, case: &TestCase) -> TestRunResult {
        run(subject, case, &self.settings)
    }

    fn name(&self) -> &str {
        "process"
    }
}

/// Execute `case` against `subject`.
///
/// Subjects the test does not apply to are classified as
/// [`Status::FilenameMismatch`] without spawning anything.
pub fn run(subject: &str, case: &TestCase, settings: &RunSettings) -> TestRunResult {
    if !case.applies_to(subject) {
        return TestRunResult::new(subject, case, Status::FilenameMismatch);
    }
    let result = match &case.kind {
        TestKind::Io(test) => io::run_io(subject, case, test, settings),
        TestKind::Script(test) => script::run_script(subject, case, test, settings),
    };
    tracing::debug!(
        subject,
        test = %case.id,
        status = result.status.name(),
        elapsed_ms = result.elapsed.as_millis() as u64,
        "test run finished"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcase::{compile_spec, CompileDefaults, RawTestSpec, TestCaseId};

    fn case(raw: RawTestSpec) -> TestCase {
        compile_spec(
            raw,
            TestCaseId {
                suite: "tests.yaml".into(),
                index: 1,
            },
            &CompileDefaults::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_interpreter_lookup() {
        let map = InterpreterMap::new(
            BTreeMap::from([("py".to_string(), "python3 -B".to_string())]),
            None,
        );
        assert_eq!(map.command_for("a.py").as_deref(), Some("python3 -B a.py"));
        assert_eq!(map.command_for("a.rb"), None);
        assert_eq!(map.command_for("Makefile"), None);
    }

    #[test]
    fn test_interpreter_fallback() {
        let map = InterpreterMap::new(BTreeMap::new(), Some("run {} --fast".into()));
        assert_eq!(map.command_for("a.rb").as_deref(), Some("run a.rb --fast"));
    }

    #[test]
    fn test_filename_mismatch_skips_execution() {
        let case = case(RawTestSpec {
            output: Some("x".into()),
            ..Default::default()
        });
        let result = run("prog.rb", &case, &RunSettings::default());
        assert_eq!(result.status, Status::FilenameMismatch);
        assert_eq!(result.summary, "_");
        assert!(result.command.is_none());
    }

    #[test]
    fn test_no_interpreter() {
        let case = case(RawTestSpec {
            output: Some("x".into()),
            fnmatch: Some(crate::testcase::StringOrList::One("*".into())),
            ..Default::default()
        });
        let settings = RunSettings {
            interpreters: InterpreterMap::default(),
            ..RunSettings::default()
        };
        let result = run("prog.xyz", &case, &settings);
        assert_eq!(result.status, Status::NoInterpreterError);
        assert_eq!(result.summary, "?");
    }

    #[test]
    fn test_result_serializes_status_name() {
        let case = case(RawTestSpec {
            output: Some("x".into()),
            ..Default::default()
        });
        let result = TestRunResult::new("a.py", &case, Status::Timeout);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["summary"], "t");
        assert_eq!(json["kind"], "io");
        assert_eq!(json["index"], 1);
    }
}
