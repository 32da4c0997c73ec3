//! Canonical test cases and the preprocessor that builds them.
//!
//! Test files are written in a small declarative language (`output`,
//! `match`, `tokens`, `session`, `parts`, `script`, ...). [`compile`] turns
//! each raw spec into an immutable [`TestCase`] whose output strategy is
//! either an exact expected output or a regex, never both.

mod compile;
pub mod raw;
mod suite;

pub use compile::{compile, compile_spec, CompileDefaults};
pub use raw::{RawTestSpec, StringOrList};
pub use suite::{load_suites, TestSuite};

use crate::normalize::Normalizer;
use regex::Regex;
use std::fmt;

/// Stable identity of a test case: its suite and 1-based position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestCaseId {
    pub suite: String,
    pub index: usize,
}

impl fmt::Display for TestCaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.suite, self.index)
    }
}

/// How the output of an io test is judged.
#[derive(Debug, Clone)]
pub enum Expected {
    /// Exact stdout after normalization.
    Output { text: String, normalized: String },
    /// Regex the raw stdout must match from its start.
    Match(Regex),
}

impl Expected {
    /// The expected output text, for exact-output tests.
    pub fn output(&self) -> Option<&str> {
        match self {
            Expected::Output { text, .. } => Some(text),
            Expected::Match(_) => None,
        }
    }

    /// The match pattern, for regex tests.
    pub fn pattern(&self) -> Option<&str> {
        match self {
            Expected::Output { .. } => None,
            Expected::Match(re) => Some(re.as_str()),
        }
    }
}

/// A test that feeds `input` to the subject and judges its stdout.
#[derive(Debug, Clone)]
pub struct IoTest {
    pub input: String,
    pub expected: Expected,
}

/// A test delegated to an external command that reports a summary.
#[derive(Debug, Clone)]
pub struct ScriptTest {
    /// Command template; `{}` stands for the subject filename.
    pub command: String,
}

impl ScriptTest {
    /// Substitute the subject filename into the template, or append it.
    pub fn command_for(&self, filename: &str) -> String {
        substitute_filename(&self.command, filename)
    }
}

/// Fill `{}` in a command template with a shell-quoted `filename`, or append
/// it when the template has no placeholder.
pub fn substitute_filename(template: &str, filename: &str) -> String {
    let quoted = shell_words::quote(filename);
    if template.contains("{}") {
        template.replace("{}", &quoted)
    } else {
        format!("{template} {quoted}")
    }
}

#[derive(Debug, Clone)]
pub enum TestKind {
    Io(IoTest),
    Script(ScriptTest),
}

impl TestKind {
    pub fn name(&self) -> &'static str {
        match self {
            TestKind::Io(_) => "io",
            TestKind::Script(_) => "script",
        }
    }
}

/// A validated, immutable test case.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub id: TestCaseId,
    pub name: Option<String>,
    pub kind: TestKind,
    pub fnmatch: Vec<glob::Pattern>,
    pub ignore: Normalizer,
}

impl TestCase {
    /// Whether this test applies to the subject `filename`.
    ///
    /// Patterns are tried against the full name and against its last path
    /// component.
    pub fn applies_to(&self, filename: &str) -> bool {
        let base = std::path::Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(filename);
        self.fnmatch
            .iter()
            .any(|p| p.matches(filename) || p.matches(base))
    }
}
