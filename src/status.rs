//! Status taxonomy shared by test runs, the aggregator and the reporters.
//!
//! Every terminal outcome of a test run is one [`Status`], and every status
//! renders as exactly one summary character. Script tests are the only
//! source of multi-character summaries (see [`crate::runner::TestRunResult`]).

use serde::{Deserialize, Serialize};

/// Character shown for a slot whose result has not arrived yet.
pub const PLACEHOLDER: char = '#';

/// Terminal status of a single test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Status {
    Success,
    Fail,
    Timeout,
    Error,
    ScriptTestError,
    NoInterpreterError,
    FilenameMismatch,

    // Interpreter error refinements of `Error`.
    AttributeError,
    SyntaxError,
    #[serde(rename = "EOFError")]
    EofError,
    ZeroDivisionError,
    IndentationError,
    IndexError,
    ValueError,
    TypeError,
    NameError,
}

impl Status {
    /// Every status, in taxonomy order.
    pub const ALL: [Status; 16] = [
        Status::Success,
        Status::Fail,
        Status::Timeout,
        Status::Error,
        Status::ScriptTestError,
        Status::NoInterpreterError,
        Status::FilenameMismatch,
        Status::AttributeError,
        Status::SyntaxError,
        Status::EofError,
        Status::ZeroDivisionError,
        Status::IndentationError,
        Status::IndexError,
        Status::ValueError,
        Status::TypeError,
        Status::NameError,
    ];

    /// Interpreter error refinements, in the order stderr is scanned.
    const REFINEMENTS: [Status; 9] = [
        Status::ZeroDivisionError,
        Status::IndentationError,
        Status::SyntaxError,
        Status::NameError,
        Status::IndexError,
        Status::AttributeError,
        Status::EofError,
        Status::ValueError,
        Status::TypeError,
    ];

    /// Single-character summary code.
    pub fn summary_char(self) -> char {
        match self {
            Status::Success => '.',
            Status::Fail => 'F',
            Status::Timeout => 't',
            Status::Error => 'e',
            Status::ScriptTestError => '!',
            Status::NoInterpreterError => '?',
            Status::FilenameMismatch => '_',
            Status::AttributeError => 'a',
            Status::SyntaxError => 's',
            Status::EofError => 'o',
            Status::ZeroDivisionError => 'z',
            Status::IndentationError => 'i',
            Status::IndexError => 'x',
            Status::ValueError => 'v',
            Status::TypeError => 'y',
            Status::NameError => 'n',
        }
    }

    /// Inverse of [`summary_char`](Self::summary_char).
    pub fn from_summary_char(c: char) -> Option<Status> {
        Status::ALL.into_iter().find(|s| s.summary_char() == c)
    }

    /// Human-readable name, as used in reports.
    pub fn name(self) -> &'static str {
        match self {
            Status::Success => "Success",
            Status::Fail => "Fail",
            Status::Timeout => "Timeout",
            Status::Error => "Error",
            Status::ScriptTestError => "ScriptTestError",
            Status::NoInterpreterError => "NoInterpreterError",
            Status::FilenameMismatch => "FilenameMismatch",
            Status::AttributeError => "AttributeError",
            Status::SyntaxError => "SyntaxError",
            Status::EofError => "EOFError",
            Status::ZeroDivisionError => "ZeroDivisionError",
            Status::IndentationError => "IndentationError",
            Status::IndexError => "IndexError",
            Status::ValueError => "ValueError",
            Status::TypeError => "TypeError",
            Status::NameError => "NameError",
        }
    }

    /// Whether this status counts against the subject.
    ///
    /// `FilenameMismatch` is neutral: the test never applied.
    pub fn is_failure(self) -> bool {
        !matches!(self, Status::Success | Status::FilenameMismatch)
    }

    /// Whether this status is `Error` or one of its interpreter refinements.
    pub fn is_error(self) -> bool {
        self == Status::Error || Status::REFINEMENTS.contains(&self)
    }

    /// Classify a non-zero exit by looking for interpreter error markers in
    /// `stderr`.
    ///
    /// The last non-empty line (where a traceback names the exception) is
    /// checked first; otherwise the whole text is scanned in a fixed order.
    /// Falls back to the generic [`Status::Error`].
    pub fn classify_stderr(stderr: &str) -> Status {
        if let Some(last) = stderr.lines().rev().find(|l| !l.trim().is_empty()) {
            let last = last.trim_start();
            if let Some(status) = Status::REFINEMENTS
                .into_iter()
                .find(|s| last.starts_with(s.name()))
            {
                return status;
            }
        }

        Status::REFINEMENTS
            .into_iter()
            .find(|s| stderr.contains(s.name()))
            .unwrap_or(Status::Error)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a rendered summary counts as passed.
///
/// Passing characters are `.`, the placeholder `#` and the neutral `_`.
/// Spaces between suite summaries are ignored.
pub fn is_passing_summary(summary: &str) -> bool {
    summary
        .chars()
        .all(|c| c == '.' || c == PLACEHOLDER || c == '_' || c == ' ')
}
