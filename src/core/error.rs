use std::path::PathBuf;

/// Result type alias for tst-runner operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tst-runner.
///
/// Only test-file, configuration and infrastructure problems surface as
/// an `Error`. Anything that goes wrong while a subject runs is recorded as a
/// [`Status`](crate::status::Status) on its result instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A test case in a suite could not be compiled.
    #[error("Invalid test spec in {suite} (test {index}): {message}")]
    InvalidTestSpec {
        suite: String,
        index: usize,
        message: String,
    },

    /// A test-suite file could not be read or parsed.
    #[error("Invalid test file {}: {message}", .path.display())]
    InvalidTestFile { path: PathBuf, message: String },

    /// Unknown normalizer operator in an `ignore` list.
    #[error("Unknown normalizer operator: {0}")]
    UnknownNormalizer(String),

    /// No test cases were collected from any test file.
    #[error("0 tests found")]
    NoTestCases,

    /// No subject matched any test case.
    #[error("No files to test")]
    NoSubjects,

    /// File not found.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML deserialization error.
    #[error("TOML parsing error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid glob pattern.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create an invalid test spec error for the 1-based `index` of `suite`.
    pub fn invalid_spec(suite: impl Into<String>, index: usize, msg: impl Into<String>) -> Self {
        Error::InvalidTestSpec {
            suite: suite.into(),
            index,
            message: msg.into(),
        }
    }

    /// Create an invalid test file error.
    pub fn invalid_file(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Error::InvalidTestFile {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Whether this error only affects a single test suite.
    ///
    /// Suite-level errors are reported as warnings and the suite is skipped;
    /// every other error aborts the run.
    pub fn is_suite_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidTestSpec { .. }
                | Error::InvalidTestFile { .. }
                | Error::UnknownNormalizer(_)
                | Error::Yaml(_)
                | Error::Json(_)
        )
    }
}
