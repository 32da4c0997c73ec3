//! Configuration types and layered loading from TOML files and `TST_*`
//! environment variables.

use crate::runner::{InterpreterMap, RunSettings};
use crate::testcase::CompileDefaults;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};

pub mod env;
mod loader;
pub use loader::ConfigLoader;

/// Complete configuration for a test run.
///
/// Loaded once per invocation and read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Execution limits.
    #[serde(default)]
    pub run: RunConfig,

    /// Extension → command template used to launch io-test subjects.
    #[serde(default = "default_interpreters")]
    pub interpreters: BTreeMap<String, String>,

    /// Command used for extensions missing from `interpreters`.
    #[serde(default)]
    pub fallback_interpreter: Option<String>,

    /// Test discovery and compile defaults.
    #[serde(default)]
    pub tests: TestsConfig,

    /// Report rendering.
    #[serde(default)]
    pub report: ReportConfig,

    /// Subject filenames that are never tested.
    #[serde(default)]
    pub ignore_files: Vec<String>,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            run: RunConfig::default(),
            interpreters: default_interpreters(),
            fallback_interpreter: None,
            tests: TestsConfig::default(),
            report: ReportConfig::default(),
            ignore_files: Vec::new(),
            verbose: false,
        }
    }
}

fn default_interpreters() -> BTreeMap<String, String> {
    BTreeMap::from([("py".to_string(), "python3".to_string())])
}

/// Execution limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RunConfig {
    /// Per-run timeout in seconds.
    pub timeout: u64,

    /// Multiplier for the last-resort deadline of script tests and retries.
    pub hard_timeout_factor: u32,

    /// Maximum retries after transient spawn failures.
    pub spawn_retries: u32,

    /// Maximum number of subject batches running at once (unbounded if unset).
    pub subject_batches: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout: 5,
            hard_timeout_factor: 10,
            spawn_retries: 100,
            subject_batches: None,
        }
    }
}

/// Test discovery and compile defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TestsConfig {
    /// Glob patterns naming test-suite files.
    pub files: Vec<String>,

    /// Default applicability patterns. Derived from `interpreters` when unset.
    pub fnmatch: Option<Vec<String>>,

    /// Default normalizer operators for tests that specify none.
    pub ignore: Vec<String>,
}

impl Default for TestsConfig {
    fn default() -> Self {
        Self {
            files: vec!["*.yaml".to_string(), "*.yml".to_string(), "*.json".to_string()],
            fnmatch: None,
            ignore: Vec::new(),
        }
    }
}

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One line per subject.
    #[default]
    Summary,
    /// Only subjects that passed everything.
    Passed,
    /// Only subjects that failed something.
    Failed,
    /// JSON object.
    Json,
}

serde_plain::derive_display_from_serialize!(OutputFormat);
serde_plain::derive_fromstr_from_deserialize!(OutputFormat);

/// Report rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "kebab-case")]
pub struct ReportConfig {
    pub format: OutputFormat,

    /// Show line diffs for failed exact-output tests.
    pub diff: bool,

    /// Cap on the filename column width.
    pub max_name_width: Option<usize>,
}

impl Config {
    /// Parse a configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> crate::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load a configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config(format!("failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Default applicability patterns: configured, or `*.<ext>` per interpreter.
    pub fn default_fnmatch(&self) -> Vec<String> {
        match &self.tests.fnmatch {
            Some(patterns) => patterns.clone(),
            None if self.interpreters.is_empty() => vec!["*.py".to_string()],
            None => self.interpreters.keys().map(|ext| format!("*.{ext}")).collect(),
        }
    }

    /// Defaults handed to the preprocessor.
    pub fn compile_defaults(&self) -> CompileDefaults {
        CompileDefaults {
            fnmatch: self.default_fnmatch(),
            ignore: self.tests.ignore.clone(),
        }
    }

    /// Check that the execution limits can be turned into deadlines.
    pub fn validate(&self) -> crate::Result<()> {
        let settings = self.run_settings();
        let now = Instant::now();
        if now.checked_add(settings.hard_timeout).is_none() || settings.hard_timeout == Duration::MAX {
            return Err(crate::Error::config(format!(
                "timeout {}s with hard-timeout-factor {} is out of range",
                self.run.timeout, self.run.hard_timeout_factor
            )));
        }
        Ok(())
    }

    /// Read-only execution settings shared by the scheduler and test runs.
    ///
    /// The hard timeout saturates instead of overflowing; [`validate`](Self::validate)
    /// rejects such limits.
    pub fn run_settings(&self) -> RunSettings {
        let timeout = Duration::from_secs(self.run.timeout.max(1));
        RunSettings {
            timeout,
            hard_timeout: timeout
                .checked_mul(self.run.hard_timeout_factor.max(1))
                .unwrap_or(Duration::MAX),
            spawn_retries: self.run.spawn_retries,
            interpreters: InterpreterMap::new(
                self.interpreters.clone(),
                self.fallback_interpreter.clone(),
            ),
            working_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = Config::default();
        assert_eq!(config.run.timeout, 5);
        assert_eq!(config.run.hard_timeout_factor, 10);
        assert_eq!(config.run.spawn_retries, 100);
        assert!(config.run.subject_batches.is_none());
        assert_eq!(config.interpreters.get("py").unwrap(), "python3");
        assert!(config.fallback_interpreter.is_none());
        assert_eq!(config.tests.files, vec!["*.yaml", "*.yml", "*.json"]);
        assert!(config.tests.ignore.is_empty());
        assert_eq!(config.report.format, OutputFormat::Summary);
        assert!(!config.report.diff);
        assert!(config.ignore_files.is_empty());
        assert!(!config.verbose);
    }

    #[test]
    fn test_config_deserialize_minimal() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.run.timeout, 5);
        assert_eq!(config.default_fnmatch(), vec!["*.py"]);
    }

    #[test]
    fn test_config_deserialize_full() {
        let toml_str = r#"
        verbose = true
        fallback-interpreter = "sh"
        ignore-files = ["setup.py"]

        [run]
        timeout = 3
        hard-timeout-factor = 4
        spawn-retries = 7
        subject-batches = 2

        [interpreters]
        py = "python3 -B"
        rb = "ruby"

        [tests]
        files = ["tst.yaml"]
        ignore = ["case"]

        [report]
        format = "json"
        diff = true
        max-name-width = 20
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.verbose);
        assert_eq!(config.fallback_interpreter.as_deref(), Some("sh"));
        assert_eq!(config.ignore_files, vec!["setup.py"]);
        assert_eq!(config.run.timeout, 3);
        assert_eq!(config.run.hard_timeout_factor, 4);
        assert_eq!(config.run.spawn_retries, 7);
        assert_eq!(config.run.subject_batches, Some(2));
        assert_eq!(config.interpreters.len(), 2);
        assert_eq!(config.default_fnmatch(), vec!["*.py", "*.rb"]);
        assert_eq!(config.tests.files, vec!["tst.yaml"]);
        assert_eq!(config.report.format, OutputFormat::Json);
        assert!(config.report.diff);
        assert_eq!(config.report.max_name_width, Some(20));
    }

    #[test]
    fn test_config_deserialize_invalid_format() {
        let result: std::result::Result<Config, _> = toml::from_str("[report]\nformat = \"xml\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_fnmatch_wins() {
        let mut config = Config::default();
        config.tests.fnmatch = Some(vec!["*.c".into()]);
        assert_eq!(config.compile_defaults().fnmatch, vec!["*.c"]);
    }

    #[test]
    fn test_run_settings() {
        let mut config = Config::default();
        config.run.timeout = 2;
        config.run.hard_timeout_factor = 10;
        let settings = config.run_settings();
        assert_eq!(settings.timeout, Duration::from_secs(2));
        assert_eq!(settings.hard_timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_huge_timeout_is_config_error() {
        let mut config = Config::default();
        config.run.timeout = u64::MAX;
        assert_eq!(config.run_settings().hard_timeout, Duration::MAX);
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));

        config.run.timeout = 1_000_000_000_000;
        config.run.hard_timeout_factor = u32::MAX;
        assert!(config.validate().is_err());

        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("failed".parse::<OutputFormat>().unwrap(), OutputFormat::Failed);
        assert_eq!(OutputFormat::Json.to_string(), "json");
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
