use super::compile::{compile, CompileDefaults};
use super::raw::RawTestFile;
use super::TestCase;
use crate::core::error::{Error, Result};
use std::path::Path;

/// The ordered test cases originating from one test file.
#[derive(Debug, Clone)]
pub struct TestSuite {
    pub name: String,
    /// Ordering weight among suites; lower runs and renders first.
    pub level: i64,
    cases: Vec<TestCase>,
}

impl TestSuite {
    pub fn new(name: impl Into<String>, level: i64, cases: Vec<TestCase>) -> Self {
        Self {
            name: name.into(),
            level,
            cases,
        }
    }

    /// Load and compile a YAML or JSON test file, naming the suite after
    /// its path.
    ///
    /// Files ending in `.json` are parsed as JSON, everything else as YAML.
    pub fn load(path: &Path, defaults: &CompileDefaults) -> Result<Self> {
        Self::load_as(path, &path.display().to_string(), defaults)
    }

    /// Load and compile a test file under an explicit suite name.
    pub fn load_as(path: &Path, name: &str, defaults: &CompileDefaults) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        Self::from_source(&content, name, is_json, defaults)
            .map_err(|e| match e {
                Error::Yaml(e) => Error::invalid_file(path, e.to_string()),
                Error::Json(e) => Error::invalid_file(path, e.to_string()),
                other => other,
            })
    }

    /// Compile a test file already read into memory.
    pub fn from_source(
        content: &str,
        name: &str,
        is_json: bool,
        defaults: &CompileDefaults,
    ) -> Result<Self> {
        let raw: RawTestFile = if is_json {
            serde_json::from_str(content)?
        } else {
            serde_yaml::from_str(content)?
        };
        let (tests, level) = raw.into_parts();
        compile(&tests, name, level, defaults)
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

/// Load every test file, skipping (and returning) the ones that fail.
///
/// `paths` are resolved against `base` and name their suites as given.
/// Suites come back stably sorted by level; empty suites are dropped.
pub fn load_suites(
    base: &Path,
    paths: &[impl AsRef<Path>],
    defaults: &CompileDefaults,
) -> (Vec<TestSuite>, Vec<Error>) {
    let mut suites = Vec::new();
    let mut skipped = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let name = path.display().to_string();
        match TestSuite::load_as(&base.join(path), &name, defaults) {
            Ok(suite) if suite.is_empty() => {
                tracing::debug!(suite = %suite.name, "skipping empty test suite");
            }
            Ok(suite) => {
                tracing::debug!(suite = %suite.name, tests = suite.len(), level = suite.level, "loaded test suite");
                suites.push(suite);
            }
            Err(e) => {
                tracing::warn!("skipping {}: {}", path.display(), e);
                skipped.push(e);
            }
        }
    }

    suites.sort_by_key(|s| s.level);
    (suites, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("a.yaml");
        std::fs::write(&yaml, "tests:\n- input: '1'\n  output: '1'\n").unwrap();
        let json = dir.path().join("b.json");
        std::fs::write(&json, r#"{"level": 1, "tests": [{"match": ".*"}, {"output": "x"}]}"#).unwrap();

        let defaults = CompileDefaults::default();
        let a = TestSuite::load(&yaml, &defaults).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a.level, 0);
        let b = TestSuite::load(&json, &defaults).unwrap();
        assert_eq!(b.len(), 2);
        assert_eq!(b.level, 1);
    }

    #[test]
    fn test_load_suites_skips_malformed_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let high = dir.path().join("high.yaml");
        std::fs::write(&high, "level: 5\ntests:\n- output: a\n").unwrap();
        let low = dir.path().join("low.yaml");
        std::fs::write(&low, "level: -1\ntests:\n- output: a\n").unwrap();
        let broken = dir.path().join("broken.yaml");
        std::fs::write(&broken, "tests: [ {output: ").unwrap();
        let invalid = dir.path().join("invalid.yaml");
        std::fs::write(&invalid, "tests:\n- output: a\n  match: b\n").unwrap();

        let (suites, skipped) = load_suites(
            dir.path(),
            &["high.yaml", "broken.yaml", "low.yaml", "invalid.yaml"],
            &CompileDefaults::default(),
        );
        let names: Vec<&str> = suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["low.yaml", "high.yaml"]);
        assert_eq!(skipped.len(), 2);
        assert!(skipped.iter().all(|e| e.is_suite_error()));
    }

    #[test]
    fn test_load_missing_file() {
        let err = TestSuite::load(Path::new("/nonexistent/tests.yaml"), &CompileDefaults::default())
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }
}
