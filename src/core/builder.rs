use crate::config::{Config, ConfigLoader, OutputFormat};
use crate::core::error::{Error, Result};
use crate::report::{RenderOptions, ReportFormatter, ResultTable};
use crate::runner::{ProcessRunner, Runner, TestRunResult};
use crate::scheduler::{NullObserver, RunObserver, Scheduler};
use crate::testcase::{load_suites, TestSuite};
use crate::util::fs::{discover_subjects, filter_subjects, find_test_files};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Builder for configuring and running a test engine.
pub struct TestEngineBuilder {
    config: Option<Config>,
    working_dir: Option<PathBuf>,
    test_files: Option<Vec<String>>,
    subject_args: Vec<String>,
    runner: Option<Box<dyn Runner>>,
    observer: Option<Box<dyn RunObserver>>,
}

impl TestEngineBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: None,
            working_dir: None,
            test_files: None,
            subject_args: Vec::new(),
            runner: None,
            observer: None,
        }
    }

    /// Set the configuration directly.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Load layered configuration (user file, `tst.toml`, `TST_*` env vars)
    /// for the working directory.
    pub fn load_config(mut self) -> Result<Self> {
        let mut loader = ConfigLoader::new();
        if let Some(ref dir) = self.working_dir {
            loader = loader.project_dir(dir);
        }
        self.config = Some(loader.load()?);
        Ok(self)
    }

    /// Load configuration with an explicit TOML file layered on top.
    pub fn from_config_file(mut self, path: impl Into<PathBuf>) -> Result<Self> {
        let mut loader = ConfigLoader::new().config_file(path);
        if let Some(ref dir) = self.working_dir {
            loader = loader.project_dir(dir);
        }
        self.config = Some(loader.load()?);
        Ok(self)
    }

    /// Directory that subjects and test files are resolved against, and
    /// that subjects run in. Defaults to the current directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Glob patterns for test-suite files, overriding `tests.files`.
    pub fn test_files<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.test_files = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    /// Subject arguments, interpreted as described in
    /// [`discover_subjects`](crate::util::fs::discover_subjects).
    pub fn subjects<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subject_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set a custom runner implementation.
    pub fn runner<R: Runner + 'static>(mut self, runner: R) -> Self {
        self.runner = Some(Box::new(runner));
        self
    }

    /// Set the progress observer.
    pub fn observer<O: RunObserver + 'static>(mut self, observer: O) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Load test suites and discover subjects.
    ///
    /// Fails when no test case could be loaded, when no subject matches any
    /// test case, or when a diff is requested for anything but a single
    /// subject in the summary format.
    pub fn build(self) -> Result<TestEngine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let working_dir = match self.working_dir {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };

        let patterns = self.test_files.unwrap_or_else(|| config.tests.files.clone());
        let test_files = find_test_files(&working_dir, &patterns)?;
        tracing::debug!(files = ?test_files, "found test files");

        let (suites, skipped) = load_suites(&working_dir, &test_files, &config.compile_defaults());
        if suites.iter().all(TestSuite::is_empty) {
            return Err(Error::NoTestCases);
        }

        let candidates = discover_subjects(&working_dir, &self.subject_args)?;
        let candidates = filter_subjects(candidates, &config.ignore_files, &test_files)?;
        let subjects: Vec<String> = candidates
            .into_iter()
            .filter(|subject| {
                suites
                    .iter()
                    .flat_map(TestSuite::cases)
                    .any(|case| case.applies_to(subject))
            })
            .collect();
        if subjects.is_empty() {
            return Err(Error::NoSubjects);
        }

        if config.report.diff
            && (subjects.len() != 1 || config.report.format != OutputFormat::Summary)
        {
            return Err(Error::config(
                "diff output requires a single subject and the summary format",
            ));
        }

        let runner = match self.runner {
            Some(runner) => runner,
            None => {
                let mut settings = config.run_settings();
                settings.working_dir = Some(working_dir.clone());
                Box::new(ProcessRunner::new(settings))
            }
        };

        Ok(TestEngine {
            config,
            working_dir,
            suites,
            subjects,
            skipped: skipped.iter().map(ToString::to_string).collect(),
            runner,
            observer: self.observer.unwrap_or_else(|| Box::new(NullObserver)),
        })
    }

    /// Build and immediately run.
    pub fn run(self) -> Result<RunReport> {
        Ok(self.build()?.run())
    }
}

impl Default for TestEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A configured engine, ready to run every suite against every subject.
pub struct TestEngine {
    config: Config,
    working_dir: PathBuf,
    suites: Vec<TestSuite>,
    subjects: Vec<String>,
    skipped: Vec<String>,
    runner: Box<dyn Runner>,
    observer: Box<dyn RunObserver>,
}

impl TestEngine {
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Loaded suites, sorted by level.
    pub fn suites(&self) -> &[TestSuite] {
        &self.suites
    }

    /// Subjects to test, sorted.
    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    /// Diagnostics for test files that were skipped.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Run everything and aggregate the results.
    pub fn run(self) -> RunReport {
        let started = Instant::now();
        tracing::debug!(
            runner = self.runner.name(),
            subjects = self.subjects.len(),
            suites = self.suites.len(),
            "running tests"
        );

        let results = Scheduler::new(self.runner.as_ref())
            .max_batches(self.config.run.subject_batches)
            .run(&self.subjects, &self.suites, self.observer);
        let table = ResultTable::from_results(&self.subjects, &self.suites, &results);

        for subject in table.subjects() {
            tracing::info!(
                subject,
                summary = %table.summary(subject).unwrap_or_default(),
                "subject finished"
            );
        }

        RunReport {
            options: RenderOptions::from(&self.config.report),
            table,
            results,
            skipped: self.skipped,
            elapsed: started.elapsed(),
        }
    }
}

/// Aggregated outcome of a run.
#[derive(Debug)]
pub struct RunReport {
    options: RenderOptions,
    table: ResultTable,
    results: Vec<TestRunResult>,
    skipped: Vec<String>,
    elapsed: Duration,
}

impl RunReport {
    pub fn table(&self) -> &ResultTable {
        &self.table
    }

    /// Individual results, in completion order.
    pub fn results(&self) -> &[TestRunResult] {
        &self.results
    }

    /// Diagnostics for test files that were skipped.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Whether every subject passed every applicable test.
    pub fn all_passed(&self) -> bool {
        self.table.all_passed()
    }

    /// Render with the configured report options.
    pub fn render(&self) -> Result<String> {
        self.render_with(&self.options)
    }

    pub fn render_with(&self, options: &RenderOptions) -> Result<String> {
        ReportFormatter::new(options.clone()).render(&self.table, &self.results, self.elapsed)
    }
}
