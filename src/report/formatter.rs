//! Text and JSON rendering of a result table.

use super::diff::line_diff;
use super::table::ResultTable;
use super::{RenderOptions, SubjectFilter};
use crate::config::OutputFormat;
use crate::core::error::Result;
use crate::runner::TestRunResult;
use crate::status::Status;
use serde::Serialize;
use std::fmt::Write;
use std::time::Duration;

#[derive(Serialize)]
struct JsonReport<'a> {
    subjects: Vec<JsonSubject<'a>>,
    suppressed: usize,
    test_cases: usize,
    elapsed_secs: f64,
}

#[derive(Serialize)]
struct JsonSubject<'a> {
    filename: &'a str,
    summary: String,
    passed: bool,
    suites: Vec<JsonSuite<'a>>,
}

#[derive(Serialize)]
struct JsonSuite<'a> {
    name: &'a str,
    summary: String,
}

/// Renders a [`ResultTable`] according to [`RenderOptions`].
pub struct ReportFormatter {
    options: RenderOptions,
}

impl ReportFormatter {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    /// Render the full report.
    ///
    /// `results` are only consulted for diff sections.
    pub fn render(
        &self,
        table: &ResultTable,
        results: &[TestRunResult],
        elapsed: Duration,
    ) -> Result<String> {
        let (shown, suppressed) = self.select(table);
        match self.options.format {
            OutputFormat::Json => self.render_json(table, &shown, suppressed, elapsed),
            OutputFormat::Summary => Ok(self.render_summary(table, results, &shown, suppressed, elapsed)),
            OutputFormat::Passed | OutputFormat::Failed => {
                Ok(self.render_filtered(table, &shown, suppressed, elapsed))
            }
        }
    }

    /// Subjects that pass the filter, and how many were suppressed.
    fn select<'t>(&self, table: &'t ResultTable) -> (Vec<&'t str>, usize) {
        let filter = self.options.effective_filter();
        let shown: Vec<&str> = table
            .subjects()
            .filter(|subject| match filter {
                SubjectFilter::All => true,
                SubjectFilter::Passed => table.passed(subject),
                SubjectFilter::Failed => !table.passed(subject),
            })
            .collect();
        let suppressed = table.subject_count() - shown.len();
        (shown, suppressed)
    }

    fn name_width(&self, subjects: &[&str]) -> usize {
        let longest = subjects.iter().map(|s| s.chars().count()).max().unwrap_or(0);
        match self.options.max_name_width {
            Some(cap) => longest.min(cap),
            None => longest,
        }
    }

    fn render_summary(
        &self,
        table: &ResultTable,
        results: &[TestRunResult],
        shown: &[&str],
        suppressed: usize,
        elapsed: Duration,
    ) -> String {
        let width = self.name_width(shown);
        let mut out = String::new();
        for subject in shown {
            let name: String = subject.chars().take(width).collect();
            let summary = table.summary(subject).unwrap_or_default();
            let _ = writeln!(out, "{name:<width$} {summary}");
            if self.options.diff && !table.passed(subject) {
                self.render_details(&mut out, table, results, subject);
            }
        }
        self.render_footer(&mut out, table, suppressed, elapsed);
        out
    }

    fn render_filtered(
        &self,
        table: &ResultTable,
        shown: &[&str],
        suppressed: usize,
        elapsed: Duration,
    ) -> String {
        let mut out = String::new();
        for subject in shown {
            let summary = table.summary(subject).unwrap_or_default();
            let _ = writeln!(out, "{summary} {subject}");
        }
        self.render_footer(&mut out, table, suppressed, elapsed);
        out
    }

    fn render_footer(&self, out: &mut String, table: &ResultTable, suppressed: usize, elapsed: Duration) {
        if table.suites().is_empty() {
            return;
        }
        let passed = table.subjects().filter(|s| table.passed(s)).count();
        let failed = table.subject_count() - passed;
        let _ = writeln!(
            out,
            "--\n{} subjects: {} passed, {} failed, {} suppressed",
            table.subject_count(),
            passed,
            failed,
            suppressed
        );
        let _ = writeln!(
            out,
            "{} test cases in {} suites, {:.2}s",
            table.test_case_count(),
            table.suites().len(),
            elapsed.as_secs_f64()
        );
    }

    /// Explain every failing test of `subject`, in suite then index order.
    fn render_details(
        &self,
        out: &mut String,
        table: &ResultTable,
        results: &[TestRunResult],
        subject: &str,
    ) {
        let suite_order = |name: &str| table.suites().iter().position(|s| s.name == name);
        let mut failing: Vec<&TestRunResult> = results
            .iter()
            .filter(|r| r.subject == subject && r.is_failure())
            .collect();
        failing.sort_by_key(|r| (suite_order(&r.suite), r.index));

        for result in failing {
            let label = match &result.name {
                Some(name) => format!("{}#{} {:?}", result.suite, result.index, name),
                None => format!("{}#{}", result.suite, result.index),
            };
            let _ = writeln!(out, "\ntest {label}: {}", result.kind);
            if let Some(command) = &result.command {
                let _ = writeln!(out, "command: {command}");
            }
            if result.kind == "io" {
                if let Some(input) = &result.input {
                    let _ = writeln!(out, "input: {input:?}");
                }
                if let Some(expected) = &result.expected_output {
                    let _ = writeln!(out, "output: {expected:?}");
                }
                if let Some(pattern) = &result.match_pattern {
                    let _ = writeln!(out, "match: {pattern}");
                }
                if let Some(stdout) = &result.stdout {
                    let _ = writeln!(out, "stdout: {stdout:?}");
                }
            }
            let _ = writeln!(out, "summary: {} ({})", result.summary, result.status);
            if let Some(error) = &result.error {
                let _ = writeln!(out, "error: {error}");
            }
            if let Some(feedback) = &result.feedback {
                let _ = writeln!(out, "feedback:");
                for line in feedback.lines() {
                    let _ = writeln!(out, "    {line}");
                }
            }
            if result.status == Status::Fail {
                if let (Some(expected), Some(stdout)) = (&result.expected_output, &result.stdout) {
                    let _ = writeln!(out, "diff (-expected +stdout):");
                    out.push_str(&line_diff(expected, stdout));
                }
            }
        }
        out.push('\n');
    }

    fn render_json(
        &self,
        table: &ResultTable,
        shown: &[&str],
        suppressed: usize,
        elapsed: Duration,
    ) -> Result<String> {
        let subjects = shown
            .iter()
            .map(|&filename| {
                let per_suite = table.suite_summaries(filename).unwrap_or_default();
                JsonSubject {
                    filename,
                    summary: per_suite.concat(),
                    passed: table.passed(filename),
                    suites: table
                        .suites()
                        .iter()
                        .zip(per_suite)
                        .map(|(suite, summary)| JsonSuite {
                            name: &suite.name,
                            summary,
                        })
                        .collect(),
                }
            })
            .collect();
        let report = JsonReport {
            subjects,
            suppressed,
            test_cases: table.test_case_count(),
            elapsed_secs: elapsed.as_secs_f64(),
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }
}
