//! Aggregation of test results and report rendering.
//!
//! The reporter sits after the scheduler in the pipeline:
//! `Preprocessor → Scheduler → TestRun → Aggregator → Reporter`.
//! Results arrive in completion order; [`ResultTable`] indexes them by
//! subject, suite and test index so rendering is order-independent.

mod diff;
mod formatter;
mod table;

pub use diff::line_diff;
pub use formatter::ReportFormatter;
pub use table::{ResultTable, SuiteShape};

use crate::config::{OutputFormat, ReportConfig};

/// Which subjects a report shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubjectFilter {
    #[default]
    All,
    /// Only subjects whose summary consists of passing characters: `.`,
    /// the `#` placeholder, and `_` for tests that did not apply to the
    /// subject.
    Passed,
    /// Only subjects with at least one failing slot. A `_` slot is never
    /// failing.
    Failed,
}

/// Report rendering options.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub format: OutputFormat,
    /// Explicit filter. `Passed`/`Failed` formats imply their own filter.
    pub filter: SubjectFilter,
    /// Append failure details and output diffs (summary format only).
    pub diff: bool,
    pub max_name_width: Option<usize>,
}

impl RenderOptions {
    pub(crate) fn effective_filter(&self) -> SubjectFilter {
        match self.format {
            OutputFormat::Passed => SubjectFilter::Passed,
            OutputFormat::Failed => SubjectFilter::Failed,
            OutputFormat::Summary | OutputFormat::Json => self.filter,
        }
    }
}

impl From<&ReportConfig> for RenderOptions {
    fn from(config: &ReportConfig) -> Self {
        Self {
            format: config.format,
            filter: SubjectFilter::All,
            diff: config.diff,
            max_name_width: config.max_name_width,
        }
    }
}
