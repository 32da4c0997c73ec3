use crate::runner::TestRunResult;
use crate::status::{is_passing_summary, PLACEHOLDER};
use crate::testcase::TestSuite;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Name and size of one suite column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteShape {
    pub name: String,
    pub len: usize,
}

/// Subject × suite table of summary slots.
///
/// Slots are addressed by the stable test index, so the table renders the
/// same no matter in which order results are recorded. Slots that never
/// received a result render as [`PLACEHOLDER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultTable {
    suites: Vec<SuiteShape>,
    suite_index: HashMap<String, usize>,
    rows: BTreeMap<String, Vec<Vec<Option<String>>>>,
}

impl ResultTable {
    /// An empty table with one row per subject and one column per suite.
    pub fn new(subjects: &[String], suites: &[TestSuite]) -> Self {
        let shapes = suites
            .iter()
            .map(|s| SuiteShape {
                name: s.name.clone(),
                len: s.len(),
            })
            .collect();
        Self::with_shape(subjects, shapes)
    }

    pub fn with_shape(subjects: &[String], suites: Vec<SuiteShape>) -> Self {
        let suite_index = suites
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();
        let empty_row: Vec<Vec<Option<String>>> =
            suites.iter().map(|s| vec![None; s.len]).collect();
        let rows = subjects
            .iter()
            .map(|subject| (subject.clone(), empty_row.clone()))
            .collect();
        Self {
            suites,
            suite_index,
            rows,
        }
    }

    /// Build a table and record every result into it.
    pub fn from_results<'r>(
        subjects: &[String],
        suites: &[TestSuite],
        results: impl IntoIterator<Item = &'r TestRunResult>,
    ) -> Self {
        let mut table = Self::new(subjects, suites);
        for result in results {
            table.record(result);
        }
        table
    }

    /// Store a result in its slot. Returns `false` if the result does not
    /// belong to this table.
    pub fn record(&mut self, result: &TestRunResult) -> bool {
        let Some(&suite) = self.suite_index.get(&result.suite) else {
            return false;
        };
        let Some(row) = self.rows.get_mut(&result.subject) else {
            return false;
        };
        match result
            .index
            .checked_sub(1)
            .and_then(|i| row[suite].get_mut(i))
        {
            Some(slot) => {
                *slot = Some(result.summary.clone());
                true
            }
            None => false,
        }
    }

    pub fn suites(&self) -> &[SuiteShape] {
        &self.suites
    }

    /// Subjects in sorted order.
    pub fn subjects(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn subject_count(&self) -> usize {
        self.rows.len()
    }

    /// Total test cases across all suites.
    pub fn test_case_count(&self) -> usize {
        self.suites.iter().map(|s| s.len).sum()
    }

    /// Per-suite summary strings for `subject`, in suite order.
    pub fn suite_summaries(&self, subject: &str) -> Option<Vec<String>> {
        self.rows.get(subject).map(|row| {
            row.iter()
                .map(|slots| {
                    slots
                        .iter()
                        .map(|slot| match slot {
                            Some(summary) => summary.clone(),
                            None => PLACEHOLDER.to_string(),
                        })
                        .collect()
                })
                .collect()
        })
    }

    /// Suite summaries for `subject` joined with single spaces.
    pub fn summary(&self, subject: &str) -> Option<String> {
        self.suite_summaries(subject).map(|s| s.join(" "))
    }

    /// Whether `subject` passed every applicable test.
    pub fn passed(&self, subject: &str) -> bool {
        self.summary(subject)
            .is_some_and(|summary| is_passing_summary(&summary))
    }

    pub fn all_passed(&self) -> bool {
        self.subjects().all(|subject| self.passed(subject))
    }
}
