//! tst-runner: a concurrent test runner for student assignments.
//!
//! Test suites are YAML or JSON files holding declarative test cases. Each
//! case is either an *io* test (feed stdin, judge stdout by exact output,
//! regex, tokens, sessions or parts) or a *script* test (an external command
//! judges the subject and reports a summary string). Every applicable
//! (subject, test case) pair runs as its own subprocess under a timeout, and
//! results are aggregated into one summary line per subject.
//!
//! # Quick Start
//!
//! ## Using the Builder API
//!
//! ```no_run
//! use tst_runner::builder;
//!
//! # fn main() -> tst_runner::Result<()> {
//! let report = builder()
//!     .load_config()?
//!     .test_files(["tests.yaml"])
//!     .run()?;
//! print!("{}", report.render()?);
//! assert!(report.all_passed());
//! # Ok(())
//! # }
//! ```
//!
//! ## Test files
//!
//! ```yaml
//! level: 1
//! tests:
//!   - input: "3 4\n"
//!     output: "7\n"
//!   - tokens: sum 7
//!   - session: ["3 4", "7"]
//!   - parts: [{lin: "3 4"}, {out: "7"}]
//!   - output: "Seven"
//!     ignore: case accents
//!   - script: python3 check_style.py {}
//! ```
//!
//! ## Configuration in `tst.toml`
//!
//! ```toml
//! [run]
//! timeout = 2
//!
//! [interpreters]
//! py = "python3"
//! rb = "ruby {}"
//!
//! [report]
//! format = "failed"
//! ```
//!
//! # Architecture
//!
//! - [`testcase`]: preprocessing raw specs into immutable [`testcase::TestCase`]s
//! - [`normalize`]: text normalization before exact comparison
//! - [`runner`]: executing one pair as a subprocess and classifying it into a [`Status`]
//! - [`scheduler`]: thread-per-pair fan-out with a single result collector
//! - [`report`]: order-independent aggregation and text/JSON rendering
//!
//! The [`Runner`](runner::Runner) and [`RunObserver`](scheduler::RunObserver)
//! traits are the extension points for custom execution and progress display.
//!
//! # Features
//!
//! - `default` - Enables `cli`
//! - `cli` - The `tst-runner` binary
//! - `progress` - indicatif progress bar observer

pub mod config;
pub mod core;
pub mod normalize;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod status;
pub mod testcase;
pub mod util;

// Re-export commonly used types
pub use crate::core::{Error, Result, RunReport, TestEngine, TestEngineBuilder};
pub use config::{Config, OutputFormat};
pub use status::Status;

/// Create a new test engine builder.
///
/// This is the main entry point for the fluent API.
pub fn builder() -> TestEngineBuilder {
    TestEngineBuilder::new()
}
