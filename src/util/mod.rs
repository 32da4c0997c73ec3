//! Filesystem discovery helpers.

pub mod fs;

pub use fs::{discover_subjects, filter_subjects, find_test_files};
