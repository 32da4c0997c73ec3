//! Core types for the test engine: builder, engine, report, and error handling.

pub mod builder;
pub mod error;

pub use builder::{RunReport, TestEngine, TestEngineBuilder};
pub use error::{Error, Result};
