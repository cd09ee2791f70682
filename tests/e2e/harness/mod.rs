//! E2E test harness for clipd.
//!
//! This module contains test infrastructure with builders, variants and
//! methods that not every scenario uses.

#![allow(dead_code)]

pub mod clipboard;
pub mod runner;

// Re-export commonly used types
pub use assertions::Assertion;
pub use scenario::Scenario;
