//! Output module.
//!
//! This module handles:
//! - Colored console banner and scan summary
//! - JSON output of the scan report

pub mod console;

pub use console::ConsoleOutput;
