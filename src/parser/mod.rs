//! Response parsers.
//!
//! This module handles extracting data from:
//! - Profiler panels (config metrics, router, request, search results)
//! - File previews rendered by `_profiler/open`
//! - The kernel container dump and PHP sources (class references)
//! - The profiler request index (`index.csv`)

pub mod kernel;
pub mod panels;
pub mod preview;

pub use kernel::{class_to_path, KernelParser};
pub use panels::{parse_index, LogEntry, PanelParser, RequestPanel, RouterPanel};
pub use preview::PreviewParser;
