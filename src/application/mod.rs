//! Application layer - use cases and orchestration.
//!
//! This layer turns listing metadata and conversation payloads into
//! Markdown documents, driven through the `Session` port.

pub mod aggregator;
pub mod composer;
pub mod diagnose;
pub mod exporter;
pub mod linearizer;
pub mod parser;
pub mod renderer;
pub mod sink;

#[cfg(test)]
mod testing;

pub use diagnose::{diagnose, format_report};
pub use exporter::run_export;
