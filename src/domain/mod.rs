//! Domain layer - core types, configuration and ports.
//!
//! This layer contains pure domain models and error types
//! without any I/O of its own.

pub mod config;
pub mod error;
pub mod models;
pub mod session;

pub use config::{ApiConfig, AppConfig, SessionConfig};
pub use error::{AppError, Result};
pub use models::{
    ContentPart, ConversationCategory, ConversationSummary, Document, ExportCounters,
    ExportReport, ExportTarget, Message, MessageGraph, MessageNode, Role, Timestamp,
    PROJECT_PREFIX, UNTITLED,
};
pub use session::Session;
