//! Document composition: metadata header plus rendered message blocks.

use crate::domain::{ConversationSummary, Document, MessageGraph, Result};

use super::linearizer::linearize;
use super::parser::parse_timestamp;
use super::renderer::render_message;

/// Date format of the metadata line.
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Builds the document for one conversation from its listing metadata and graph.
///
/// # Errors
/// Returns error if the creation timestamp cannot be parsed.
pub fn compose(summary: &ConversationSummary, graph: &MessageGraph) -> Result<Document> {
    let created = parse_timestamp(&summary.created)?;

    let blocks = linearize(graph)
        .into_iter()
        .filter_map(render_message)
        .collect();

    Ok(Document {
        title: summary.title.clone(),
        created,
        archived: summary.archived,
        blocks,
    })
}

impl Document {
    /// Markdown text of the document.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut lines = vec![
            format!("# {}", self.title),
            format!(
                "*{}*{}",
                self.created.format(DATE_FORMAT),
                if self.archived { " | archived" } else { "" }
            ),
            String::new(),
        ];

        for block in self.blocks.iter().filter(|b| !b.is_empty()) {
            lines.push(block.clone());
            lines.push(String::new());
            lines.push("---".to_string());
            lines.push(String::new());
        }

        lines.join("\n")
    }
}
