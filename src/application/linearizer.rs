//! Active-thread extraction from a branching message graph.
//!
//! Only the path from the current leaf up to the root is canonical;
//! regenerated answers and abandoned edits hang off it and are never visited.

use std::collections::HashSet;

use crate::domain::{Message, MessageGraph};

/// Returns the messages of the active thread, root first.
///
/// Nodes without a payload are skipped. A missing or unknown leaf yields an
/// empty thread.
pub fn linearize(graph: &MessageGraph) -> Vec<&Message> {
    let Some(leaf) = graph.current_node.as_deref() else {
        return Vec::new();
    };

    let mut path = Vec::new();
    let mut visited = HashSet::new();
    let mut cursor = Some(leaf);

    while let Some(id) = cursor {
        if !visited.insert(id) {
            tracing::warn!(node = id, "Cycle in message graph, truncating thread");
            break;
        }
        let Some(node) = graph.nodes.get(id) else {
            break;
        };
        if let Some(message) = &node.message {
            path.push(message);
        }
        cursor = node.parent.as_deref();
    }

    path.reverse();
    path
}
