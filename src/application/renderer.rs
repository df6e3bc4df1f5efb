//! Message-to-Markdown block rendering.

use crate::domain::{ContentPart, Message, Role};

/// Label preceding user messages.
pub const USER_LABEL: &str = "**You:**";
/// Label preceding assistant messages.
pub const ASSISTANT_LABEL: &str = "**ChatGPT:**";

const IMAGE_MARKER: &str = "*[image]*";

/// Renders one message as a Markdown block.
///
/// Returns `None` for system/tool scaffolding and for messages with nothing
/// visible left after dropping unknown parts.
pub fn render_message(message: &Message) -> Option<String> {
    let label = match message.role {
        Role::System | Role::Tool => return None,
        Role::User => USER_LABEL,
        Role::Assistant => ASSISTANT_LABEL,
    };

    let parts: Vec<String> = message.parts.iter().filter_map(render_part).collect();
    if parts.is_empty() {
        return None;
    }

    Some(format!("{label}\n\n{}", parts.join("\n\n")))
}

fn render_part(part: &ContentPart) -> Option<String> {
    match part {
        ContentPart::Text(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        ContentPart::ImagePlaceholder => Some(IMAGE_MARKER.to_string()),
        ContentPart::CitedSource { title, url } => Some(format!("*[source: [{title}]({url})]*")),
        ContentPart::Unknown => None,
    }
}
