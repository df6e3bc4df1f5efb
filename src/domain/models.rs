//! Domain models for exported conversations.
//!
//! These models represent listing metadata, the branching message graph of a
//! single conversation, and the rendered document written to disk.

use std::collections::HashMap;
use std::ops::AddAssign;
use std::path::PathBuf;

use chrono::NaiveDateTime;

/// Origin ids starting with this prefix belong to project folders,
/// everything else is a custom assistant.
pub const PROJECT_PREFIX: &str = "g-p-";

/// Title used when a listing item carries none.
pub const UNTITLED: &str = "Untitled";

/// Creation time as reported by a listing source.
///
/// Endpoints disagree on the representation: some send ISO-8601 strings,
/// others epoch seconds.
#[derive(Debug, Clone, PartialEq)]
pub enum Timestamp {
    /// Seconds since the Unix epoch, possibly fractional.
    Epoch(f64),
    /// ISO-8601 string, with or without offset.
    Iso(String),
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::Epoch(0.0)
    }
}

/// Listing metadata for one conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    /// Stable conversation id.
    pub id: String,
    /// Conversation title.
    pub title: String,
    /// When this conversation was created.
    pub created: Timestamp,
    /// Owning assistant or project folder, if any.
    pub origin_tag: Option<String>,
    /// Whether this item came from the archived listing.
    pub archived: bool,
}

impl ConversationSummary {
    /// Create a summary with default timestamp and no origin.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            created: Timestamp::default(),
            origin_tag: None,
            archived: false,
        }
    }

    /// Set the creation time.
    #[must_use]
    pub fn created_at(mut self, created: Timestamp) -> Self {
        self.created = created;
        self
    }

    /// Set the origin tag.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin_tag = Some(origin.into());
        self
    }

    /// Mark as archived.
    #[must_use]
    pub const fn archived(mut self) -> Self {
        self.archived = true;
        self
    }

    /// Category derived from the origin tag.
    #[must_use]
    pub fn category(&self) -> ConversationCategory {
        ConversationCategory::from_origin_tag(self.origin_tag.as_deref())
    }
}

/// Where a conversation lives in the product.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConversationCategory {
    /// Plain chat.
    Regular,
    /// Chat with a custom assistant.
    AssistantBacked(String),
    /// Chat inside a project folder.
    ProjectBacked(String),
}

impl ConversationCategory {
    /// Classify an origin tag. Empty tags count as no tag.
    #[must_use]
    pub fn from_origin_tag(tag: Option<&str>) -> Self {
        match tag {
            None | Some("") => Self::Regular,
            Some(id) if id.starts_with(PROJECT_PREFIX) => Self::ProjectBacked(id.to_string()),
            Some(id) => Self::AssistantBacked(id.to_string()),
        }
    }

    /// The owning origin id, if any.
    #[must_use]
    pub fn origin_id(&self) -> Option<&str> {
        match self {
            Self::Regular => None,
            Self::AssistantBacked(id) | Self::ProjectBacked(id) => Some(id),
        }
    }
}

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    /// Map an author role string. Unrecognized roles render like the assistant.
    #[must_use]
    pub fn from_author(role: &str) -> Self {
        match role {
            "system" => Self::System,
            "user" => Self::User,
            "tool" => Self::Tool,
            _ => Self::Assistant,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "System"),
            Self::User => write!(f, "User"),
            Self::Assistant => write!(f, "Assistant"),
            Self::Tool => write!(f, "Tool"),
        }
    }
}

/// One piece of message content, resolved at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    ImagePlaceholder,
    CitedSource { title: String, url: String },
    Unknown,
}

/// A single message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

#[cfg(test)]
impl Message {
    /// Message consisting of one text part.
    #[must_use]
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![ContentPart::Text(text.into())],
        }
    }
}

/// Node of the message graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageNode {
    /// Payload; scaffolding nodes (the root, for instance) carry none.
    pub message: Option<Message>,
    /// Parent node id, `None` at the root.
    pub parent: Option<String>,
}

/// Arena of message nodes keyed by id, with the tip of the active branch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageGraph {
    pub nodes: HashMap<String, MessageNode>,
    pub current_node: Option<String>,
}

/// A rendered conversation, ready to be written once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub title: String,
    pub created: NaiveDateTime,
    pub archived: bool,
    pub blocks: Vec<String>,
}

/// Destination of one group of conversations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    pub category: ConversationCategory,
    /// Assistant or folder name, raw origin id when unresolvable.
    pub display_name: String,
    pub output_dir: PathBuf,
}

/// Run-wide export counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportCounters {
    /// Documents written during this run.
    pub saved: usize,
    /// Documents already present on disk.
    pub skipped: usize,
    /// Conversations that failed to fetch or render.
    pub errored: usize,
}

impl ExportCounters {
    /// Number of conversations visited.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.saved + self.skipped + self.errored
    }
}

impl AddAssign for ExportCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.saved += rhs.saved;
        self.skipped += rhs.skipped;
        self.errored += rhs.errored;
    }
}

/// Outcome of a full export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub counters: ExportCounters,
    /// Resolved output directory.
    pub output_dir: PathBuf,
}
