//! JSON parsing for listing pages, local caches and conversation payloads.
//!
//! Handles conversion from raw API/cache values to domain models. Content
//! parts are resolved into `ContentPart` here, once.

use std::collections::HashMap;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;

use crate::domain::{
    AppError, ContentPart, ConversationSummary, Message, MessageGraph, MessageNode, Result, Role,
    Timestamp, PROJECT_PREFIX, UNTITLED,
};

/// Listing item as returned by the conversation endpoints and the local cache.
#[derive(Debug, Deserialize)]
struct RawListingItem {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    create_time: Option<Value>,
    #[serde(default)]
    gizmo_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawListingPage {
    #[serde(default = "Vec::new")]
    items: Vec<RawListingItem>,
    #[serde(default)]
    total: Option<u64>,
}

/// Local-storage cache envelope: `{value: {pages: [{items: [...]}]}}`.
#[derive(Debug, Deserialize)]
struct RawCache<T> {
    value: Option<RawCacheValue<T>>,
}

#[derive(Debug, Deserialize)]
struct RawCacheValue<T> {
    #[serde(default = "Vec::new")]
    pages: Vec<RawCachePage<T>>,
}

#[derive(Debug, Deserialize)]
struct RawCachePage<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

impl<T> RawCache<T> {
    fn into_items(self) -> impl Iterator<Item = T> {
        self.value
            .into_iter()
            .flat_map(|v| v.pages)
            .flat_map(|p| p.items)
    }
}

/// Folder-history cache item: `{gizmo: {gizmo: {id, display: {name}}}}`.
#[derive(Debug, Deserialize)]
struct RawFolderItem {
    #[serde(default)]
    gizmo: Option<RawGizmoEnvelope>,
}

#[derive(Debug, Deserialize)]
struct RawGizmoEnvelope {
    #[serde(default)]
    gizmo: Option<RawGizmo>,
}

#[derive(Debug, Deserialize)]
struct RawGizmo {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    display: Option<RawDisplay>,
}

#[derive(Debug, Deserialize)]
struct RawDisplay {
    #[serde(default)]
    name: Option<String>,
}

/// Full conversation payload.
#[derive(Debug, Deserialize)]
struct RawConversation {
    #[serde(default)]
    mapping: HashMap<String, RawNode>,
    #[serde(default)]
    current_node: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default)]
    parent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    author: Option<RawAuthor>,
    #[serde(default)]
    content: Option<RawContent>,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    #[serde(default)]
    role: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawContent {
    #[serde(default = "Vec::new")]
    parts: Vec<Value>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub items: Vec<ConversationSummary>,
    /// Total the endpoint claims to hold, if it reports one.
    pub total: Option<u64>,
    /// Items received, including ones dropped for lacking an id.
    pub received: usize,
}

/// A project folder found in the local folder cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFolder {
    pub id: String,
    /// Cached display name, if the cache had a non-empty one.
    pub name: Option<String>,
}

/// Parses one listing page.
///
/// # Errors
/// Returns error if the payload is not a listing object.
pub fn parse_listing_page(value: Value) -> Result<ListingPage> {
    let raw: RawListingPage = serde_json::from_value(value).map_err(AppError::json_parse)?;
    let received = raw.items.len();

    Ok(ListingPage {
        items: raw.items.into_iter().filter_map(summary_from_raw).collect(),
        total: raw.total,
        received,
    })
}

/// Parses the conversation-history cache snapshot.
///
/// # Errors
/// Returns error if the cache entry is not valid JSON.
pub fn parse_cached_listing(raw: &str) -> Result<Vec<ConversationSummary>> {
    let cache: RawCache<RawListingItem> = serde_json::from_str(raw).map_err(AppError::json_parse)?;
    Ok(cache.into_items().filter_map(summary_from_raw).collect())
}

/// Parses the folder-history cache into distinct project folders, first-seen order.
///
/// # Errors
/// Returns error if the cache entry is not valid JSON.
pub fn parse_cached_folders(raw: &str) -> Result<Vec<ProjectFolder>> {
    let cache: RawCache<RawFolderItem> = serde_json::from_str(raw).map_err(AppError::json_parse)?;
    let mut folders: Vec<ProjectFolder> = Vec::new();

    for gizmo in cache
        .into_items()
        .filter_map(|item| item.gizmo.and_then(|g| g.gizmo))
    {
        let Some(id) = gizmo.id.filter(|id| id.starts_with(PROJECT_PREFIX)) else {
            continue;
        };
        if folders.iter().any(|f| f.id == id) {
            continue;
        }
        let name = gizmo
            .display
            .and_then(|d| d.name)
            .filter(|n| !n.trim().is_empty());
        folders.push(ProjectFolder { id, name });
    }

    Ok(folders)
}

/// Extracts `gizmo.display.name` from an assistant/folder lookup response.
#[must_use]
pub fn parse_gizmo_name(value: &Value) -> Option<String> {
    value
        .pointer("/gizmo/display/name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
}

/// Parses a full conversation payload into its message graph.
///
/// # Errors
/// Returns error if the payload does not have the conversation shape.
pub fn parse_conversation(value: Value) -> Result<MessageGraph> {
    let raw: RawConversation = serde_json::from_value(value).map_err(AppError::json_parse)?;

    let nodes = raw
        .mapping
        .into_iter()
        .map(|(id, node)| {
            let message = node.message.and_then(message_from_raw);
            (
                id,
                MessageNode {
                    message,
                    parent: node.parent,
                },
            )
        })
        .collect();

    Ok(MessageGraph {
        nodes,
        current_node: raw.current_node.filter(|id| !id.is_empty()),
    })
}

/// Resolves a timestamp to local wall-clock time without an offset.
///
/// # Errors
/// Returns `InvalidData` if the value is neither ISO-8601 nor epoch seconds.
pub fn parse_timestamp(ts: &Timestamp) -> Result<NaiveDateTime> {
    match ts {
        Timestamp::Epoch(secs) => epoch_to_local(*secs),
        Timestamp::Iso(s) => {
            let s = s.trim();

            // Some caches store epoch seconds as strings
            if let Ok(secs) = s.parse::<f64>() {
                return epoch_to_local(secs);
            }

            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(dt.with_timezone(&Local).naive_local());
            }

            // Offset-less ISO strings are already local time
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                .map_err(|e| AppError::InvalidData {
                    message: format!("Unrecognized timestamp '{s}': {e}"),
                })
        }
    }
}

fn epoch_to_local(secs: f64) -> Result<NaiveDateTime> {
    let whole = secs.floor();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let nanos = ((secs - whole) * 1e9) as u32;
    #[allow(clippy::cast_possible_truncation)]
    let whole = whole as i64;

    DateTime::from_timestamp(whole, nanos)
        .map(|dt| dt.with_timezone(&Local).naive_local())
        .ok_or_else(|| AppError::InvalidData {
            message: format!("Epoch timestamp out of range: {secs}"),
        })
}

fn summary_from_raw(raw: RawListingItem) -> Option<ConversationSummary> {
    let Some(id) = raw.id.filter(|id| !id.is_empty()) else {
        tracing::debug!("Skipping listing item without id");
        return None;
    };

    let title = raw
        .title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let summary =
        ConversationSummary::new(id, title).created_at(timestamp_from_value(raw.create_time));

    Some(match raw.gizmo_id.filter(|g| !g.is_empty()) {
        Some(origin) => summary.with_origin(origin),
        None => summary,
    })
}

fn timestamp_from_value(value: Option<Value>) -> Timestamp {
    match value {
        Some(Value::Number(n)) => Timestamp::Epoch(n.as_f64().unwrap_or_default()),
        Some(Value::String(s)) if !s.is_empty() => Timestamp::Iso(s),
        _ => Timestamp::default(),
    }
}

fn message_from_raw(raw: RawMessage) -> Option<Message> {
    let content = raw.content?;
    let role = raw
        .author
        .and_then(|a| a.role)
        .map_or(Role::Assistant, |r| Role::from_author(&r));

    Some(Message {
        role,
        parts: content.parts.iter().map(part_from_value).collect(),
    })
}

fn part_from_value(value: &Value) -> ContentPart {
    match value {
        Value::String(text) => ContentPart::Text(text.clone()),
        Value::Object(obj) => match obj.get("content_type").and_then(Value::as_str) {
            Some("image_asset_pointer") => ContentPart::ImagePlaceholder,
            Some("tether_quote") => ContentPart::CitedSource {
                title: string_field(obj, "title"),
                url: string_field(obj, "url"),
            },
            _ => ContentPart::Unknown,
        },
        _ => ContentPart::Unknown,
    }
}

fn string_field(obj: &serde_json::Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
