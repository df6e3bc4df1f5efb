//! Conversation listing aggregation.
//!
//! Merges the primary listing, the archived listing and the local cache into
//! one deduplicated worklist, then partitions it into regular, assistant and
//! project-folder groups.

use std::collections::HashSet;
use std::path::Path;

use crate::domain::{
    AppConfig, ConversationCategory, ConversationSummary, ExportTarget, Result, Session,
};

use super::parser::{
    parse_cached_folders, parse_cached_listing, parse_gizmo_name, parse_listing_page,
    ListingPage, ProjectFolder,
};
use super::sink::safe_filename;

/// Local-storage key fragment of the conversation-list cache.
pub const CONVERSATION_CACHE_KEY: &str = "conversation-history";
/// Local-storage key fragment of the folder-history cache.
pub const FOLDER_CACHE_KEY: &str = "snorlax-history";
/// Local-storage key holding the active workspace/account id.
pub const ACCOUNT_KEY: &str = "_account";

const ASSISTANTS_DIR: &str = "gpts";
const PROJECTS_DIR: &str = "projects";

/// Conversations sharing one output target.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportGroup {
    pub target: ExportTarget,
    pub conversations: Vec<ConversationSummary>,
}

/// Everything one run will export, partitioned by category.
#[derive(Debug, Clone, PartialEq)]
pub struct Worklist {
    pub regular: ExportGroup,
    pub assistants: Vec<ExportGroup>,
    pub projects: Vec<ExportGroup>,
}

impl Worklist {
    /// All groups: regular first, then assistants, then projects.
    pub fn groups(&self) -> impl Iterator<Item = &ExportGroup> {
        std::iter::once(&self.regular)
            .chain(&self.assistants)
            .chain(&self.projects)
    }

    /// Number of conversations across all groups.
    #[must_use]
    pub fn conversation_count(&self) -> usize {
        self.groups().map(|g| g.conversations.len()).sum()
    }
}

/// Drains a paginated listing.
///
/// Stops on an empty page, on a page shorter than `page_size`, or once the
/// reported total is reached, whichever comes first. A reported total larger
/// than what could be retrieved is logged, not fatal.
///
/// # Errors
/// Returns the first page error.
pub fn paginate<F>(label: &str, page_size: usize, mut fetch_page: F) -> Result<Vec<ConversationSummary>>
where
    F: FnMut(usize) -> Result<ListingPage>,
{
    let mut items = Vec::new();
    let mut offset = 0usize;
    let mut reported_total = None;

    loop {
        let page = fetch_page(offset)?;
        let received = page.received;
        if page.total.is_some() {
            reported_total = page.total;
        }

        items.extend(page.items);
        offset += received;

        tracing::debug!(source = label, offset, received, total = ?page.total, "Fetched listing page");

        if received == 0 || received < page_size {
            break;
        }
        if page.total.is_some_and(|total| offset as u64 >= total) {
            break;
        }
    }

    if let Some(total) = reported_total {
        if total > items.len() as u64 {
            tracing::warn!(
                source = label,
                reported = total,
                retrieved = items.len(),
                "Listing reported more conversations than it returned; some may be inaccessible"
            );
        }
    }

    Ok(items)
}

/// Drops repeated ids, keeping the first occurrence.
#[must_use]
pub fn dedup_by_id(items: Vec<ConversationSummary>) -> Vec<ConversationSummary> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|c| seen.insert(c.id.clone()))
        .collect()
}

/// Appends archived items whose id the primary listing does not already hold.
///
/// Primary entries win: their archival state is authoritative.
#[must_use]
pub fn merge_archived(
    primary: Vec<ConversationSummary>,
    archived: Vec<ConversationSummary>,
) -> Vec<ConversationSummary> {
    let mut seen: HashSet<String> = primary.iter().map(|c| c.id.clone()).collect();
    let mut merged = primary;

    for conv in archived {
        if seen.insert(conv.id.clone()) {
            merged.push(conv.archived());
        }
    }

    merged
}

/// Workspace id from config, else from the browser's account entry.
pub fn resolve_workspace_id<S: Session + ?Sized>(session: &S, config: &AppConfig) -> Option<String> {
    if let Some(id) = config.session.workspace_id.as_ref().filter(|id| !id.is_empty()) {
        return Some(id.clone());
    }

    match session.local_item(ACCOUNT_KEY) {
        Ok(value) => value
            .map(|v| v.trim().trim_matches('"').to_string())
            .filter(|v| !v.is_empty()),
        Err(e) => {
            tracing::warn!(error = %e, "Could not read workspace id from local storage");
            None
        }
    }
}

/// Reads and merges the listing sources of one session.
pub struct SourceAggregator<'a, S: Session + ?Sized> {
    session: &'a S,
    config: &'a AppConfig,
    workspace_id: Option<String>,
}

impl<'a, S: Session + ?Sized> SourceAggregator<'a, S> {
    /// Create an aggregator over `session`.
    pub const fn new(session: &'a S, config: &'a AppConfig, workspace_id: Option<String>) -> Self {
        Self {
            session,
            config,
            workspace_id,
        }
    }

    fn listing_path(&self, offset: usize, archived: bool) -> String {
        let mut path = format!(
            "/backend-api/conversations?offset={offset}&limit={}&order=updated",
            self.config.api.page_size
        );
        if archived {
            path.push_str("&is_archived=true");
        }
        if let Some(ws) = &self.workspace_id {
            path.push_str("&workspace_id=");
            path.push_str(ws);
        }
        path
    }

    fn fetch_listing(&self, archived: bool) -> Result<Vec<ConversationSummary>> {
        let label = if archived { "archived" } else { "primary" };
        let items = paginate(label, self.config.api.page_size, |offset| {
            parse_listing_page(self.session.fetch_json(&self.listing_path(offset, archived))?)
        })?;
        Ok(dedup_by_id(items))
    }

    /// The paginated primary listing.
    ///
    /// # Errors
    /// Returns error if any page fails.
    pub fn primary_listing(&self) -> Result<Vec<ConversationSummary>> {
        self.fetch_listing(false)
    }

    /// The paginated archived listing. Items are not yet marked archived.
    ///
    /// # Errors
    /// Returns error if any page fails.
    pub fn archived_listing(&self) -> Result<Vec<ConversationSummary>> {
        self.fetch_listing(true)
    }

    /// The conversation list cached by the browser, empty if absent.
    ///
    /// # Errors
    /// Returns error if the cache cannot be read or parsed.
    pub fn cached_listing(&self) -> Result<Vec<ConversationSummary>> {
        match self.session.find_local_item(CONVERSATION_CACHE_KEY)? {
            Some(raw) => Ok(dedup_by_id(parse_cached_listing(&raw)?)),
            None => Ok(Vec::new()),
        }
    }

    /// Project folders named in the browser's folder cache, empty if absent.
    ///
    /// # Errors
    /// Returns error if the cache cannot be read or parsed.
    pub fn cached_folders(&self) -> Result<Vec<ProjectFolder>> {
        match self.session.find_local_item(FOLDER_CACHE_KEY)? {
            Some(raw) => parse_cached_folders(&raw),
            None => Ok(Vec::new()),
        }
    }

    /// All conversations of one project folder, tagged with its id.
    ///
    /// # Errors
    /// Returns error if any page fails.
    pub fn folder_conversations(&self, folder_id: &str) -> Result<Vec<ConversationSummary>> {
        let limit = self.config.api.folder_page_size;
        let items = paginate(folder_id, limit, |offset| {
            let path = format!("/backend-api/gizmos/{folder_id}/conversations?offset={offset}&limit={limit}");
            parse_listing_page(self.session.fetch_json(&path)?)
        })?;

        Ok(dedup_by_id(items)
            .into_iter()
            .map(|c| {
                if c.origin_tag.is_some() {
                    c
                } else {
                    c.with_origin(folder_id)
                }
            })
            .collect())
    }

    /// Display name of an assistant or folder; `None` if the lookup fails.
    pub fn lookup_display_name(&self, origin_id: &str) -> Option<String> {
        match self.session.fetch_json(&format!("/backend-api/gizmos/{origin_id}")) {
            Ok(value) => parse_gizmo_name(&value),
            Err(e) => {
                tracing::debug!(origin = origin_id, error = %e, "Name lookup failed");
                None
            }
        }
    }

    /// Primary listing merged with archived items, or the cache if the
    /// primary listing is empty.
    pub fn aggregate(&self) -> Vec<ConversationSummary> {
        let primary = self.primary_listing().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Primary listing failed");
            Vec::new()
        });

        if primary.is_empty() {
            tracing::info!("Primary listing returned nothing, falling back to the local cache");
            return self.cached_listing().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Local conversation cache unreadable");
                Vec::new()
            });
        }

        let archived = self.archived_listing().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Archived listing failed");
            Vec::new()
        });
        if !archived.is_empty() {
            tracing::info!(count = archived.len(), "Found archived conversations");
        }

        merge_archived(primary, archived)
    }

    /// Builds the categorized worklist for one run.
    pub fn build_worklist(&self) -> Worklist {
        let root = &self.config.export.output_dir;

        let mut regular = Vec::new();
        let mut assistant_members: Vec<(String, Vec<ConversationSummary>)> = Vec::new();
        let mut project_members: Vec<(String, Vec<ConversationSummary>)> = Vec::new();

        for conv in self.aggregate() {
            match conv.category() {
                ConversationCategory::Regular => regular.push(conv),
                ConversationCategory::AssistantBacked(id) => {
                    push_grouped(&mut assistant_members, id, conv);
                }
                ConversationCategory::ProjectBacked(id) => {
                    push_grouped(&mut project_members, id, conv);
                }
            }
        }

        let assistants = assistant_members
            .into_iter()
            .map(|(id, conversations)| {
                let name = self.lookup_display_name(&id).unwrap_or_else(|| id.clone());
                ExportGroup {
                    target: self.target(ConversationCategory::AssistantBacked(id), name, &root.join(ASSISTANTS_DIR)),
                    conversations,
                }
            })
            .collect();

        let worklist = Worklist {
            regular: ExportGroup {
                target: ExportTarget {
                    category: ConversationCategory::Regular,
                    display_name: String::new(),
                    output_dir: root.clone(),
                },
                conversations: regular,
            },
            assistants,
            projects: self.project_groups(project_members),
        };

        tracing::info!(
            regular = worklist.regular.conversations.len(),
            assistants = worklist.assistants.len(),
            projects = worklist.projects.len(),
            total = worklist.conversation_count(),
            "Worklist ready"
        );

        worklist
    }

    /// One group per folder: cached folders first, then folders only seen
    /// as origin tags. Members come from the tags and the folder listing.
    fn project_groups(&self, mut tagged: Vec<(String, Vec<ConversationSummary>)>) -> Vec<ExportGroup> {
        let mut folders = self.cached_folders().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Local folder cache unreadable");
            Vec::new()
        });
        for (id, _) in &tagged {
            if !folders.iter().any(|f| &f.id == id) {
                folders.push(ProjectFolder {
                    id: id.clone(),
                    name: None,
                });
            }
        }

        let projects_root = self.config.export.output_dir.join(PROJECTS_DIR);

        folders
            .into_iter()
            .map(|folder| {
                let mut conversations = tagged
                    .iter()
                    .position(|(id, _)| id == &folder.id)
                    .map(|i| tagged.swap_remove(i).1)
                    .unwrap_or_default();

                match self.folder_conversations(&folder.id) {
                    Ok(listed) => {
                        let mut seen: HashSet<String> =
                            conversations.iter().map(|c| c.id.clone()).collect();
                        conversations.extend(listed.into_iter().filter(|c| seen.insert(c.id.clone())));
                    }
                    Err(e) => {
                        tracing::warn!(folder = %folder.id, error = %e, "Folder listing failed");
                    }
                }

                let name = folder
                    .name
                    .or_else(|| self.lookup_display_name(&folder.id))
                    .unwrap_or_else(|| folder.id.clone());

                tracing::debug!(folder = %folder.id, name = %name, count = conversations.len(), "Resolved project folder");

                ExportGroup {
                    target: self.target(ConversationCategory::ProjectBacked(folder.id), name, &projects_root),
                    conversations,
                }
            })
            .collect()
    }

    fn target(&self, category: ConversationCategory, display_name: String, parent: &Path) -> ExportTarget {
        let output_dir = parent.join(safe_filename(&display_name, self.config.export.max_slug_len));
        ExportTarget {
            category,
            display_name,
            output_dir,
        }
    }
}

fn push_grouped(
    groups: &mut Vec<(String, Vec<ConversationSummary>)>,
    id: String,
    conv: ConversationSummary,
) {
    match groups.iter_mut().find(|(g, _)| *g == id) {
        Some((_, members)) => members.push(conv),
        None => groups.push((id, vec![conv])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    use crate::application::testing::{capture_logs, FakeSession};
    use crate::domain::AppError;

    const PRIMARY_0: &str = "/backend-api/conversations?offset=0&limit=100&order=updated";
    const ARCHIVED_0: &str =
        "/backend-api/conversations?offset=0&limit=100&order=updated&is_archived=true";

    fn page(ids: &[&str], total: Option<u64>) -> Value {
        let items: Vec<Value> = ids
            .iter()
            .map(|id| json!({"id": id, "title": format!("title {id}"), "create_time": 1_700_000_000}))
            .collect();
        match total {
            Some(t) => json!({"items": items, "total": t}),
            None => json!({"items": items}),
        }
    }

    fn tagged_page(items: &[(&str, &str)]) -> Value {
        let items: Vec<Value> = items
            .iter()
            .map(|(id, gizmo)| json!({"id": id, "title": id, "create_time": 1, "gizmo_id": gizmo}))
            .collect();
        json!({"items": items})
    }

    fn ids(items: &[ConversationSummary]) -> Vec<&str> {
        items.iter().map(|c| c.id.as_str()).collect()
    }

    fn config_with_page_size(page_size: usize) -> AppConfig {
        let mut config = AppConfig::default();
        config.api.page_size = page_size;
        config.api.folder_page_size = page_size;
        config
    }

    #[test]
    fn test_archived_merge_keeps_primary_state() {
        let session = FakeSession::new()
            .with_json(PRIMARY_0, page(&["a", "b"], Some(2)))
            .with_json(ARCHIVED_0, page(&["b", "c"], Some(2)));
        let config = AppConfig::default();

        let merged = SourceAggregator::new(&session, &config, None).aggregate();

        assert_eq!(ids(&merged), vec!["a", "b", "c"]);
        assert!(!merged[0].archived);
        assert!(!merged[1].archived);
        assert!(merged[2].archived);
    }

    #[test]
    fn test_fallback_uses_cache_exactly() {
        let cache = json!({"value": {"pages": [{"items": [
            {"id": "x", "title": "X", "create_time": 5},
            {"id": "y", "title": "Y", "create_time": "2024-01-01T00:00:00Z"}
        ]}]}})
        .to_string();
        let session = FakeSession::new()
            .with_json(PRIMARY_0, page(&[], Some(0)))
            .with_json(ARCHIVED_0, page(&["z"], Some(1)))
            .with_local("client/conversation-history/v2", &cache);
        let config = AppConfig::default();
        let aggregator = SourceAggregator::new(&session, &config, None);

        let merged = aggregator.aggregate();

        assert_eq!(merged, aggregator.cached_listing().unwrap());
        assert_eq!(ids(&merged), vec!["x", "y"]);
        assert_eq!(session.fetch_count(ARCHIVED_0), 0);
    }

    #[test]
    fn test_primary_failure_falls_back() {
        let cache = json!({"value": {"pages": [{"items": [{"id": "x"}]}]}}).to_string();
        let session = FakeSession::new()
            .with_failure(PRIMARY_0, 500)
            .with_local("conversation-history", &cache);
        let config = AppConfig::default();

        let merged = SourceAggregator::new(&session, &config, None).aggregate();
        assert_eq!(ids(&merged), vec!["x"]);
    }

    #[test]
    fn test_archived_failure_is_not_fatal() {
        let session = FakeSession::new()
            .with_json(PRIMARY_0, page(&["a"], Some(1)))
            .with_failure(ARCHIVED_0, 403);
        let config = AppConfig::default();

        let merged = SourceAggregator::new(&session, &config, None).aggregate();
        assert_eq!(ids(&merged), vec!["a"]);
    }

    #[test]
    fn test_paginate_stops_on_short_page() {
        let mut offsets = Vec::new();
        let items = paginate("test", 2, |offset| {
            offsets.push(offset);
            let value = match offset {
                0 => page(&["a", "b"], Some(5)),
                2 => page(&["c", "d"], Some(5)),
                4 => page(&["e"], Some(5)),
                _ => return Err(AppError::http(404, "past the end")),
            };
            parse_listing_page(value)
        })
        .unwrap();

        assert_eq!(ids(&items), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(offsets, vec![0, 2, 4]);
    }

    #[test]
    fn test_paginate_stops_when_total_reached() {
        let mut calls = 0;
        let items = paginate("test", 2, |offset| {
            calls += 1;
            match offset {
                0 => parse_listing_page(page(&["a", "b"], Some(4))),
                2 => parse_listing_page(page(&["c", "d"], Some(4))),
                _ => Err(AppError::http(404, "past the end")),
            }
        })
        .unwrap();

        assert_eq!(items.len(), 4);
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_paginate_stops_on_empty_page() {
        let items = paginate("test", 2, |offset| match offset {
            0 => parse_listing_page(page(&["a", "b"], None)),
            2 => parse_listing_page(page(&[], None)),
            _ => Err(AppError::http(404, "past the end")),
        })
        .unwrap();

        assert_eq!(ids(&items), vec!["a", "b"]);
    }

    #[test]
    fn test_paginate_overreported_total_is_not_fatal() {
        let (items, logs) = capture_logs(|| {
            paginate("test", 2, |offset| match offset {
                0 => parse_listing_page(page(&["a", "b"], Some(10))),
                _ => parse_listing_page(page(&[], Some(10))),
            })
        });

        assert_eq!(items.unwrap().len(), 2);
        assert!(logs.contains("WARN"), "{logs}");
        assert!(logs.contains("some may be inaccessible"), "{logs}");
        assert!(logs.contains("reported=10"), "{logs}");
        assert!(logs.contains("retrieved=2"), "{logs}");
    }

    #[test]
    fn test_paginate_complete_listing_does_not_warn() {
        let (items, logs) = capture_logs(|| {
            paginate("test", 2, |_| parse_listing_page(page(&["a"], Some(1))))
        });

        assert_eq!(items.unwrap().len(), 1);
        assert!(!logs.contains("inaccessible"), "{logs}");
    }

    #[test]
    fn test_paginate_propagates_errors() {
        let result = paginate("test", 2, |_| Err(AppError::http(500, "boom")));
        assert!(matches!(result, Err(AppError::Http { status: 500, .. })));
    }

    #[test]
    fn test_listing_path_carries_workspace() {
        let session = FakeSession::new().with_json(
            "/backend-api/conversations?offset=0&limit=100&order=updated&workspace_id=ws-9",
            page(&["a"], Some(1)),
        );
        let config = AppConfig::default();
        let aggregator = SourceAggregator::new(&session, &config, Some("ws-9".into()));

        assert_eq!(ids(&aggregator.primary_listing().unwrap()), vec!["a"]);
    }

    #[test]
    fn test_folder_pagination_conditions_are_independent() {
        let config = config_with_page_size(2);

        // Short page wins even though the total says there is more
        let session = FakeSession::new().with_json(
            "/backend-api/gizmos/g-p-1/conversations?offset=0&limit=2",
            page(&["f1"], Some(10)),
        );
        let folder = SourceAggregator::new(&session, &config, None)
            .folder_conversations("g-p-1")
            .unwrap();
        assert_eq!(ids(&folder), vec!["f1"]);
        assert_eq!(session.fetched().len(), 1);
        assert_eq!(folder[0].origin_tag.as_deref(), Some("g-p-1"));

        // Total wins even though the page was full
        let session = FakeSession::new().with_json(
            "/backend-api/gizmos/g-p-1/conversations?offset=0&limit=2",
            page(&["f1", "f2"], Some(2)),
        );
        let folder = SourceAggregator::new(&session, &config, None)
            .folder_conversations("g-p-1")
            .unwrap();
        assert_eq!(ids(&folder), vec!["f1", "f2"]);
        assert_eq!(session.fetched().len(), 1);
    }

    #[test]
    fn test_build_worklist_partitions_by_origin() {
        let folders = json!({"value": {"pages": [{"items": [
            {"gizmo": {"gizmo": {"id": "g-p-2", "display": {"name": "Taxes"}}}}
        ]}]}})
        .to_string();

        let session = FakeSession::new()
            .with_json(
                PRIMARY_0,
                tagged_page(&[("r1", ""), ("a1", "g-abc"), ("a2", "g-abc"), ("a3", "g-zzz"), ("p1", "g-p-1")]),
            )
            .with_json(ARCHIVED_0, tagged_page(&[("r2", "")]))
            .with_json(
                "/backend-api/gizmos/g-abc",
                json!({"gizmo": {"display": {"name": "Writer/Helper"}}}),
            )
            .with_failure("/backend-api/gizmos/g-zzz", 404)
            .with_failure("/backend-api/gizmos/g-p-1", 500)
            .with_json(
                "/backend-api/gizmos/g-p-2/conversations?offset=0&limit=50",
                tagged_page(&[("p3", "")]),
            )
            .with_json(
                "/backend-api/gizmos/g-p-1/conversations?offset=0&limit=50",
                tagged_page(&[("p1", "g-p-1"), ("p2", "g-p-1")]),
            )
            .with_local("snorlax-history", &folders);
        let config = AppConfig::default();

        let worklist = SourceAggregator::new(&session, &config, None).build_worklist();

        assert_eq!(ids(&worklist.regular.conversations), vec!["r1", "r2"]);
        assert!(worklist.regular.conversations[1].archived);
        assert_eq!(worklist.regular.target.output_dir, Path::new("exports"));

        assert_eq!(worklist.assistants.len(), 2);
        let writer = &worklist.assistants[0];
        assert_eq!(
            writer.target.category,
            ConversationCategory::AssistantBacked("g-abc".into())
        );
        assert_eq!(writer.target.display_name, "Writer/Helper");
        assert_eq!(writer.target.output_dir, Path::new("exports/gpts/WriterHelper"));
        assert_eq!(ids(&writer.conversations), vec!["a1", "a2"]);

        // Failed lookups fall back to the raw id
        assert_eq!(worklist.assistants[1].target.display_name, "g-zzz");

        assert_eq!(worklist.projects.len(), 2);
        let taxes = &worklist.projects[0];
        assert_eq!(taxes.target.display_name, "Taxes");
        assert_eq!(taxes.target.output_dir, Path::new("exports/projects/Taxes"));
        assert_eq!(ids(&taxes.conversations), vec!["p3"]);
        assert_eq!(taxes.conversations[0].origin_tag.as_deref(), Some("g-p-2"));

        let untitled = &worklist.projects[1];
        assert_eq!(untitled.target.display_name, "g-p-1");
        assert_eq!(ids(&untitled.conversations), vec!["p1", "p2"]);

        assert_eq!(worklist.conversation_count(), 8);
        // The cached folder name spares a lookup
        assert!(!session.fetched().contains(&"/backend-api/gizmos/g-p-2".to_string()));
    }

    #[test]
    fn test_resolve_workspace_id() {
        let mut config = AppConfig::default();
        let session = FakeSession::new().with_local("_account", "\"acct-1\"");
        assert_eq!(resolve_workspace_id(&session, &config).as_deref(), Some("acct-1"));

        config.session.workspace_id = Some("ws-cfg".into());
        assert_eq!(resolve_workspace_id(&session, &config).as_deref(), Some("ws-cfg"));

        let empty = FakeSession::new();
        config.session.workspace_id = None;
        assert_eq!(resolve_workspace_id(&empty, &config), None);
    }

    #[test]
    fn test_dedup_by_id_keeps_first() {
        let items = vec![
            ConversationSummary::new("a", "first"),
            ConversationSummary::new("b", "b"),
            ConversationSummary::new("a", "second"),
        ];
        let deduped = dedup_by_id(items);
        assert_eq!(ids(&deduped), vec!["a", "b"]);
        assert_eq!(deduped[0].title, "first");
    }
}
