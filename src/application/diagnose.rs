//! Read-only inspection of what a session can see.
//!
//! Reports the local caches and probes each project folder listing without
//! writing anything.

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::domain::{AppConfig, ConversationCategory, Result, Session};

use super::aggregator::{resolve_workspace_id, SourceAggregator};
use super::parser::parse_listing_page;

const PROBE_LIMIT: usize = 5;
const SAMPLE_IDS: usize = 3;

/// Counts from the cached conversation list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSummary {
    pub total: usize,
    pub regular: usize,
    pub assistant: usize,
    pub project: usize,
    pub sample_ids: Vec<String>,
}

/// Result of probing one folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Listed {
        total: Option<u64>,
        fetched: usize,
        first_title: Option<String>,
    },
    Failed(String),
}

/// One project folder and its probe result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderProbe {
    pub id: String,
    pub name: Option<String>,
    pub outcome: ProbeOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticReport {
    pub workspace_id: Option<String>,
    pub cache: CacheSummary,
    pub folders: Vec<FolderProbe>,
}

/// Inspects caches and probes folder listings.
///
/// # Errors
/// Returns error if a local cache cannot be read or parsed.
pub fn diagnose<S: Session + ?Sized>(session: &S, config: &AppConfig) -> Result<DiagnosticReport> {
    let workspace_id = resolve_workspace_id(session, config);
    let aggregator = SourceAggregator::new(session, config, workspace_id.clone());

    let cached = aggregator.cached_listing()?;
    let mut cache = CacheSummary {
        total: cached.len(),
        sample_ids: cached.iter().take(SAMPLE_IDS).map(|c| c.id.clone()).collect(),
        ..CacheSummary::default()
    };
    for conv in &cached {
        match conv.category() {
            ConversationCategory::Regular => cache.regular += 1,
            ConversationCategory::AssistantBacked(_) => cache.assistant += 1,
            ConversationCategory::ProjectBacked(_) => cache.project += 1,
        }
    }

    let folders = aggregator
        .cached_folders()?
        .into_iter()
        .map(|folder| {
            let path = format!(
                "/backend-api/gizmos/{}/conversations?offset=0&limit={PROBE_LIMIT}",
                folder.id
            );
            let outcome = match session.fetch_json(&path).and_then(parse_listing_page) {
                Ok(page) => ProbeOutcome::Listed {
                    total: page.total,
                    fetched: page.received,
                    first_title: page.items.first().map(|c| c.title.clone()),
                },
                Err(e) => ProbeOutcome::Failed(e.to_string()),
            };
            FolderProbe {
                id: folder.id,
                name: folder.name,
                outcome,
            }
        })
        .collect();

    Ok(DiagnosticReport {
        workspace_id,
        cache,
        folders,
    })
}

/// Human-readable rendering of a diagnostic report.
#[must_use]
pub fn format_report(report: &DiagnosticReport) -> String {
    let cache = &report.cache;
    let mut out = format!(
        "{}\n  Workspace: {}\n  Cached conversations: {} (regular {}, assistant {}, project {})\n",
        "🔎 Session diagnostics".bold(),
        report.workspace_id.as_deref().unwrap_or("-").cyan(),
        cache.total.to_string().cyan(),
        cache.regular,
        cache.assistant,
        cache.project,
    );
    if !cache.sample_ids.is_empty() {
        out.push_str(&format!("  Sample ids: {}\n", cache.sample_ids.join(", ")));
    }

    if report.folders.is_empty() {
        out.push_str(&format!("  {}\n", "No project folders in the local cache".yellow()));
        return out;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Folder", "Name", "Total", "Fetched", "First title", "Status"]);

    for probe in &report.folders {
        let name = probe.name.as_deref().unwrap_or("-");
        let row = match &probe.outcome {
            ProbeOutcome::Listed {
                total,
                fetched,
                first_title,
            } => vec![
                probe.id.clone(),
                name.to_string(),
                total.map_or_else(|| "?".to_string(), |t| t.to_string()),
                fetched.to_string(),
                first_title.clone().unwrap_or_else(|| "-".to_string()),
                "ok".to_string(),
            ],
            ProbeOutcome::Failed(err) => vec![
                probe.id.clone(),
                name.to_string(),
                "-".to_string(),
                "-".to_string(),
                "-".to_string(),
                err.clone(),
            ],
        };
        table.add_row(row);
    }

    out.push('\n');
    out.push_str(&table.to_string());
    out
}
