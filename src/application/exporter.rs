//! Export orchestration.
//!
//! Drives one run: aggregate listings, then for every conversation either
//! skip it (document already on disk) or fetch, compose and write it.

use std::fs;
use std::thread;

use crate::domain::{
    AppConfig, AppError, ConversationSummary, ExportCounters, ExportReport, Result, Session,
};

use super::aggregator::{resolve_workspace_id, ExportGroup, SourceAggregator};
use super::composer::compose;
use super::parser::parse_conversation;
use super::sink::{DocumentSink, SinkOutcome};

/// Runs a full incremental export.
///
/// Per-conversation and per-group failures are logged and counted, never fatal.
///
/// # Errors
/// Returns error if the output root cannot be created.
pub fn run_export<S: Session + ?Sized>(session: &S, config: &AppConfig) -> Result<ExportReport> {
    let root = &config.export.output_dir;
    fs::create_dir_all(root).map_err(|e| {
        AppError::io(format!("Failed to create output directory {}", root.display()), e)
    })?;

    tracing::info!(output = %root.display(), "Starting export");

    if let Err(e) = session.prime_cache(config.priming.ticks, config.priming_wait()) {
        tracing::warn!(error = %e, "Cache priming failed, continuing with what is cached");
    }

    let workspace_id = resolve_workspace_id(session, config);
    if let Some(ws) = &workspace_id {
        tracing::debug!(workspace = %ws, "Scoping listings to workspace");
    }

    let worklist = SourceAggregator::new(session, config, workspace_id).build_worklist();
    let exporter = Exporter::new(session, config);

    let mut counters = ExportCounters::default();
    for group in worklist.groups() {
        counters += exporter.export_group(group);
    }

    let output_dir = root.canonicalize().unwrap_or_else(|_| root.clone());

    tracing::info!(
        saved = counters.saved,
        skipped = counters.skipped,
        errored = counters.errored,
        "Export completed"
    );

    Ok(ExportReport {
        counters,
        output_dir,
    })
}

/// Exports conversations group by group.
pub struct Exporter<'a, S: Session + ?Sized> {
    session: &'a S,
    config: &'a AppConfig,
}

impl<'a, S: Session + ?Sized> Exporter<'a, S> {
    pub const fn new(session: &'a S, config: &'a AppConfig) -> Self {
        Self { session, config }
    }

    /// Exports every conversation of one group into its directory.
    ///
    /// When the directory cannot be created, the whole group counts as errored.
    pub fn export_group(&self, group: &ExportGroup) -> ExportCounters {
        let mut counters = ExportCounters::default();
        let sink = match DocumentSink::open(&group.target.output_dir, self.config.export.max_slug_len) {
            Ok(sink) => sink,
            Err(e) => {
                tracing::error!(
                    name = %group.target.display_name,
                    count = group.conversations.len(),
                    error = %e,
                    "Group directory unavailable, skipping group"
                );
                counters.errored += group.conversations.len();
                return counters;
            }
        };

        if let Some(origin) = group.target.category.origin_id() {
            tracing::info!(
                origin,
                name = %group.target.display_name,
                dir = %sink.dir().display(),
                count = group.conversations.len(),
                "Exporting group"
            );
        }

        for conv in &group.conversations {
            match self.export_one(&sink, conv) {
                Ok(SinkOutcome::Saved) => counters.saved += 1,
                Ok(SinkOutcome::Skipped) => counters.skipped += 1,
                Err(e) => {
                    tracing::error!(id = %conv.id, title = %conv.title, error = %e, "Export failed");
                    counters.errored += 1;
                }
            }
        }

        counters
    }

    /// Exports one conversation unless its document already exists.
    ///
    /// # Errors
    /// Returns error if fetching, composing or writing fails.
    pub fn export_one(&self, sink: &DocumentSink, conv: &ConversationSummary) -> Result<SinkOutcome> {
        let path = sink.path_for(conv)?;
        if sink.exists(&path) {
            tracing::debug!(id = %conv.id, path = %path.display(), "Already exported");
            return Ok(SinkOutcome::Skipped);
        }

        let fetched = self
            .session
            .fetch_json(&format!("/backend-api/conversation/{}", conv.id));
        self.pause();

        let graph = parse_conversation(fetched?)?;
        let document = compose(conv, &graph)?;
        sink.write(&path, &document.to_markdown())?;

        tracing::info!(title = %conv.title, archived = conv.archived, "Saved");
        Ok(SinkOutcome::Saved)
    }

    fn pause(&self) {
        let delay = self.config.fetch_delay();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}
