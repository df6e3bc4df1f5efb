//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::AppConfig;
use crate::infrastructure::Credentials;

/// chat-offboard - Incrementally export ChatGPT conversations to Markdown.
///
/// Re-running only fetches conversations that have no document yet.
#[derive(Parser, Debug)]
#[command(name = "chat-offboard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of the default location.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export every conversation not yet on disk.
    Export(ExportArgs),

    /// Inspect local caches and probe project folders without writing files.
    Diagnose {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Write a commented default config file.
    InitConfig,

    /// Show resolved config and output paths.
    Paths,
}

/// How to reach an authenticated session.
#[derive(Args, Debug, Default)]
pub struct SessionArgs {
    /// Bearer access token.
    #[arg(long, env = "CHATGPT_ACCESS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Session cookie exchanged for an access token.
    #[arg(long, env = "CHATGPT_SESSION_TOKEN", hide_env_values = true)]
    pub session_token: Option<String>,

    /// Workspace id for team accounts.
    #[arg(short, long)]
    pub workspace: Option<String>,

    /// Browser local-storage SQLite file with the listing caches.
    #[arg(long)]
    pub local_storage: Option<PathBuf>,
}

impl SessionArgs {
    /// Applies flag values over the loaded config and returns the credentials.
    pub fn apply(self, config: &mut AppConfig) -> Credentials {
        if let Some(path) = self.local_storage {
            config.session.local_storage_db = Some(path);
        }
        if self.workspace.is_some() {
            config.session.workspace_id.clone_from(&self.workspace);
        }

        Credentials {
            access_token: self.token,
            session_token: self.session_token,
            workspace_id: self.workspace,
        }
        .or_config(&config.session)
    }
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output directory for exported documents.
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Pause after every conversation fetch, in milliseconds.
    #[arg(long)]
    pub delay_ms: Option<u64>,

    #[command(flatten)]
    pub session: SessionArgs,
}

impl ExportArgs {
    /// Applies flag values over the loaded config and returns the credentials.
    pub fn apply(self, config: &mut AppConfig) -> Credentials {
        if let Some(dir) = self.dir {
            config.export.output_dir = dir;
        }
        if let Some(delay) = self.delay_ms {
            config.export.delay_ms = delay;
        }
        self.session.apply(config)
    }
}
