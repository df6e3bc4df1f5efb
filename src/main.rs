//! chat-offboard - Incrementally export ChatGPT conversations to Markdown.
//!
//! Lists every conversation the account can see (regular, archived,
//! assistant-backed and project folders), then writes one Markdown document
//! per conversation. Documents already on disk are never fetched again, so an
//! interrupted run is resumed by running it again.
//!
//! QUICK START:
//!   chat-offboard init-config                 # Write a default config file
//!   chat-offboard export --token <token>      # Export into ./exports
//!   chat-offboard diagnose                    # Inspect caches and folders

mod application;
mod cli;
mod domain;
mod infrastructure;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{diagnose, format_report, run_export};
use cli::{Cli, Commands, ExportArgs, SessionArgs};
use domain::AppConfig;
use infrastructure::{config_file_path, ensure_config_exists, load_config, BrowserSession};

fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
fn run(cli: Cli) -> domain::Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(config_file_path);

    match cli.command {
        Commands::Export(args) => {
            let config = load_config(cli.config.as_deref())?;
            cmd_export(config, args)?;
        }
        Commands::Diagnose { session } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_diagnose(config, session)?;
        }
        Commands::InitConfig => {
            cmd_init_config(&config_path)?;
        }
        Commands::Paths => {
            let config = load_config(cli.config.as_deref())?;
            cmd_paths(&config, &config_path);
        }
    }

    Ok(())
}

/// Export command.
fn cmd_export(mut config: AppConfig, args: ExportArgs) -> domain::Result<()> {
    let credentials = args.apply(&mut config);
    let session = BrowserSession::connect(&config, &credentials)?;

    let report = run_export(&session, &config)?;
    let counters = report.counters;

    println!("{}", "📦 Export finished".bold());
    println!("  Visited: {}", counters.total());
    println!("  Saved:   {}", counters.saved.to_string().green());
    println!("  Skipped: {}", counters.skipped.to_string().cyan());
    println!(
        "  Errors:  {}",
        if counters.errored == 0 {
            counters.errored.to_string().normal()
        } else {
            counters.errored.to_string().red()
        }
    );
    println!("  Output:  {}", report.output_dir.display());

    if counters.errored > 0 {
        println!();
        println!("💡 Run the export again to retry failed conversations.");
    }

    Ok(())
}

/// Diagnose command.
fn cmd_diagnose(mut config: AppConfig, session_args: SessionArgs) -> domain::Result<()> {
    let credentials = session_args.apply(&mut config);
    let session = BrowserSession::connect(&config, &credentials)?;

    let report = diagnose(&session, &config)?;
    println!("{}", format_report(&report));

    Ok(())
}

/// Write the default config file.
fn cmd_init_config(path: &std::path::Path) -> domain::Result<()> {
    if ensure_config_exists(path)? {
        println!("{} Created {}", "✓".green().bold(), path.display());
    } else {
        println!("{} Config already exists: {}", "•".yellow(), path.display());
    }
    Ok(())
}

/// Show resolved paths.
fn cmd_paths(config: &AppConfig, config_path: &std::path::Path) {
    let exists = if config_path.exists() {
        "found".green()
    } else {
        "missing, using defaults".yellow()
    };

    println!("{}", "📂 chat-offboard paths".bold());
    println!();
    println!("  Config:        {} [{}]", config_path.display(), exists);
    println!("  Output:        {}", config.export.output_dir.display());
    println!(
        "  Local storage: {}",
        config
            .session
            .local_storage_db
            .as_ref()
            .map_or_else(|| "-".to_string(), |p| p.display().to_string())
    );
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
