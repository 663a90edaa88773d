//! journal-mcp: MCP server exposing a personal journal to AI assistants
//!
//! Speaks the Model Context Protocol over stdio: journal entries and tags
//! as tools and resources, tag suggestions via prompts and sampling.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use journal_mcp::config;
use journal_mcp::journal;
use journal_mcp::mcp::server::McpServer;
use journal_mcp::mcp::transport::StdioTransport;
use journal_mcp::store::JournalStore;

/// MCP server exposing a personal journal to AI assistants.
///
/// Provides entry and tag CRUD tools, `journal://` resources, and a
/// tag-suggestion prompt over a local SQLite database.
#[derive(Parser, Debug)]
#[command(name = "journal-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Path to the journal database (overrides the configured path)
    #[arg(short, long, value_name = "DB_FILE")]
    database: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN, // Default to warn for unknown levels
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
///
/// Logs go to stderr; stdout belongs to the protocol.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Entry point for the journal-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if config_path.is_none() {
                if let Some(default_path) = config::default_config_path() {
                    eprintln!("\nExpected config at: {}", default_path.display());
                }
            }
            return ExitCode::FAILURE;
        }
    };

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting journal-mcp server"
    );

    // Resolve the database location: CLI flag, then config, then default.
    let db_path = args
        .database
        .or(cfg.database_path)
        .or_else(config::default_database_path);
    let Some(db_path) = db_path else {
        error!("Cannot determine a database path (no home directory?)");
        return ExitCode::FAILURE;
    };

    if let Some(parent) = db_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            error!(path = %parent.display(), error = %e, "Failed to create database directory");
            return ExitCode::FAILURE;
        }
    }

    let store = match JournalStore::open(&db_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(path = %db_path.display(), error = %e, "Failed to open journal database");
            return ExitCode::FAILURE;
        }
    };

    info!(database = %db_path.display(), "Journal database ready");

    let registry = match journal::build_registry() {
        Ok(registry) => registry,
        Err(e) => {
            error!(error = %e, "Failed to build capability registry");
            return ExitCode::FAILURE;
        }
    };

    let mut server = McpServer::new(StdioTransport::new(), registry, store);

    info!("MCP server ready, waiting for client connection...");

    // Run the server
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(server.run());

    match result {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
