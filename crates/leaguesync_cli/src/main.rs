//! LeagueSync CLI
//!
//! Command-line tools for the LeagueSync event store.
//!
//! # Commands
//!
//! - `ingest` - Digest-gated ingestion of a JSON snapshot file
//! - `query` - List stored events, newest first
//! - `history` - Show the field-level history of one entity
//! - `digest` - Show the stored digest tree of a batch type
//! - `teams` - Render the team summary view

mod commands;
mod league;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// LeagueSync command-line tools.
#[derive(Parser)]
#[command(name = "leaguesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the document store and persisted views
    #[arg(global = true, short, long, default_value = "./leaguesync-data")]
    data_dir: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a JSON array of entities, writing only changed ones
    Ingest {
        /// Subject key (e.g. league id)
        #[arg(short, long)]
        subject: String,

        /// Event type (e.g. TEAMS)
        #[arg(short, long)]
        event_type: String,

        /// Field holding each entity's id
        #[arg(short, long)]
        id_field: String,

        /// JSON file containing an array of objects
        file: PathBuf,
    },

    /// List stored events, newest first
    Query {
        /// Subject key
        #[arg(short, long)]
        subject: String,

        /// Event type
        #[arg(short, long)]
        event_type: String,

        /// Only events stored after this RFC 3339 time
        #[arg(short, long)]
        after: Option<String>,

        /// Equality filter as field=value (repeatable)
        #[arg(short, long)]
        filter: Vec<String>,

        /// Maximum number of events
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show the field-level history of one entity
    History {
        /// Subject key
        #[arg(short, long)]
        subject: String,

        /// Event type
        #[arg(short, long)]
        event_type: String,

        /// Entity id
        #[arg(long)]
        id: String,
    },

    /// Show the stored digest tree of a batch type
    Digest {
        /// Subject key
        #[arg(short, long)]
        subject: String,

        /// Batch (event) type
        #[arg(short, long)]
        event_type: String,
    },

    /// Render the team summary view
    Teams {
        /// Subject key
        #[arg(short, long)]
        subject: String,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Ingest {
            subject,
            event_type,
            id_field,
            file,
        } => {
            let ctx = commands::Context::open(&cli.data_dir).await?;
            commands::ingest::run(&ctx, &subject, &event_type, &id_field, &file).await?;
        }
        Commands::Query {
            subject,
            event_type,
            after,
            filter,
            limit,
            format,
        } => {
            let ctx = commands::Context::open(&cli.data_dir).await?;
            let query = commands::query::build_query(after.as_deref(), &filter, limit)?;
            commands::query::run(&ctx, &subject, &event_type, &query, &format).await?;
        }
        Commands::History {
            subject,
            event_type,
            id,
        } => {
            let ctx = commands::Context::open(&cli.data_dir).await?;
            commands::history::run(&ctx, &subject, &event_type, &id).await?;
        }
        Commands::Digest {
            subject,
            event_type,
        } => {
            let ctx = commands::Context::open(&cli.data_dir).await?;
            commands::digest::run(&ctx, &subject, &event_type).await?;
        }
        Commands::Teams { subject, format } => {
            let ctx = commands::Context::open(&cli.data_dir).await?;
            commands::teams::run(&ctx, &subject, &format).await?;
        }
        Commands::Version => {
            println!("LeagueSync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
