mod commands;
mod context;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use context::AppContext;

#[derive(Debug, Parser)]
#[command(name = "memory-system", version, about = "Local-first conversational memory engine")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract memories from a transcript and write them to the store.
    Consolidate {
        #[arg(long)]
        project: String,
        #[arg(long)]
        session: Option<String>,
        #[arg(long)]
        transcript: String,
    },
    /// Hybrid BM25 + semantic search over stored memories.
    Search {
        query: String,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long = "min-importance")]
        min_importance: Option<f64>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Spaced-repetition review queue.
    Review {
        #[command(subcommand)]
        command: ReviewCommands,
    },
    /// Daily decay, archival, health and weekly promotion maintenance jobs.
    Maintenance {
        #[command(subcommand)]
        command: MaintenanceCommands,
    },
    /// Weekly freshness review: scan stale memories and optionally act on them.
    Freshness {
        /// Report categorized candidates only (default).
        #[arg(long, conflicts_with_all = ["refresh", "archive"])]
        scan: bool,
        /// Reinforce every refresh-candidate.
        #[arg(long, conflicts_with_all = ["scan", "archive"])]
        refresh: bool,
        /// Archive every archive-candidate.
        #[arg(long, conflicts_with_all = ["scan", "refresh"])]
        archive: bool,
    },
    /// Relationship and contradiction graph management.
    Relate {
        #[command(subcommand)]
        command: RelateCommands,
    },
}

#[derive(Debug, Subcommand)]
enum ReviewCommands {
    /// List memories currently due for review, ranked by priority.
    Due {
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Record a review grade (FAIL/HARD/GOOD/EASY) for a memory.
    Grade { memory_id: String, grade: String },
}

#[derive(Debug, Subcommand)]
enum MaintenanceCommands {
    Daily {
        #[arg(long)]
        dry_run: bool,
    },
    Weekly {
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Debug, Subcommand)]
enum RelateCommands {
    Add {
        from: String,
        to: String,
        #[arg(long = "type")]
        edge_type: String,
        #[arg(long, default_value_t = 1.0)]
        strength: f64,
        #[arg(long, default_value = "")]
        evidence: String,
    },
    Chain { from: String, to: String },
    Contradictions { memory_id: String },
    /// Outgoing/incoming/both edges for a memory, optionally filtered by
    /// type and minimum strength.
    Edges {
        memory_id: String,
        #[arg(long, default_value = "both")]
        direction: String,
        #[arg(long = "type")]
        edge_type: Option<String>,
        #[arg(long, default_value_t = 0.0)]
        min_strength: f64,
    },
    /// Global edge counts by type and average strength.
    Stats,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(err.exit_code());
    }
}

fn run() -> memory_core::error::MemoryResult<()> {
    let cli = Cli::parse();
    let ctx = AppContext::load()?;

    match cli.command.unwrap_or(Commands::Review { command: ReviewCommands::Due { project: None, limit: None } }) {
        Commands::Consolidate { project, session, transcript } => {
            commands::consolidate::run(&ctx, &project, session.as_deref(), &transcript)
        }
        Commands::Search { query, project, tag, min_importance, limit } => {
            commands::search::run(&ctx, &query, project.as_deref(), tag.as_deref(), min_importance, limit)
        }
        Commands::Review { command } => match command {
            ReviewCommands::Due { project, limit } => commands::review::due(&ctx, project.as_deref(), limit),
            ReviewCommands::Grade { memory_id, grade } => commands::review::grade(&ctx, &memory_id, &grade),
        },
        Commands::Maintenance { command } => match command {
            MaintenanceCommands::Daily { dry_run } => commands::maintenance::daily(&ctx, dry_run),
            MaintenanceCommands::Weekly { dry_run } => commands::maintenance::weekly(&ctx, dry_run),
        },
        Commands::Freshness { scan: _, refresh, archive } => {
            let mode = if archive {
                commands::freshness::FreshnessMode::Archive
            } else if refresh {
                commands::freshness::FreshnessMode::Refresh
            } else {
                commands::freshness::FreshnessMode::Scan
            };
            commands::freshness::run(&ctx, mode)
        }
        Commands::Relate { command } => match command {
            RelateCommands::Add { from, to, edge_type, strength, evidence } => {
                commands::relate::add(&ctx, &from, &to, &edge_type, strength, &evidence)
            }
            RelateCommands::Chain { from, to } => commands::relate::chain(&ctx, &from, &to),
            RelateCommands::Contradictions { memory_id } => commands::relate::contradictions(&ctx, &memory_id),
            RelateCommands::Edges { memory_id, direction, edge_type, min_strength } => {
                commands::relate::edges(&ctx, &memory_id, &direction, edge_type.as_deref(), min_strength)
            }
            RelateCommands::Stats => commands::relate::stats(&ctx),
        },
    }
}
