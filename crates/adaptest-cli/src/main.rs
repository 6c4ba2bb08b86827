//! adaptest CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "adaptest", version, about = "Adaptive testing and validity analysis")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate adaptive sessions against an item pool
    Simulate {
        /// Path to .toml item pool file
        #[arg(long)]
        pool: PathBuf,

        /// Number of synthetic respondents
        #[arg(long, default_value = "20")]
        respondents: usize,

        /// RNG seed for reproducible runs
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Write the full summary as JSON to this path
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compute (or recompute) the validity assessment of a session
    Assess {
        /// SQLite database path
        #[arg(long, default_value = "./adaptest.db")]
        db: PathBuf,

        /// Session id
        #[arg(long)]
        session: uuid::Uuid,

        /// Recompute even if an assessment already exists
        #[arg(long)]
        force: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Override the validity status of an assessed session
    Override {
        /// SQLite database path
        #[arg(long, default_value = "./adaptest.db")]
        db: PathBuf,

        /// Session id
        #[arg(long)]
        session: uuid::Uuid,

        /// New status: valid, suspect, invalid, incomplete
        #[arg(long)]
        status: String,

        /// Administrator identifier
        #[arg(long)]
        admin: String,

        /// Justification (at least 10 characters)
        #[arg(long)]
        reason: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Aggregate validity statistics over stored assessments
    Report {
        /// SQLite database path
        #[arg(long, default_value = "./adaptest.db")]
        db: PathBuf,

        /// Only assessments at or after this instant (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,

        /// Only assessments before this instant (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        until: Option<String>,

        /// Only assessments with this status
        #[arg(long)]
        status: Option<String>,

        /// Output format: text, json, markdown, html
        #[arg(long, default_value = "text")]
        format: String,

        /// Write output to this path instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate item pool TOML files
    ValidatePool {
        /// Path to pool file or directory
        #[arg(long)]
        pool: PathBuf,
    },

    /// Create starter config and example item pool
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("adaptest=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Simulate {
            pool,
            respondents,
            seed,
            output,
            config,
        } => commands::simulate::execute(pool, respondents, seed, output, config).await,
        Commands::Assess {
            db,
            session,
            force,
            config,
        } => commands::assess::execute(db, session, force, config).await,
        Commands::Override {
            db,
            session,
            status,
            admin,
            reason,
            config,
        } => commands::override_cmd::execute(db, session, status, admin, reason, config).await,
        Commands::Report {
            db,
            since,
            until,
            status,
            format,
            output,
            config,
        } => commands::report::execute(db, since, until, status, format, output, config).await,
        Commands::ValidatePool { pool } => commands::validate_pool::execute(pool),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
