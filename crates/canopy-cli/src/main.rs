//! Canopy CLI - Inspect group hierarchies and membership resolution.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod seed;

/// Canopy - Nested groups and inherited access
#[derive(Parser, Debug)]
#[command(name = "canopy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Seed file describing users, groups and memberships
    #[arg(short, long, global = true, env = "CANOPY_SEED")]
    seed: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show a user's effective access on a group
    Access {
        /// Full path of the group
        group: String,
        /// Username
        user: String,
    },

    /// List the members of a group
    Members {
        /// Full path of the group
        group: String,
        /// Include members inherited from ancestors
        #[arg(long)]
        with_parents: bool,
        /// List pending access requests instead
        #[arg(long, conflicts_with = "with_parents")]
        requesters: bool,
    },

    /// Show the secret variables a job would receive
    Variables {
        /// Full path of the project
        project: String,
        /// Branch or tag the job runs on
        #[arg(short, long = "ref", default_value = "main")]
        ref_name: String,
        /// Print values instead of masking them
        #[arg(long)]
        reveal: bool,
    },

    /// Search groups by name or path
    Search {
        /// Search query
        query: String,
    },

    /// Check whether a path can be used for a group
    ValidatePath {
        /// Candidate path
        path: String,
        /// Check as a subgroup path
        #[arg(long)]
        nested: bool,
    },

    /// Show version information
    Version,
}

fn load_store(seed_path: Option<&Path>) -> anyhow::Result<canopy_groups::GroupStore> {
    let path = seed_path.context("a seed file is required (--seed or CANOPY_SEED)")?;
    let store = seed::Seed::load(path)
        .and_then(seed::Seed::into_store)
        .with_context(|| format!("loading seed {}", path.display()))?;
    Ok(store)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let seed_path = cli.seed.as_deref();
    let output = match cli.command {
        Commands::Access { group, user } => {
            commands::access(&load_store(seed_path)?, &group, &user)?
        }
        Commands::Members {
            group,
            with_parents,
            requesters,
        } => commands::members(&load_store(seed_path)?, &group, with_parents, requesters)?,
        Commands::Variables {
            project,
            ref_name,
            reveal,
        } => commands::variables(&load_store(seed_path)?, &project, &ref_name, reveal)?,
        Commands::Search { query } => commands::search(&load_store(seed_path)?, &query)?,
        Commands::ValidatePath { path, nested } => commands::validate_path(&path, nested),
        Commands::Version => {
            println!("canopy {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let default_filter = format!("canopy_cli={log_level},canopy_groups={log_level}");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
