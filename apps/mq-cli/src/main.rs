//! # mq-cli
//!
//! Command-line interface for the moderation queue.
//!
//! Works on a `.mq/` directory in the project root:
//! - `mq pending` — list changesets awaiting review
//! - `mq show <id>` — field diff for a changeset and its dependents
//! - `mq approve <id>` / `mq reject <id>` — resolve, optionally with `--cascade`
//! - `mq submit <type>` — stage a creation or an edit
//! - `mq entities <type>` / `mq status <type> <id>` — inspect entities

mod commands;
mod project;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mq_changeset::ChangesetId;
use tracing_subscriber::EnvFilter;

use crate::commands::Output;
use crate::project::ProjectLayout;

/// Moderation queue CLI — review and resolve staged changes.
#[derive(Parser)]
#[command(name = "mq", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Print JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    /// Log moderation activity to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List changesets awaiting review.
    Pending {
        /// Only this entity type.
        #[arg(long = "type")]
        entity_type: Option<String>,
    },
    /// Show a changeset with its field diff and dependents.
    Show {
        /// Changeset ID.
        id: ChangesetId,
    },
    /// Approve a changeset and apply it to its entity.
    Approve {
        /// Changeset ID.
        id: ChangesetId,
        #[command(flatten)]
        review: commands::queue::ReviewArgs,
    },
    /// Reject a changeset.
    Reject {
        /// Changeset ID.
        id: ChangesetId,
        #[command(flatten)]
        review: commands::queue::ReviewArgs,
    },
    /// Submit a new entity or an edit for moderation.
    Submit(commands::submit::SubmitArgs),
    /// List entities of a type.
    Entities {
        /// Entity type.
        entity_type: String,
        /// Include entities whose creation is still awaiting review.
        #[arg(long)]
        all: bool,
    },
    /// Show the moderation status of one entity.
    Status {
        /// Entity type.
        entity_type: String,
        /// Entity ID.
        id: u64,
    },
}

fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "info" } else { "warn" };
    // Logs go to stderr so --json output on stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("mq_changeset={}", level).parse()?)
                .add_directive(format!("mq_registry={}", level).parse()?)
                .add_directive(format!("mq_moderation={}", level).parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let layout = ProjectLayout::for_project(&project_root);
    let output = Output { json: cli.json };

    match &cli.command {
        Commands::Pending { entity_type } => {
            commands::queue::pending(&layout, entity_type.as_deref(), output)
        }
        Commands::Show { id } => commands::queue::show(&layout, *id, output),
        Commands::Approve { id, review } => {
            commands::queue::resolve(&layout, *id, commands::queue::Decision::Approve, review, output)
        }
        Commands::Reject { id, review } => {
            commands::queue::resolve(&layout, *id, commands::queue::Decision::Reject, review, output)
        }
        Commands::Submit(args) => commands::submit::execute(&layout, args, output),
        Commands::Entities { entity_type, all } => {
            commands::entities::list(&layout, entity_type, *all, output)
        }
        Commands::Status { entity_type, id } => {
            commands::entities::status(&layout, entity_type, *id, output)
        }
    }
}
