//! pathwise CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "pathwise",
    version,
    about = "Personalized learning paths over a concept graph"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where to find the catalog, the ledger and the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Catalog TOML file or directory (overrides config)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Mastery ledger JSON file (overrides config)
    #[arg(long)]
    ledger: Option<PathBuf>,

    /// Config file path
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate catalog TOML files and the prerequisite graph
    Validate {
        /// Path to catalog file or directory
        #[arg(long)]
        catalog: PathBuf,
    },

    /// Show every concept's status for a learner
    Status {
        /// Learner id
        #[arg(long)]
        user: String,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Record a quiz result
    Submit {
        /// Learner id
        #[arg(long)]
        user: String,

        /// Concept the quiz covered
        #[arg(long)]
        concept: String,

        /// Normalized score between 0.0 and 1.0
        #[arg(long)]
        score: f64,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Recommend a learning path towards a goal concept
    Recommend {
        /// Learner id
        #[arg(long)]
        user: String,

        /// Goal concept id
        #[arg(long)]
        goal: String,

        /// Cost policy: uniform, complexity, mastery-weighted (overrides config)
        #[arg(long)]
        policy: Option<String>,

        /// Number of alternative paths to show (overrides config)
        #[arg(long)]
        alternatives: Option<usize>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// List the transitive prerequisites of a concept, earliest first
    Prerequisites {
        /// Concept id
        #[arg(long)]
        concept: String,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Create starter config and example catalog
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pathwise=info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { catalog } => commands::validate::execute(catalog),
        Commands::Status {
            user,
            format,
            store,
        } => commands::status::execute(user, format, store).await,
        Commands::Submit {
            user,
            concept,
            score,
            store,
        } => commands::submit::execute(user, concept, score, store).await,
        Commands::Recommend {
            user,
            goal,
            policy,
            alternatives,
            format,
            store,
        } => commands::recommend::execute(user, goal, policy, alternatives, format, store).await,
        Commands::Prerequisites { concept, store } => {
            commands::prerequisites::execute(concept, store).await
        }
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
