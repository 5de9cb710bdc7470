use std::path::PathBuf;

mod classify;
mod matrix;
mod process;
mod queue;
mod reembed;
mod review;
mod search;
mod show;
mod status;
mod terminal;

use clap::ArgAction;
use classify::Classify;
use matrix::Matrix;
use process::Process;
use queue::Queue;
use reembed::Reembed;
use review::Review;
use search::Search;
use shall::{Config, DocumentId, Workspace};
use show::Show;
use status::Status;
use tracing::instrument;

/// Parse a document id at the CLI boundary.
fn parse_document_id(s: &str) -> Result<DocumentId, String> {
    s.parse().map_err(|e| format!("{e}"))
}

/// Output format shared by the listing commands.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The path to the root of the workspace
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        self.command
            .unwrap_or_else(|| Command::Status(Status::default()))
            .run(self.root)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Show workspace or document statistics (default)
    Status(Status),

    /// Initialize a new workspace
    Init,

    /// Extract requirements from text files
    Process(Process),

    /// List requirements awaiting review, lowest confidence first
    Queue(Queue),

    /// Approve, correct or flag a requirement
    Review(Review),

    /// Show a requirement with its audit history
    Show(Show),

    /// Print the compliance matrix of a document
    Matrix(Matrix),

    /// Search requirement text
    Search(Search),

    /// Classify a sentence and explain the verdict
    Classify(Classify),

    /// Recompute chunk embeddings with the configured embedder
    Reembed(Reembed),
}

impl Command {
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        match self {
            Self::Status(command) => command.run(root)?,
            Self::Init => Init::run(root)?,
            Self::Process(command) => command.run(root)?,
            Self::Queue(command) => command.run(root)?,
            Self::Review(command) => command.run(root)?,
            Self::Show(command) => command.run(root)?,
            Self::Matrix(command) => command.run(root)?,
            Self::Search(command) => command.run(root)?,
            Self::Classify(command) => command.run(root)?,
            Self::Reembed(command) => command.run(root)?,
        }
        Ok(())
    }
}

struct Init;

impl Init {
    #[instrument]
    fn run(root: PathBuf) -> anyhow::Result<()> {
        let workspace = Workspace::init(root, Config::default())?;

        println!(
            "Initialized workspace in {}",
            workspace.root().display()
        );
        println!("  Created: .shall/config.toml");
        println!("  Created: documents/");
        println!();
        println!("Next steps:");
        println!("  shall process solicitation.txt");
        println!("  shall queue");

        Ok(())
    }
}
