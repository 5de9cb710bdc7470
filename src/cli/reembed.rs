use std::path::PathBuf;

use anyhow::Context;
use dialoguer::Confirm;
use shall::{extraction::embedding, DocumentId, Workspace};
use tracing::instrument;

use super::{
    parse_document_id,
    terminal::{is_interactive, Colorize},
};

#[derive(Debug, clap::Parser)]
pub struct Reembed {
    /// Only re-embed this document
    #[arg(long, value_parser = parse_document_id)]
    document: Option<DocumentId>,

    /// Don't ask for confirmation
    #[arg(long, short)]
    yes: bool,
}

impl Reembed {
    #[instrument(skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let workspace = Workspace::open(root)?;

        let embedder = embedding::from_config(&workspace.config().embedding)?
            .context("embeddings are disabled in .shall/config.toml")?;

        if !self.yes && is_interactive() {
            let scope = self
                .document
                .as_ref()
                .map_or_else(|| "every processed document".to_string(), |d| format!("'{d}'"));
            let proceed = Confirm::new()
                .with_prompt(format!(
                    "Replace the chunk embeddings of {scope} using {}?",
                    embedder.name()
                ))
                .default(false)
                .interact()?;
            if !proceed {
                println!("Cancelled.");
                return Ok(());
            }
        }

        let summary = workspace.reembed(embedder.as_ref(), self.document.as_ref())?;

        let embedded = format!("{}/{}", summary.embedded, summary.chunks);
        let embedded = if summary.embedded == summary.chunks {
            embedded.success()
        } else {
            embedded.warning()
        };
        println!(
            "Re-embedded {embedded} chunks across {} document(s).",
            summary.documents
        );
        if summary.embedded < summary.chunks {
            println!(
                "{}",
                "Some batches failed and were left without embeddings. Run with -v for details."
                    .dim()
            );
        }
        Ok(())
    }
}
