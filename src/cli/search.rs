use std::path::PathBuf;

use shall::{storage::SearchQuery, Classification, DocumentId, Status, Workspace};
use tracing::instrument;

use super::{
    parse_document_id,
    terminal::{self, text_width, truncate},
    OutputFormat,
};

#[derive(Debug, clap::Parser)]
pub struct Search {
    /// Text to look for (case-insensitive)
    text: String,

    /// Only search these documents
    #[arg(long, value_delimiter = ',', value_parser = parse_document_id)]
    document: Vec<DocumentId>,

    /// Only return requirements with these classifications
    #[arg(long, value_delimiter = ',')]
    classification: Vec<Classification>,

    /// Only return requirements in these review states
    #[arg(long, value_delimiter = ',')]
    status: Vec<Status>,

    /// Maximum number of results, 1 to 200
    #[arg(long, default_value_t = 50)]
    limit: usize,

    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Search {
    #[instrument(skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let workspace = Workspace::open(root)?;

        let query = SearchQuery::new(&self.text)?
            .documents(self.document)
            .classifications(self.classification)
            .statuses(self.status)
            .limit(self.limit)?;

        let found = workspace.search(&query)?;

        match self.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&found)?),
            OutputFormat::Table => {
                if found.is_empty() {
                    println!("No requirements matched '{}'.", self.text);
                    return Ok(());
                }
                let width = text_width(36 + 16 + 18 + 6);
                for requirement in &found {
                    println!(
                        "{:<36}  {:<16}  {}  {}",
                        requirement.id(),
                        requirement.source().to_string(),
                        terminal::status(requirement.status(), 18),
                        truncate(requirement.clean_text(), width)
                    );
                }
            }
        }
        Ok(())
    }
}
