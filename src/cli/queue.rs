use std::path::PathBuf;

use serde_json::json;
use shall::{
    storage::{QueuePage, QueueQuery},
    Classification, Confidence, DocumentId, Workspace,
};
use tracing::instrument;

use super::{
    parse_document_id,
    terminal::{self, text_width, truncate, Colorize},
    OutputFormat,
};

#[derive(Debug, clap::Parser)]
pub struct Queue {
    /// Only show requirements in this confidence bucket (low, medium, high)
    #[arg(long)]
    confidence: Option<Confidence>,

    /// Only show requirements with this classification
    #[arg(long)]
    classification: Option<Classification>,

    /// Only show requirements from this document
    #[arg(long, value_parser = parse_document_id)]
    document: Option<DocumentId>,

    /// Number of items to skip
    #[arg(long, default_value_t = 0)]
    skip: usize,

    /// Page size, 1 to 100 (defaults to the workspace setting)
    #[arg(long)]
    limit: Option<usize>,

    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Queue {
    #[instrument(skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let workspace = Workspace::open(root)?;

        let limit = self.limit.unwrap_or_else(|| workspace.config().page_size());
        let mut query = QueueQuery::new(limit)?.skip(self.skip);
        if let Some(confidence) = self.confidence {
            query = query.confidence(confidence);
        }
        if let Some(classification) = self.classification {
            query = query.classification(classification);
        }
        if let Some(document) = self.document {
            query = query.document(document);
        }

        let page = workspace.review_queue(&query)?;

        match self.output {
            OutputFormat::Json => Self::output_json(&page)?,
            OutputFormat::Table => Self::output_table(&page),
        }
        Ok(())
    }

    fn output_json(page: &QueuePage) -> anyhow::Result<()> {
        let output = json!({
            "items": page.items,
            "total": page.total,
            "page": page.page(),
            "page_size": page.limit,
            "has_more": page.has_more,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    fn output_table(page: &QueuePage) {
        if page.total == 0 {
            println!("{}", "Nothing awaiting review.".success());
            return;
        }

        println!(
            "{:<36}  {:<6}  {:<23}  {:<16}  TEXT",
            "ID", "CONF", "CLASSIFICATION", "SOURCE"
        );
        let width = text_width(36 + 6 + 23 + 16 + 8 + 6);
        for requirement in &page.items {
            println!(
                "{:<36}  {}  {:<23}  {:<16}  {}",
                requirement.id(),
                terminal::confidence(requirement.confidence(), 6),
                requirement.classification().as_str(),
                requirement.source().to_string(),
                truncate(requirement.clean_text(), width)
            );
        }

        let shown_to = page.skip + page.items.len();
        println!();
        let footer = format!(
            "Showing {}-{} of {} (page {})",
            (page.skip + 1).min(shown_to),
            shown_to,
            page.total,
            page.page()
        );
        println!("{}", footer.dim());
        if page.has_more {
            println!(
                "{}",
                format!("Next page: shall queue --skip {}", shown_to).dim()
            );
        }
    }
}
