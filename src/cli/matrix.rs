use std::path::PathBuf;

use shall::{storage::ComplianceMatrix, DocumentId, Workspace};
use tracing::instrument;

use super::{
    parse_document_id,
    terminal::{self, text_width, truncate, Colorize},
    OutputFormat,
};

#[derive(Debug, clap::Parser)]
pub struct Matrix {
    /// The document
    #[arg(value_parser = parse_document_id)]
    document: DocumentId,

    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Matrix {
    #[instrument(skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let workspace = Workspace::open(root)?;
        let matrix = workspace.compliance_matrix(&self.document)?;

        match self.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&matrix)?),
            OutputFormat::Table => Self::output_table(&matrix),
        }
        Ok(())
    }

    fn output_table(matrix: &ComplianceMatrix) {
        println!("Compliance matrix: {} ({})", matrix.title, matrix.document);
        println!();

        if matrix.items.is_empty() {
            println!("No requirements were extracted from this document.");
            return;
        }

        println!(
            "{:>4}  {:<12}  {:<23}  {:<18}  REQUIREMENT",
            "PAGE", "SECTION", "CLASSIFICATION", "STATUS"
        );
        let width = text_width(4 + 12 + 23 + 18 + 8);
        for item in &matrix.items {
            let section = item
                .subsection
                .as_deref()
                .or(item.section.as_deref())
                .unwrap_or("-");
            println!(
                "{:>4}  {:<12}  {:<23}  {}  {}",
                item.page.map_or_else(|| "-".to_string(), |p| p.to_string()),
                truncate(section, 12),
                item.classification.as_str(),
                terminal::status(item.status, 18),
                truncate(&item.text, width)
            );
            if !item.cross_references.is_empty() {
                let references = format!("refs: {}", item.cross_references.join("; "));
                println!("{:>66}{}", "", truncate(&references, width).dim());
            }
        }

        println!();
        println!(
            "{} requirements: {} validated, {} pending",
            matrix.total,
            matrix.validated.to_string().success(),
            matrix.pending.to_string().warning()
        );
    }
}
