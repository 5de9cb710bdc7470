use std::path::PathBuf;

use shall::{Requirement, Workspace};
use tracing::instrument;
use uuid::Uuid;

use super::{
    terminal::{self, Colorize},
    OutputFormat,
};

#[derive(Debug, clap::Parser)]
pub struct Show {
    /// The requirement to show
    requirement: Uuid,

    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Show {
    #[instrument(skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let workspace = Workspace::open(root)?;
        let requirement = workspace.requirement(self.requirement)?;

        match self.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&requirement)?),
            OutputFormat::Table => Self::output_table(&requirement),
        }
        Ok(())
    }

    fn output_table(requirement: &Requirement) {
        let provenance = requirement.provenance();
        let unknown = || "?".to_string();

        println!("{}", requirement.id());
        println!();
        println!("  Status:          {}", terminal::status(requirement.status(), 0));
        println!("  Classification:  {}", requirement.classification());
        println!(
            "  Confidence:      {} ({:.2})",
            terminal::confidence(requirement.confidence(), 0),
            requirement.score()
        );
        println!(
            "  Rule verdict:    {} ({:.2})",
            requirement.baseline().classification,
            requirement.baseline().score
        );
        println!(
            "  Source:          {} page {} paragraph {}",
            requirement.source(),
            provenance.page.map_or_else(unknown, |p| p.to_string()),
            provenance.paragraph.map_or_else(unknown, |p| p.to_string())
        );
        if let Some(section) = &provenance.section {
            let subsection = provenance
                .subsection
                .as_deref()
                .map(|s| format!(" / {s}"))
                .unwrap_or_default();
            println!("  Section:         {section}{subsection}");
        }
        let extraction = requirement.extraction();
        println!(
            "  Extracted by:    {} with catalog {} ({})",
            extraction.scorer,
            extraction.catalog_version,
            &extraction.catalog_fingerprint[..extraction.catalog_fingerprint.len().min(12)]
        );
        println!();
        println!("  {}", requirement.clean_text());
        if requirement.raw_text() != requirement.clean_text() {
            println!("  {}", format!("extracted as: {}", requirement.raw_text()).dim());
        }
        if let Some(notes) = requirement.validation_notes() {
            println!();
            println!("  Notes: {notes}");
        }

        if requirement.history().is_empty() {
            return;
        }
        println!();
        println!("  History:");
        for entry in requirement.history() {
            println!(
                "    {}  {:<8} by {:<16} (was {}, {})",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.action.as_str(),
                entry.actor.as_str(),
                entry.previous_status,
                entry.previous_classification
            );
            if let Some(notes) = &entry.notes {
                println!("      {}", notes.dim());
            }
        }
    }
}
