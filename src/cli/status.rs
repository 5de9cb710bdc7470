use std::{collections::BTreeMap, fmt::Display, path::PathBuf, process};

use clap::Parser;
use shall::{
    domain::DocumentStatus,
    storage::{DocumentStats, WorkspaceStats},
    DocumentId, Status as ReviewStatus, Workspace,
};
use tracing::instrument;

use super::{parse_document_id, terminal::Colorize, OutputFormat};

#[derive(Debug, Parser, Default)]
#[command(about = "Show document and requirement counts")]
pub struct Status {
    /// Show counts for a single document
    #[arg(long, value_parser = parse_document_id)]
    document: Option<DocumentId>,

    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,

    /// Suppress headers and format for scripting
    #[arg(long)]
    quiet: bool,
}

impl Status {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let workspace = Workspace::open(root)?;

        if let Some(document) = &self.document {
            let stats = workspace.document_stats(document)?;
            match self.output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
                OutputFormat::Table if self.quiet => {
                    println!(
                        "status={} chunks={} requirements={}",
                        stats.status, stats.chunks, stats.requirements
                    );
                }
                OutputFormat::Table => Self::output_document(&stats),
            }
            if stats.status == DocumentStatus::Error {
                process::exit(2);
            }
            return Ok(());
        }

        let stats = workspace.stats()?;

        if stats.documents == 0 {
            println!("No documents processed yet. Add one with 'shall process <file>'.");
            return Ok(());
        }

        match self.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
            OutputFormat::Table if self.quiet => Self::output_quiet(&stats),
            OutputFormat::Table => Self::output_table(&stats),
        }

        // Non-zero exit when some document needs attention.
        if stats
            .documents_by_status
            .get(&DocumentStatus::Error)
            .is_some_and(|&n| n > 0)
        {
            process::exit(2);
        }

        Ok(())
    }

    fn output_quiet(stats: &WorkspaceStats) {
        let count = |status: ReviewStatus| stats.by_status.get(&status).copied().unwrap_or(0);
        println!(
            "documents={} requirements={} pending={} validated={} flagged={}",
            stats.documents,
            stats.requirements,
            count(ReviewStatus::AiExtracted),
            count(ReviewStatus::HumanValidated) + count(ReviewStatus::HumanCorrected),
            count(ReviewStatus::FlaggedForReview)
        );
    }

    fn output_table(stats: &WorkspaceStats) {
        println!("Documents");
        println!("{}", "─────────".dim());
        print_counts(&stats.documents_by_status);
        println!("{:<24} {}", "Total", stats.documents);
        if let Some(seconds) = stats.average_processing_seconds {
            println!("{}", format!("Average processing time {seconds:.2}s").dim());
        }

        println!();
        println!("Requirements");
        println!("{}", "────────────".dim());
        print_counts(&stats.by_classification);
        println!("{:<24} {}", "Total", stats.requirements);

        println!();
        print_review(&stats.by_status);

        if let Some(errored) = stats.documents_by_status.get(&DocumentStatus::Error) {
            println!();
            println!(
                "{}",
                format!("{errored} document(s) failed. Re-run 'shall process' to retry.").error()
            );
        }
    }

    fn output_document(stats: &DocumentStats) {
        println!("{} ({})", stats.document, stats.status);
        println!(
            "{}",
            format!("{} chunks, {} requirements", stats.chunks, stats.requirements).dim()
        );
        if let Some(seconds) = stats.processing_seconds {
            println!("{}", format!("Processed in {seconds:.2}s").dim());
        }

        if stats.requirements == 0 {
            return;
        }

        println!();
        print_counts(&stats.by_classification);
        println!();
        print_counts(&stats.by_confidence);
        println!();
        print_review(&stats.by_status);
    }
}

fn print_counts<K: Display>(counts: &BTreeMap<K, usize>) {
    for (key, count) in counts {
        println!("{:<24} {count}", key.to_string());
    }
}

fn print_review(by_status: &BTreeMap<ReviewStatus, usize>) {
    let pending = by_status.get(&ReviewStatus::AiExtracted).copied().unwrap_or(0);
    if pending == 0 {
        println!("Awaiting review: {} ✅", "0".success());
    } else {
        println!("Awaiting review: {} ⚠️", pending.to_string().warning());
        println!("{}", "Run 'shall queue' to start reviewing.".dim());
    }
    if let Some(flagged) = by_status.get(&ReviewStatus::FlaggedForReview) {
        println!("Flagged: {}", flagged.to_string().error());
    }
}
