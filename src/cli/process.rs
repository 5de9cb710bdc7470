use std::{collections::HashSet, fs, path::PathBuf};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use shall::{
    domain::DocumentStatus,
    extraction::{Input, PageBoundaries},
    storage::DocumentRecord,
    DocumentId, Workspace,
};
use tracing::instrument;

use super::{
    parse_document_id,
    terminal::{is_interactive, Colorize},
    OutputFormat,
};

#[derive(Debug, clap::Parser)]
pub struct Process {
    /// Text files extracted from solicitation documents
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Document id to use instead of the file stem (single file only)
    #[arg(long, value_parser = parse_document_id)]
    id: Option<DocumentId>,

    /// Byte offsets at which each page starts, beginning with 0 (single file
    /// only). Without this, page markers in the text are used.
    #[arg(long, value_delimiter = ',')]
    page_offsets: Vec<usize>,

    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Process {
    #[instrument(skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        if self.files.len() > 1 && (self.id.is_some() || !self.page_offsets.is_empty()) {
            anyhow::bail!("--id and --page-offsets can only be used with a single file");
        }

        let workspace = Workspace::open(root)?;
        let pipeline = workspace.pipeline()?;

        let mut seen = HashSet::new();
        let mut inputs = Vec::with_capacity(self.files.len());
        for path in &self.files {
            let raw_text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let document = match &self.id {
                Some(id) => id.clone(),
                None => {
                    let stem = path
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    DocumentId::from_stem(&stem)
                        .with_context(|| format!("no document id for {}", path.display()))?
                }
            };
            if !seen.insert(document.clone()) {
                anyhow::bail!("more than one file maps to document id {document}");
            }

            let title = path
                .file_name()
                .map_or_else(|| document.to_string(), |n| n.to_string_lossy().into_owned());
            let boundaries = if self.page_offsets.is_empty() {
                PageBoundaries::detect()
            } else {
                PageBoundaries::explicit(self.page_offsets.clone())
            };

            workspace.begin(&document, &title)?;
            inputs.push(Input {
                document,
                raw_text,
                boundaries,
            });
        }

        let bar = progress_bar(inputs.len())?;
        let results = pipeline.process_all(inputs, |document| {
            bar.set_message(document.to_string());
            bar.inc(1);
        });
        bar.finish_and_clear();

        let records = results
            .into_iter()
            .map(|(document, result)| workspace.finish(&document, result))
            .collect::<Result<Vec<_>, _>>()?;

        match self.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
            OutputFormat::Table => Self::output_table(&records),
        }

        let failed = records
            .iter()
            .filter(|r| r.status == DocumentStatus::Error)
            .count();
        if failed > 0 {
            anyhow::bail!("{failed} of {} documents failed", records.len());
        }
        Ok(())
    }

    fn output_table(records: &[DocumentRecord]) {
        println!(
            "{:<24} {:<20} {:>5} {:>6} {:>12} {:>5}",
            "DOCUMENT", "STATUS", "PAGES", "CHUNKS", "REQUIREMENTS", "REFS"
        );
        for record in records {
            let status = format!("{:<20}", record.status.as_str());
            let status = match record.status {
                DocumentStatus::Error => status.error(),
                _ => status.success(),
            };
            println!(
                "{:<24} {status} {:>5} {:>6} {:>12} {:>5}",
                record.id.as_str(),
                record.pages,
                record.chunks,
                record.requirements,
                record.cross_references
            );
            if let Some(error) = &record.error {
                println!("  {}", error.error());
            }
            for warning in &record.warnings {
                println!("  {}", format!("warning: {warning}").warning());
            }
        }
    }
}

fn progress_bar(len: usize) -> anyhow::Result<ProgressBar> {
    if len < 2 || !is_interactive() {
        return Ok(ProgressBar::hidden());
    }
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );
    Ok(bar)
}
