use std::{io, path::PathBuf, sync::Arc};

use serde_json::json;
use shall::{extraction::RuleClassifier, PatternCatalog, Workspace};
use tracing::{debug, instrument};

use super::{terminal::Colorize, OutputFormat};

#[derive(Debug, clap::Parser)]
pub struct Classify {
    /// The sentence to classify. Read from stdin if omitted.
    text: Option<String>,

    /// Section title to apply section hints for
    #[arg(long)]
    section: Option<String>,

    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Classify {
    #[instrument(skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let text = match self.text {
            Some(text) => text,
            None => io::read_to_string(io::stdin())?,
        };
        let text = text.trim();
        anyhow::ensure!(!text.is_empty(), "nothing to classify");

        let catalog = Self::catalog(root)?;
        let indicators = catalog.matching_indicators(text);
        let classifier = RuleClassifier::new(Arc::clone(&catalog));
        let verdict = classifier.classify_in_section(text, self.section.as_deref());

        match self.output {
            OutputFormat::Json => {
                let output = json!({
                    "catalog": {
                        "version": catalog.version(),
                        "fingerprint": catalog.fingerprint(),
                    },
                    "candidate": !indicators.is_empty(),
                    "indicators": indicators,
                    "verdict": verdict,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                println!(
                    "{} ({:.2}, {} confidence)",
                    verdict.verdict.classification,
                    verdict.verdict.score,
                    verdict.verdict.confidence
                );
                if indicators.is_empty() {
                    println!(
                        "{}",
                        "No requirement indicator matched; the pipeline would skip this sentence."
                            .warning()
                    );
                } else {
                    println!("{}", format!("indicators: {}", indicators.join(", ")).dim());
                }
                for score in &verdict.scores {
                    println!();
                    println!("  {:<24} {:.2}", score.classification.as_str(), score.total);
                    for pattern in &score.matched {
                        println!("    {}", pattern.dim());
                    }
                }
                println!();
                println!(
                    "{}",
                    format!("catalog {} ({})", catalog.version(), catalog.fingerprint()).dim()
                );
            }
        }
        Ok(())
    }

    /// The workspace catalog when run inside a workspace, otherwise the
    /// built-in one.
    fn catalog(root: PathBuf) -> anyhow::Result<Arc<PatternCatalog>> {
        if root.join(".shall").is_dir() {
            Ok(Workspace::open(root)?.catalog()?)
        } else {
            debug!("not in a workspace, using the built-in catalog");
            Ok(PatternCatalog::builtin()?)
        }
    }
}
