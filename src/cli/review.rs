use std::path::PathBuf;

use anyhow::Context;
use shall::{Classification, ValidationAction, Workspace};
use tracing::instrument;
use uuid::Uuid;

use super::terminal::Colorize;

#[derive(Debug, clap::Parser)]
pub struct Review {
    /// The requirement to review
    requirement: Uuid,

    /// The action to apply (approve, correct, flag)
    action: String,

    /// Who is reviewing
    #[arg(long = "as", value_name = "ACTOR")]
    actor: String,

    /// Replacement text (correct only)
    #[arg(long)]
    text: Option<String>,

    /// Replacement classification (correct only)
    #[arg(long)]
    classification: Option<Classification>,

    /// Notes to record with the action
    #[arg(long)]
    notes: Option<String>,

    /// Reject the action if the requirement has changed since this revision
    #[arg(long)]
    revision: Option<u64>,
}

impl Review {
    #[instrument(skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let workspace = Workspace::open(root)?;

        let action = ValidationAction::from_parts(
            &self.action,
            &self.actor,
            self.text,
            self.classification,
            self.notes,
        )
        .with_context(|| format!("requirement {}", self.requirement))?;

        let outcome = workspace.apply_validation_action(self.requirement, &action, self.revision)?;

        for warning in &outcome.warnings {
            eprintln!("{}", format!("warning: {warning}").warning());
        }

        let requirement = &outcome.requirement;
        println!(
            "{} {} is now {} (revision {})",
            "✓".success(),
            requirement.id(),
            requirement.status(),
            requirement.revision()
        );
        println!("  {}: {}", requirement.classification(), requirement.clean_text());
        Ok(())
    }
}
