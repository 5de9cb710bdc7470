use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    history::{History, HistoryEntry, Snapshot},
    validation::{ActionKind, Actor, Transition, ValidationAction, ValidationError, ValidationWarning},
    ChunkRef, Classification, Confidence, DocumentId, Provenance, Verdict,
};

/// Review status of a requirement.
///
/// Every requirement starts as `AiExtracted`. The other states are reached
/// through [`ValidationAction`]s and none of them is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Produced by the extraction pipeline and not yet reviewed.
    AiExtracted,
    /// Approved by a reviewer as extracted.
    HumanValidated,
    /// Text and/or classification corrected by a reviewer.
    HumanCorrected,
    /// Marked by a reviewer as needing further attention.
    FlaggedForReview,
}

impl Status {
    /// The `snake_case` name used in records and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AiExtracted => "ai_extracted",
            Self::HumanValidated => "human_validated",
            Self::HumanCorrected => "human_corrected",
            Self::FlaggedForReview => "flagged_for_review",
        }
    }

    /// Whether a reviewer has signed off on the requirement.
    #[must_use]
    pub const fn is_validated(self) -> bool {
        matches!(self, Self::HumanValidated | Self::HumanCorrected)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "ai_extracted" => Ok(Self::AiExtracted),
            "human_validated" => Ok(Self::HumanValidated),
            "human_corrected" => Ok(Self::HumanCorrected),
            "flagged_for_review" => Ok(Self::FlaggedForReview),
            _ => Err(format!(
                "unknown status '{s}': expected ai_extracted, human_validated, human_corrected or \
                 flagged_for_review"
            )),
        }
    }
}

/// Which engine and rule set produced a requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionMethod {
    /// Name of the scorer whose verdict was used.
    pub scorer: String,
    /// Version string of the pattern catalog.
    pub catalog_version: String,
    /// Fingerprint of the pattern catalog.
    pub catalog_fingerprint: String,
}

/// A single contractual obligation extracted from a chunk.
///
/// The extracted fields (`raw_text`, `source`, `baseline`, `extraction`) are
/// fixed at creation. The reviewable fields (`status`, `clean_text`,
/// `classification`) change only through [`Requirement::apply`], which
/// records the previous values in the history first.
///
/// Serializes for output only. Persisted records go through the storage
/// layer's versioned format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Requirement {
    pub(crate) id: Uuid,
    pub(crate) source: ChunkRef,
    pub(crate) ordinal: u32,
    pub(crate) provenance: Provenance,
    pub(crate) raw_text: String,
    pub(crate) clean_text: String,
    pub(crate) classification: Classification,
    pub(crate) score: f64,
    pub(crate) confidence: Confidence,
    pub(crate) baseline: Verdict,
    pub(crate) extraction: ExtractionMethod,
    pub(crate) status: Status,
    pub(crate) validation_notes: Option<String>,
    pub(crate) history: History,
    pub(crate) validated_by: Option<Actor>,
    pub(crate) validated_at: Option<DateTime<Utc>>,
    pub(crate) created: DateTime<Utc>,
}

/// Everything the assembler knows about a new requirement.
#[derive(Debug, Clone)]
pub(crate) struct Extracted {
    pub source: ChunkRef,
    pub ordinal: u32,
    pub provenance: Provenance,
    pub raw_text: String,
    pub clean_text: String,
    pub verdict: Verdict,
    pub baseline: Verdict,
    pub extraction: ExtractionMethod,
}

impl Requirement {
    /// A freshly extracted requirement with a new UUID.
    pub(crate) fn new(extracted: Extracted) -> Self {
        let Extracted {
            source,
            ordinal,
            provenance,
            raw_text,
            clean_text,
            verdict,
            baseline,
            extraction,
        } = extracted;

        Self {
            id: Uuid::new_v4(),
            source,
            ordinal,
            provenance,
            raw_text,
            clean_text,
            classification: verdict.classification,
            score: verdict.score,
            confidence: verdict.confidence,
            baseline,
            extraction,
            status: Status::AiExtracted,
            validation_notes: None,
            history: History::default(),
            validated_by: None,
            validated_at: None,
            created: Utc::now(),
        }
    }

    /// Globally unique identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The document the requirement was extracted from.
    #[must_use]
    pub const fn document(&self) -> &DocumentId {
        &self.source.document
    }

    /// The chunk the requirement was extracted from.
    #[must_use]
    pub const fn source(&self) -> &ChunkRef {
        &self.source
    }

    /// Position of the requirement among those extracted from its chunk.
    #[must_use]
    pub const fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Page, paragraph and section labels of the source chunk.
    #[must_use]
    pub const fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// The verbatim extracted span.
    #[must_use]
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// The human-editable text.
    #[must_use]
    pub fn clean_text(&self) -> &str {
        &self.clean_text
    }

    /// Current classification.
    #[must_use]
    pub const fn classification(&self) -> Classification {
        self.classification
    }

    /// Extraction confidence bucket.
    #[must_use]
    pub const fn confidence(&self) -> Confidence {
        self.confidence
    }

    /// The normalised score the confidence bucket was derived from.
    #[must_use]
    pub const fn score(&self) -> f64 {
        self.score
    }

    /// The rule-based verdict, kept even when an external scorer was used.
    #[must_use]
    pub const fn baseline(&self) -> &Verdict {
        &self.baseline
    }

    /// Which scorer and catalog produced the requirement.
    #[must_use]
    pub const fn extraction(&self) -> &ExtractionMethod {
        &self.extraction
    }

    /// Current review status.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Notes left by the most recent reviewer who supplied any.
    #[must_use]
    pub fn validation_notes(&self) -> Option<&str> {
        self.validation_notes.as_deref()
    }

    /// The audit history.
    #[must_use]
    pub const fn history(&self) -> &History {
        &self.history
    }

    /// The actor of the most recent action.
    #[must_use]
    pub const fn validated_by(&self) -> Option<&Actor> {
        self.validated_by.as_ref()
    }

    /// When the most recent action was applied.
    #[must_use]
    pub const fn validated_at(&self) -> Option<DateTime<Utc>> {
        self.validated_at
    }

    /// When the requirement was extracted.
    #[must_use]
    pub const fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Number of actions applied so far.
    ///
    /// Used as an optimistic-concurrency token: a writer that read revision
    /// `n` may only write if the stored requirement is still at `n`.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.history.len() as u64
    }

    /// The current reviewable state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            status: self.status,
            clean_text: self.clean_text.clone(),
            classification: self.classification,
        }
    }

    /// Apply a reviewer action.
    ///
    /// The action is checked in full before anything changes. On success a
    /// history entry holding the previous status, clean text and
    /// classification is appended, then the new values are applied and
    /// `validated_by` / `validated_at` are overwritten.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the requirement untouched, if `approve`
    /// carries replacement values or `correct` carries blank text.
    pub fn apply(
        &mut self,
        action: &ValidationAction,
        at: DateTime<Utc>,
    ) -> Result<Transition, ValidationError> {
        action.check(self.id)?;

        let from = self.status;
        self.history.append(HistoryEntry {
            timestamp: at,
            action: action.kind,
            actor: action.actor.clone(),
            previous_status: self.status,
            previous_clean_text: self.clean_text.clone(),
            previous_classification: self.classification,
            notes: action.notes().map(str::to_string),
        });

        let mut warnings = Vec::new();
        match action.kind {
            ActionKind::Approve => {}
            ActionKind::Correct => {
                if let Some(clean_text) = &action.clean_text {
                    self.clean_text.clone_from(clean_text);
                }
                if let Some(classification) = action.classification {
                    self.classification = classification;
                }
            }
            ActionKind::Flag => {
                if action.notes().is_none() {
                    let warning = ValidationWarning::EmptyFlagNotes {
                        requirement: self.id,
                    };
                    tracing::warn!("{warning}");
                    warnings.push(warning);
                }
            }
        }

        if let Some(notes) = action.notes() {
            self.validation_notes = Some(notes.to_string());
        }
        self.status = action.kind.target_status();
        self.validated_by = Some(action.actor.clone());
        self.validated_at = Some(at);

        tracing::debug!(
            "requirement {}: {} by {} ({} -> {})",
            self.id,
            action.kind,
            action.actor,
            from,
            self.status
        );

        Ok(Transition {
            from,
            to: self.status,
            warnings,
        })
    }
}
