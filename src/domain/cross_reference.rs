use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{ChunkRef, Confidence};

/// What kind of location a cross-reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// An attachment, exhibit, appendix or annex.
    Attachment,
    /// A section or numbered paragraph of the solicitation.
    Section,
    /// A FAR or DFARS clause.
    Clause,
    /// Proposal preparation instructions (usually Section L).
    Instruction,
}

impl ReferenceKind {
    /// The lower-case name used in records and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Attachment => "attachment",
            Self::Section => "section",
            Self::Clause => "clause",
            Self::Instruction => "instruction",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a cross-reference resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ReferenceTarget {
    /// A chunk in the same document as the requirement.
    SameDocument {
        /// The target chunk.
        chunk: ChunkRef,
    },
    /// Outside the document (for example a separately issued attachment),
    /// or not locatable within it.
    CrossDocument,
}

/// A link from a requirement to another location it cites, such as
/// "See Attachment 3".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReference {
    requirement: Uuid,
    source: ChunkRef,
    target: ReferenceTarget,
    kind: ReferenceKind,
    text: String,
    resolved_target: String,
    confidence: Confidence,
}

/// Error returned when a same-document target lies in another document.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error(
    "requirement {requirement}: reference target {target} is not in document {}; mark it as \
     cross-document instead",
    .origin.document
)]
pub struct ForeignTargetError {
    requirement: Uuid,
    origin: ChunkRef,
    target: ChunkRef,
}

impl CrossReference {
    /// A reference resolved to a chunk in the requirement's own document.
    ///
    /// # Errors
    ///
    /// Returns [`ForeignTargetError`] if `target` belongs to a different
    /// document than `source`.
    pub fn within_document(
        requirement: Uuid,
        source: ChunkRef,
        target: ChunkRef,
        kind: ReferenceKind,
        text: String,
        resolved_target: String,
        confidence: Confidence,
    ) -> Result<Self, ForeignTargetError> {
        if target.document != source.document {
            return Err(ForeignTargetError {
                requirement,
                origin: source,
                target,
            });
        }
        Ok(Self {
            requirement,
            source,
            target: ReferenceTarget::SameDocument { chunk: target },
            kind,
            text,
            resolved_target,
            confidence,
        })
    }

    /// A reference explicitly marked as pointing outside the document.
    #[must_use]
    pub const fn cross_document(
        requirement: Uuid,
        source: ChunkRef,
        kind: ReferenceKind,
        text: String,
        resolved_target: String,
        confidence: Confidence,
    ) -> Self {
        Self {
            requirement,
            source,
            target: ReferenceTarget::CrossDocument,
            kind,
            text,
            resolved_target,
            confidence,
        }
    }

    /// The citing requirement.
    #[must_use]
    pub const fn requirement(&self) -> Uuid {
        self.requirement
    }

    /// The chunk the citing requirement came from.
    #[must_use]
    pub const fn source(&self) -> &ChunkRef {
        &self.source
    }

    /// Where the reference resolved to.
    #[must_use]
    pub const fn target(&self) -> &ReferenceTarget {
        &self.target
    }

    /// The kind of location referenced.
    #[must_use]
    pub const fn kind(&self) -> ReferenceKind {
        self.kind
    }

    /// The matched reference text, e.g. `See Attachment 3`.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Best-guess identifier of the target, e.g. `Attachment 3`.
    #[must_use]
    pub fn resolved_target(&self) -> &str {
        &self.resolved_target
    }

    /// How confident the resolution is.
    #[must_use]
    pub const fn confidence(&self) -> Confidence {
        self.confidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DocumentId;

    fn chunk(document: &str, index: u32) -> ChunkRef {
        ChunkRef {
            document: DocumentId::new(document.to_string()).unwrap(),
            index,
        }
    }

    #[test]
    fn same_document_target_is_accepted() {
        let reference = CrossReference::within_document(
            Uuid::new_v4(),
            chunk("rfp", 2),
            chunk("rfp", 9),
            ReferenceKind::Section,
            "Section M".to_string(),
            "Section M".to_string(),
            Confidence::High,
        )
        .unwrap();
        assert_eq!(
            reference.target(),
            &ReferenceTarget::SameDocument {
                chunk: chunk("rfp", 9)
            }
        );
    }

    #[test]
    fn foreign_target_is_rejected() {
        let result = CrossReference::within_document(
            Uuid::new_v4(),
            chunk("rfp", 2),
            chunk("other", 0),
            ReferenceKind::Attachment,
            "Attachment 3".to_string(),
            "Attachment 3".to_string(),
            Confidence::Medium,
        );
        let error = result.unwrap_err();
        assert!(error.to_string().contains("cross-document"));
    }
}
