//! Detection and resolution of cross-references in requirement text.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::domain::{Chunk, Confidence, CrossReference, ReferenceKind, Requirement};

/// Optional lead-in such as "see" or "in accordance with", included in the
/// matched span.
const LEAD: &str = r"(?:(?:see|refer\s+to|per|pursuant\s+to|in\s+accordance\s+with|as\s+(?:described|specified|set\s+forth|defined)\s+in)\s+)?";

static PATTERNS: LazyLock<Vec<(ReferenceKind, Regex)>> = LazyLock::new(|| {
    [
        (
            ReferenceKind::Instruction,
            r"(?:instructions?\s+to\s+offerors|proposal\s+(?:preparation\s+)?instructions|section\s+L\b)",
        ),
        (
            ReferenceKind::Clause,
            r"(?:(?P<reg>FAR|DFARS)\s+(?:clause\s+)?)?(?P<clause>(?:52|252)\.\d{3}-\d{1,4})",
        ),
        (
            ReferenceKind::Clause,
            r"(?P<reg>FAR|DFARS)\s+(?:part\s+|subpart\s+)?(?P<clause>\d{1,3}(?:\.\d+)+(?:-\d+)?)",
        ),
        (
            ReferenceKind::Attachment,
            r"(?P<word>attachment|exhibit|appendix|annex|enclosure)\s+(?:no\.\s*)?(?P<id>(?:[A-Z]{1,2}-?)?\d{1,3}(?:[.-]\d{1,3})*|[A-Z])\b",
        ),
        (
            ReferenceKind::Section,
            r"(?:section|paragraph|para\.)\s+(?P<label>[A-M](?:\.\d+)*|\d+(?:\.\d+)+)\b",
        ),
    ]
    .into_iter()
    .map(|(kind, pattern)| {
        let regex = Regex::new(&format!(r"(?i)\b{LEAD}{pattern}")).expect("valid reference regex");
        (kind, regex)
    })
    .collect()
});

/// A reference found in text, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detected {
    /// The kind of location referenced.
    pub kind: ReferenceKind,
    /// Byte range of the match.
    pub span: std::ops::Range<usize>,
    /// The matched text.
    pub text: String,
    /// Normalised identifier of the target, e.g. `Attachment 3`.
    pub target: String,
    /// Section or subsection label to resolve against, if the target is
    /// part of the solicitation's own numbering.
    label: Option<String>,
}

const fn priority(kind: ReferenceKind) -> u8 {
    match kind {
        ReferenceKind::Instruction => 0,
        ReferenceKind::Clause => 1,
        ReferenceKind::Attachment => 2,
        ReferenceKind::Section => 3,
    }
}

/// Find the references in a piece of text.
///
/// Overlapping matches are resolved by keeping the longest span, then the
/// earliest, then the higher-priority kind (instruction, clause,
/// attachment, section). The result is ordered by position.
#[must_use]
pub fn detect(text: &str) -> Vec<Detected> {
    let mut found: Vec<Detected> = PATTERNS
        .iter()
        .flat_map(|(kind, regex)| {
            regex
                .captures_iter(text)
                .filter_map(move |caps| detected(*kind, &caps))
        })
        .collect();

    found.sort_by(|a, b| {
        b.span
            .len()
            .cmp(&a.span.len())
            .then(a.span.start.cmp(&b.span.start))
            .then(priority(a.kind).cmp(&priority(b.kind)))
    });

    let mut kept: Vec<Detected> = Vec::new();
    for candidate in found {
        let overlaps = kept
            .iter()
            .any(|k| candidate.span.start < k.span.end && k.span.start < candidate.span.end);
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept.sort_by_key(|d| d.span.start);
    kept
}

fn detected(kind: ReferenceKind, caps: &Captures<'_>) -> Option<Detected> {
    let whole = caps.get(0)?;
    let (target, label) = match kind {
        ReferenceKind::Instruction => ("Section L".to_string(), Some("L".to_string())),
        ReferenceKind::Clause => {
            let clause = caps.name("clause")?.as_str();
            let regulation = caps.name("reg").map_or_else(
                || if clause.starts_with("252.") { "DFARS" } else { "FAR" }.to_string(),
                |m| m.as_str().to_uppercase(),
            );
            (format!("{regulation} {clause}"), None)
        }
        ReferenceKind::Attachment => {
            let word = caps.name("word")?.as_str();
            let id = caps.name("id")?.as_str().to_uppercase();
            (format!("{} {id}", title_case(word)), None)
        }
        ReferenceKind::Section => {
            let label = caps.name("label")?.as_str().to_uppercase();
            (format!("Section {label}"), Some(label))
        }
    };

    Some(Detected {
        kind,
        span: whole.range(),
        text: whole.as_str().to_string(),
        target,
        label,
    })
}

fn title_case(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Detect the references of a requirement and resolve each against the
/// chunks of its document.
///
/// A target whose section or subsection label matches a chunk exactly
/// resolves to that chunk with high confidence; a chunk that merely
/// mentions the target gives medium confidence. Anything else is marked as
/// cross-document with low confidence. The requirement's own chunk is never
/// a target.
#[must_use]
pub fn resolve(requirement: &Requirement, chunks: &[Chunk]) -> Vec<CrossReference> {
    let source = requirement.source();
    let others: Vec<&Chunk> = chunks
        .iter()
        .filter(|chunk| chunk.document() == &source.document && chunk.index() != source.index)
        .collect();

    detect(requirement.clean_text())
        .into_iter()
        .map(|detected| {
            let hit = detected
                .label
                .as_deref()
                .and_then(|label| find_by_label(&others, label))
                .map(|chunk| (chunk, Confidence::High))
                .or_else(|| find_mention(&others, &detected.target).map(|c| (c, Confidence::Medium)));

            let Detected {
                kind, text, target, ..
            } = detected;

            match hit {
                Some((chunk, confidence)) => CrossReference::within_document(
                    requirement.id(),
                    source.clone(),
                    chunk.chunk_ref(),
                    kind,
                    text.clone(),
                    target.clone(),
                    confidence,
                )
                .unwrap_or_else(|e| {
                    tracing::warn!("{e}");
                    CrossReference::cross_document(
                        requirement.id(),
                        source.clone(),
                        kind,
                        text,
                        target,
                        Confidence::Low,
                    )
                }),
                None => CrossReference::cross_document(
                    requirement.id(),
                    source.clone(),
                    kind,
                    text,
                    target,
                    Confidence::Low,
                ),
            }
        })
        .collect()
}

/// The first chunk carrying the label: `L` matches `Section L`, `M.2.1`
/// matches subsection `M.2.1`.
fn find_by_label<'a>(chunks: &[&'a Chunk], label: &str) -> Option<&'a Chunk> {
    let section = format!("Section {label}");
    chunks
        .iter()
        .copied()
        .find(|chunk| {
            chunk
                .subsection()
                .is_some_and(|s| s.eq_ignore_ascii_case(label))
        })
        .or_else(|| {
            chunks.iter().copied().find(|chunk| {
                chunk.subsection().is_none()
                    && chunk
                        .section()
                        .is_some_and(|s| s.eq_ignore_ascii_case(&section))
            })
        })
}

/// The first chunk whose text mentions the target as a whole word.
fn find_mention<'a>(chunks: &[&'a Chunk], target: &str) -> Option<&'a Chunk> {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(target));
    let regex = Regex::new(&pattern).ok()?;
    chunks
        .iter()
        .copied()
        .find(|chunk| regex.is_match(chunk.cleaned_text()))
}
