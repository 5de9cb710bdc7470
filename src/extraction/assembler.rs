//! Turns the candidate sentences of a chunk into requirements.

use crate::{
    domain::{
        clean_text,
        requirement::{ExtractionMethod, Extracted, Requirement},
        Chunk, ChunkKind,
    },
    extraction::{catalog::PatternCatalog, scorer::ScoringChain},
};

/// Tokens ending in a period that do not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "e.g.", "i.e.", "etc.", "u.s.", "u.s.c.", "no.", "nos.", "vs.", "inc.", "corp.", "co.",
    "ltd.", "mr.", "ms.", "mrs.", "dr.", "approx.", "sec.", "para.", "ref.", "fig.", "vol.",
    "pt.", "subpt.", "st.", "jan.", "feb.", "mar.", "apr.", "jun.", "jul.", "aug.", "sep.",
    "sept.", "oct.", "nov.", "dec.", "a.m.", "p.m.", "cf.", "al.",
];

/// Nouns that take a single-letter designator, as in "Attachment J".
const REFERENCE_NOUNS: &[&str] = &[
    "attachment", "exhibit", "appendix", "annex", "section", "volume", "part", "clause",
];

/// Split text into sentences.
///
/// A sentence ends at `.`, `!` or `?` (optionally followed by a closing
/// quote or bracket) when whitespace and then something other than a
/// lower-case letter follow. Known abbreviations and single-letter initials
/// do not end a sentence, and decimals and section numbers never do since
/// no whitespace follows their periods. Returned slices are trimmed and
/// never empty.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let chars: Vec<(usize, char)> = text.char_indices().collect();

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i].1;
        if !matches!(c, '.' | '!' | '?') {
            i += 1;
            continue;
        }

        // Absorb closing punctuation.
        let mut end = i + 1;
        while end < chars.len() && matches!(chars[end].1, '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}') {
            end += 1;
        }
        let end_byte = chars.get(end).map_or(text.len(), |(offset, _)| *offset);

        let followed_by_space = chars.get(end).is_none_or(|(_, next)| next.is_whitespace());
        let next_word_lower = chars[end..]
            .iter()
            .find(|(_, ch)| !ch.is_whitespace())
            .is_some_and(|(_, ch)| ch.is_lowercase());

        let boundary = followed_by_space
            && !next_word_lower
            && !(c == '.' && is_abbreviation(&text[start..end_byte]));

        if boundary {
            push_trimmed(&mut sentences, &text[start..end_byte]);
            start = end_byte;
        }
        i = end;
    }
    push_trimmed(&mut sentences, &text[start..]);

    sentences
}

fn push_trimmed<'a>(sentences: &mut Vec<&'a str>, sentence: &'a str) {
    let sentence = sentence.trim();
    if !sentence.is_empty() {
        sentences.push(sentence);
    }
}

/// Whether the last word of `sentence`, which ends in a period, is an
/// abbreviation or an initial.
fn is_abbreviation(sentence: &str) -> bool {
    let mut words = sentence
        .trim_end_matches(['"', '\'', ')', ']', '\u{201D}', '\u{2019}'])
        .split_whitespace()
        .rev();
    let word = words
        .next()
        .unwrap_or_default()
        .trim_start_matches(['(', '[', '"', '\'', '\u{201C}']);

    if ABBREVIATIONS.contains(&word.to_lowercase().as_str()) {
        return true;
    }

    // A designator such as "Attachment J." ends the sentence.
    let stem = word.trim_end_matches('.');
    let designated = words
        .next()
        .is_some_and(|noun| REFERENCE_NOUNS.contains(&noun.to_lowercase().as_str()));
    if designated && stem.chars().count() == 1 {
        return false;
    }

    // Initials such as "Q." or "U.S.A.".
    word.chars().next().is_some_and(char::is_uppercase)
        && stem.split('.').all(|part| {
            let mut chars = part.chars();
            matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic())
        })
}

/// A sentence of a chunk that passed the indicator gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate<'a> {
    /// Position among the chunk's candidates, from 0.
    pub ordinal: u32,
    /// The sentence, verbatim from the chunk's raw text.
    pub text: &'a str,
}

/// The candidate requirement sentences of a chunk.
///
/// Header chunks never yield candidates.
#[must_use]
pub fn candidates<'a>(catalog: &PatternCatalog, chunk: &'a Chunk) -> Vec<Candidate<'a>> {
    if chunk.kind() == ChunkKind::Header {
        return Vec::new();
    }

    split_sentences(chunk.raw_text())
        .into_iter()
        .filter(|sentence| catalog.is_candidate(sentence))
        .zip(0_u32..)
        .map(|(text, ordinal)| Candidate { ordinal, text })
        .collect()
}

/// Score every candidate of a chunk and build its requirements.
///
/// One requirement per candidate; nothing is deduplicated.
#[must_use]
pub fn assemble(
    chunk: &Chunk,
    scoring: &ScoringChain,
    catalog_version: &str,
    catalog_fingerprint: &str,
) -> Vec<Requirement> {
    let catalog = scoring.classifier().catalog();
    candidates(catalog, chunk)
        .into_iter()
        .map(|candidate| {
            let scored = scoring.score(candidate.text, chunk.section());
            tracing::debug!(
                "{}: candidate {} classified {} ({}) by {}",
                chunk.chunk_ref(),
                candidate.ordinal,
                scored.verdict.classification,
                scored.verdict.confidence,
                scored.verdict.scorer
            );
            Requirement::new(Extracted {
                source: chunk.chunk_ref(),
                ordinal: candidate.ordinal,
                provenance: chunk.provenance().clone(),
                raw_text: candidate.text.to_string(),
                clean_text: strip_list_marker(&clean_text(candidate.text)).to_string(),
                extraction: ExtractionMethod {
                    scorer: scored.verdict.scorer.clone(),
                    catalog_version: catalog_version.to_string(),
                    catalog_fingerprint: catalog_fingerprint.to_string(),
                },
                verdict: scored.verdict,
                baseline: scored.baseline,
            })
        })
        .collect()
}

/// Drop a leading bullet or enumerator from a list item.
fn strip_list_marker(text: &str) -> &str {
    let trimmed = text.trim_start();
    let rest = trimmed
        .strip_prefix(['\u{2022}', '\u{25E6}', '\u{25AA}', '\u{2023}', '*', '-', '\u{2013}'])
        .or_else(|| {
            let (marker, rest) = trimmed.split_once(' ')?;
            let inner = marker
                .strip_prefix('(')
                .unwrap_or(marker)
                .strip_suffix([')', '.'])?;
            (!inner.is_empty()
                && inner.chars().count() <= 3
                && inner.chars().all(char::is_alphanumeric))
            .then_some(rest)
        });
    rest.map_or(trimmed, str::trim_start)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::{
        domain::{Classification, DocumentId, Provenance, Status},
        extraction::classifier::RuleClassifier,
    };

    #[test_case(
        "The contractor shall comply. The offeror must submit a proposal.",
        &["The contractor shall comply.", "The offeror must submit a proposal."];
        "two sentences"
    )]
    #[test_case(
        "Systems shall maintain 99.9% availability per Section 3.1.2 of the SOW.",
        &["Systems shall maintain 99.9% availability per Section 3.1.2 of the SOW."];
        "decimals and section numbers"
    )]
    #[test_case(
        "Use approved tools, e.g. Jira. The contractor shall report weekly.",
        &["Use approved tools, e.g. Jira.", "The contractor shall report weekly."];
        "abbreviation followed by a capital"
    )]
    #[test_case(
        "Deliver to the U.S. Army within 30 days. Invoices are due monthly!",
        &["Deliver to the U.S. Army within 30 days.", "Invoices are due monthly!"];
        "initialism"
    )]
    #[test_case(
        "Reference No. 12 applies. See item (a.) below.",
        &["Reference No. 12 applies.", "See item (a.) below."];
        "number abbreviation"
    )]
    #[test_case(
        "Is this required? Yes. \"It shall be done.\" Next.",
        &["Is this required?", "Yes.", "\"It shall be done.\"", "Next."];
        "questions and quotes"
    )]
    #[test_case(
        "The contractor shall comply with Attachment J. The contractor shall deliver monthly reports.",
        &[
            "The contractor shall comply with Attachment J.",
            "The contractor shall deliver monthly reports."
        ];
        "attachment designator"
    )]
    #[test_case(
        "Proposals are evaluated under Section M. Offerors shall address each factor.",
        &["Proposals are evaluated under Section M.", "Offerors shall address each factor."];
        "section designator"
    )]
    #[test_case(
        "Reports go to John Q. Public by Friday.",
        &["Reports go to John Q. Public by Friday."];
        "middle initial"
    )]
    #[test_case("no terminal punctuation", &["no terminal punctuation"]; "unterminated")]
    #[test_case("   ", &[]; "blank")]
    fn splits_sentences(text: &str, expected: &[&str]) {
        assert_eq!(split_sentences(text), expected);
    }

    #[test_case("\u{2022} The contractor shall comply.", "The contractor shall comply."; "bullet")]
    #[test_case("(a) The contractor shall comply.", "The contractor shall comply."; "parenthesised letter")]
    #[test_case("1. The contractor shall comply.", "The contractor shall comply."; "numbered")]
    #[test_case("The contractor shall comply.", "The contractor shall comply."; "no marker")]
    #[test_case("3.1 The contractor shall comply.", "3.1 The contractor shall comply."; "section number kept")]
    fn strips_list_markers(text: &str, expected: &str) {
        assert_eq!(strip_list_marker(text), expected);
    }

    fn chunk(kind: ChunkKind, text: &str) -> Chunk {
        Chunk::new(
            DocumentId::new("rfp".to_string()).unwrap(),
            4,
            kind,
            Provenance {
                page: Some(2),
                paragraph: Some(3),
                section: Some("Section C".to_string()),
                subsection: Some("C.3.1".to_string()),
            },
            text.to_string(),
        )
    }

    fn scoring() -> ScoringChain {
        ScoringChain::rules_only(RuleClassifier::new(PatternCatalog::builtin().unwrap()))
    }

    #[test]
    fn one_requirement_per_gated_sentence() {
        let chunk = chunk(
            ChunkKind::Paragraph,
            "This section describes hosting. The contractor shall maintain 99.9% uptime for \
             production systems. The contractor shall encrypt all data at rest.",
        );
        let requirements = assemble(&chunk, &scoring(), "v", "fp");

        assert_eq!(requirements.len(), 2);
        assert_eq!(requirements[0].ordinal(), 0);
        assert_eq!(requirements[1].ordinal(), 1);
        assert_eq!(requirements[0].classification(), Classification::Performance);
        assert_eq!(requirements[1].classification(), Classification::Compliance);
        for requirement in &requirements {
            assert_eq!(requirement.status(), Status::AiExtracted);
            assert!(requirement.history().is_empty());
            assert_eq!(requirement.source(), &chunk.chunk_ref());
            assert_eq!(requirement.provenance().subsection.as_deref(), Some("C.3.1"));
            assert_eq!(requirement.extraction().catalog_fingerprint, "fp");
            assert_eq!(requirement.baseline(), &requirement_verdict(requirement));
        }
    }

    fn requirement_verdict(requirement: &Requirement) -> crate::domain::Verdict {
        crate::domain::Verdict::new(requirement.classification(), requirement.score(), "rules")
    }

    #[test]
    fn duplicates_are_kept() {
        let chunk = chunk(
            ChunkKind::Paragraph,
            "The contractor shall comply with FISMA. The contractor shall comply with FISMA.",
        );
        assert_eq!(assemble(&chunk, &scoring(), "v", "fp").len(), 2);
    }

    #[test]
    fn list_marker_is_removed_from_clean_text_only() {
        let chunk = chunk(
            ChunkKind::List,
            "(b) The contractor shall submit monthly status reports.",
        );
        let requirements = assemble(&chunk, &scoring(), "v", "fp");
        assert_eq!(
            requirements[0].raw_text(),
            "(b) The contractor shall submit monthly status reports."
        );
        assert_eq!(
            requirements[0].clean_text(),
            "The contractor shall submit monthly status reports."
        );
    }

    #[test]
    fn headers_yield_nothing() {
        let chunk = chunk(
            ChunkKind::Header,
            "C.3.1 Requirements the contractor shall meet for hosting services",
        );
        assert!(assemble(&chunk, &scoring(), "v", "fp").is_empty());
    }
}
