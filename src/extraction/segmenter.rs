//! Splits extracted document text into provenance-tagged chunks.
//!
//! Segmentation happens in three passes:
//!
//! 1. the text is cut into pages, using explicit boundaries if given or
//!    `--- PAGE n ---` markers and form feeds otherwise,
//! 2. each page is cut into units at blank lines, headers, list items and
//!    table rows, tracking the section and subsection in force,
//! 3. units too short to carry a requirement are dropped and the rest become
//!    [`Chunk`]s with contiguous indices.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::domain::{clean_text, Chunk, ChunkKind, Config, DocumentId, Provenance};

static PAGE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*-{3,}\s*PAGE\s+(\d+)\s*-{3,}\s*$").expect("valid page marker regex")
});

static SECTION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*SECTION\s+([A-M])(?:\s*[-:\u{2013}\u{2014}]\s*|\s+|$)(.*)$")
        .expect("valid section header regex")
});

static NUMBERED_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:([A-M])\.)?(\d+(?:\.\d+)*)\.?(?:\s+(.*))?$").expect("valid numbered header regex")
});

static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:[\u{2022}\u{25E6}\u{25AA}\u{2023}*\-\u{2013}]\s+|\(\w{1,3}\)\s+|[a-z0-9]{1,3}\)\s+|\d{1,3}\.\s+|[a-z]\.\s+)",
    )
    .expect("valid list item regex")
});

/// Byte offsets at which each page of the text starts.
///
/// An empty set means "detect pages from markers in the text".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageBoundaries(Vec<usize>);

impl PageBoundaries {
    /// Detect pages from `--- PAGE n ---` markers and form feeds.
    #[must_use]
    pub const fn detect() -> Self {
        Self(Vec::new())
    }

    /// Explicit page start offsets. They are validated when segmenting.
    #[must_use]
    pub const fn explicit(offsets: Vec<usize>) -> Self {
        Self(offsets)
    }

    /// Whether pages will be detected from the text.
    #[must_use]
    pub fn is_detect(&self) -> bool {
        self.0.is_empty()
    }
}

/// A non-fatal observation made while segmenting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum SegmentWarning {
    /// The page yielded no chunks.
    EmptyPage {
        /// The page number.
        page: u32,
    },
    /// A unit was longer than the configured maximum and was kept whole.
    OversizedUnit {
        /// The page number.
        page: u32,
        /// The paragraph counter of the unit.
        paragraph: u32,
        /// Length of the cleaned text, in characters.
        chars: usize,
    },
}

impl std::fmt::Display for SegmentWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPage { page } => write!(f, "page {page} has no extractable text"),
            Self::OversizedUnit {
                page,
                paragraph,
                chars,
            } => write!(
                f,
                "page {page} paragraph {paragraph} is {chars} characters long and was kept whole"
            ),
        }
    }
}

/// Errors from segmentation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SegmentError {
    /// An explicit page boundary is unusable.
    #[error("document {document}: invalid page boundary {offset}: {reason}")]
    InvalidPageBoundary {
        /// The document.
        document: DocumentId,
        /// The offending offset.
        offset: usize,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// No unit survived segmentation.
    #[error("document {0}: no extractable text")]
    NoExtractableText(DocumentId),
}

/// The result of segmenting a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    /// Chunks with contiguous indices from 0.
    pub chunks: Vec<Chunk>,
    /// Per-page and per-unit warnings.
    pub warnings: Vec<SegmentWarning>,
    /// Number of pages seen.
    pub pages: u32,
}

/// Turns raw document text into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segmenter {
    min_chunk_chars: usize,
    max_chunk_chars: usize,
    max_header_chars: usize,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageText<'a> {
    number: u32,
    text: &'a str,
}

#[derive(Debug, Default)]
struct Context {
    section: Option<String>,
    subsection: Option<String>,
}

#[derive(Debug)]
struct Unit {
    kind: ChunkKind,
    lines: Vec<String>,
}

impl Segmenter {
    /// A segmenter using the thresholds from the configuration.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self {
            min_chunk_chars: config.min_chunk_chars,
            max_chunk_chars: config.max_chunk_chars,
            max_header_chars: config.max_header_chars,
        }
    }

    /// Segment a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the explicit page boundaries are invalid, or if
    /// no chunk survives segmentation.
    pub fn segment(
        &self,
        document: &DocumentId,
        raw_text: &str,
        boundaries: &PageBoundaries,
    ) -> Result<Segmentation, SegmentError> {
        let pages = if boundaries.is_detect() {
            detect_pages(raw_text)
        } else {
            split_pages(document, raw_text, &boundaries.0)?
        };

        let mut context = Context::default();
        let mut chunks = Vec::new();
        let mut warnings = Vec::new();

        for page in &pages {
            let before = chunks.len();
            self.segment_page(document, *page, &mut context, &mut chunks, &mut warnings);
            if chunks.len() == before {
                tracing::debug!("{document}: page {} has no extractable text", page.number);
                warnings.push(SegmentWarning::EmptyPage { page: page.number });
            }
        }

        if chunks.is_empty() {
            return Err(SegmentError::NoExtractableText(document.clone()));
        }

        let pages = u32::try_from(pages.len()).unwrap_or(u32::MAX);
        tracing::debug!(
            "{document}: segmented {pages} pages into {} chunks",
            chunks.len()
        );

        Ok(Segmentation {
            chunks,
            warnings,
            pages,
        })
    }

    fn segment_page(
        &self,
        document: &DocumentId,
        page: PageText<'_>,
        context: &mut Context,
        chunks: &mut Vec<Chunk>,
        warnings: &mut Vec<SegmentWarning>,
    ) {
        let mut paragraph = 0_u32;
        let mut open: Option<Unit> = None;

        let mut emit = |unit: Unit, context: &Context| {
            paragraph += 1;
            self.emit(document, page.number, paragraph, unit, context, chunks, warnings);
        };

        for line in page.text.lines() {
            let line = line.trim_end();

            if line.trim().is_empty() {
                if let Some(unit) = open.take() {
                    emit(unit, context);
                }
                continue;
            }

            // Inside a wrapped sentence a line-initial `Section H` or `2.5`
            // is running text, not a header.
            let at_boundary = open.as_ref().is_none_or(Unit::ends_sentence);

            if let Some(caps) = SECTION_HEADER.captures(line).filter(|_| at_boundary) {
                let title = caps.get(2).map_or("", |m| m.as_str().trim());
                if self.is_header_title(title) {
                    if let Some(unit) = open.take() {
                        emit(unit, context);
                    }
                    context.section = Some(format!("Section {}", caps[1].to_uppercase()));
                    context.subsection = None;
                    emit(Unit::single(ChunkKind::Header, line), context);
                    continue;
                }
            }

            if let Some((letter, label, title)) = numbered_header(line).filter(|_| at_boundary) {
                if let Some(unit) = open.take() {
                    emit(unit, context);
                }
                if let Some(letter) = letter {
                    context.section = Some(format!("Section {letter}"));
                }
                context.subsection = Some(label);
                if self.is_header_title(title) {
                    emit(Unit::single(ChunkKind::Header, line), context);
                } else {
                    open = Some(Unit::single(ChunkKind::Paragraph, line));
                }
                continue;
            }

            if LIST_ITEM.is_match(line) {
                if let Some(unit) = open.take() {
                    emit(unit, context);
                }
                open = Some(Unit::single(ChunkKind::List, line));
                continue;
            }

            if is_table_row(line) {
                match &mut open {
                    Some(unit) if unit.kind == ChunkKind::Table => unit.lines.push(line.to_string()),
                    _ => {
                        if let Some(unit) = open.take() {
                            emit(unit, context);
                        }
                        open = Some(Unit::single(ChunkKind::Table, line));
                    }
                }
                continue;
            }

            match &mut open {
                Some(unit) if unit.kind != ChunkKind::Table => unit.lines.push(line.to_string()),
                _ => {
                    if let Some(unit) = open.take() {
                        emit(unit, context);
                    }
                    open = Some(Unit::single(ChunkKind::Paragraph, line));
                }
            }
        }

        if let Some(unit) = open.take() {
            emit(unit, context);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &self,
        document: &DocumentId,
        page: u32,
        paragraph: u32,
        unit: Unit,
        context: &Context,
        chunks: &mut Vec<Chunk>,
        warnings: &mut Vec<SegmentWarning>,
    ) {
        let raw_text = unit.lines.join("\n");
        let chars = clean_text(&raw_text).chars().count();
        if chars < self.min_chunk_chars {
            tracing::trace!("{document}: page {page} paragraph {paragraph} discarded ({chars} chars)");
            return;
        }

        let mut kind = unit.kind;
        if chars > self.max_chunk_chars {
            kind = ChunkKind::Paragraph;
            let warning = SegmentWarning::OversizedUnit {
                page,
                paragraph,
                chars,
            };
            tracing::debug!("{document}: {warning}");
            warnings.push(warning);
        }

        let index = u32::try_from(chunks.len()).unwrap_or(u32::MAX);
        chunks.push(Chunk::new(
            document.clone(),
            index,
            kind,
            Provenance {
                page: Some(page),
                paragraph: Some(paragraph),
                section: context.section.clone(),
                subsection: context.subsection.clone(),
            },
            raw_text,
        ));
    }

    fn is_header_title(&self, title: &str) -> bool {
        title.chars().count() <= self.max_header_chars && !title.ends_with('.')
    }
}

impl Unit {
    fn single(kind: ChunkKind, line: &str) -> Self {
        Self {
            kind,
            lines: vec![line.to_string()],
        }
    }

    /// Whether the unit can be followed by a header line.
    fn ends_sentence(&self) -> bool {
        self.kind == ChunkKind::Table
            || self
                .lines
                .last()
                .is_some_and(|line| line.trim_end().ends_with(['.', ':', ';', '?', '!']))
    }
}

/// Recognise `3.1`, `3.1.1`, `C.3` and `C.3.1` headers.
///
/// Returns the section letter (if any), the subsection label and the title.
fn numbered_header(line: &str) -> Option<(Option<String>, String, &str)> {
    let caps = NUMBERED_HEADER.captures(line)?;
    let letter = caps.get(1).map(|m| m.as_str().to_string());
    let number = caps.get(2)?.as_str();
    // A bare `3` or `3.` is an enumerator, not a header.
    if letter.is_none() && !number.contains('.') {
        return None;
    }
    let label = letter
        .as_ref()
        .map_or_else(|| number.to_string(), |letter| format!("{letter}.{number}"));
    let title = caps.get(3).map_or("", |m| m.as_str().trim());
    if title.chars().next().is_some_and(|c| !c.is_uppercase()) {
        return None;
    }
    Some((letter, label, title))
}

fn is_table_row(line: &str) -> bool {
    line.contains('|') || line.trim_start().contains('\t')
}

fn split_pages<'a>(
    document: &DocumentId,
    text: &'a str,
    offsets: &[usize],
) -> Result<Vec<PageText<'a>>, SegmentError> {
    let invalid = |offset, reason| SegmentError::InvalidPageBoundary {
        document: document.clone(),
        offset,
        reason,
    };

    if offsets.first() != Some(&0) {
        return Err(invalid(offsets.first().copied().unwrap_or_default(), "the first page must start at 0"));
    }
    for pair in offsets.windows(2) {
        if pair[1] <= pair[0] {
            return Err(invalid(pair[1], "offsets must be strictly ascending"));
        }
    }
    for &offset in offsets {
        if offset > text.len() {
            return Err(invalid(offset, "offset is past the end of the text"));
        }
        if !text.is_char_boundary(offset) {
            return Err(invalid(offset, "offset is not on a character boundary"));
        }
    }

    let ends = offsets.iter().skip(1).copied().chain(std::iter::once(text.len()));
    Ok(offsets
        .iter()
        .zip(ends)
        .zip(1_u32..)
        .map(|((&start, end), number)| PageText {
            number,
            text: &text[start..end],
        })
        .collect())
}

/// Cut text into pages at `--- PAGE n ---` marker lines and form feeds.
///
/// Text without either is a single page 1.
fn detect_pages(text: &str) -> Vec<PageText<'_>> {
    let mut pages = Vec::new();
    let mut next_number = 1_u32;
    let sheets: Vec<&str> = text.split('\u{000C}').collect();
    let last_sheet = sheets.len() - 1;

    for (sheet_index, sheet) in sheets.into_iter().enumerate() {
        let mut start = 0;
        let mut offset = 0;
        let mut marked: Option<u32> = None;
        let mut saw_marker = false;

        for line in sheet.split_inclusive('\n') {
            if let Some(caps) = PAGE_MARKER.captures(line.trim_end()) {
                let segment = &sheet[start..offset];
                if marked.is_some() || !segment.trim().is_empty() {
                    let number = marked.unwrap_or(next_number);
                    pages.push(PageText {
                        number,
                        text: segment,
                    });
                    next_number = number.saturating_add(1);
                }
                marked = Some(page_number(&caps[1]).unwrap_or(next_number));
                saw_marker = true;
                start = offset + line.len();
            }
            offset += line.len();
        }

        let segment = &sheet[start..];
        // A sheet ended by a form feed is a page even when blank.
        let ended_by_form_feed = !saw_marker && sheet_index < last_sheet;
        if marked.is_some() || !segment.trim().is_empty() || ended_by_form_feed {
            let number = marked.unwrap_or(next_number);
            pages.push(PageText {
                number,
                text: segment,
            });
            next_number = number.saturating_add(1);
        }
    }

    pages
}

/// The page number written in a marker, if it is usable.
///
/// Page 0 does not exist and `u32::MAX` leaves no room for the next page.
fn page_number(marker: &str) -> Option<u32> {
    marker
        .parse()
        .ok()
        .filter(|&number| number != 0 && number != u32::MAX)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn doc() -> DocumentId {
        DocumentId::new("rfp".to_string()).unwrap()
    }

    fn segment(text: &str) -> Result<Segmentation, SegmentError> {
        Segmenter::default().segment(&doc(), text, &PageBoundaries::detect())
    }

    const SOW: &str = "The contractor shall maintain 99.9% uptime for all production systems.";
    const REPORTS: &str = "The contractor shall submit monthly status reports to the COR by the 5th.";

    #[test]
    fn indices_are_contiguous_from_zero() {
        let text = format!("{SOW}\n\n{REPORTS}\n\nshort\n\n{SOW}");
        let segmentation = segment(&text).unwrap();
        let indices: Vec<_> = segmentation.chunks.iter().map(Chunk::index).collect();
        assert_eq!(indices, [0, 1, 2]);
    }

    #[test]
    fn short_units_are_discarded_but_counted() {
        let text = format!("short\n\n{SOW}");
        let segmentation = segment(&text).unwrap();
        assert_eq!(segmentation.chunks.len(), 1);
        assert_eq!(segmentation.chunks[0].provenance().paragraph, Some(2));
    }

    #[test]
    fn three_pages_with_one_empty() {
        let text = format!("--- PAGE 1 ---\n{SOW}\n--- PAGE 2 ---\n\n--- PAGE 3 ---\n{REPORTS}\n");
        let segmentation = segment(&text).unwrap();

        let pages: Vec<_> = segmentation
            .chunks
            .iter()
            .map(|c| c.provenance().page.unwrap())
            .collect();
        assert_eq!(pages, [1, 3]);
        assert_eq!(segmentation.pages, 3);
        assert_eq!(segmentation.warnings, [SegmentWarning::EmptyPage { page: 2 }]);
    }

    #[test_case("--- PAGE 0 ---", [1, 2]; "page zero")]
    #[test_case("--- PAGE 4294967295 ---", [1, 2]; "no room for the next page")]
    #[test_case("--- PAGE 99999999999 ---", [1, 2]; "out of range")]
    #[test_case("--- PAGE 4294967294 ---", [4_294_967_294, 4_294_967_295]; "last usable page")]
    fn unusable_page_markers_fall_back_to_counting(marker: &str, expected: [u32; 2]) {
        let text = format!("{marker}\n{SOW}\n\u{000C}{REPORTS}");
        let segmentation = segment(&text).unwrap();
        let pages: Vec<_> = segmentation
            .chunks
            .iter()
            .map(|c| c.provenance().page.unwrap())
            .collect();
        assert_eq!(pages, expected);
    }

    #[test]
    fn form_feeds_separate_pages() {
        let text = format!("{SOW}\u{000C}\u{000C}{REPORTS}");
        let segmentation = segment(&text).unwrap();
        let pages: Vec<_> = segmentation
            .chunks
            .iter()
            .map(|c| c.provenance().page.unwrap())
            .collect();
        assert_eq!(pages, [1, 3]);
        assert_eq!(segmentation.warnings, [SegmentWarning::EmptyPage { page: 2 }]);
    }

    #[test]
    fn text_without_markers_is_page_one() {
        let segmentation = segment(SOW).unwrap();
        assert_eq!(segmentation.pages, 1);
        assert_eq!(segmentation.chunks[0].provenance().page, Some(1));
    }

    #[test]
    fn explicit_boundaries_are_used() {
        let text = format!("{SOW}\n{REPORTS}");
        let boundaries = PageBoundaries::explicit(vec![0, SOW.len() + 1]);
        let segmentation = Segmenter::default()
            .segment(&doc(), &text, &boundaries)
            .unwrap();
        let pages: Vec<_> = segmentation
            .chunks
            .iter()
            .map(|c| c.provenance().page.unwrap())
            .collect();
        assert_eq!(pages, [1, 2]);
    }

    #[test_case(vec![5]; "does not start at zero")]
    #[test_case(vec![0, 10, 10]; "not ascending")]
    #[test_case(vec![0, 10_000]; "past the end")]
    fn invalid_boundaries_are_rejected(offsets: Vec<usize>) {
        let result = Segmenter::default().segment(&doc(), SOW, &PageBoundaries::explicit(offsets));
        assert!(matches!(
            result,
            Err(SegmentError::InvalidPageBoundary { .. })
        ));
    }

    #[test]
    fn boundary_inside_a_character_is_rejected() {
        let text = format!("\u{2022} {SOW}");
        let result =
            Segmenter::default().segment(&doc(), &text, &PageBoundaries::explicit(vec![0, 1]));
        assert!(matches!(
            result,
            Err(SegmentError::InvalidPageBoundary { offset: 1, .. })
        ));
    }

    #[test]
    fn nothing_usable_is_an_error() {
        assert_eq!(
            segment("too short\n\nalso short"),
            Err(SegmentError::NoExtractableText(doc()))
        );
    }

    #[test]
    fn section_and_subsection_labels_are_inherited() {
        let text = format!(
            "SECTION C - STATEMENT OF WORK\n\nC.3.1 Availability\n\n{SOW}\n\nSection L - \
             Instructions\n\n{REPORTS}"
        );
        let segmentation = segment(&text).unwrap();
        let labels: Vec<_> = segmentation
            .chunks
            .iter()
            .map(|c| (c.section(), c.subsection()))
            .collect();
        assert_eq!(
            labels,
            [
                (Some("Section C"), Some("C.3.1")),
                (Some("Section L"), None),
            ]
        );
    }

    #[test]
    fn context_persists_across_pages() {
        let text = format!("--- PAGE 1 ---\n3.2 Hosting\n--- PAGE 2 ---\n{SOW}\n");
        let segmentation = segment(&text).unwrap();
        assert_eq!(segmentation.chunks[0].subsection(), Some("3.2"));
        assert_eq!(segmentation.chunks[0].provenance().page, Some(2));
    }

    #[test]
    fn long_numbered_line_opens_a_paragraph() {
        let text = format!("3.4.1 {SOW}\nThis continues the same paragraph.");
        let segmentation = segment(&text).unwrap();
        assert_eq!(segmentation.chunks.len(), 1);
        let chunk = &segmentation.chunks[0];
        assert_eq!(chunk.kind(), ChunkKind::Paragraph);
        assert_eq!(chunk.subsection(), Some("3.4.1"));
        assert!(chunk.cleaned_text().ends_with("same paragraph."));
    }

    #[test]
    fn wrapped_section_mention_is_not_a_header() {
        let text = "The contractor shall take all actions necessary to comply with\nSection H \
                    special contract requirements and the\nclauses listed in Section I.";
        let segmentation = segment(text).unwrap();

        assert_eq!(segmentation.chunks.len(), 1);
        let chunk = &segmentation.chunks[0];
        assert_eq!(chunk.section(), None);
        assert!(chunk.cleaned_text().ends_with("listed in Section I."));
    }

    #[test]
    fn wrapped_decimal_is_not_a_subsection() {
        let text = "C.5.2 Incident Response\n\nThe contractor shall respond to all security \
                    incidents within\n2.5 hours of notification by the government.";
        let segmentation = segment(text).unwrap();

        assert_eq!(segmentation.chunks.len(), 1);
        let chunk = &segmentation.chunks[0];
        assert_eq!(chunk.subsection(), Some("C.5.2"));
        assert!(chunk.cleaned_text().contains("within 2.5 hours"));
    }

    #[test]
    fn header_after_a_finished_sentence_is_recognised() {
        let text = format!("{SOW}\nSECTION F - DELIVERIES\n{REPORTS}");
        let segmentation = segment(&text).unwrap();
        let sections: Vec<_> = segmentation.chunks.iter().map(Chunk::section).collect();
        // The header itself is below the minimum length and dropped.
        assert_eq!(sections, [None, Some("Section F")]);
    }

    #[test]
    fn list_items_are_separate_units() {
        let text = format!("\u{2022} {SOW}\n  wrapped continuation line\n(b) {REPORTS}");
        let segmentation = segment(&text).unwrap();
        let kinds: Vec<_> = segmentation.chunks.iter().map(Chunk::kind).collect();
        assert_eq!(kinds, [ChunkKind::List, ChunkKind::List]);
        assert!(segmentation.chunks[0]
            .cleaned_text()
            .ends_with("wrapped continuation line"));
    }

    #[test]
    fn table_rows_are_grouped() {
        let text = "| CLIN | Description | Quantity |\n| 0001 | Hosting services, base year | 12 \
                    |\n| 0002 | Help desk support, base year | 12 |\n\n"
            .to_string()
            + SOW;
        let segmentation = segment(&text).unwrap();
        assert_eq!(segmentation.chunks[0].kind(), ChunkKind::Table);
        assert_eq!(segmentation.chunks[0].raw_text().lines().count(), 3);
        assert_eq!(segmentation.chunks[1].kind(), ChunkKind::Paragraph);
    }

    #[test]
    fn oversized_units_are_kept_whole_and_reported() {
        let long = std::iter::repeat_n(SOW, 40).collect::<Vec<_>>().join(" ");
        let text = format!("- {long}");
        let segmentation = segment(&text).unwrap();

        assert_eq!(segmentation.chunks.len(), 1);
        assert_eq!(segmentation.chunks[0].kind(), ChunkKind::Paragraph);
        assert!(matches!(
            segmentation.warnings.as_slice(),
            [SegmentWarning::OversizedUnit {
                page: 1,
                paragraph: 1,
                ..
            }]
        ));
    }

    #[test_case("3.1 Scope", Some((None, "3.1", "Scope")); "numbered")]
    #[test_case("C.3.1 Hosting", Some((Some("C"), "C.3.1", "Hosting")); "letter prefixed")]
    #[test_case("3. Something", None; "enumerator")]
    #[test_case("99.9% uptime is required", None; "decimal")]
    #[test_case("2.5 hours of notification", None; "lowercase continuation")]
    fn recognises_numbered_headers(line: &str, expected: Option<(Option<&str>, &str, &str)>) {
        let actual = numbered_header(line);
        let actual = actual
            .as_ref()
            .map(|(letter, label, title)| (letter.as_deref(), label.as_str(), *title));
        assert_eq!(actual, expected);
    }
}
