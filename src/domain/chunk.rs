use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::DocumentId;

/// Stable address of a chunk: its document plus its position in that
/// document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkRef {
    /// The document the chunk belongs to.
    pub document: DocumentId,
    /// Position of the chunk within the document, starting at 0.
    pub index: u32,
}

impl fmt::Display for ChunkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.document, self.index)
    }
}

/// The structural kind of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// Running prose.
    #[default]
    Paragraph,
    /// Rows of a table.
    Table,
    /// A bulleted or enumerated list item.
    List,
    /// A section or numbered heading.
    Header,
}

impl ChunkKind {
    /// The `snake_case` name used in records and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paragraph => "paragraph",
            Self::Table => "table",
            Self::List => "list",
            Self::Header => "header",
        }
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a piece of text came from in the source document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Provenance {
    /// Page number, starting at 1. `None` if unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Paragraph counter within the page. `None` if unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph: Option<u32>,
    /// Section label in force, e.g. `Section C`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Subsection label in force, e.g. `3.1.1` or `C.3.1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsection: Option<String>,
}

/// A contiguous, provenance-tagged unit of source text.
///
/// Chunks are produced once by the segmenter and are immutable afterwards,
/// apart from their embedding which a bulk re-embedding pass may replace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub(crate) document: DocumentId,
    pub(crate) index: u32,
    pub(crate) kind: ChunkKind,
    #[serde(flatten)]
    pub(crate) provenance: Provenance,
    pub(crate) raw_text: String,
    pub(crate) cleaned_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) embedding: Option<Vec<f32>>,
}

impl Chunk {
    pub(crate) fn new(
        document: DocumentId,
        index: u32,
        kind: ChunkKind,
        provenance: Provenance,
        raw_text: String,
    ) -> Self {
        let cleaned_text = clean_text(&raw_text);
        Self {
            document,
            index,
            kind,
            provenance,
            raw_text,
            cleaned_text,
            embedding: None,
        }
    }

    /// The address of this chunk.
    #[must_use]
    pub fn chunk_ref(&self) -> ChunkRef {
        ChunkRef {
            document: self.document.clone(),
            index: self.index,
        }
    }

    /// The document this chunk belongs to.
    #[must_use]
    pub const fn document(&self) -> &DocumentId {
        &self.document
    }

    /// Position of the chunk within its document.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Structural kind of the chunk.
    #[must_use]
    pub const fn kind(&self) -> ChunkKind {
        self.kind
    }

    /// Page, paragraph and section labels of the chunk.
    #[must_use]
    pub const fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// The section label in force for this chunk.
    #[must_use]
    pub fn section(&self) -> Option<&str> {
        self.provenance.section.as_deref()
    }

    /// The subsection label in force for this chunk.
    #[must_use]
    pub fn subsection(&self) -> Option<&str> {
        self.provenance.subsection.as_deref()
    }

    /// The text exactly as segmented.
    #[must_use]
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Whitespace-normalised text with control characters removed.
    #[must_use]
    pub fn cleaned_text(&self) -> &str {
        &self.cleaned_text
    }

    /// The embedding vector, if one has been computed.
    #[must_use]
    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    /// Replace the embedding.
    ///
    /// This is the only mutation permitted on a chunk after segmentation.
    pub fn set_embedding(&mut self, embedding: Option<Vec<f32>>) {
        self.embedding = embedding;
    }
}

/// Normalise whitespace and strip control and zero-width characters.
///
/// Runs of whitespace (including newlines and non-breaking spaces) collapse
/// to a single space. Soft hyphens and zero-width characters are removed.
/// Nothing else is altered.
#[must_use]
pub fn clean_text(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if c.is_control() || is_invisible(c) {
            continue;
        }
        if pending_space && !cleaned.is_empty() {
            cleaned.push(' ');
        }
        pending_space = false;
        cleaned.push(c);
    }

    cleaned
}

const fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}'
    )
}
