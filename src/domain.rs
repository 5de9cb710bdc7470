//! Domain models for requirement extraction and review.
//!
//! This module contains the core types: provenance-tagged chunks of source
//! text, the requirements extracted from them, their classification and
//! confidence, the reviewer state machine and its audit history, and
//! configuration.

mod chunk;
pub use chunk::{clean_text, Chunk, ChunkKind, ChunkRef, Provenance};

mod classification;
pub use classification::{
    Classification, Confidence, UnknownClassificationError, UnknownConfidenceError, Verdict,
};

mod config;
pub use config::{Config, ConfigError, EmbeddingConfig, ExternalScorerConfig};

/// Cross-references from requirements to other document locations.
pub mod cross_reference;
pub use cross_reference::{CrossReference, ReferenceKind, ReferenceTarget};

mod document;
pub use document::{DocumentId, DocumentStatus, InvalidDocumentIdError};

pub mod history;
pub use history::{History, HistoryEntry, Snapshot};

/// Requirement domain model.
pub mod requirement;
pub use requirement::{ExtractionMethod, Requirement, Status};

pub mod validation;
pub use validation::{
    ActionKind, Actor, Transition, ValidationAction, ValidationError, ValidationWarning,
};
