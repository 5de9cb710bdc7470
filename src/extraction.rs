//! Requirement extraction.
//!
//! Raw document text is split into provenance-tagged chunks, candidate
//! sentences are gated on requirement indicators and classified against a
//! pattern catalog, and the resulting requirements are linked to the places
//! they reference.

pub mod assembler;

pub mod catalog;
pub use catalog::{CatalogError, PatternCatalog};

pub mod classifier;
pub use classifier::RuleClassifier;

pub mod embedding;
pub use embedding::{EmbedError, Embedder, HashingEmbedder, OpenAiEmbedder};

mod pipeline;
pub use pipeline::{Extraction, Input, Pipeline, PipelineError};

pub mod references;

pub mod scorer;
pub use scorer::{ExternalModel, RuleBased, Scorer, ScorerError, ScoringChain};

pub mod segmenter;
pub use segmenter::{PageBoundaries, SegmentError, SegmentWarning, Segmentation, Segmenter};
