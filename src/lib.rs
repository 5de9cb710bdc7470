//! Requirement extraction and review for government solicitations.
//!
//! Solicitation text is split into provenance-tagged chunks, candidate
//! obligations are classified against a versioned pattern catalog, and the
//! resulting requirements are stored for human review with an append-only
//! audit history.

pub mod domain;
pub use domain::{
    Chunk, Classification, Confidence, Config, DocumentId, Requirement, Status, ValidationAction,
};

pub mod extraction;
pub use extraction::{PatternCatalog, Pipeline};

/// Filesystem storage of documents, requirements and review state.
pub mod storage;
pub use storage::{Workspace, WorkspaceError};
