//! A filesystem backed store of processed documents and their requirements.
//!
//! ```text
//! <root>/
//!   .shall/config.toml
//!   .shall/catalog.toml            (optional catalog override)
//!   documents/<id>/document.yaml
//!   documents/<id>/chunks.yaml
//!   documents/<id>/cross_references.yaml
//!   documents/<id>/requirements/<uuid>.yaml
//! ```

use std::{
    collections::HashMap,
    ffi::OsStr,
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use chrono::Utc;
use rayon::prelude::*;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::{
    domain::{
        Chunk, Config, ConfigError, CrossReference, DocumentId, DocumentStatus, Requirement,
        ValidationAction, ValidationError, ValidationWarning,
    },
    extraction::{
        embedding::{self, Embedder},
        CatalogError, Extraction, Input, PatternCatalog, Pipeline, PipelineError,
    },
    storage::{
        lock::LockFile,
        queue::{self, QueuePage, QueueQuery},
        record::{self, DocumentRecord, RecordError},
        report::{self, ComplianceMatrix, DocumentStats, SearchQuery, WorkspaceStats},
    },
};

const META_DIR: &str = ".shall";
const DOCUMENTS_DIR: &str = "documents";
const REQUIREMENTS_DIR: &str = "requirements";

/// Errors raised by the workspace.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// The directory has no `.shall` metadata directory.
    #[error("{} is not a shall workspace (run `shall init` first)", .0.display())]
    NotAWorkspace(PathBuf),

    /// `init` was run on an existing workspace.
    #[error("{} is already a shall workspace", .0.display())]
    AlreadyInitialised(PathBuf),

    /// The configuration file is unreadable or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The catalog override is invalid.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A record could not be read or written.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// A filesystem operation failed.
    #[error("{}: {source}", path.display())]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },

    /// No such document.
    #[error("document {0} not found")]
    DocumentNotFound(DocumentId),

    /// The document already has extracted requirements.
    #[error("document {0} has already been processed")]
    AlreadyProcessed(DocumentId),

    /// No such requirement.
    #[error("requirement {0} not found")]
    RequirementNotFound(Uuid),

    /// The validation action was rejected.
    #[error("requirement {requirement}: {source}")]
    Validation {
        /// The requirement.
        requirement: Uuid,
        /// Why the action was rejected.
        source: ValidationError,
    },

    /// Another writer got to the requirement first.
    #[error("requirement {requirement}: {conflict}")]
    Conflict {
        /// The requirement.
        requirement: Uuid,
        /// What the other writer did.
        conflict: Conflict,
    },
}

/// Why a write to a requirement was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Conflict {
    /// The requirement changed since the caller read it.
    #[error("expected revision {expected} but the stored revision is {actual}")]
    StaleRevision {
        /// The revision the caller read.
        expected: u64,
        /// The stored revision.
        actual: u64,
    },

    /// Another process holds the requirement's lock file.
    #[error("another process is writing this requirement")]
    Locked,
}

/// The result of applying a validation action.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// The requirement as stored after the action.
    pub requirement: Requirement,
    /// Non-fatal observations about the action.
    pub warnings: Vec<ValidationWarning>,
}

/// The result of a bulk re-embedding pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReembedSummary {
    /// Documents whose chunks were re-embedded.
    pub documents: usize,
    /// Chunks visited.
    pub chunks: usize,
    /// Chunks that received an embedding.
    pub embedded: usize,
}

/// One in-process mutex per requirement, created on first use.
#[derive(Debug, Default)]
struct LockTable(Mutex<HashMap<Uuid, Arc<Mutex<()>>>>);

impl LockTable {
    fn slot(&self, id: Uuid) -> Arc<Mutex<()>> {
        let mut table = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(table.entry(id).or_default())
    }
}

/// A directory of processed documents.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    config: Config,
    locks: LockTable,
}

impl Workspace {
    /// Create a new workspace at `root` with the given configuration.
    ///
    /// # Errors
    ///
    /// Fails if `root` is already a workspace or cannot be written to.
    pub fn init(root: impl Into<PathBuf>, config: Config) -> Result<Self, WorkspaceError> {
        let root = root.into();
        let meta = root.join(META_DIR);
        if meta.exists() {
            return Err(WorkspaceError::AlreadyInitialised(root));
        }

        create_dir(&meta)?;
        create_dir(&root.join(DOCUMENTS_DIR))?;
        config.save(&meta.join("config.toml"))?;

        tracing::info!("Initialised workspace at {}", root.display());

        Ok(Self {
            root,
            config,
            locks: LockTable::default(),
        })
    }

    /// Open an existing workspace.
    ///
    /// A missing configuration file is treated as the default configuration.
    ///
    /// # Errors
    ///
    /// Fails if `root` is not a workspace or its configuration is invalid.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, WorkspaceError> {
        let root = root.into();
        if !root.join(META_DIR).is_dir() {
            return Err(WorkspaceError::NotAWorkspace(root));
        }
        let config = load_config(&root)?;

        Ok(Self {
            root,
            config,
            locks: LockTable::default(),
        })
    }

    /// The workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The workspace configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The pattern catalog: `.shall/catalog.toml` if present, otherwise the
    /// built-in catalog.
    ///
    /// # Errors
    ///
    /// Fails if the override cannot be read or compiled.
    pub fn catalog(&self) -> Result<Arc<PatternCatalog>, WorkspaceError> {
        let path = self.root.join(META_DIR).join("catalog.toml");
        let catalog = if path.exists() {
            PatternCatalog::load(&path)?
        } else {
            PatternCatalog::builtin()?
        };
        tracing::debug!(
            "Using catalog {} ({})",
            catalog.version(),
            catalog.fingerprint()
        );
        Ok(catalog)
    }

    /// A pipeline configured for this workspace.
    ///
    /// # Errors
    ///
    /// Fails if the catalog cannot be loaded.
    pub fn pipeline(&self) -> Result<Pipeline, WorkspaceError> {
        Ok(Pipeline::new(&self.config, self.catalog()?))
    }

    /// Register a document and mark it as processing.
    ///
    /// A document left in `processing` or `error` by an earlier run may be
    /// processed again; its partial outputs are discarded first.
    ///
    /// # Errors
    ///
    /// Fails if the document was already processed successfully, or on I/O
    /// errors.
    pub fn begin(&self, document: &DocumentId, title: &str) -> Result<DocumentRecord, WorkspaceError> {
        let path = self.document_path(document);
        match record::read_document(&path) {
            Ok(existing) if existing.status == DocumentStatus::ExtractionComplete => {
                return Err(WorkspaceError::AlreadyProcessed(document.clone()));
            }
            Ok(existing) => {
                tracing::warn!(
                    "{document}: discarding outputs of an earlier run left in state {}",
                    existing.status
                );
                self.discard_outputs(document)?;
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let mut record = DocumentRecord::uploaded(document.clone(), title.to_string());
        record.status = DocumentStatus::Processing;
        record::write_document(&path, &record)?;
        Ok(record)
    }

    /// Store the outcome of processing a registered document.
    ///
    /// A pipeline error is recorded as the document's terminal `error` state
    /// and is not returned as an error.
    ///
    /// # Errors
    ///
    /// Fails if the document was never registered, or on I/O errors.
    pub fn finish(
        &self,
        document: &DocumentId,
        result: Result<Extraction, PipelineError>,
    ) -> Result<DocumentRecord, WorkspaceError> {
        let path = self.document_path(document);
        let mut record = self.document(document)?;
        record.processed_at = Some(Utc::now());

        match result {
            Ok(extraction) => {
                let dir = self.document_dir(document);
                record::write_chunks(&dir.join("chunks.yaml"), &extraction.chunks)?;
                extraction
                    .requirements
                    .par_iter()
                    .try_for_each(|requirement| {
                        record::write_requirement(
                            &self.requirement_path(document, requirement.id()),
                            requirement,
                        )
                    })?;
                record::write_cross_references(
                    &dir.join("cross_references.yaml"),
                    &extraction.cross_references,
                )?;

                record.status = DocumentStatus::ExtractionComplete;
                record.error = None;
                record.pages = extraction.pages;
                record.chunks = extraction.chunks.len();
                record.requirements = extraction.requirements.len();
                record.cross_references = extraction.cross_references.len();
                record.warnings = extraction.warnings;
                record.method = Some(extraction.method);
                tracing::info!(
                    "{document}: stored {} requirements",
                    record.requirements
                );
            }
            Err(e) => {
                tracing::warn!("{document}: processing failed: {e}");
                record.status = DocumentStatus::Error;
                record.error = Some(e.to_string());
            }
        }

        record::write_document(&path, &record)?;
        Ok(record)
    }

    /// Register, process and store one document.
    ///
    /// # Errors
    ///
    /// See [`Self::begin`] and [`Self::finish`].
    #[tracing::instrument(skip_all, fields(document = %input.document))]
    pub fn process(
        &self,
        pipeline: &Pipeline,
        input: &Input,
        title: &str,
    ) -> Result<DocumentRecord, WorkspaceError> {
        self.begin(&input.document, title)?;
        let result = pipeline.process(&input.document, &input.raw_text, &input.boundaries);
        self.finish(&input.document, result)
    }

    /// All document records, ordered by id.
    ///
    /// # Errors
    ///
    /// Fails if a record cannot be read.
    pub fn documents(&self) -> Result<Vec<DocumentRecord>, WorkspaceError> {
        let paths: Vec<PathBuf> = WalkDir::new(self.root.join(DOCUMENTS_DIR))
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name() == "document.yaml")
            .map(walkdir::DirEntry::into_path)
            .collect();

        let mut documents = paths
            .par_iter()
            .map(|path| record::read_document(path))
            .collect::<Result<Vec<_>, _>>()?;
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(documents)
    }

    /// The record of one document.
    ///
    /// # Errors
    ///
    /// Fails if the document does not exist or its record cannot be read.
    pub fn document(&self, document: &DocumentId) -> Result<DocumentRecord, WorkspaceError> {
        record::read_document(&self.document_path(document)).map_err(|e| {
            if e.is_not_found() {
                WorkspaceError::DocumentNotFound(document.clone())
            } else {
                e.into()
            }
        })
    }

    /// The chunks of a document, in index order.
    ///
    /// # Errors
    ///
    /// Fails if the document does not exist or its chunks cannot be read.
    pub fn chunks(&self, document: &DocumentId) -> Result<Vec<Chunk>, WorkspaceError> {
        self.document(document)?;
        read_optional(&self.document_dir(document).join("chunks.yaml"), record::read_chunks)
    }

    /// The cross-references of a document.
    ///
    /// # Errors
    ///
    /// Fails if the document does not exist or its references cannot be read.
    pub fn cross_references(
        &self,
        document: &DocumentId,
    ) -> Result<Vec<CrossReference>, WorkspaceError> {
        self.document(document)?;
        read_optional(
            &self.document_dir(document).join("cross_references.yaml"),
            record::read_cross_references,
        )
    }

    /// Requirements of one document, or of all documents, ordered by
    /// document, chunk index and ordinal.
    ///
    /// # Errors
    ///
    /// Fails if the document does not exist or a record cannot be read.
    pub fn requirements(
        &self,
        document: Option<&DocumentId>,
    ) -> Result<Vec<Requirement>, WorkspaceError> {
        let base = match document {
            Some(document) => {
                self.document(document)?;
                self.document_dir(document)
            }
            None => self.root.join(DOCUMENTS_DIR),
        };

        let paths = collect_requirement_paths(&base);
        let mut requirements = paths
            .par_iter()
            .map(|path| record::read_requirement(path))
            .collect::<Result<Vec<_>, _>>()?;
        requirements.sort_by(|a, b| {
            (a.document(), a.source().index, a.ordinal())
                .cmp(&(b.document(), b.source().index, b.ordinal()))
        });
        Ok(requirements)
    }

    /// One requirement by id.
    ///
    /// # Errors
    ///
    /// Fails if the requirement does not exist or cannot be read.
    pub fn requirement(&self, id: Uuid) -> Result<Requirement, WorkspaceError> {
        let path = self.find_requirement(id)?;
        Ok(record::read_requirement(&path)?)
    }

    /// Apply a reviewer action to a stored requirement.
    ///
    /// The read, check and write happen inside a critical section for the
    /// requirement: an in-process mutex plus a lock file created exclusively
    /// next to the record. If `expected_revision` is given and the stored
    /// requirement has moved on, the action is rejected as a conflict.
    ///
    /// # Errors
    ///
    /// - the requirement does not exist
    /// - the action is invalid (nothing is written)
    /// - another writer holds the lock or the revision is stale
    /// - I/O errors
    pub fn apply_validation_action(
        &self,
        id: Uuid,
        action: &ValidationAction,
        expected_revision: Option<u64>,
    ) -> Result<Outcome, WorkspaceError> {
        let path = self.find_requirement(id)?;

        let slot = self.locks.slot(id);
        let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let lock_path = path.with_extension("lock");
        let _lock = LockFile::acquire(&lock_path)
            .map_err(|source| WorkspaceError::Io {
                path: lock_path,
                source,
            })?
            .ok_or(WorkspaceError::Conflict {
                requirement: id,
                conflict: Conflict::Locked,
            })?;

        let mut requirement = record::read_requirement(&path)?;
        if let Some(expected) = expected_revision {
            let actual = requirement.revision();
            if actual != expected {
                return Err(WorkspaceError::Conflict {
                    requirement: id,
                    conflict: Conflict::StaleRevision { expected, actual },
                });
            }
        }

        let transition = requirement
            .apply(action, Utc::now())
            .map_err(|source| WorkspaceError::Validation {
                requirement: id,
                source,
            })?;
        record::write_requirement(&path, &requirement)?;

        tracing::info!(
            "requirement {id}: {} -> {} by {}",
            transition.from,
            transition.to,
            action.actor()
        );

        Ok(Outcome {
            requirement,
            warnings: transition.warnings,
        })
    }

    /// One page of the review queue.
    ///
    /// # Errors
    ///
    /// Fails if requirements cannot be read.
    pub fn review_queue(&self, query: &QueueQuery) -> Result<QueuePage, WorkspaceError> {
        let requirements = self.requirements(query.document_filter())?;
        Ok(queue::review_queue(requirements, query))
    }

    /// The compliance matrix of a document.
    ///
    /// # Errors
    ///
    /// Fails if the document does not exist or cannot be read.
    pub fn compliance_matrix(&self, document: &DocumentId) -> Result<ComplianceMatrix, WorkspaceError> {
        let record = self.document(document)?;
        let requirements = self.requirements(Some(document))?;
        let references = self.cross_references(document)?;
        Ok(report::compliance_matrix(&record, requirements, &references))
    }

    /// Requirements matching a text search.
    ///
    /// # Errors
    ///
    /// Fails if requirements cannot be read.
    pub fn search(&self, query: &SearchQuery) -> Result<Vec<Requirement>, WorkspaceError> {
        Ok(report::search(self.requirements(None)?, query))
    }

    /// Statistics for one document.
    ///
    /// # Errors
    ///
    /// Fails if the document does not exist or cannot be read.
    pub fn document_stats(&self, document: &DocumentId) -> Result<DocumentStats, WorkspaceError> {
        let record = self.document(document)?;
        let requirements = self.requirements(Some(document))?;
        Ok(report::document_stats(&record, &requirements))
    }

    /// Statistics for the whole workspace.
    ///
    /// # Errors
    ///
    /// Fails if records cannot be read.
    pub fn stats(&self) -> Result<WorkspaceStats, WorkspaceError> {
        let documents = self.documents()?;
        let requirements = self.requirements(None)?;
        Ok(report::workspace_stats(&documents, &requirements))
    }

    /// Recompute chunk embeddings for processed documents.
    ///
    /// Only the `embedding` field of each chunk changes. Documents that did
    /// not complete extraction are skipped.
    ///
    /// # Errors
    ///
    /// Fails if chunks cannot be read or written.
    pub fn reembed(
        &self,
        embedder: &dyn Embedder,
        document: Option<&DocumentId>,
    ) -> Result<ReembedSummary, WorkspaceError> {
        let documents = match document {
            Some(document) => vec![self.document(document)?],
            None => self.documents()?,
        };

        let mut summary = ReembedSummary::default();
        for processed in documents
            .iter()
            .filter(|d| d.status == DocumentStatus::ExtractionComplete)
        {
            let path = self.document_dir(&processed.id).join("chunks.yaml");
            let mut chunks = read_optional(&path, record::read_chunks)?;
            let embedded = embedding::embed_chunks(embedder, &mut chunks);
            record::write_chunks(&path, &chunks)?;

            tracing::info!(
                "{}: embedded {embedded} of {} chunks with {}",
                processed.id,
                chunks.len(),
                embedder.name()
            );
            summary.documents += 1;
            summary.chunks += chunks.len();
            summary.embedded += embedded;
        }
        Ok(summary)
    }

    fn document_dir(&self, document: &DocumentId) -> PathBuf {
        self.root.join(DOCUMENTS_DIR).join(document.as_str())
    }

    fn document_path(&self, document: &DocumentId) -> PathBuf {
        self.document_dir(document).join("document.yaml")
    }

    fn requirement_path(&self, document: &DocumentId, id: Uuid) -> PathBuf {
        self.document_dir(document)
            .join(REQUIREMENTS_DIR)
            .join(format!("{id}.yaml"))
    }

    fn find_requirement(&self, id: Uuid) -> Result<PathBuf, WorkspaceError> {
        let file_name = format!("{id}.yaml");
        WalkDir::new(self.root.join(DOCUMENTS_DIR))
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .map(|entry| entry.path().join(REQUIREMENTS_DIR).join(&file_name))
            .find(|path| path.is_file())
            .ok_or(WorkspaceError::RequirementNotFound(id))
    }

    fn discard_outputs(&self, document: &DocumentId) -> Result<(), WorkspaceError> {
        let dir = self.document_dir(document);
        let requirements = dir.join(REQUIREMENTS_DIR);
        if requirements.exists() {
            fs::remove_dir_all(&requirements).map_err(|source| WorkspaceError::Io {
                path: requirements.clone(),
                source,
            })?;
        }
        for name in ["chunks.yaml", "cross_references.yaml"] {
            let path = dir.join(name);
            if path.exists() {
                fs::remove_file(&path).map_err(|source| WorkspaceError::Io { path, source })?;
            }
        }
        Ok(())
    }
}

fn load_config(root: &Path) -> Result<Config, WorkspaceError> {
    let path = root.join(META_DIR).join("config.toml");
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    Ok(Config::load(&path)?)
}

fn create_dir(path: &Path) -> Result<(), WorkspaceError> {
    fs::create_dir_all(path).map_err(|source| WorkspaceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_optional<T>(
    path: &Path,
    read: impl Fn(&Path) -> Result<Vec<T>, RecordError>,
) -> Result<Vec<T>, WorkspaceError> {
    match read(path) {
        Ok(items) => Ok(items),
        Err(e) if e.is_not_found() => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

fn collect_requirement_paths(base: &Path) -> Vec<PathBuf> {
    WalkDir::new(base)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension() == Some(OsStr::new("yaml")))
        .filter(|entry| {
            entry
                .path()
                .parent()
                .and_then(Path::file_name)
                .is_some_and(|name| name == REQUIREMENTS_DIR)
        })
        .map(walkdir::DirEntry::into_path)
        .collect()
}
