//! On-disk record formats.
//!
//! Every file in a workspace carries a `_version` tag so that the format can
//! change without breaking existing workspaces. The domain types never see
//! these wrappers.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    domain::{
        requirement::ExtractionMethod, validation::Actor, Chunk, ChunkRef, Classification,
        Confidence, CrossReference, DocumentId, DocumentStatus, History, Provenance, Requirement,
        Status, Verdict,
    },
    extraction::SegmentWarning,
};

/// The processing record of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DocumentVersions", into = "DocumentVersions")]
pub struct DocumentRecord {
    /// The document.
    pub id: DocumentId,
    /// Human readable title, usually the source file name.
    pub title: String,
    /// Processing state.
    pub status: DocumentStatus,
    /// When the document was registered.
    pub uploaded_at: DateTime<Utc>,
    /// When processing finished, successfully or not.
    pub processed_at: Option<DateTime<Utc>>,
    /// Message for the terminal error state.
    pub error: Option<String>,
    /// Segmentation warnings.
    pub warnings: Vec<SegmentWarning>,
    /// Number of pages seen.
    pub pages: u32,
    /// Number of chunks stored.
    pub chunks: usize,
    /// Number of requirements stored.
    pub requirements: usize,
    /// Number of cross-references stored.
    pub cross_references: usize,
    /// The scorer and catalog used.
    pub method: Option<ExtractionMethod>,
}

impl DocumentRecord {
    /// A freshly registered document.
    #[must_use]
    pub fn uploaded(id: DocumentId, title: String) -> Self {
        Self {
            id,
            title,
            status: DocumentStatus::Uploaded,
            uploaded_at: Utc::now(),
            processed_at: None,
            error: None,
            warnings: Vec::new(),
            pages: 0,
            chunks: 0,
            requirements: 0,
            cross_references: 0,
            method: None,
        }
    }

    /// Seconds between registration and the end of processing.
    #[must_use]
    pub fn processing_seconds(&self) -> Option<f64> {
        self.processed_at.map(|processed| {
            #[allow(clippy::cast_precision_loss)]
            let millis = (processed - self.uploaded_at).num_milliseconds() as f64;
            millis / 1000.0
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum DocumentVersions {
    #[serde(rename = "1")]
    V1 {
        id: DocumentId,
        title: String,
        status: DocumentStatus,
        uploaded_at: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        processed_at: Option<DateTime<Utc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<SegmentWarning>,
        #[serde(default)]
        pages: u32,
        #[serde(default)]
        chunks: usize,
        #[serde(default)]
        requirements: usize,
        #[serde(default)]
        cross_references: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<ExtractionMethod>,
    },
}

impl From<DocumentVersions> for DocumentRecord {
    fn from(versions: DocumentVersions) -> Self {
        match versions {
            DocumentVersions::V1 {
                id,
                title,
                status,
                uploaded_at,
                processed_at,
                error,
                warnings,
                pages,
                chunks,
                requirements,
                cross_references,
                method,
            } => Self {
                id,
                title,
                status,
                uploaded_at,
                processed_at,
                error,
                warnings,
                pages,
                chunks,
                requirements,
                cross_references,
                method,
            },
        }
    }
}

impl From<DocumentRecord> for DocumentVersions {
    fn from(record: DocumentRecord) -> Self {
        Self::V1 {
            id: record.id,
            title: record.title,
            status: record.status,
            uploaded_at: record.uploaded_at,
            processed_at: record.processed_at,
            error: record.error,
            warnings: record.warnings,
            pages: record.pages,
            chunks: record.chunks,
            requirements: record.requirements,
            cross_references: record.cross_references,
            method: record.method,
        }
    }
}

/// The serialized form of a requirement.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
pub(crate) enum RequirementRecord {
    #[serde(rename = "1")]
    V1 {
        id: Uuid,
        source: ChunkRef,
        ordinal: u32,
        #[serde(default)]
        provenance: Provenance,
        raw_text: String,
        clean_text: String,
        classification: Classification,
        score: f64,
        confidence: Confidence,
        baseline: Verdict,
        extraction: ExtractionMethod,
        status: Status,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        validation_notes: Option<String>,
        #[serde(default, skip_serializing_if = "History::is_empty")]
        history: History,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        validated_by: Option<Actor>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        validated_at: Option<DateTime<Utc>>,
        created: DateTime<Utc>,
    },
}

impl From<RequirementRecord> for Requirement {
    fn from(record: RequirementRecord) -> Self {
        match record {
            RequirementRecord::V1 {
                id,
                source,
                ordinal,
                provenance,
                raw_text,
                clean_text,
                classification,
                score,
                confidence,
                baseline,
                extraction,
                status,
                validation_notes,
                history,
                validated_by,
                validated_at,
                created,
            } => Self {
                id,
                source,
                ordinal,
                provenance,
                raw_text,
                clean_text,
                classification,
                score,
                confidence,
                baseline,
                extraction,
                status,
                validation_notes,
                history,
                validated_by,
                validated_at,
                created,
            },
        }
    }
}

impl From<Requirement> for RequirementRecord {
    fn from(requirement: Requirement) -> Self {
        Self::V1 {
            id: requirement.id,
            source: requirement.source,
            ordinal: requirement.ordinal,
            provenance: requirement.provenance,
            raw_text: requirement.raw_text,
            clean_text: requirement.clean_text,
            classification: requirement.classification,
            score: requirement.score,
            confidence: requirement.confidence,
            baseline: requirement.baseline,
            extraction: requirement.extraction,
            status: requirement.status,
            validation_notes: requirement.validation_notes,
            history: requirement.history,
            validated_by: requirement.validated_by,
            validated_at: requirement.validated_at,
            created: requirement.created,
        }
    }
}

/// A versioned list of items, used for the chunk and cross-reference files.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum ListVersions<T> {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "Vec::new")]
        items: Vec<T>,
    },
}

/// Errors reading or writing a record file.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The file could not be read or written.
    #[error("{}: {source}", path.display())]
    Io {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },

    /// The file is not a valid record.
    #[error("{}: {source}", path.display())]
    Yaml {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        source: serde_yaml::Error,
    },
}

impl RecordError {
    /// Whether the error is a missing file.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

pub(crate) fn read_document(path: &Path) -> Result<DocumentRecord, RecordError> {
    read_yaml(path)
}

pub(crate) fn write_document(path: &Path, record: &DocumentRecord) -> Result<(), RecordError> {
    write_yaml(path, record)
}

pub(crate) fn read_requirement(path: &Path) -> Result<Requirement, RecordError> {
    read_yaml::<RequirementRecord>(path).map(Requirement::from)
}

pub(crate) fn write_requirement(path: &Path, requirement: &Requirement) -> Result<(), RecordError> {
    write_yaml(path, &RequirementRecord::from(requirement.clone()))
}

pub(crate) fn read_chunks(path: &Path) -> Result<Vec<Chunk>, RecordError> {
    read_list(path)
}

pub(crate) fn write_chunks(path: &Path, chunks: &[Chunk]) -> Result<(), RecordError> {
    write_list(path, chunks)
}

pub(crate) fn read_cross_references(path: &Path) -> Result<Vec<CrossReference>, RecordError> {
    read_list(path)
}

pub(crate) fn write_cross_references(
    path: &Path,
    references: &[CrossReference],
) -> Result<(), RecordError> {
    write_list(path, references)
}

fn read_list<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, RecordError> {
    read_yaml::<ListVersions<T>>(path).map(|ListVersions::V1 { items }| items)
}

fn write_list<T: Serialize + Clone>(path: &Path, items: &[T]) -> Result<(), RecordError> {
    write_yaml(
        path,
        &ListVersions::V1 {
            items: items.to_vec(),
        },
    )
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, RecordError> {
    let content = fs::read_to_string(path).map_err(|source| RecordError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| RecordError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialize `value` and replace `path` with it atomically.
///
/// The content is written to a sibling temporary file which is then renamed
/// over the target, so readers see either the old or the new record.
fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<(), RecordError> {
    let io_error = |source| RecordError::Io {
        path: path.to_path_buf(),
        source,
    };

    let content = serde_yaml::to_string(value).map_err(|source| RecordError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = fs::File::create(&tmp).map_err(io_error)?;
    file.write_all(content.as_bytes()).map_err(io_error)?;
    file.sync_all().map_err(io_error)?;
    drop(file);

    fs::rename(&tmp, path).map_err(io_error)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::domain::{requirement::tests::sample_requirement, ValidationAction};

    #[test]
    fn requirement_survives_a_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("req.yaml");

        let mut requirement = sample_requirement("rfp", 3, 0.4);
        requirement
            .apply(
                &ValidationAction::flag(Actor::new("alice").unwrap(), "check the figure"),
                Utc::now(),
            )
            .unwrap();

        write_requirement(&path, &requirement).unwrap();
        let loaded = read_requirement(&path).unwrap();

        assert_eq!(loaded, requirement);
        assert!(!tmp.path().join("req.yaml.tmp").exists());
    }

    #[test]
    fn records_are_version_tagged() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("req.yaml");
        write_requirement(&path, &sample_requirement("rfp", 0, 0.9)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("_version: '1'"));
        assert!(content.contains("status: ai_extracted"));
        assert!(!content.contains("history"));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("document.yaml");
        fs::write(&path, "_version: '99'\nid: rfp\n").unwrap();

        assert!(matches!(
            read_document(&path),
            Err(RecordError::Yaml { .. })
        ));
    }

    #[test]
    fn missing_file_is_reported_as_not_found() {
        let tmp = TempDir::new().unwrap();
        let error = read_document(&tmp.path().join("absent.yaml")).unwrap_err();
        assert!(error.is_not_found());
    }

    #[test]
    fn document_record_round_trips() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("document.yaml");

        let mut record =
            DocumentRecord::uploaded(DocumentId::new("rfp".to_string()).unwrap(), "RFP".into());
        record.status = DocumentStatus::ExtractionComplete;
        record.warnings = vec![SegmentWarning::EmptyPage { page: 2 }];
        record.processed_at = Some(record.uploaded_at + chrono::Duration::milliseconds(1500));

        write_document(&path, &record).unwrap();
        let loaded = read_document(&path).unwrap();

        assert_eq!(loaded, record);
        assert_eq!(loaded.processing_seconds(), Some(1.5));
    }
}
