//! Read-only views over a workspace: compliance matrices, text search and
//! statistics.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::{
        Classification, Confidence, CrossReference, DocumentId, DocumentStatus, Requirement,
        Status,
    },
    storage::DocumentRecord,
};

/// One row of a compliance matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixItem {
    /// The requirement.
    pub requirement: Uuid,
    /// The reviewed text of the requirement.
    pub text: String,
    /// Current classification.
    pub classification: Classification,
    /// Section label, if known.
    pub section: Option<String>,
    /// Subsection label, if known.
    pub subsection: Option<String>,
    /// Page number, if known.
    pub page: Option<u32>,
    /// Review status.
    pub status: Status,
    /// Texts of the cross-references found in the requirement.
    pub cross_references: Vec<String>,
}

/// Every requirement of a document with its review state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceMatrix {
    /// The document.
    pub document: DocumentId,
    /// The document title.
    pub title: String,
    /// Rows, ordered by page, paragraph, chunk and ordinal.
    pub items: Vec<MatrixItem>,
    /// Number of rows.
    pub total: usize,
    /// Rows that a reviewer approved or corrected.
    pub validated: usize,
    /// Rows not yet reviewed.
    pub pending: usize,
    /// When the matrix was built.
    pub generated_at: DateTime<Utc>,
}

/// Build the compliance matrix of a document.
///
/// Requirements whose page or paragraph is unknown sort after those where it
/// is known.
#[must_use]
pub fn compliance_matrix(
    record: &DocumentRecord,
    mut requirements: Vec<Requirement>,
    references: &[CrossReference],
) -> ComplianceMatrix {
    let mut by_requirement: HashMap<Uuid, Vec<String>> = HashMap::new();
    for reference in references {
        by_requirement
            .entry(reference.requirement())
            .or_default()
            .push(reference.text().to_string());
    }

    requirements.sort_by_key(|r| {
        (
            r.provenance().page.unwrap_or(u32::MAX),
            r.provenance().paragraph.unwrap_or(u32::MAX),
            r.source().index,
            r.ordinal(),
        )
    });

    let items: Vec<MatrixItem> = requirements
        .into_iter()
        .map(|requirement| MatrixItem {
            requirement: requirement.id(),
            text: requirement.clean_text().to_string(),
            classification: requirement.classification(),
            section: requirement.provenance().section.clone(),
            subsection: requirement.provenance().subsection.clone(),
            page: requirement.provenance().page,
            status: requirement.status(),
            cross_references: by_requirement.remove(&requirement.id()).unwrap_or_default(),
        })
        .collect();

    let validated = items
        .iter()
        .filter(|item| item.status.is_validated())
        .count();
    let pending = items
        .iter()
        .filter(|item| item.status == Status::AiExtracted)
        .count();

    ComplianceMatrix {
        document: record.id.clone(),
        title: record.title.clone(),
        total: items.len(),
        items,
        validated,
        pending,
        generated_at: Utc::now(),
    }
}

/// Longest accepted search text, in characters.
pub const MAX_QUERY_CHARS: usize = 500;

/// Largest number of search results that may be requested.
pub const MAX_SEARCH_LIMIT: usize = 200;

/// Errors building a search query.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SearchError {
    /// The search text is blank.
    #[error("search text must not be blank")]
    BlankQuery,

    /// The search text is too long.
    #[error("search text must be at most {MAX_QUERY_CHARS} characters, got {0}")]
    QueryTooLong(usize),

    /// The result limit is out of range.
    #[error("search limit must be between 1 and {MAX_SEARCH_LIMIT}, got {0}")]
    InvalidLimit(usize),
}

/// A case-insensitive text search over requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    needle: String,
    documents: Vec<DocumentId>,
    classifications: Vec<Classification>,
    statuses: Vec<Status>,
    limit: usize,
}

impl SearchQuery {
    /// Search for `text` in the raw and clean text of requirements.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is blank or too long.
    pub fn new(text: &str) -> Result<Self, SearchError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SearchError::BlankQuery);
        }
        let chars = text.chars().count();
        if chars > MAX_QUERY_CHARS {
            return Err(SearchError::QueryTooLong(chars));
        }
        Ok(Self {
            needle: text.to_lowercase(),
            documents: Vec::new(),
            classifications: Vec::new(),
            statuses: Vec::new(),
            limit: 50,
        })
    }

    /// Restrict to these documents. Empty means all.
    #[must_use]
    pub fn documents(mut self, documents: Vec<DocumentId>) -> Self {
        self.documents = documents;
        self
    }

    /// Restrict to these classifications. Empty means all.
    #[must_use]
    pub fn classifications(mut self, classifications: Vec<Classification>) -> Self {
        self.classifications = classifications;
        self
    }

    /// Restrict to these statuses. Empty means all.
    #[must_use]
    pub fn statuses(mut self, statuses: Vec<Status>) -> Self {
        self.statuses = statuses;
        self
    }

    /// Return at most `limit` results.
    ///
    /// # Errors
    ///
    /// Returns an error if `limit` is 0 or greater than [`MAX_SEARCH_LIMIT`].
    pub fn limit(mut self, limit: usize) -> Result<Self, SearchError> {
        if !(1..=MAX_SEARCH_LIMIT).contains(&limit) {
            return Err(SearchError::InvalidLimit(limit));
        }
        self.limit = limit;
        Ok(self)
    }

    fn matches(&self, requirement: &Requirement) -> bool {
        (self.documents.is_empty() || self.documents.contains(requirement.document()))
            && (self.classifications.is_empty()
                || self.classifications.contains(&requirement.classification()))
            && (self.statuses.is_empty() || self.statuses.contains(&requirement.status()))
            && (requirement.raw_text().to_lowercase().contains(&self.needle)
                || requirement.clean_text().to_lowercase().contains(&self.needle))
    }
}

/// Requirements matching a search, ordered by document, chunk and ordinal.
#[must_use]
pub fn search(requirements: Vec<Requirement>, query: &SearchQuery) -> Vec<Requirement> {
    let mut found: Vec<Requirement> = requirements
        .into_iter()
        .filter(|requirement| query.matches(requirement))
        .collect();
    found.sort_by(|a, b| {
        (a.document(), a.source().index, a.ordinal())
            .cmp(&(b.document(), b.source().index, b.ordinal()))
    });
    found.truncate(query.limit);
    found
}

/// Counts for a single document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentStats {
    /// The document.
    pub document: DocumentId,
    /// Processing state.
    pub status: DocumentStatus,
    /// Number of chunks.
    pub chunks: usize,
    /// Number of requirements.
    pub requirements: usize,
    /// Requirements per classification.
    pub by_classification: BTreeMap<Classification, usize>,
    /// Requirements per review status.
    pub by_status: BTreeMap<Status, usize>,
    /// Requirements per confidence bucket.
    pub by_confidence: BTreeMap<Confidence, usize>,
    /// Time from registration to the end of processing.
    pub processing_seconds: Option<f64>,
}

/// Counts across the whole workspace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkspaceStats {
    /// Number of documents.
    pub documents: usize,
    /// Number of chunks.
    pub chunks: usize,
    /// Number of requirements.
    pub requirements: usize,
    /// Documents per processing state.
    pub documents_by_status: BTreeMap<DocumentStatus, usize>,
    /// Requirements per classification.
    pub by_classification: BTreeMap<Classification, usize>,
    /// Requirements per review status.
    pub by_status: BTreeMap<Status, usize>,
    /// Mean processing time of processed documents.
    pub average_processing_seconds: Option<f64>,
}

/// Statistics for one document.
#[must_use]
pub fn document_stats(record: &DocumentRecord, requirements: &[Requirement]) -> DocumentStats {
    DocumentStats {
        document: record.id.clone(),
        status: record.status,
        chunks: record.chunks,
        requirements: requirements.len(),
        by_classification: tally(requirements.iter().map(Requirement::classification)),
        by_status: tally(requirements.iter().map(Requirement::status)),
        by_confidence: tally(requirements.iter().map(Requirement::confidence)),
        processing_seconds: record.processing_seconds(),
    }
}

/// Statistics for the whole workspace.
#[must_use]
pub fn workspace_stats(documents: &[DocumentRecord], requirements: &[Requirement]) -> WorkspaceStats {
    let times: Vec<f64> = documents
        .iter()
        .filter_map(DocumentRecord::processing_seconds)
        .collect();
    #[allow(clippy::cast_precision_loss)]
    let average_processing_seconds =
        (!times.is_empty()).then(|| times.iter().sum::<f64>() / times.len() as f64);

    WorkspaceStats {
        documents: documents.len(),
        chunks: documents.iter().map(|d| d.chunks).sum(),
        requirements: requirements.len(),
        documents_by_status: tally(documents.iter().map(|d| d.status)),
        by_classification: tally(requirements.iter().map(Requirement::classification)),
        by_status: tally(requirements.iter().map(Requirement::status)),
        average_processing_seconds,
    }
}

fn tally<K: Ord>(keys: impl Iterator<Item = K>) -> BTreeMap<K, usize> {
    let mut counts = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::domain::{
        requirement::tests::sample_requirement, Actor, ChunkRef, ReferenceKind,
        ValidationAction,
    };

    fn record() -> DocumentRecord {
        DocumentRecord::uploaded(DocumentId::new("rfp".to_string()).unwrap(), "RFP".into())
    }

    fn actor() -> Actor {
        Actor::new("alice").unwrap()
    }

    #[test]
    fn matrix_orders_rows_and_counts_review_states() {
        let mut late = sample_requirement("rfp", 4, 0.9);
        late.provenance.page = Some(3);
        let mut early = sample_requirement("rfp", 9, 0.9);
        early.provenance.page = Some(1);
        let mut unknown = sample_requirement("rfp", 0, 0.9);
        unknown.provenance.page = None;

        early
            .apply(&ValidationAction::approve(actor()), Utc::now())
            .unwrap();
        late.apply(
            &ValidationAction::correct(actor()).with_clean_text("Corrected text."),
            Utc::now(),
        )
        .unwrap();

        let reference = CrossReference::cross_document(
            late.id(),
            late.source().clone(),
            ReferenceKind::Attachment,
            "Attachment 4".to_string(),
            "Attachment 4".to_string(),
            Confidence::Low,
        );

        let ids = (early.id(), late.id(), unknown.id());
        let matrix = compliance_matrix(&record(), vec![unknown, late, early], &[reference]);

        let order: Vec<Uuid> = matrix.items.iter().map(|item| item.requirement).collect();
        assert_eq!(order, [ids.0, ids.1, ids.2]);
        assert_eq!(matrix.items[1].text, "Corrected text.");
        assert_eq!(matrix.items[1].cross_references, ["Attachment 4"]);
        assert!(matrix.items[0].cross_references.is_empty());
        assert_eq!(matrix.total, 3);
        assert_eq!(matrix.validated, 2);
        assert_eq!(matrix.pending, 1);
    }

    #[test]
    fn flagged_rows_are_neither_validated_nor_pending() {
        let mut flagged = sample_requirement("rfp", 0, 0.5);
        flagged
            .apply(&ValidationAction::flag(actor(), "ambiguous"), Utc::now())
            .unwrap();

        let matrix = compliance_matrix(&record(), vec![flagged], &[]);
        assert_eq!((matrix.total, matrix.validated, matrix.pending), (1, 0, 0));
    }

    #[test]
    fn search_is_case_insensitive_and_filtered() {
        let mut corrected = sample_requirement("rfp", 1, 0.5);
        corrected
            .apply(
                &ValidationAction::correct(actor()).with_clean_text("Hosting SHALL use FedRAMP."),
                Utc::now(),
            )
            .unwrap();
        let requirements = vec![
            sample_requirement("rfp", 0, 0.5),
            corrected,
            sample_requirement("other", 0, 0.5),
        ];

        let by_raw = search(requirements.clone(), &SearchQuery::new("UPTIME").unwrap());
        assert_eq!(by_raw.len(), 3);

        let by_clean = search(requirements.clone(), &SearchQuery::new("fedramp").unwrap());
        assert_eq!(by_clean.len(), 1);

        let in_rfp = search(
            requirements.clone(),
            &SearchQuery::new("uptime")
                .unwrap()
                .documents(vec![DocumentId::new("rfp".to_string()).unwrap()])
                .statuses(vec![Status::AiExtracted]),
        );
        assert_eq!(in_rfp.len(), 1);
        assert_eq!(in_rfp[0].source(), &ChunkRef {
            document: DocumentId::new("rfp".to_string()).unwrap(),
            index: 0,
        });

        let limited = search(requirements, &SearchQuery::new("uptime").unwrap().limit(2).unwrap());
        assert_eq!(limited.len(), 2);
    }

    #[test_case("", SearchError::BlankQuery; "blank")]
    #[test_case("   ", SearchError::BlankQuery; "whitespace")]
    fn rejects_bad_queries(text: &str, expected: SearchError) {
        assert_eq!(SearchQuery::new(text), Err(expected));
    }

    #[test]
    fn rejects_overlong_queries_and_limits() {
        let long = "x".repeat(MAX_QUERY_CHARS + 1);
        assert_eq!(
            SearchQuery::new(&long),
            Err(SearchError::QueryTooLong(MAX_QUERY_CHARS + 1))
        );
        assert_eq!(
            SearchQuery::new("x").unwrap().limit(0),
            Err(SearchError::InvalidLimit(0))
        );
    }

    #[test]
    fn stats_tally_requirements() {
        let mut flagged = sample_requirement("rfp", 1, 0.1);
        flagged
            .apply(&ValidationAction::flag(actor(), ""), Utc::now())
            .unwrap();
        let requirements = vec![sample_requirement("rfp", 0, 0.9), flagged];

        let mut record = record();
        record.chunks = 4;
        record.status = DocumentStatus::ExtractionComplete;
        record.processed_at = Some(record.uploaded_at + chrono::Duration::seconds(2));

        let stats = document_stats(&record, &requirements);
        assert_eq!(stats.requirements, 2);
        assert_eq!(stats.by_status[&Status::AiExtracted], 1);
        assert_eq!(stats.by_status[&Status::FlaggedForReview], 1);
        assert_eq!(stats.by_confidence[&Confidence::Low], 1);
        assert_eq!(stats.by_classification[&Classification::Performance], 2);
        assert_eq!(stats.processing_seconds, Some(2.0));

        let mut errored = self::record();
        errored.status = DocumentStatus::Error;
        let overall = workspace_stats(&[record, errored], &requirements);
        assert_eq!(overall.documents, 2);
        assert_eq!(overall.chunks, 4);
        assert_eq!(overall.documents_by_status[&DocumentStatus::Error], 1);
        assert_eq!(overall.average_processing_seconds, Some(2.0));
    }
}
