//! The review queue.
//!
//! Unreviewed requirements, lowest confidence first.

use serde::Serialize;

use crate::domain::{Classification, Confidence, DocumentId, Requirement, Status};

/// Largest page a single query may request.
pub const MAX_LIMIT: usize = 100;

/// Page size used when none is given.
pub const DEFAULT_LIMIT: usize = 20;

/// Which part of the queue to return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueQuery {
    confidence: Option<Confidence>,
    classification: Option<Classification>,
    document: Option<DocumentId>,
    skip: usize,
    limit: usize,
}

impl Default for QueueQuery {
    fn default() -> Self {
        Self {
            confidence: None,
            classification: None,
            document: None,
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Error returned for a page size outside `1..=100`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("queue limit must be between 1 and {MAX_LIMIT}, got {0}")]
pub struct InvalidLimitError(usize);

impl QueueQuery {
    /// A query for the first `limit` items.
    ///
    /// # Errors
    ///
    /// Returns an error if `limit` is 0 or greater than [`MAX_LIMIT`].
    pub fn new(limit: usize) -> Result<Self, InvalidLimitError> {
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(InvalidLimitError(limit));
        }
        Ok(Self {
            limit,
            ..Self::default()
        })
    }

    /// Only include requirements in this confidence bucket.
    #[must_use]
    pub const fn confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Only include requirements with this classification.
    #[must_use]
    pub const fn classification(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }

    /// Only include requirements from this document.
    #[must_use]
    pub fn document(mut self, document: DocumentId) -> Self {
        self.document = Some(document);
        self
    }

    /// Skip this many matching items.
    #[must_use]
    pub const fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// The document filter, if any.
    #[must_use]
    pub const fn document_filter(&self) -> Option<&DocumentId> {
        self.document.as_ref()
    }

    fn matches(&self, requirement: &Requirement) -> bool {
        requirement.status() == Status::AiExtracted
            && self
                .confidence
                .is_none_or(|confidence| requirement.confidence() == confidence)
            && self
                .classification
                .is_none_or(|classification| requirement.classification() == classification)
            && self
                .document
                .as_ref()
                .is_none_or(|document| requirement.document() == document)
    }
}

/// One page of the review queue.
#[derive(Debug, Clone, Serialize)]
pub struct QueuePage {
    /// The requirements on this page, in queue order.
    pub items: Vec<Requirement>,
    /// Number of requirements matching the query across all pages.
    pub total: usize,
    /// Number of items skipped.
    pub skip: usize,
    /// Page size.
    pub limit: usize,
    /// Whether items remain after this page.
    pub has_more: bool,
}

impl QueuePage {
    /// One-based page number.
    #[must_use]
    pub const fn page(&self) -> usize {
        self.skip / self.limit + 1
    }
}

/// Select and order one page of the review queue.
///
/// The queue holds only `ai_extracted` requirements, ordered by confidence
/// bucket ascending, then document id, chunk index and ordinal.
#[must_use]
pub fn review_queue(requirements: Vec<Requirement>, query: &QueueQuery) -> QueuePage {
    let mut matching: Vec<Requirement> = requirements
        .into_iter()
        .filter(|requirement| query.matches(requirement))
        .collect();
    matching.sort_by(|a, b| queue_key(a).cmp(&queue_key(b)));

    let total = matching.len();
    let items: Vec<Requirement> = matching
        .into_iter()
        .skip(query.skip)
        .take(query.limit)
        .collect();

    QueuePage {
        items,
        total,
        skip: query.skip,
        limit: query.limit,
        has_more: query.skip.saturating_add(query.limit) < total,
    }
}

fn queue_key(requirement: &Requirement) -> (Confidence, &DocumentId, u32, u32, uuid::Uuid) {
    (
        requirement.confidence(),
        requirement.document(),
        requirement.source().index,
        requirement.ordinal(),
        requirement.id(),
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use test_case::test_case;

    use super::*;
    use crate::domain::{requirement::tests::sample_requirement, Actor, ValidationAction};

    fn sample() -> Vec<Requirement> {
        vec![
            sample_requirement("b-doc", 0, 0.9),
            sample_requirement("a-doc", 5, 0.5),
            sample_requirement("b-doc", 1, 0.1),
            sample_requirement("a-doc", 2, 0.5),
            sample_requirement("a-doc", 7, 0.2),
        ]
    }

    fn positions(page: &QueuePage) -> Vec<(&str, u32)> {
        page.items
            .iter()
            .map(|r| (r.document().as_str(), r.source().index))
            .collect()
    }

    #[test]
    fn lowest_confidence_first_then_document_then_chunk() {
        let page = review_queue(sample(), &QueueQuery::default());
        assert_eq!(
            positions(&page),
            [
                ("a-doc", 7),
                ("b-doc", 1),
                ("a-doc", 2),
                ("a-doc", 5),
                ("b-doc", 0)
            ]
        );
        assert_eq!(page.total, 5);
        assert!(!page.has_more);
    }

    #[test]
    fn reviewed_requirements_leave_the_queue() {
        let mut requirements = sample();
        requirements[2]
            .apply(
                &ValidationAction::approve(Actor::new("alice").unwrap()),
                Utc::now(),
            )
            .unwrap();
        requirements[4]
            .apply(
                &ValidationAction::flag(Actor::new("alice").unwrap(), "unclear"),
                Utc::now(),
            )
            .unwrap();

        let page = review_queue(requirements, &QueueQuery::default());
        assert_eq!(page.total, 3);
        assert!(page
            .items
            .iter()
            .all(|r| r.status() == Status::AiExtracted));
    }

    #[test]
    fn paging() {
        let query = QueueQuery::new(2).unwrap().skip(2);
        let page = review_queue(sample(), &query);

        assert_eq!(positions(&page), [("a-doc", 2), ("a-doc", 5)]);
        assert_eq!(page.total, 5);
        assert_eq!(page.page(), 2);
        assert!(page.has_more);

        let last = review_queue(sample(), &QueueQuery::new(2).unwrap().skip(4));
        assert_eq!(last.items.len(), 1);
        assert!(!last.has_more);
    }

    #[test]
    fn filters() {
        let medium = review_queue(sample(), &QueueQuery::default().confidence(Confidence::Medium));
        assert_eq!(positions(&medium), [("a-doc", 2), ("a-doc", 5)]);

        let document = review_queue(
            sample(),
            &QueueQuery::default().document(DocumentId::new("b-doc".to_string()).unwrap()),
        );
        assert_eq!(positions(&document), [("b-doc", 1), ("b-doc", 0)]);

        let none = review_queue(
            sample(),
            &QueueQuery::default().classification(Classification::FarClause),
        );
        assert_eq!(none.total, 0);
        assert!(none.items.is_empty());
    }

    #[test_case(0; "zero")]
    #[test_case(101; "too large")]
    fn rejects_out_of_range_limits(limit: usize) {
        assert_eq!(QueueQuery::new(limit), Err(InvalidLimitError(limit)));
    }

    #[test_case(1; "smallest")]
    #[test_case(100; "largest")]
    fn accepts_limits_in_range(limit: usize) {
        assert!(QueueQuery::new(limit).is_ok());
    }
}
