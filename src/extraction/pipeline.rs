use std::sync::Arc;

use rayon::prelude::*;

use crate::{
    domain::{Chunk, Config, CrossReference, DocumentId, ExtractionMethod, Requirement},
    extraction::{
        assembler,
        catalog::PatternCatalog,
        classifier::RuleClassifier,
        embedding::{self, Embedder},
        references,
        scorer::{ExternalModel, ScoringChain},
        segmenter::{PageBoundaries, SegmentError, SegmentWarning, Segmenter},
    },
};

/// Errors that end processing of a document.
///
/// Both variants are terminal: the document is marked as errored and is not
/// retried.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PipelineError {
    /// The extracted text is empty or whitespace.
    #[error("document {0}: nothing was extracted from the source file")]
    NothingExtracted(DocumentId),

    /// Segmentation produced no chunks.
    #[error("document {0}: no extractable text")]
    NoExtractableText(DocumentId),

    /// The page boundaries supplied with the text are invalid.
    #[error(transparent)]
    Segment(SegmentError),
}

impl From<SegmentError> for PipelineError {
    fn from(error: SegmentError) -> Self {
        match error {
            SegmentError::NoExtractableText(document) => Self::NoExtractableText(document),
            other @ SegmentError::InvalidPageBoundary { .. } => Self::Segment(other),
        }
    }
}

/// Everything extracted from one document.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// The document.
    pub document: DocumentId,
    /// Chunks, indexed contiguously from 0.
    pub chunks: Vec<Chunk>,
    /// Requirements, ordered by chunk index then ordinal.
    pub requirements: Vec<Requirement>,
    /// Cross-references found in the requirements.
    pub cross_references: Vec<CrossReference>,
    /// Segmentation warnings.
    pub warnings: Vec<SegmentWarning>,
    /// Number of pages seen.
    pub pages: u32,
    /// The scorer and catalog used.
    pub method: ExtractionMethod,
}

/// One document to process.
#[derive(Debug, Clone)]
pub struct Input {
    /// The document.
    pub document: DocumentId,
    /// Text extracted from the source file.
    pub raw_text: String,
    /// Where each page starts.
    pub boundaries: PageBoundaries,
}

/// The extraction pipeline: segment, embed, classify, assemble, and link.
///
/// Holds only immutable state, so one pipeline can process many documents
/// at once.
#[derive(Debug)]
pub struct Pipeline {
    segmenter: Segmenter,
    scoring: ScoringChain,
    embedder: Option<Box<dyn Embedder>>,
}

impl Pipeline {
    /// Build a pipeline from configuration and a compiled catalog.
    ///
    /// An external scorer or embedder that cannot be built (for example
    /// because its API key is missing) is logged and left out.
    #[must_use]
    pub fn new(config: &Config, catalog: Arc<PatternCatalog>) -> Self {
        let classifier = RuleClassifier::new(catalog);
        let scoring = match &config.external_scorer {
            None => ScoringChain::rules_only(classifier),
            Some(external) => match ExternalModel::from_config(external) {
                Ok(model) => ScoringChain::with_external(classifier, Box::new(model)),
                Err(e) => {
                    tracing::warn!("external scorer disabled: {e}");
                    ScoringChain::rules_only(classifier)
                }
            },
        };

        let embedder = embedding::from_config(&config.embedding).unwrap_or_else(|e| {
            tracing::warn!("embeddings disabled: {e}");
            None
        });

        Self::from_parts(Segmenter::from_config(config), scoring, embedder)
    }

    /// Assemble a pipeline from its parts.
    #[must_use]
    pub fn from_parts(
        segmenter: Segmenter,
        scoring: ScoringChain,
        embedder: Option<Box<dyn Embedder>>,
    ) -> Self {
        Self {
            segmenter,
            scoring,
            embedder,
        }
    }

    /// The catalog in use.
    #[must_use]
    pub fn catalog(&self) -> &Arc<PatternCatalog> {
        self.scoring.classifier().catalog()
    }

    /// The embedder in use, if any.
    #[must_use]
    pub fn embedder(&self) -> Option<&dyn Embedder> {
        self.embedder.as_deref()
    }

    /// The method recorded on documents processed by this pipeline.
    #[must_use]
    pub fn method(&self) -> ExtractionMethod {
        let catalog = self.catalog();
        ExtractionMethod {
            scorer: self.scoring.primary_name().to_string(),
            catalog_version: catalog.version().to_string(),
            catalog_fingerprint: catalog.fingerprint().to_string(),
        }
    }

    /// Process one document.
    ///
    /// Segmentation completes before classification starts. Chunks are then
    /// classified in parallel and the requirements re-sorted by chunk index
    /// and ordinal.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is blank, yields no chunks, or the page
    /// boundaries are invalid.
    pub fn process(
        &self,
        document: &DocumentId,
        raw_text: &str,
        boundaries: &PageBoundaries,
    ) -> Result<Extraction, PipelineError> {
        if raw_text.trim().is_empty() {
            return Err(PipelineError::NothingExtracted(document.clone()));
        }

        let segmentation = self.segmenter.segment(document, raw_text, boundaries)?;
        for warning in &segmentation.warnings {
            tracing::warn!("{document}: {warning}");
        }
        let mut chunks = segmentation.chunks;

        if let Some(embedder) = &self.embedder {
            let embedded = embedding::embed_chunks(embedder.as_ref(), &mut chunks);
            tracing::debug!(
                "{document}: embedded {embedded} of {} chunks with {}",
                chunks.len(),
                embedder.name()
            );
        }

        let method = self.method();
        let mut requirements: Vec<Requirement> = chunks
            .par_iter()
            .flat_map_iter(|chunk| {
                assembler::assemble(
                    chunk,
                    &self.scoring,
                    &method.catalog_version,
                    &method.catalog_fingerprint,
                )
            })
            .collect();
        requirements.sort_by_key(|r| (r.source().index, r.ordinal()));

        let cross_references: Vec<CrossReference> = requirements
            .par_iter()
            .flat_map_iter(|requirement| references::resolve(requirement, &chunks))
            .collect();

        tracing::info!(
            "{document}: {} pages, {} chunks, {} requirements, {} cross-references",
            segmentation.pages,
            chunks.len(),
            requirements.len(),
            cross_references.len()
        );

        Ok(Extraction {
            document: document.clone(),
            chunks,
            requirements,
            cross_references,
            warnings: segmentation.warnings,
            pages: segmentation.pages,
            method,
        })
    }

    /// Process several documents in parallel.
    ///
    /// Each document succeeds or fails independently. `on_done` is called
    /// once per document as it finishes, from whichever thread processed it.
    pub fn process_all<F>(
        &self,
        inputs: Vec<Input>,
        on_done: F,
    ) -> Vec<(DocumentId, Result<Extraction, PipelineError>)>
    where
        F: Fn(&DocumentId) + Sync,
    {
        inputs
            .into_par_iter()
            .map(|input| {
                let result = self.process(&input.document, &input.raw_text, &input.boundaries);
                on_done(&input.document);
                (input.document, result)
            })
            .collect()
    }
}
