use std::sync::Arc;

use serde::Serialize;

use crate::{
    domain::{Classification, Verdict},
    extraction::catalog::PatternCatalog,
};

/// Name recorded on verdicts produced by the rule classifier.
pub const RULES_SCORER: &str = "rules";

/// The total for one label and the patterns that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelScore {
    /// The label.
    pub classification: Classification,
    /// Sum of the weights of the matching patterns and section hints.
    pub total: f64,
    /// The matching patterns, plus `section <X>` for an applied hint.
    pub matched: Vec<String>,
}

/// Result of rule-based classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleVerdict {
    /// The winning classification and its normalised score.
    pub verdict: Verdict,
    /// Raw total of the winner, before normalisation.
    pub total: f64,
    /// Every label with a non-zero total, best first.
    pub scores: Vec<LabelScore>,
}

/// Deterministic weighted-pattern classifier.
///
/// Each label's total is the sum of the weights of its patterns that match
/// the text, each pattern counted at most once. The highest total wins and
/// ties go to the label earlier in the catalog's tie-break order. A winner
/// whose total is not strictly above the catalog's `min_score` is replaced by
/// `OTHER` with a score of zero.
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    catalog: Arc<PatternCatalog>,
}

impl RuleClassifier {
    /// Creates a classifier over the given catalog.
    #[must_use]
    pub const fn new(catalog: Arc<PatternCatalog>) -> Self {
        Self { catalog }
    }

    /// The catalog in use.
    #[must_use]
    pub const fn catalog(&self) -> &Arc<PatternCatalog> {
        &self.catalog
    }

    /// Classify text with no section context.
    #[must_use]
    pub fn classify(&self, text: &str) -> RuleVerdict {
        self.classify_in_section(text, None)
    }

    /// Classify text found in the given section, applying section hints.
    #[must_use]
    pub fn classify_in_section(&self, text: &str, section: Option<&str>) -> RuleVerdict {
        let mut scores: Vec<LabelScore> = self
            .catalog
            .rules()
            .map(|(classification, patterns)| {
                let mut score = LabelScore {
                    classification,
                    total: 0.0,
                    matched: Vec::new(),
                };
                for pattern in patterns.iter().filter(|p| p.is_match(text)) {
                    score.total += pattern.weight;
                    score.matched.push(pattern.source.clone());
                }
                score
            })
            .collect();

        if let Some(section) = section {
            for hint in self.catalog.hints_for(section) {
                let index = scores
                    .iter()
                    .position(|s| s.classification == hint.classification)
                    .unwrap_or_else(|| {
                        scores.push(LabelScore {
                            classification: hint.classification,
                            total: 0.0,
                            matched: Vec::new(),
                        });
                        scores.len() - 1
                    });
                scores[index].total += hint.weight;
                scores[index].matched.push(format!("section {}", hint.section));
            }
        }

        scores.retain(|s| s.total > 0.0);
        scores.sort_by(|a, b| {
            b.total.total_cmp(&a.total).then_with(|| {
                self.catalog
                    .tie_break_rank(a.classification)
                    .cmp(&self.catalog.tie_break_rank(b.classification))
            })
        });

        let verdict = match scores.first() {
            Some(best) if best.total > self.catalog.min_score() => {
                let normalised = (best.total / self.catalog.saturation()).min(1.0);
                Verdict::new(best.classification, normalised, RULES_SCORER)
            }
            _ => Verdict::new(Classification::Other, 0.0, RULES_SCORER),
        };
        let total = if verdict.classification == Classification::Other {
            0.0
        } else {
            scores.first().map_or(0.0, |best| best.total)
        };

        tracing::trace!(
            "classified as {} (total {total}, score {:.2})",
            verdict.classification,
            verdict.score
        );

        RuleVerdict {
            verdict,
            total,
            scores,
        }
    }
}
