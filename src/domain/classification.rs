use std::{fmt, str::FromStr};

use borsh::BorshSerialize;
use serde::{Deserialize, Serialize};

/// The category of an extracted requirement.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    BorshSerialize,
)]
pub enum Classification {
    /// Performance levels: uptime, response time, capacity.
    #[serde(rename = "PERFORMANCE_REQUIREMENT")]
    Performance,
    /// Regulatory, security and standards compliance.
    #[serde(rename = "COMPLIANCE_REQUIREMENT")]
    Compliance,
    /// Documents, reports and other outputs to be delivered.
    #[serde(rename = "DELIVERABLE_REQUIREMENT")]
    Deliverable,
    /// How proposals will be evaluated or scored.
    #[serde(rename = "EVALUATION_CRITERIA")]
    EvaluationCriteria,
    /// Instructions to offerors on proposal preparation and submission.
    #[serde(rename = "INSTRUCTION")]
    Instruction,
    /// Federal Acquisition Regulation clauses.
    #[serde(rename = "FAR_CLAUSE")]
    FarClause,
    /// Anything that did not score into another category.
    #[serde(rename = "OTHER")]
    Other,
}

impl Classification {
    /// Every classification, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Performance,
        Self::Compliance,
        Self::Deliverable,
        Self::EvaluationCriteria,
        Self::Instruction,
        Self::FarClause,
        Self::Other,
    ];

    /// The canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Performance => "PERFORMANCE_REQUIREMENT",
            Self::Compliance => "COMPLIANCE_REQUIREMENT",
            Self::Deliverable => "DELIVERABLE_REQUIREMENT",
            Self::EvaluationCriteria => "EVALUATION_CRITERIA",
            Self::Instruction => "INSTRUCTION",
            Self::FarClause => "FAR_CLAUSE",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Classification {
    type Err = UnknownClassificationError;

    /// Parses canonical names as well as the short forms `PERFORMANCE`,
    /// `COMPLIANCE` and `DELIVERABLE`, case-insensitively. `-` and spaces are
    /// treated as `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().to_uppercase().replace(['-', ' '], "_");
        let classification = match normalised.as_str() {
            "PERFORMANCE_REQUIREMENT" | "PERFORMANCE" => Self::Performance,
            "COMPLIANCE_REQUIREMENT" | "COMPLIANCE" => Self::Compliance,
            "DELIVERABLE_REQUIREMENT" | "DELIVERABLE" => Self::Deliverable,
            "EVALUATION_CRITERIA" | "EVALUATION" => Self::EvaluationCriteria,
            "INSTRUCTION" | "INSTRUCTIONS" => Self::Instruction,
            "FAR_CLAUSE" | "FAR" => Self::FarClause,
            "OTHER" => Self::Other,
            _ => return Err(UnknownClassificationError(s.to_string())),
        };
        Ok(classification)
    }
}

/// Error returned when parsing an unrecognised classification name.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown classification '{0}'")]
pub struct UnknownClassificationError(String);

/// A confidence tier derived from a normalised score.
///
/// Ordered `Low < Medium < High`, which is the order the review queue
/// surfaces requirements in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Normalised score below 0.34.
    Low,
    /// Normalised score below 0.67.
    Medium,
    /// Everything else.
    High,
}

impl Confidence {
    const LOW_CEILING: f64 = 0.34;
    const MEDIUM_CEILING: f64 = 0.67;

    /// Buckets a normalised score in `[0, 1]`.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score < Self::LOW_CEILING {
            Self::Low
        } else if score < Self::MEDIUM_CEILING {
            Self::Medium
        } else {
            Self::High
        }
    }

    /// The lower-case name used in records and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = UnknownConfidenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(UnknownConfidenceError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unrecognised confidence bucket.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown confidence '{0}': expected low, medium or high")]
pub struct UnknownConfidenceError(String);

/// The output of a scorer: a classification and how sure it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// The winning classification.
    pub classification: Classification,
    /// Normalised score in `[0, 1]`.
    pub score: f64,
    /// Bucketed score.
    pub confidence: Confidence,
    /// Name of the scorer that produced the verdict.
    pub scorer: String,
}

impl Verdict {
    /// Builds a verdict, clamping the score to `[0, 1]` and bucketing it.
    #[must_use]
    pub fn new(classification: Classification, score: f64, scorer: impl Into<String>) -> Self {
        let score = if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        };
        Self {
            classification,
            score,
            confidence: Confidence::from_score(score),
            scorer: scorer.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(0.0, Confidence::Low; "zero")]
    #[test_case(0.339, Confidence::Low; "just below low ceiling")]
    #[test_case(0.34, Confidence::Medium; "at low ceiling")]
    #[test_case(0.669, Confidence::Medium; "just below medium ceiling")]
    #[test_case(0.67, Confidence::High; "at medium ceiling")]
    #[test_case(1.0, Confidence::High; "saturated")]
    fn buckets_scores(score: f64, expected: Confidence) {
        assert_eq!(Confidence::from_score(score), expected);
    }

    #[test]
    fn confidence_orders_low_first() {
        assert!(Confidence::Low < Confidence::Medium);
        assert!(Confidence::Medium < Confidence::High);
    }

    #[test_case("PERFORMANCE_REQUIREMENT", Classification::Performance; "canonical")]
    #[test_case("performance", Classification::Performance; "short lower")]
    #[test_case("evaluation-criteria", Classification::EvaluationCriteria; "dashed")]
    #[test_case("far clause", Classification::FarClause; "spaced")]
    fn parses_classification(input: &str, expected: Classification) {
        assert_eq!(input.parse::<Classification>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_classification() {
        assert!("SECURITY".parse::<Classification>().is_err());
    }

    #[test]
    fn classification_serialises_with_canonical_name() {
        let json = serde_json::to_string(&Classification::Deliverable).unwrap();
        assert_eq!(json, "\"DELIVERABLE_REQUIREMENT\"");
    }

    #[test]
    fn verdict_clamps_score() {
        let verdict = Verdict::new(Classification::Other, 3.5, "rules");
        assert!((verdict.score - 1.0).abs() < f64::EPSILON);
        assert_eq!(verdict.confidence, Confidence::High);

        let verdict = Verdict::new(Classification::Other, f64::NAN, "rules");
        assert_eq!(verdict.confidence, Confidence::Low);
    }
}
