//! The requirement pattern catalog.
//!
//! A [`CatalogDefinition`] is the serialisable form (TOML on disk). It is
//! compiled once into an immutable [`PatternCatalog`], which is shared
//! between threads behind an [`Arc`]. Changing the catalog means building a
//! new instance; nothing mutates a compiled catalog.

use std::{collections::HashSet, path::Path, sync::Arc};

use borsh::BorshSerialize;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::Classification;

const BUILTIN: &str = include_str!("default_catalog.toml");

/// The serialisable definition of a pattern catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct CatalogDefinition {
    /// Human-readable version label, recorded on every requirement.
    pub version: String,
    /// A label only wins if its total score is strictly above this.
    pub min_score: f64,
    /// Total score that maps to a normalised score of 1.
    pub saturation: f64,
    /// Preference order between labels with equal totals.
    pub tie_break: Vec<Classification>,
    /// Patterns of which at least one must match for a sentence to be a
    /// candidate requirement.
    pub indicators: Vec<String>,
    /// Weighted patterns per label.
    pub rules: Vec<RuleSet>,
    /// Extra weight for candidates found in particular sections.
    pub section_hints: Vec<SectionHint>,
}

/// The weighted patterns of one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, BorshSerialize)]
pub struct RuleSet {
    /// The label the patterns score for.
    pub classification: Classification,
    /// Patterns in evaluation order.
    pub patterns: Vec<WeightedPattern>,
}

/// A pattern and the weight it contributes when it matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, BorshSerialize)]
pub struct WeightedPattern {
    /// Case-insensitive regular expression, matched on token boundaries.
    pub pattern: String,
    /// Contribution to the label's total.
    pub weight: f64,
}

/// Extra weight for a label when the chunk lies in a given section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, BorshSerialize)]
pub struct SectionHint {
    /// Section letter, e.g. `L`.
    pub section: String,
    /// The label that receives the weight.
    pub classification: Classification,
    /// Weight added to the label's total.
    pub weight: f64,
}

/// Errors building a [`PatternCatalog`].
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("failed to read catalog file {path}: {source}")]
    Read {
        /// The catalog file.
        path: String,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The catalog file is not valid TOML or does not match the schema.
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),

    /// A pattern failed to compile.
    #[error("invalid pattern '{pattern}' for {label}: {source}")]
    InvalidPattern {
        /// The label the pattern belongs to, or `indicator`.
        label: String,
        /// The offending pattern.
        pattern: String,
        /// The compilation error.
        source: Box<regex::Error>,
    },

    /// A weight is not a positive finite number.
    #[error("invalid weight {weight} for pattern '{pattern}' of {label}: must be positive")]
    InvalidWeight {
        /// The label the pattern belongs to.
        label: String,
        /// The offending pattern or section.
        pattern: String,
        /// The weight.
        weight: f64,
    },

    /// A threshold is out of range.
    #[error("invalid {name} {value}: {reason}")]
    InvalidThreshold {
        /// `min_score` or `saturation`.
        name: &'static str,
        /// The value.
        value: f64,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// `OTHER` may only be assigned as a fallback.
    #[error("{0} cannot carry patterns, hints or a tie-break position")]
    ReservedLabel(Classification),

    /// A label appears more than once in the tie-break order.
    #[error("{0} appears more than once in the tie-break order")]
    DuplicateTieBreak(Classification),

    /// No indicator patterns were given.
    #[error("the catalog must define at least one indicator pattern")]
    NoIndicators,
}

/// A compiled pattern.
#[derive(Debug)]
pub(crate) struct Pattern {
    pub source: String,
    pub weight: f64,
    regex: Regex,
}

impl Pattern {
    fn compile(label: &str, source: &str, weight: f64) -> Result<Self, CatalogError> {
        // `\b` fails next to patterns that start or end in punctuation
        // (`99.9%`), so delimit with non-word characters instead.
        let regex = Regex::new(&format!(r"(?i)(?:^|\W)(?:{source})(?:\W|$)")).map_err(|e| {
            CatalogError::InvalidPattern {
                label: label.to_string(),
                pattern: source.to_string(),
                source: Box::new(e),
            }
        })?;
        Ok(Self {
            source: source.to_string(),
            weight,
            regex,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// An immutable, compiled pattern catalog.
#[derive(Debug)]
pub struct PatternCatalog {
    version: String,
    fingerprint: String,
    min_score: f64,
    saturation: f64,
    tie_break: Vec<Classification>,
    indicators: Vec<Pattern>,
    rules: Vec<(Classification, Vec<Pattern>)>,
    section_hints: Vec<SectionHint>,
}

impl PatternCatalog {
    /// The catalog compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns an error only if the embedded definition is broken.
    pub fn builtin() -> Result<Arc<Self>, CatalogError> {
        Self::from_toml(BUILTIN)
    }

    /// Compile a catalog from TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or the definition is
    /// invalid.
    pub fn from_toml(content: &str) -> Result<Arc<Self>, CatalogError> {
        let definition: CatalogDefinition = toml::from_str(content)?;
        Self::compile(definition)
    }

    /// Compile a catalog from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid
    /// catalog.
    pub fn load(path: &Path) -> Result<Arc<Self>, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// The embedded default definition, as TOML.
    #[must_use]
    pub const fn builtin_toml() -> &'static str {
        BUILTIN
    }

    /// Validate and compile a definition.
    ///
    /// # Errors
    ///
    /// Returns an error if any pattern fails to compile, any weight or
    /// threshold is out of range, `OTHER` is given patterns, or there are no
    /// indicators.
    pub fn compile(definition: CatalogDefinition) -> Result<Arc<Self>, CatalogError> {
        validate_thresholds(&definition)?;
        let tie_break = complete_tie_break(&definition.tie_break)?;

        if definition.indicators.is_empty() {
            return Err(CatalogError::NoIndicators);
        }
        let indicators = definition
            .indicators
            .iter()
            .map(|source| Pattern::compile("indicator", source, 1.0))
            .collect::<Result<Vec<_>, _>>()?;

        let mut rules: Vec<(Classification, Vec<Pattern>)> = Vec::new();
        for rule_set in &definition.rules {
            let label = rule_set.classification;
            if label == Classification::Other {
                return Err(CatalogError::ReservedLabel(label));
            }
            let mut compiled = Vec::with_capacity(rule_set.patterns.len());
            for WeightedPattern { pattern, weight } in &rule_set.patterns {
                check_weight(label, pattern, *weight)?;
                compiled.push(Pattern::compile(label.as_str(), pattern, *weight)?);
            }
            // Several rule sets for one label are merged, in order.
            match rules.iter_mut().find(|(existing, _)| *existing == label) {
                Some((_, patterns)) => patterns.extend(compiled),
                None => rules.push((label, compiled)),
            }
        }

        for hint in &definition.section_hints {
            if hint.classification == Classification::Other {
                return Err(CatalogError::ReservedLabel(hint.classification));
            }
            check_weight(hint.classification, &hint.section, hint.weight)?;
        }

        let fingerprint = fingerprint(&definition);
        tracing::debug!(
            "compiled pattern catalog {} ({} labels, {} indicators, fingerprint {})",
            definition.version,
            rules.len(),
            indicators.len(),
            fingerprint
        );

        Ok(Arc::new(Self {
            version: definition.version,
            fingerprint,
            min_score: definition.min_score,
            saturation: definition.saturation,
            tie_break,
            indicators,
            rules,
            section_hints: definition.section_hints,
        }))
    }

    /// Version label of the catalog.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// SHA-256 fingerprint of the catalog definition, as hex.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// The winning total must be strictly above this.
    #[must_use]
    pub const fn min_score(&self) -> f64 {
        self.min_score
    }

    /// Total that maps to a normalised score of 1.
    #[must_use]
    pub const fn saturation(&self) -> f64 {
        self.saturation
    }

    /// Whether the text contains at least one requirement indicator.
    #[must_use]
    pub fn is_candidate(&self, text: &str) -> bool {
        self.indicators.iter().any(|pattern| pattern.is_match(text))
    }

    /// The indicator patterns that match the text.
    #[must_use]
    pub fn matching_indicators<'a>(&'a self, text: &str) -> Vec<&'a str> {
        self.indicators
            .iter()
            .filter(|pattern| pattern.is_match(text))
            .map(|pattern| pattern.source.as_str())
            .collect()
    }

    pub(crate) fn rules(&self) -> impl Iterator<Item = (Classification, &[Pattern])> {
        self.rules
            .iter()
            .map(|(label, patterns)| (*label, patterns.as_slice()))
    }

    /// Position of the label in the tie-break order; lower wins.
    pub(crate) fn tie_break_rank(&self, label: Classification) -> usize {
        self.tie_break
            .iter()
            .position(|candidate| *candidate == label)
            .unwrap_or(self.tie_break.len())
    }

    /// Section hints applying to a section label such as `Section L` or
    /// `L`.
    pub(crate) fn hints_for<'a>(
        &'a self,
        section: &'a str,
    ) -> impl Iterator<Item = &'a SectionHint> + 'a {
        let letter = section_letter(section);
        self.section_hints
            .iter()
            .filter(move |hint| letter.is_some_and(|l| hint.section.eq_ignore_ascii_case(l)))
    }
}

/// The identifier of a section label: `Section L - Instructions` → `L`.
fn section_letter(section: &str) -> Option<&str> {
    let trimmed = section.trim();
    let rest = trimmed
        .get(..8)
        .filter(|prefix| prefix.eq_ignore_ascii_case("section "))
        .map_or(trimmed, |_| &trimmed[8..]);
    rest.split(|c: char| !c.is_ascii_alphanumeric())
        .find(|part| !part.is_empty())
}

fn validate_thresholds(definition: &CatalogDefinition) -> Result<(), CatalogError> {
    if !definition.min_score.is_finite() || definition.min_score < 0.0 {
        return Err(CatalogError::InvalidThreshold {
            name: "min_score",
            value: definition.min_score,
            reason: "must be a non-negative number",
        });
    }
    if !definition.saturation.is_finite() || definition.saturation <= 0.0 {
        return Err(CatalogError::InvalidThreshold {
            name: "saturation",
            value: definition.saturation,
            reason: "must be a positive number",
        });
    }
    Ok(())
}

fn check_weight(label: Classification, pattern: &str, weight: f64) -> Result<(), CatalogError> {
    if weight.is_finite() && weight > 0.0 {
        Ok(())
    } else {
        Err(CatalogError::InvalidWeight {
            label: label.to_string(),
            pattern: pattern.to_string(),
            weight,
        })
    }
}

/// Validate the configured tie-break order and append any label it leaves
/// out, in declaration order.
fn complete_tie_break(configured: &[Classification]) -> Result<Vec<Classification>, CatalogError> {
    let mut seen = HashSet::new();
    for label in configured {
        if *label == Classification::Other {
            return Err(CatalogError::ReservedLabel(*label));
        }
        if !seen.insert(*label) {
            return Err(CatalogError::DuplicateTieBreak(*label));
        }
    }

    let mut order = configured.to_vec();
    order.extend(
        Classification::ALL
            .into_iter()
            .filter(|label| *label != Classification::Other && !seen.contains(label)),
    );
    Ok(order)
}

/// Calculate the fingerprint of a catalog definition.
///
/// # Panics
///
/// Panics if borsh serialization fails, which cannot happen once the
/// thresholds and weights have been checked to be finite.
fn fingerprint(definition: &CatalogDefinition) -> String {
    #[derive(BorshSerialize)]
    struct FingerprintData<'a> {
        version: &'a str,
        min_score: f64,
        saturation: f64,
        tie_break: &'a [Classification],
        indicators: &'a [String],
        rules: &'a [RuleSet],
        section_hints: &'a [SectionHint],
    }

    let data = FingerprintData {
        version: &definition.version,
        min_score: definition.min_score,
        saturation: definition.saturation,
        tie_break: &definition.tie_break,
        indicators: &definition.indicators,
        rules: &definition.rules,
        section_hints: &definition.section_hints,
    };

    let encoded = borsh::to_vec(&data).expect("this should never fail");
    let hash = Sha256::digest(encoded);
    format!("{hash:x}")
}

/// The serialized versions of the catalog definition.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        version: String,
        min_score: f64,
        saturation: f64,
        #[serde(default)]
        tie_break: Vec<Classification>,
        indicators: Vec<String>,
        #[serde(default)]
        rules: Vec<RuleSet>,
        #[serde(default)]
        section_hints: Vec<SectionHint>,
    },
}

impl From<Versions> for CatalogDefinition {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                version,
                min_score,
                saturation,
                tie_break,
                indicators,
                rules,
                section_hints,
            } => Self {
                version,
                min_score,
                saturation,
                tie_break,
                indicators,
                rules,
                section_hints,
            },
        }
    }
}

impl From<CatalogDefinition> for Versions {
    fn from(definition: CatalogDefinition) -> Self {
        Self::V1 {
            version: definition.version,
            min_score: definition.min_score,
            saturation: definition.saturation,
            tie_break: definition.tie_break,
            indicators: definition.indicators,
            rules: definition.rules,
            section_hints: definition.section_hints,
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    const MINIMAL: &str = r#"
_version = "1"
version = "test"
min_score = 0.5
saturation = 2.0
indicators = ['shall']

[[rules]]
classification = "DELIVERABLE_REQUIREMENT"
patterns = [{ pattern = 'report', weight = 1.0 }]
"#;

    #[test]
    fn builtin_catalog_compiles() {
        let catalog = PatternCatalog::builtin().unwrap();
        assert_eq!(catalog.version(), "builtin-1");
        assert_eq!(catalog.fingerprint().len(), 64);
        assert_eq!(catalog.rules().count(), 6);
    }

    #[test]
    fn fingerprint_is_stable_and_content_sensitive() {
        let a = PatternCatalog::from_toml(MINIMAL).unwrap();
        let b = PatternCatalog::from_toml(MINIMAL).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let changed = MINIMAL.replace("weight = 1.0", "weight = 1.5");
        let c = PatternCatalog::from_toml(&changed).unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test_case("The contractor shall deliver.", true; "indicator word")]
    #[test_case("The Contractor SHALL deliver.", true; "case insensitive")]
    #[test_case("The contractor marshall deliver.", false; "not inside a word")]
    #[test_case("Background information only.", false; "no indicator")]
    fn indicator_gate(text: &str, expected: bool) {
        let catalog = PatternCatalog::from_toml(MINIMAL).unwrap();
        assert_eq!(catalog.is_candidate(text), expected);
    }

    #[test]
    fn builtin_indicators_cover_common_phrasings() {
        let catalog = PatternCatalog::builtin().unwrap();
        for text in [
            "Offerors must include a cover letter.",
            "The vendor is required to notify the CO.",
            "The contractor is responsible for all travel.",
            "Key personnel will be required to hold a clearance.",
        ] {
            assert!(catalog.is_candidate(text), "{text}");
        }
    }

    #[test]
    fn invalid_pattern_names_label_and_pattern() {
        let broken = MINIMAL.replace("'report'", "'(unclosed'");
        let error = PatternCatalog::from_toml(&broken).unwrap_err();
        let message = error.to_string();
        assert!(message.contains("DELIVERABLE_REQUIREMENT"), "{message}");
        assert!(message.contains("(unclosed"), "{message}");
    }

    #[test]
    fn non_positive_weight_is_rejected() {
        let broken = MINIMAL.replace("weight = 1.0", "weight = 0.0");
        assert!(matches!(
            PatternCatalog::from_toml(&broken),
            Err(CatalogError::InvalidWeight { .. })
        ));
    }

    #[test]
    fn other_cannot_have_patterns() {
        let broken = MINIMAL.replace("DELIVERABLE_REQUIREMENT", "OTHER");
        assert!(matches!(
            PatternCatalog::from_toml(&broken),
            Err(CatalogError::ReservedLabel(Classification::Other))
        ));
    }

    #[test]
    fn missing_indicators_are_rejected() {
        let broken = MINIMAL.replace("indicators = ['shall']", "indicators = []");
        assert!(matches!(
            PatternCatalog::from_toml(&broken),
            Err(CatalogError::NoIndicators)
        ));
    }

    #[test]
    fn tie_break_is_completed_in_declaration_order() {
        let catalog = PatternCatalog::from_toml(MINIMAL).unwrap();
        assert_eq!(catalog.tie_break_rank(Classification::Performance), 0);
        assert_eq!(catalog.tie_break_rank(Classification::Compliance), 1);
        assert_eq!(catalog.tie_break_rank(Classification::FarClause), 5);
    }

    #[test]
    fn duplicate_tie_break_is_rejected() {
        let with_dupes = MINIMAL.replace(
            "indicators",
            "tie_break = [\"INSTRUCTION\", \"INSTRUCTION\"]\nindicators",
        );
        assert!(matches!(
            PatternCatalog::from_toml(&with_dupes),
            Err(CatalogError::DuplicateTieBreak(Classification::Instruction))
        ));
    }

    #[test_case("Section L", Some("L"); "plain")]
    #[test_case("SECTION M - EVALUATION FACTORS", Some("M"); "with title")]
    #[test_case("C", Some("C"); "bare letter")]
    #[test_case("", None; "empty")]
    fn extracts_section_letter(label: &str, expected: Option<&str>) {
        assert_eq!(section_letter(label), expected);
    }

    #[test]
    fn hints_match_by_section_letter() {
        let catalog = PatternCatalog::builtin().unwrap();
        let hints: Vec<_> = catalog.hints_for("Section L - Instructions").collect();
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].classification, Classification::Instruction);
        assert_eq!(catalog.hints_for("Section C").count(), 0);
    }

    #[test]
    fn builtin_definition_round_trips_through_toml() {
        let definition: CatalogDefinition = toml::from_str(PatternCatalog::builtin_toml()).unwrap();
        let rendered = toml::to_string(&definition).unwrap();
        let reparsed: CatalogDefinition = toml::from_str(&rendered).unwrap();
        assert_eq!(reparsed, definition);
    }
}
