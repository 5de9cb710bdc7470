use std::{fmt, ops::Deref, str::FromStr};

use serde::{Deserialize, Serialize};

/// Identifier of a source document.
///
/// Document ids double as directory names in the workspace, so they are
/// restricted to ASCII letters, digits, `.`, `_` and `-`, and may not start
/// with a `.`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    /// Creates a new `DocumentId`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidDocumentIdError`] if the string is empty, starts with
    /// a `.`, or contains characters other than ASCII alphanumerics, `.`, `_`
    /// and `-`.
    pub fn new(s: String) -> Result<Self, InvalidDocumentIdError> {
        let valid = !s.is_empty()
            && !s.starts_with('.')
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(InvalidDocumentIdError(s));
        }

        Ok(Self(s))
    }

    /// Derives a document id from a file stem, replacing disallowed
    /// characters with `-`.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing usable remains (for example an empty stem).
    pub fn from_stem(stem: &str) -> Result<Self, InvalidDocumentIdError> {
        let slug: String = stem
            .trim()
            .trim_start_matches('.')
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        Self::new(slug)
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DocumentId {
    type Error = InvalidDocumentIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for DocumentId {
    type Error = InvalidDocumentIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

impl Deref for DocumentId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = InvalidDocumentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

/// Error returned when a string is not a usable document id.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error(
    "Invalid document id '{0}': must be non-empty, must not start with '.', and may only contain \
     ASCII letters, digits, '.', '_' and '-'"
)]
pub struct InvalidDocumentIdError(String);

/// Processing state of a document.
///
/// `ExtractionComplete` and `Error` are terminal for a processing run.
/// Errored documents are not retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Registered but not yet processed.
    Uploaded,
    /// Processing is in progress.
    Processing,
    /// Chunks and requirements have been written.
    ExtractionComplete,
    /// Processing ended in a terminal error.
    Error,
}

impl DocumentStatus {
    /// The `snake_case` name used in records and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::ExtractionComplete => "extraction_complete",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("rfp-2024-001"; "slug")]
    #[test_case("W912DY24R0001"; "solicitation number")]
    #[test_case("amendment_3.v2"; "dots and underscores")]
    fn accepts_valid_ids(id: &str) {
        assert_eq!(DocumentId::new(id.to_string()).unwrap().as_str(), id);
    }

    #[test_case(""; "empty")]
    #[test_case(".hidden"; "leading dot")]
    #[test_case("has space"; "space")]
    #[test_case("a/b"; "path separator")]
    fn rejects_invalid_ids(id: &str) {
        assert!(DocumentId::new(id.to_string()).is_err());
    }

    #[test]
    fn from_stem_replaces_disallowed_characters() {
        let id = DocumentId::from_stem("Final RFP (v2)").unwrap();
        assert_eq!(id.as_str(), "Final-RFP--v2-");
    }

    #[test]
    fn serde_round_trips_through_string() {
        let id = DocumentId::new("rfp-7".to_string()).unwrap();
        let yaml = serde_yaml::to_string(&id).unwrap();
        assert_eq!(yaml.trim(), "rfp-7");
        let parsed: DocumentId = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, id);
    }
}
