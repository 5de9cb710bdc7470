//! Reviewer actions and the rules governing them.
//!
//! A [`ValidationAction`] is applied to a requirement with
//! [`Requirement::apply`](crate::Requirement::apply). Every action moves the
//! requirement to the action's target status and appends one entry to its
//! history. No state is final: a validated or flagged requirement can be
//! acted on again.

use std::{fmt, str::FromStr};

use non_empty_string::NonEmptyString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{requirement::Status, Classification};

/// The three reviewer actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Accept the requirement as extracted.
    Approve,
    /// Replace the text and/or classification.
    Correct,
    /// Mark the requirement as needing further review.
    Flag,
}

impl ActionKind {
    /// The status a requirement ends up in after this action.
    #[must_use]
    pub const fn target_status(self) -> Status {
        match self {
            Self::Approve => Status::HumanValidated,
            Self::Correct => Status::HumanCorrected,
            Self::Flag => Status::FlaggedForReview,
        }
    }

    /// The lower-case action name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Correct => "correct",
            Self::Flag => "flag",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "approve" => Ok(Self::Approve),
            "correct" => Ok(Self::Correct),
            "flag" => Ok(Self::Flag),
            _ => Err(ValidationError::UnknownAction(s.to_string())),
        }
    }
}

/// Identifier of the human applying an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Actor(NonEmptyString);

impl Actor {
    /// Creates an actor id, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingActor`] if the id is blank.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into().trim().to_string();
        NonEmptyString::new(id)
            .map(Self)
            .map_err(|_| ValidationError::MissingActor)
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for Actor {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Actor> for String {
    fn from(actor: Actor) -> Self {
        actor.0.as_str().to_string()
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reviewer action with its optional payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationAction {
    pub(crate) kind: ActionKind,
    pub(crate) actor: Actor,
    pub(crate) clean_text: Option<String>,
    pub(crate) classification: Option<Classification>,
    pub(crate) notes: Option<String>,
}

impl ValidationAction {
    /// An `approve` action.
    #[must_use]
    pub const fn approve(actor: Actor) -> Self {
        Self::new(ActionKind::Approve, actor)
    }

    /// A `correct` action. Add the replacement text and/or classification
    /// with [`Self::with_clean_text`] and [`Self::with_classification`].
    #[must_use]
    pub const fn correct(actor: Actor) -> Self {
        Self::new(ActionKind::Correct, actor)
    }

    /// A `flag` action. Notes are expected but not enforced.
    #[must_use]
    pub fn flag(actor: Actor, notes: impl Into<String>) -> Self {
        Self::new(ActionKind::Flag, actor).with_notes(notes)
    }

    /// An action of the given kind with no payload.
    #[must_use]
    pub const fn new(kind: ActionKind, actor: Actor) -> Self {
        Self {
            kind,
            actor,
            clean_text: None,
            classification: None,
            notes: None,
        }
    }

    /// Builds an action from loosely typed input, as received from a user
    /// interface.
    ///
    /// # Errors
    ///
    /// Returns an error if the action name is unknown or the actor is blank.
    pub fn from_parts(
        action: &str,
        actor: &str,
        clean_text: Option<String>,
        classification: Option<Classification>,
        notes: Option<String>,
    ) -> Result<Self, ValidationError> {
        let kind = action.parse()?;
        let actor = Actor::new(actor)?;
        Ok(Self {
            kind,
            actor,
            clean_text,
            classification,
            notes,
        })
    }

    /// Sets replacement clean text.
    #[must_use]
    pub fn with_clean_text(mut self, clean_text: impl Into<String>) -> Self {
        self.clean_text = Some(clean_text.into());
        self
    }

    /// Sets a replacement classification.
    #[must_use]
    pub const fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }

    /// Sets notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// The kind of action.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Who is applying the action.
    #[must_use]
    pub const fn actor(&self) -> &Actor {
        &self.actor
    }

    /// Check the payload against the action's rules.
    ///
    /// # Errors
    ///
    /// - `approve` carrying replacement text or classification
    /// - `correct` carrying blank replacement text
    pub(crate) fn check(&self, requirement: Uuid) -> Result<(), ValidationError> {
        match self.kind {
            ActionKind::Approve if self.clean_text.is_some() || self.classification.is_some() => {
                Err(ValidationError::ApproveWithEdits { requirement })
            }
            ActionKind::Correct
                if self
                    .clean_text
                    .as_deref()
                    .is_some_and(|text| text.trim().is_empty()) =>
            {
                Err(ValidationError::BlankCleanText { requirement })
            }
            _ => Ok(()),
        }
    }

    /// Notes, if any non-blank notes were supplied.
    pub(crate) fn notes(&self) -> Option<&str> {
        self.notes.as_deref().filter(|notes| !notes.trim().is_empty())
    }
}

/// Reasons an action is rejected. A rejected action changes nothing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The action name is not one of `approve`, `correct`, `flag`.
    #[error("unknown action '{0}': expected approve, correct or flag")]
    UnknownAction(String),
    /// No actor id was supplied.
    #[error("an actor id is required for every validation action")]
    MissingActor,
    /// `approve` was given replacement values.
    #[error(
        "requirement {requirement}: approve does not change text or classification; use correct \
         instead"
    )]
    ApproveWithEdits {
        /// The requirement the action targeted.
        requirement: Uuid,
    },
    /// `correct` was given blank replacement text.
    #[error("requirement {requirement}: corrected text must not be blank")]
    BlankCleanText {
        /// The requirement the action targeted.
        requirement: Uuid,
    },
}

/// Conditions worth surfacing to the reviewer that do not block an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum ValidationWarning {
    /// A requirement was flagged without notes explaining why.
    EmptyFlagNotes {
        /// The flagged requirement.
        requirement: Uuid,
    },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyFlagNotes { requirement } => write!(
                f,
                "requirement {requirement} was flagged without notes; add notes so the next \
                 reviewer knows what to look at"
            ),
        }
    }
}

/// The result of a successful action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Status before the action.
    pub from: Status,
    /// Status after the action.
    pub to: Status,
    /// Non-blocking warnings raised by the action.
    pub warnings: Vec<ValidationWarning>,
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("approve", ActionKind::Approve; "approve")]
    #[test_case("Correct", ActionKind::Correct; "mixed case")]
    #[test_case(" flag ", ActionKind::Flag; "padded")]
    fn parses_action_names(input: &str, expected: ActionKind) {
        assert_eq!(input.parse::<ActionKind>().unwrap(), expected);
    }

    #[test]
    fn unknown_action_is_descriptive() {
        let error = "reject".parse::<ActionKind>().unwrap_err();
        assert_eq!(error, ValidationError::UnknownAction("reject".to_string()));
        assert!(error.to_string().contains("approve, correct or flag"));
    }

    #[test]
    fn blank_actor_is_rejected() {
        assert_eq!(Actor::new("   "), Err(ValidationError::MissingActor));
        assert_eq!(Actor::new(" jdoe ").unwrap().as_str(), "jdoe");
    }

    #[test]
    fn from_parts_rejects_unknown_action() {
        let result = ValidationAction::from_parts("delete", "jdoe", None, None, None);
        assert!(matches!(result, Err(ValidationError::UnknownAction(_))));
    }

    #[test]
    fn approve_with_edits_fails_check() {
        let id = Uuid::new_v4();
        let action = ValidationAction::approve(Actor::new("jdoe").unwrap())
            .with_classification(Classification::Compliance);
        assert_eq!(
            action.check(id),
            Err(ValidationError::ApproveWithEdits { requirement: id })
        );
    }

    #[test]
    fn correct_with_blank_text_fails_check() {
        let id = Uuid::new_v4();
        let action = ValidationAction::correct(Actor::new("jdoe").unwrap()).with_clean_text("  ");
        assert_eq!(
            action.check(id),
            Err(ValidationError::BlankCleanText { requirement: id })
        );
    }

    #[test]
    fn correct_without_payload_passes_check() {
        let action = ValidationAction::correct(Actor::new("jdoe").unwrap());
        assert!(action.check(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn blank_notes_are_treated_as_absent() {
        let action = ValidationAction::flag(Actor::new("jdoe").unwrap(), " ");
        assert_eq!(action.notes(), None);
    }
}
