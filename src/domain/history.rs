//! Append-only audit history of validation actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    requirement::Status,
    validation::{ActionKind, Actor},
    Classification,
};

/// One validation action, with the values the requirement held immediately
/// before it was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When the action was applied.
    pub timestamp: DateTime<Utc>,
    /// Which action was applied.
    pub action: ActionKind,
    /// Who applied it.
    pub actor: Actor,
    /// Status before the action.
    pub previous_status: Status,
    /// Clean text before the action.
    pub previous_clean_text: String,
    /// Classification before the action.
    pub previous_classification: Classification,
    /// Notes supplied with the action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl HistoryEntry {
    /// The state the requirement was in before this action.
    #[must_use]
    pub fn previous(&self) -> Snapshot {
        Snapshot {
            status: self.previous_status,
            clean_text: self.previous_clean_text.clone(),
            classification: self.previous_classification,
        }
    }
}

/// The reviewable state of a requirement at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Validation status.
    pub status: Status,
    /// Human-editable text.
    pub clean_text: String,
    /// Classification.
    pub classification: Classification,
}

/// The ordered log of validation actions applied to a requirement.
///
/// Entries can only be appended. There is no way to insert, reorder or remove
/// an entry, and deserialisation rejects a log whose timestamps go backwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<HistoryEntry>", into = "Vec<HistoryEntry>")]
pub struct History(Vec<HistoryEntry>);

impl History {
    /// Append an entry to the end of the log.
    ///
    /// The entry's timestamp is raised to that of the last entry if it would
    /// otherwise go backwards (for example after a clock adjustment).
    pub fn append(&mut self, mut entry: HistoryEntry) {
        if let Some(last) = self.0.last() {
            if entry.timestamp < last.timestamp {
                tracing::debug!(
                    "clamping history timestamp {} to {}",
                    entry.timestamp,
                    last.timestamp
                );
                entry.timestamp = last.timestamp;
            }
        }
        self.0.push(entry);
    }

    /// Number of actions ever applied.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no action has been applied yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.0.iter()
    }

    /// The most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.0.last()
    }

    /// Reconstruct every state the requirement has been in, oldest first.
    ///
    /// Element `i` is the state immediately before action `i`; the final
    /// element is `current`. The result always has `len() + 1` elements.
    #[must_use]
    pub fn replay(&self, current: Snapshot) -> Vec<Snapshot> {
        self.0
            .iter()
            .map(HistoryEntry::previous)
            .chain(std::iter::once(current))
            .collect()
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a HistoryEntry;
    type IntoIter = std::slice::Iter<'a, HistoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl TryFrom<Vec<HistoryEntry>> for History {
    type Error = HistoryOrderError;

    fn try_from(entries: Vec<HistoryEntry>) -> Result<Self, Self::Error> {
        if let Some(position) = entries
            .windows(2)
            .position(|pair| pair[1].timestamp < pair[0].timestamp)
        {
            return Err(HistoryOrderError {
                position: position + 1,
            });
        }
        Ok(Self(entries))
    }
}

impl From<History> for Vec<HistoryEntry> {
    fn from(history: History) -> Self {
        history.0
    }
}

/// Error returned when a stored history is not in chronological order.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("history entry {position} is older than the entry before it")]
pub struct HistoryOrderError {
    position: usize,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn entry(timestamp: DateTime<Utc>, previous_status: Status) -> HistoryEntry {
        HistoryEntry {
            timestamp,
            action: ActionKind::Approve,
            actor: Actor::new("reviewer").unwrap(),
            previous_status,
            previous_clean_text: "text".to_string(),
            previous_classification: Classification::Other,
            notes: None,
        }
    }

    #[test]
    fn append_preserves_order() {
        let now = Utc::now();
        let mut history = History::default();
        history.append(entry(now, Status::AiExtracted));
        history.append(entry(now + Duration::seconds(1), Status::HumanValidated));

        let statuses: Vec<_> = history.iter().map(|e| e.previous_status).collect();
        assert_eq!(statuses, [Status::AiExtracted, Status::HumanValidated]);
    }

    #[test]
    fn append_clamps_backwards_timestamps() {
        let now = Utc::now();
        let mut history = History::default();
        history.append(entry(now, Status::AiExtracted));
        history.append(entry(now - Duration::seconds(30), Status::HumanValidated));

        assert_eq!(history.last().unwrap().timestamp, now);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn replay_ends_with_current_state() {
        let mut history = History::default();
        history.append(entry(Utc::now(), Status::AiExtracted));
        let current = Snapshot {
            status: Status::HumanValidated,
            clean_text: "text".to_string(),
            classification: Classification::Other,
        };

        let states = history.replay(current.clone());
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].status, Status::AiExtracted);
        assert_eq!(states[1], current);
    }

    #[test]
    fn deserialising_out_of_order_history_fails() {
        let now = Utc::now();
        let entries = vec![
            entry(now, Status::AiExtracted),
            entry(now - Duration::seconds(5), Status::HumanValidated),
        ];
        let yaml = serde_yaml::to_string(&entries).unwrap();

        let result: Result<History, _> = serde_yaml::from_str(&yaml);
        assert!(result.is_err());
    }

    #[test]
    fn history_serialises_as_plain_list() {
        let mut history = History::default();
        history.append(entry(Utc::now(), Status::AiExtracted));
        let value = serde_json::to_value(&history).unwrap();
        assert!(value.is_array());
        assert_eq!(value.as_array().unwrap().len(), 1);
    }
}
