//! Present/absent toggle shared by likes and follows.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Present,
    Absent,
}

impl From<bool> for Relation {
    fn from(exists: bool) -> Self {
        if exists {
            Relation::Present
        } else {
            Relation::Absent
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleOutcome {
    Created,
    Removed,
}

/// Flip a relation. Returns the new state and what the caller must do to
/// the store to reach it.
pub fn toggle(existing: Relation) -> (Relation, ToggleOutcome) {
    match existing {
        Relation::Absent => (Relation::Present, ToggleOutcome::Created),
        Relation::Present => (Relation::Absent, ToggleOutcome::Removed),
    }
}
