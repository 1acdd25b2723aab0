use serde::{Deserialize, Serialize};

use super::note::MatchedNote;

/// Text written in place of a supervisor the roster does not know.
pub const UNRESOLVED_MARKER: &str = "UNRESOLVED";

/// One row of the supervisor roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorEntry {
    pub id: i64,
    pub employee_name: String,
    pub supervisor: Option<String>,
    pub backup_supervisor: Option<String>,
}

/// Outcome of looking up a supervisor for a note author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "name", rename_all = "snake_case")]
pub enum SupervisorAssignment {
    /// The roster names a supervisor.
    Assigned(String),
    /// The author is on the roster but the slot is empty.
    Vacant,
    /// The author is not on the roster.
    Unresolved,
}

impl SupervisorAssignment {
    /// Interpret a roster cell for an author that is on the roster.
    pub fn from_roster(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(name) if !name.is_empty() => Self::Assigned(name.to_string()),
            _ => Self::Vacant,
        }
    }

    /// Column value for the audit table. `Unresolved` is stored as NULL,
    /// `Vacant` as an empty string.
    pub fn to_column(&self) -> Option<&str> {
        match self {
            Self::Assigned(name) => Some(name.as_str()),
            Self::Vacant => Some(""),
            Self::Unresolved => None,
        }
    }

    /// Inverse of [`to_column`](Self::to_column).
    pub fn from_column(value: Option<String>) -> Self {
        match value {
            None => Self::Unresolved,
            Some(name) if name.is_empty() => Self::Vacant,
            Some(name) => Self::Assigned(name),
        }
    }

    /// Text used in exports.
    pub fn display_value(&self) -> &str {
        match self {
            Self::Assigned(name) => name.as_str(),
            Self::Vacant => "",
            Self::Unresolved => UNRESOLVED_MARKER,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unresolved)
    }
}

/// A matched note with its author's supervisors attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedNote {
    pub matched: MatchedNote,
    pub supervisor: SupervisorAssignment,
    pub backup_supervisor: SupervisorAssignment,
}
