//! Supervisor resolver: attaches primary and backup supervisors to matched notes.

use std::collections::HashMap;

use crate::models::{MatchedNote, ResolvedNote, SupervisorAssignment, SupervisorEntry};

/// Author → supervisor lookups built from the roster.
///
/// Rows are applied in the order given (row-id order from the store). When an
/// employee appears more than once the last row wins, for both lookups.
#[derive(Debug, Clone, Default)]
pub struct SupervisorRoster {
    primary: HashMap<String, SupervisorAssignment>,
    backup: HashMap<String, SupervisorAssignment>,
}

impl SupervisorRoster {
    pub fn from_entries(entries: &[SupervisorEntry]) -> Self {
        let mut roster = Self::default();
        let mut repeated = 0usize;
        for entry in entries {
            let previous = roster.primary.insert(
                entry.employee_name.clone(),
                SupervisorAssignment::from_roster(entry.supervisor.as_deref()),
            );
            roster.backup.insert(
                entry.employee_name.clone(),
                SupervisorAssignment::from_roster(entry.backup_supervisor.as_deref()),
            );
            if previous.is_some() {
                repeated += 1;
            }
        }
        if repeated > 0 {
            tracing::warn!(repeated, "Roster lists some employees more than once; last row wins");
        }
        roster
    }

    pub fn len(&self) -> usize {
        self.primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    pub fn supervisor_of(&self, author: &str) -> SupervisorAssignment {
        self.primary
            .get(author)
            .cloned()
            .unwrap_or(SupervisorAssignment::Unresolved)
    }

    pub fn backup_of(&self, author: &str) -> SupervisorAssignment {
        self.backup
            .get(author)
            .cloned()
            .unwrap_or(SupervisorAssignment::Unresolved)
    }
}

/// Attach supervisors to every matched note. Unknown authors resolve to
/// [`SupervisorAssignment::Unresolved`] for both fields.
pub fn resolve(matched: Vec<MatchedNote>, roster: &SupervisorRoster) -> Vec<ResolvedNote> {
    let resolved: Vec<ResolvedNote> = matched
        .into_iter()
        .map(|matched| {
            let author = matched.note.author.as_str();
            let supervisor = roster.supervisor_of(author);
            let backup_supervisor = roster.backup_of(author);
            ResolvedNote {
                matched,
                supervisor,
                backup_supervisor,
            }
        })
        .collect();

    let unresolved = resolved
        .iter()
        .filter(|r| !r.supervisor.is_resolved())
        .count();
    if unresolved > 0 {
        tracing::info!(unresolved, total = resolved.len(), "Some note authors are not on the roster");
    }
    resolved
}
