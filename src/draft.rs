//! Draft batch file: carries a review session between CLI invocations.
//!
//! The current batch lives in one JSON file. A batch displaced by a new scan
//! is written to `archive/<batch id>.json` next to it before the draft is
//! overwritten, and a scan over unsaved edits is refused unless the caller
//! explicitly asks to discard them.

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::PortalConfig;
use crate::pipeline::{AuditError, DateRange};
use crate::review::{AuditBatch, BatchStart, ReviewSession};

/// Subdirectory, beside the draft file, for displaced batches.
pub const ARCHIVE_DIR_NAME: &str = "archive";

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("No draft batch at {0}; run a scan first")]
    Missing(PathBuf),

    #[error(
        "Draft batch {batch_id} has unsaved edits; finalize it, or scan again with --discard to archive it"
    )]
    UnsavedEdits { batch_id: Uuid },

    #[error("Cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid draft file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Audit(#[from] AuditError),
}

/// Result of [`DraftStore::scan`].
#[derive(Debug)]
pub struct DraftScan {
    pub session: ReviewSession,
    pub start: BatchStart,
    /// Archive files written for displaced batches.
    pub archived_to: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct DraftStore {
    path: PathBuf,
}

impl DraftStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(ARCHIVE_DIR_NAME)
    }

    /// The saved batch, if a draft file exists.
    pub fn load(&self) -> Result<Option<AuditBatch>, DraftError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(DraftError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let batch = serde_json::from_str(&raw).map_err(|source| DraftError::Json {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(batch))
    }

    /// Session for `auditor` holding the saved draft, if any.
    pub fn open_session(&self, auditor: &str) -> Result<ReviewSession, DraftError> {
        let mut session = ReviewSession::new(auditor)?;
        if let Some(batch) = self.load()? {
            session.replace_batch(batch);
        }
        Ok(session)
    }

    /// Session for the saved draft's auditor. Fails when there is no draft.
    pub fn resume(&self) -> Result<ReviewSession, DraftError> {
        let batch = self
            .load()?
            .ok_or_else(|| DraftError::Missing(self.path.clone()))?;
        let mut session = ReviewSession::new(batch.request().auditor.clone())?;
        session.replace_batch(batch);
        Ok(session)
    }

    /// Write archived batches out, then the current batch. With no current
    /// batch the draft file is removed.
    pub fn save(&self, session: &mut ReviewSession) -> Result<Vec<PathBuf>, DraftError> {
        let mut archived_to = Vec::new();
        for batch in session.take_archived() {
            let path = self.archive_dir().join(format!("{}.json", batch.id()));
            write_json(&path, &batch)?;
            tracing::info!(batch_id = %batch.id(), state = %batch.state(), "Archived displaced batch");
            archived_to.push(path);
        }

        match session.current() {
            Some(batch) => write_json(&self.path, batch)?,
            None => match std::fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(DraftError::Io {
                        path: self.path.clone(),
                        source,
                    })
                }
            },
        }
        Ok(archived_to)
    }

    /// Build a new batch over the saved draft.
    ///
    /// A draft with unsaved edits is only replaced when `discard` is set; it
    /// is archived either way. On error the draft file is left untouched.
    pub fn scan(
        &self,
        conn: &Connection,
        config: &PortalConfig,
        auditor: &str,
        facility_code: &str,
        range: DateRange,
        discard: bool,
    ) -> Result<DraftScan, DraftError> {
        let mut session = self.open_session(auditor)?;
        if let Some(batch) = session.current() {
            if batch.has_unsaved_edits() && !discard {
                return Err(DraftError::UnsavedEdits { batch_id: batch.id() });
            }
        }

        let start = session.start_batch(conn, config, facility_code, range)?;
        let archived_to = self.save(&mut session)?;
        Ok(DraftScan {
            session,
            start,
            archived_to,
        })
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), DraftError> {
    let io_err = |source| DraftError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|source| DraftError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(io_err)
}
