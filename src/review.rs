//! Audit review session: the in-memory batch an auditor works through.
//!
//! A session owns at most one current batch. Its lifecycle:
//!
//! ```text
//! Empty ──build──▶ Built ──edit──▶ UnderReview ──finalize──▶ Finalized
//!                    │                  │
//!                    └──────build───────┴──▶ Built (previous batch archived)
//! ```
//!
//! Building a new batch never silently loses edits: the displaced batch is
//! moved to the session archive unless it was already finalized.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::PortalConfig;
use crate::export::{export_unreported, ExportFile};
use crate::models::{AppendOutcome, AuditRecord};
use crate::pipeline::{run_batch, AuditError, AuditSink, BatchOutcome, BatchRequest, DateRange};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Empty,
    Built,
    UnderReview,
    Finalized,
}

impl ReviewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Built => "built",
            Self::UnderReview => "under_review",
            Self::Finalized => "finalized",
        }
    }
}

impl std::fmt::Display for ReviewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One built batch of audit records plus its review progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditBatch {
    id: Uuid,
    request: BatchRequest,
    created_at: NaiveDateTime,
    state: ReviewState,
    edited: bool,
    records: Vec<AuditRecord>,
}

impl AuditBatch {
    pub fn new(
        id: Uuid,
        request: BatchRequest,
        created_at: NaiveDateTime,
        records: Vec<AuditRecord>,
    ) -> Self {
        Self {
            id,
            request,
            created_at,
            state: ReviewState::Built,
            edited: false,
            records,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &BatchRequest {
        &self.request
    }

    pub fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    pub fn state(&self) -> ReviewState {
        self.state
    }

    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.state == ReviewState::Finalized
    }

    /// Edits made since the batch was built that are not yet persisted.
    pub fn has_unsaved_edits(&self) -> bool {
        self.edited && !self.is_finalized()
    }

    pub fn record(&self, key: &str) -> Option<&AuditRecord> {
        self.records.iter().find(|r| r.idempotency_key == key)
    }

    /// Record count per note type, for the summary view. Untyped notes are
    /// counted under an empty name.
    pub fn note_type_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            let name = record.note_type.clone().unwrap_or_default();
            *counts.entry(name).or_insert(0) += 1;
        }
        counts
    }

    /// CSV of the records marked as unreported adverse events.
    pub fn export_unreported(&self) -> ExportFile {
        export_unreported(&self.records, self.request.range.start())
    }

    fn record_mut(&mut self, key: &str) -> Result<&mut AuditRecord, AuditError> {
        self.records
            .iter_mut()
            .find(|r| r.idempotency_key == key)
            .ok_or_else(|| AuditError::RecordNotFound(key.to_string()))
    }
}

/// What happened to the previous batch when a new one replaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchReplacement {
    pub displaced: Option<Uuid>,
    /// The displaced batch was not finalized and went to the archive.
    pub archived: bool,
    pub had_unsaved_edits: bool,
}

/// Result of [`ReviewSession::start_batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    NoNotes,
    NoMatches { notes_scanned: usize },
    Ready { batch_id: Uuid, records: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchStart {
    pub status: BatchStatus,
    pub replacement: BatchReplacement,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Per-auditor review state. Not shared between auditors.
#[derive(Debug)]
pub struct ReviewSession {
    auditor: String,
    current: Option<AuditBatch>,
    archived: Vec<AuditBatch>,
}

impl ReviewSession {
    pub fn new(auditor: impl Into<String>) -> Result<Self, AuditError> {
        let auditor = auditor.into().trim().to_string();
        if auditor.is_empty() {
            return Err(AuditError::InvalidInput("auditor identifier is required".into()));
        }
        Ok(Self {
            auditor,
            current: None,
            archived: Vec::new(),
        })
    }

    pub fn auditor(&self) -> &str {
        &self.auditor
    }

    pub fn state(&self) -> ReviewState {
        self.current
            .as_ref()
            .map(AuditBatch::state)
            .unwrap_or(ReviewState::Empty)
    }

    pub fn current(&self) -> Option<&AuditBatch> {
        self.current.as_ref()
    }

    /// Batches displaced before they were finalized, oldest first.
    pub fn archived(&self) -> &[AuditBatch] {
        &self.archived
    }

    pub fn take_archived(&mut self) -> Vec<AuditBatch> {
        std::mem::take(&mut self.archived)
    }

    /// Build a batch for `facility_code` over `range` and make it current.
    ///
    /// On error the current batch is left untouched. An empty result clears
    /// the current batch (archiving it as usual).
    pub fn start_batch(
        &mut self,
        conn: &Connection,
        config: &PortalConfig,
        facility_code: &str,
        range: DateRange,
    ) -> Result<BatchStart, AuditError> {
        let request = BatchRequest::new(facility_code, range, self.auditor.clone())?;
        let outcome = run_batch(conn, config, &request)?;

        let (status, next) = match outcome {
            BatchOutcome::NoNotes => (BatchStatus::NoNotes, None),
            BatchOutcome::NoMatches { notes_scanned } => {
                (BatchStatus::NoMatches { notes_scanned }, None)
            }
            BatchOutcome::Ready(batch) => (
                BatchStatus::Ready {
                    batch_id: batch.id(),
                    records: batch.len(),
                },
                Some(batch),
            ),
        };

        let replacement = self.swap_current(next);
        Ok(BatchStart {
            status,
            replacement,
        })
    }

    /// Make `batch` current, displacing whatever was there.
    pub fn replace_batch(&mut self, batch: AuditBatch) -> BatchReplacement {
        self.swap_current(Some(batch))
    }

    fn swap_current(&mut self, next: Option<AuditBatch>) -> BatchReplacement {
        let Some(previous) = std::mem::replace(&mut self.current, next) else {
            return BatchReplacement::default();
        };

        let mut replacement = BatchReplacement {
            displaced: Some(previous.id),
            archived: false,
            had_unsaved_edits: previous.has_unsaved_edits(),
        };
        if !previous.is_finalized() {
            if replacement.had_unsaved_edits {
                tracing::warn!(batch_id = %previous.id, "Replacing a batch with unsaved edits; archived");
            }
            replacement.archived = true;
            self.archived.push(previous);
        }
        replacement
    }

    fn editable(&mut self) -> Result<&mut AuditBatch, AuditError> {
        let batch = self
            .current
            .as_mut()
            .ok_or_else(|| AuditError::EmptyBatch("no batch has been built".into()))?;
        if batch.is_finalized() {
            return Err(AuditError::BatchReadOnly(batch.id));
        }
        Ok(batch)
    }

    /// Built → UnderReview. A batch already under review stays there.
    pub fn begin_review(&mut self) -> Result<(), AuditError> {
        let batch = self.editable()?;
        batch.state = ReviewState::UnderReview;
        Ok(())
    }

    pub fn set_unreported_ae(&mut self, key: &str, value: bool) -> Result<(), AuditError> {
        self.edit(key, |record| {
            let changed = record.unreported_ae != value;
            record.unreported_ae = value;
            changed
        })
    }

    pub fn set_noted_ae(&mut self, key: &str, value: bool) -> Result<(), AuditError> {
        self.edit(key, |record| {
            let changed = record.noted_ae != value;
            record.noted_ae = value;
            changed
        })
    }

    fn edit<F>(&mut self, key: &str, apply: F) -> Result<(), AuditError>
    where
        F: FnOnce(&mut AuditRecord) -> bool,
    {
        let batch = self.editable()?;
        let changed = apply(batch.record_mut(key)?);
        batch.state = ReviewState::UnderReview;
        batch.edited |= changed;
        Ok(())
    }

    /// Append the current batch through `sink` and mark it read-only.
    ///
    /// A failed append leaves the batch in its previous state so the
    /// auditor can retry.
    pub fn finalize(
        &mut self,
        conn: &Connection,
        sink: &dyn AuditSink,
    ) -> Result<AppendOutcome, AuditError> {
        let batch = match self.current.as_mut() {
            None => return Err(AuditError::EmptyBatch("no batch has been built".into())),
            Some(batch) if batch.is_finalized() => {
                return Err(AuditError::EmptyBatch(format!(
                    "batch {} was already finalized",
                    batch.id
                )))
            }
            Some(batch) => batch,
        };
        if batch.is_empty() {
            return Err(AuditError::EmptyBatch("the batch has no records".into()));
        }

        let outcome = sink.append(conn, &batch.id, &batch.records)?;
        batch.state = ReviewState::Finalized;
        tracing::info!(
            batch_id = %batch.id,
            inserted = outcome.inserted,
            skipped = outcome.skipped_duplicates,
            "Batch finalized"
        );
        Ok(outcome)
    }

    /// Drop the current batch without persisting it.
    pub fn discard(&mut self) -> Option<AuditBatch> {
        let discarded = self.current.take();
        if let Some(batch) = &discarded {
            tracing::info!(batch_id = %batch.id, state = %batch.state, "Batch discarded");
        }
        discarded
    }
}
