//! Error types for the match → resolve → build pipeline and the review
//! session that consumes it.

use thiserror::Error;
use uuid::Uuid;

use super::types::PipelineStage;
use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cannot normalize identifier: {0}")]
    Normalization(String),

    #[error("Nothing to finalize: {0}")]
    EmptyBatch(String),

    #[error("Batch {0} is finalized and read-only")]
    BatchReadOnly(Uuid),

    #[error("No record with key {0} in the current batch")]
    RecordNotFound(String),

    #[error("Reference store unavailable: {0}")]
    StoreUnavailable(#[source] DatabaseError),

    /// A stored row holds a value that cannot be read, e.g. a garbled date.
    #[error("Malformed {field} in the reference store: {value:?}")]
    MalformedData { field: String, value: String },

    #[error("{skipped} record(s) were already persisted; the append may have been retried")]
    DuplicateAppendRisk { skipped: usize },

    #[error("Batch build failed at the {stage} stage: {source}")]
    StageFailed {
        stage: PipelineStage,
        #[source]
        source: Box<AuditError>,
    },
}

impl From<DatabaseError> for AuditError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::InvalidValue { field, value } => AuditError::MalformedData { field, value },
            other => AuditError::StoreUnavailable(other),
        }
    }
}

impl AuditError {
    /// Tag an error with the pipeline stage that produced it.
    pub fn at_stage(self, stage: PipelineStage) -> Self {
        match self {
            already @ AuditError::StageFailed { .. } => already,
            other => AuditError::StageFailed {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The failing stage, when this error came out of a batch build.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            AuditError::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// True when the underlying cause is the store rather than the input.
    pub fn is_store_unavailable(&self) -> bool {
        match self {
            AuditError::StoreUnavailable(_) => true,
            AuditError::StageFailed { source, .. } => source.is_store_unavailable(),
            _ => false,
        }
    }
}
