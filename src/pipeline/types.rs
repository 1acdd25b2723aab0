//! Core types for the batch review pipeline.
//!
//! These types model one review request:
//! Request → Query → Match → Resolve → Build → Outcome.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::AuditError;
use crate::review::AuditBatch;

// ═══════════════════════════════════════════
// Stage
// ═══════════════════════════════════════════

/// The pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Query,
    Match,
    Resolve,
    Build,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Match => "match",
            Self::Resolve => "resolve",
            Self::Build => "build",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════
// Request
// ═══════════════════════════════════════════

/// A half-open date range: `start` inclusive, `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, AuditError> {
        if start >= end {
            return Err(AuditError::InvalidInput(format!(
                "date range start {start} must be before end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} through {}", self.start, self.end)
    }
}

/// What to review: one facility, one date range, one auditor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub facility_code: String,
    pub range: DateRange,
    pub auditor: String,
}

impl BatchRequest {
    pub fn new(
        facility_code: impl Into<String>,
        range: DateRange,
        auditor: impl Into<String>,
    ) -> Result<Self, AuditError> {
        let facility_code = facility_code.into().trim().to_string();
        let auditor = auditor.into().trim().to_string();
        if facility_code.is_empty() {
            return Err(AuditError::InvalidInput("facility code is required".into()));
        }
        if auditor.is_empty() {
            return Err(AuditError::InvalidInput("auditor identifier is required".into()));
        }
        Ok(Self {
            facility_code,
            range,
            auditor,
        })
    }
}

// ═══════════════════════════════════════════
// Outcome
// ═══════════════════════════════════════════

/// Result of a batch build. Empty results are values, not errors.
#[derive(Debug)]
pub enum BatchOutcome {
    /// The store returned no notes for the request.
    NoNotes,
    /// Notes were found but none matched a keyword for the facility.
    NoMatches { notes_scanned: usize },
    /// A non-empty batch ready for review.
    Ready(AuditBatch),
}

impl BatchOutcome {
    pub fn into_batch(self) -> Option<AuditBatch> {
        match self {
            BatchOutcome::Ready(batch) => Some(batch),
            _ => None,
        }
    }
}
