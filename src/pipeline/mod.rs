//! Batch review pipeline: query → match → resolve → build, then persist.

pub mod builder;
pub mod error;
pub mod matcher;
pub mod resolver;
pub mod runner;
pub mod store;
pub mod traits;
pub mod types;

pub use builder::{build_records, BuildContext};
pub use error::AuditError;
pub use matcher::{match_notes, KeywordMatcher, KeywordSet};
pub use resolver::{resolve, SupervisorRoster};
pub use runner::run_batch;
pub use store::SqliteAuditSink;
pub use traits::AuditSink;
pub use types::*;
