use crate::period::catalog::CategoryKey;
use crate::period::workflow::SubmitSummary;
use crate::store::StoreError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeriodError {
    #[error("period must be between 1 and 7, got {0}")]
    InvalidPeriod(i64),

    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("row {index} does not exist in period {period}")]
    RowOutOfRange { period: u8, index: usize },

    #[error("session is read-only in view mode")]
    ReadOnly,

    #[error("an edit of period {0} is in progress")]
    EditInProgress(u8),

    #[error("no edit in progress")]
    NotEditing,

    #[error("period {period} is locked while editing period {editing}")]
    PeriodLocked { period: u8, editing: u8 },

    #[error("{action} is only available in {expected} mode")]
    WrongMode {
        action: &'static str,
        expected: &'static str,
    },

    #[error("no period has a lesson rating; nothing to submit")]
    IncompleteSubmission,

    #[error("{action} failed: {source}")]
    RemoteCallFailure {
        action: &'static str,
        period: Option<u8>,
        source: StoreError,
    },

    #[error(
        "{} of {} periods failed to save",
        .0.failed.len(),
        .0.failed.len() + .0.saved.len()
    )]
    PartialBatchFailure(SubmitSummary),
}

impl PeriodError {
    pub fn remote(action: &'static str, period: Option<u8>, source: StoreError) -> Self {
        PeriodError::RemoteCallFailure {
            action,
            period,
            source,
        }
    }
}

/// A category with no matching event type. Never fatal: the category simply
/// contributes no events to the current save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionMiss {
    pub key: CategoryKey,
}
