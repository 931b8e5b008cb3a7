use thiserror::Error;

use crate::services::{LedgerError, RosterError};

/// Errors surfaced by the matching engine and its facade
#[derive(Debug, Error)]
pub enum MatchingError {
    #[error("Event not found: {0}")]
    NotFound(String),

    #[error("Event {event_id} has {eligible} eligible participants, at least {required} are needed")]
    InsufficientParticipants {
        event_id: String,
        eligible: usize,
        required: usize,
    },

    #[error("Another commit for event {0} is in progress, retry later")]
    ConcurrentCommit(String),

    #[error("Participant {participant_id} has no table in the committed attempt for event {event_id}")]
    NotMatched {
        event_id: String,
        participant_id: String,
    },

    #[error("Partition invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Invalid group policy: {0}")]
    InvalidPolicy(String),

    #[error("Roster provider error: {0}")]
    Roster(#[from] RosterError),

    #[error("Ledger error: {0}")]
    Ledger(LedgerError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<LedgerError> for MatchingError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::Conflict(event_id) => MatchingError::ConcurrentCommit(event_id),
            other => MatchingError::Ledger(other),
        }
    }
}

impl MatchingError {
    /// Stable machine-readable kind used in error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            MatchingError::NotFound(_) => "not_found",
            MatchingError::InsufficientParticipants { .. } => "insufficient_participants",
            MatchingError::ConcurrentCommit(_) => "concurrent_commit",
            MatchingError::NotMatched { .. } => "not_matched",
            MatchingError::InvariantViolation(_) => "invariant_violation",
            MatchingError::InvalidPolicy(_) => "invalid_policy",
            MatchingError::Roster(_) => "roster_unavailable",
            MatchingError::Ledger(_) => "ledger_error",
            MatchingError::Internal(_) => "internal_error",
        }
    }
}

pub type MatchingResult<T> = Result<T, MatchingError>;
