use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AttemptSummary, MatchingAttempt};

/// Errors that can occur when reading or writing the attempt ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    /// Another commit for the same event holds the event lock
    #[error("Commit conflict for event {0}")]
    Conflict(String),

    #[error("Corrupt ledger record: {0}")]
    Corrupt(String),
}

/// Append-only store of matching attempts
///
/// Implementations guarantee that at most one attempt per event is
/// COMMITTED at any instant and that `commit_attempt` is all-or-nothing:
/// readers observe either the previous committed attempt or the new one,
/// never an event without one in between.
#[async_trait]
pub trait AttemptLedger: Send + Sync {
    /// Supersede the event's committed attempt and store `attempt` as committed
    ///
    /// The ledger stamps `created_at` and `status` while holding the event
    /// lock, so history order always matches commit order.
    async fn commit_attempt(&self, attempt: MatchingAttempt) -> Result<MatchingAttempt, LedgerError>;

    /// Store a preview for audit; never touches committed state
    async fn record_preview(&self, attempt: &MatchingAttempt) -> Result<(), LedgerError>;

    /// Id of the event's committed attempt
    async fn current_attempt_id(&self, event_id: &str) -> Result<Option<Uuid>, LedgerError>;

    /// Full attempt including its groups
    async fn load_attempt(&self, attempt_id: Uuid) -> Result<Option<MatchingAttempt>, LedgerError>;

    /// All attempts of the event, newest first
    async fn history(&self, event_id: &str) -> Result<Vec<AttemptSummary>, LedgerError>;

    /// Health check for the backing store
    async fn health_check(&self) -> bool;
}
