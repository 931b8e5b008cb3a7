use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{AttemptStatus, AttemptSummary, MatchingAttempt};
use crate::services::ledger::{AttemptLedger, LedgerError};

/// In-process attempt ledger
///
/// Attempts are kept per event in insertion order. The write lock is this
/// store's transaction: supersession and insertion happen under one guard,
/// so readers never see an event between the two steps.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    events: RwLock<HashMap<String, Vec<MatchingAttempt>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptLedger for InMemoryLedger {
    async fn commit_attempt(&self, mut attempt: MatchingAttempt) -> Result<MatchingAttempt, LedgerError> {
        let mut events = self.events.write().await;
        let attempts = events.entry(attempt.event_id.clone()).or_default();

        let mut superseded = 0;
        for previous in attempts
            .iter_mut()
            .filter(|a| a.status == AttemptStatus::Committed)
        {
            previous.status = AttemptStatus::Superseded;
            superseded += 1;
        }

        attempt.status = AttemptStatus::Committed;
        attempt.created_at = Utc::now();
        attempts.push(attempt.clone());

        tracing::debug!(
            "Committed attempt {} for event {} ({} superseded)",
            attempt.attempt_id,
            attempt.event_id,
            superseded
        );

        Ok(attempt)
    }

    async fn record_preview(&self, attempt: &MatchingAttempt) -> Result<(), LedgerError> {
        let mut preview = attempt.clone();
        preview.status = AttemptStatus::Preview;

        self.events
            .write()
            .await
            .entry(preview.event_id.clone())
            .or_default()
            .push(preview);

        Ok(())
    }

    async fn current_attempt_id(&self, event_id: &str) -> Result<Option<Uuid>, LedgerError> {
        let events = self.events.read().await;
        Ok(events.get(event_id).and_then(|attempts| {
            attempts
                .iter()
                .find(|a| a.status == AttemptStatus::Committed)
                .map(|a| a.attempt_id)
        }))
    }

    async fn load_attempt(&self, attempt_id: Uuid) -> Result<Option<MatchingAttempt>, LedgerError> {
        let events = self.events.read().await;
        Ok(events
            .values()
            .flat_map(|attempts| attempts.iter())
            .find(|a| a.attempt_id == attempt_id)
            .cloned())
    }

    async fn history(&self, event_id: &str) -> Result<Vec<AttemptSummary>, LedgerError> {
        let events = self.events.read().await;
        Ok(events
            .get(event_id)
            .map(|attempts| attempts.iter().rev().map(MatchingAttempt::summary).collect())
            .unwrap_or_default())
    }

    async fn health_check(&self) -> bool {
        true
    }
}
