use std::sync::Arc;
use uuid::Uuid;

use crate::core::Matcher;
use crate::error::{MatchingError, MatchingResult};
use crate::models::{AttemptStatus, AttemptSummary, MatchingAttempt, MatchingGroup, Partition};
use crate::services::cache::{CacheError, CacheKey, CacheManager};
use crate::services::ledger::AttemptLedger;
use crate::services::roster::RosterProvider;

/// Reads of the current attempt retry this often when a concurrent commit
/// supersedes it between lookup and load
const CURRENT_READ_ATTEMPTS: usize = 3;

/// Matching facade
///
/// Ties the roster provider, the pure matcher and the attempt ledger
/// together into the preview/commit/results/history/my-group operations.
pub struct MatchingService {
    roster: Arc<dyn RosterProvider>,
    ledger: Arc<dyn AttemptLedger>,
    cache: Option<Arc<CacheManager>>,
    matcher: Matcher,
    audit_previews: bool,
}

impl MatchingService {
    pub fn new(roster: Arc<dyn RosterProvider>, ledger: Arc<dyn AttemptLedger>, matcher: Matcher) -> Self {
        Self {
            roster,
            ledger,
            cache: None,
            matcher,
            audit_previews: false,
        }
    }

    /// Cache committed attempt bodies by attempt id
    pub fn with_cache(mut self, cache: Arc<CacheManager>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Record previews in the ledger with status PREVIEW
    pub fn with_preview_audit(mut self, audit_previews: bool) -> Self {
        self.audit_previews = audit_previews;
        self
    }

    /// Fetch the roster and run the pipeline on the blocking pool
    async fn compute(&self, event_id: &str) -> MatchingResult<Partition> {
        let roster = self
            .roster
            .fetch_roster(event_id)
            .await?
            .ok_or_else(|| MatchingError::NotFound(event_id.to_string()))?;

        tracing::debug!("Fetched {} roster entries for event {}", roster.entries.len(), event_id);

        let matcher = self.matcher.clone();
        tokio::task::spawn_blocking(move || matcher.run(&roster))
            .await
            .map_err(|e| MatchingError::Internal(format!("matching task failed: {}", e)))?
    }

    /// Compute a non-authoritative partition for the event
    pub async fn preview(&self, event_id: &str, actor: &str) -> MatchingResult<MatchingAttempt> {
        let partition = self.compute(event_id).await?;
        let attempt = MatchingAttempt::from_partition(event_id, actor, AttemptStatus::Preview, partition);

        if self.audit_previews {
            self.ledger.record_preview(&attempt).await?;
        }

        tracing::info!(
            "Previewed event {}: {} groups, {} unmatched",
            event_id,
            attempt.groups.len(),
            attempt.unmatched.len()
        );

        Ok(attempt)
    }

    /// Compute a partition and commit it, superseding the current attempt
    pub async fn commit(&self, event_id: &str, actor: &str) -> MatchingResult<MatchingAttempt> {
        let partition = self.compute(event_id).await?;
        let attempt = MatchingAttempt::from_partition(event_id, actor, AttemptStatus::Committed, partition);

        let committed = match self.ledger.commit_attempt(attempt).await {
            Ok(committed) => committed,
            Err(e) => {
                tracing::error!("Failed to commit attempt for event {}: {}", event_id, e);
                return Err(e.into());
            }
        };

        self.cache_attempt(&committed).await;

        tracing::info!(
            "Committed attempt {} for event {} by {}: {} groups, {} unmatched",
            committed.attempt_id,
            event_id,
            actor,
            committed.groups.len(),
            committed.unmatched.len()
        );

        Ok(committed)
    }

    /// The event's committed attempt, `None` while the event is not matched
    pub async fn results(&self, event_id: &str) -> MatchingResult<Option<MatchingAttempt>> {
        for _ in 0..CURRENT_READ_ATTEMPTS {
            let Some(attempt_id) = self.ledger.current_attempt_id(event_id).await? else {
                return Ok(None);
            };

            if let Some(attempt) = self.cached_attempt(attempt_id).await {
                return Ok(Some(attempt));
            }

            match self.ledger.load_attempt(attempt_id).await? {
                Some(attempt) if attempt.status == AttemptStatus::Committed => {
                    self.cache_attempt(&attempt).await;
                    return Ok(Some(attempt));
                }
                // Superseded between lookup and load; read the newer one
                _ => tracing::debug!("Attempt {} of event {} moved on, re-reading", attempt_id, event_id),
            }
        }

        Err(MatchingError::ConcurrentCommit(event_id.to_string()))
    }

    /// Attempt summaries of the event, newest first
    pub async fn history(&self, event_id: &str) -> MatchingResult<Vec<AttemptSummary>> {
        Ok(self.ledger.history(event_id).await?)
    }

    /// The participant's table in the committed attempt
    pub async fn my_group(&self, event_id: &str, participant_id: &str) -> MatchingResult<(Uuid, MatchingGroup)> {
        let not_matched = || MatchingError::NotMatched {
            event_id: event_id.to_string(),
            participant_id: participant_id.to_string(),
        };

        let attempt = self.results(event_id).await?.ok_or_else(not_matched)?;
        let group = attempt.group_of(participant_id).cloned().ok_or_else(not_matched)?;

        Ok((attempt.attempt_id, group))
    }

    pub async fn ledger_healthy(&self) -> bool {
        self.ledger.health_check().await
    }

    async fn cached_attempt(&self, attempt_id: Uuid) -> Option<MatchingAttempt> {
        let cache = self.cache.as_ref()?;
        match cache.get(&CacheKey::attempt(attempt_id)).await {
            Ok(attempt) => Some(attempt),
            Err(CacheError::CacheMiss(_)) => None,
            Err(e) => {
                tracing::warn!("Cache read for attempt {} failed, using the ledger: {}", attempt_id, e);
                None
            }
        }
    }

    async fn cache_attempt(&self, attempt: &MatchingAttempt) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(&CacheKey::attempt(attempt.attempt_id), attempt).await {
                tracing::warn!("Failed to cache attempt {}: {}", attempt.attempt_id, e);
            }
        }
    }
}
