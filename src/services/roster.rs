use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{EventRoster, RosterEntry};

/// Errors that can occur when fetching an event roster
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Unauthorized: invalid API key or token")]
    Unauthorized,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Source of event rosters
///
/// Returns `Ok(None)` when the event does not exist. Entries are returned
/// as delivered; eligibility filtering happens in the profile resolver.
#[async_trait]
pub trait RosterProvider: Send + Sync {
    async fn fetch_roster(&self, event_id: &str) -> Result<Option<EventRoster>, RosterError>;
}

/// In-process roster provider for tests and local runs
#[derive(Debug, Default)]
pub struct StaticRosterProvider {
    events: RwLock<HashMap<String, Vec<RosterEntry>>>,
}

impl StaticRosterProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration of an event roster
    pub fn with_event(mut self, event_id: &str, entries: Vec<RosterEntry>) -> Self {
        self.events.get_mut().insert(event_id.to_string(), entries);
        self
    }

    /// Replace the roster of an event
    pub async fn set_roster(&self, event_id: &str, entries: Vec<RosterEntry>) {
        self.events.write().await.insert(event_id.to_string(), entries);
    }
}

#[async_trait]
impl RosterProvider for StaticRosterProvider {
    async fn fetch_roster(&self, event_id: &str) -> Result<Option<EventRoster>, RosterError> {
        let events = self.events.read().await;
        Ok(events.get(event_id).map(|entries| EventRoster {
            event_id: event_id.to_string(),
            entries: entries.clone(),
        }))
    }
}
