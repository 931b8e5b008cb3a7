use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

use crate::models::{EventRoster, RosterEntry};
use crate::services::roster::{RosterError, RosterProvider};

/// Default number of participant documents fetched per request
const DEFAULT_PAGE_SIZE: usize = 100;

/// Appwrite API client
///
/// Reads event rosters from the Appwrite backend:
/// - Checking that the event document exists
/// - Paging through the participant documents of the event
pub struct AppwriteClient {
    base_url: String,
    api_key: String,
    project_id: String,
    database_id: String,
    client: Client,
    collections: AppwriteCollections,
    page_size: usize,
}

/// Collection IDs in Appwrite
#[derive(Debug, Clone)]
pub struct AppwriteCollections {
    pub events: String,
    pub participants: String,
}

impl AppwriteClient {
    /// Create a new Appwrite client
    pub fn new(
        base_url: String,
        api_key: String,
        project_id: String,
        database_id: String,
        collections: AppwriteCollections,
    ) -> Result<Self, RosterError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            base_url,
            api_key,
            project_id,
            database_id,
            client,
            collections,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Override the number of documents fetched per page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn documents_url(&self, collection: &str) -> String {
        format!(
            "{}/databases/{}/collections/{}/documents",
            self.base_url.trim_end_matches('/'),
            self.database_id,
            collection
        )
    }

    /// Check whether the event document exists
    pub async fn event_exists(&self, event_id: &str) -> Result<bool, RosterError> {
        let url = format!(
            "{}/{}",
            self.documents_url(&self.collections.events),
            urlencoding::encode(event_id)
        );

        tracing::debug!("Fetching event document: {}", url);

        let response = self
            .client
            .get(&url)
            .header("X-Appwrite-Key", &self.api_key)
            .header("X-Appwrite-Project", &self.project_id)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RosterError::Unauthorized),
            status if status.is_success() => Ok(true),
            status => Err(RosterError::ApiError(format!(
                "Failed to fetch event {}: {}",
                event_id, status
            ))),
        }
    }

    /// Fetch every participant document of an event, page by page
    pub async fn list_participants(&self, event_id: &str) -> Result<Vec<RosterEntry>, RosterError> {
        let url = self.documents_url(&self.collections.participants);
        let event_literal = serde_json::to_string(event_id)
            .map_err(|e| RosterError::InvalidResponse(e.to_string()))?;

        let mut entries = Vec::new();
        let mut offset = 0usize;

        loop {
            let queries = vec![
                format!("equal(\"eventId\", [{}])", event_literal),
                format!("limit({})", self.page_size),
                format!("offset({})", offset),
            ];
            let queries_json = serde_json::to_string(&queries)
                .map_err(|e| RosterError::InvalidResponse(e.to_string()))?;
            let full_url = format!("{}?query={}", url, urlencoding::encode(&queries_json));

            let response = self
                .client
                .get(&full_url)
                .header("X-Appwrite-Key", &self.api_key)
                .header("X-Appwrite-Project", &self.project_id)
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(RosterError::Unauthorized);
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_else(|_| "Unable to read body".to_string());
                tracing::error!("Failed to list participants of {}: {} - {}", event_id, status, body);
                return Err(RosterError::ApiError(format!(
                    "Failed to list participants: {}",
                    status
                )));
            }

            let json: Value = response.json().await?;

            let total = json.get("total").and_then(|t| t.as_u64()).unwrap_or(0) as usize;

            let documents = json
                .get("documents")
                .and_then(|d| d.as_array())
                .ok_or_else(|| RosterError::InvalidResponse("Missing documents array".into()))?;

            for doc in documents {
                let data = doc.get("data").unwrap_or(doc);
                match serde_json::from_value::<RosterEntry>(data.clone()) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => tracing::warn!("Skipping malformed participant document of {}: {}", event_id, e),
                }
            }

            offset += documents.len();
            if documents.len() < self.page_size || offset >= total {
                break;
            }
        }

        tracing::debug!("Fetched {} roster entries for event {}", entries.len(), event_id);

        Ok(entries)
    }
}

#[async_trait]
impl RosterProvider for AppwriteClient {
    async fn fetch_roster(&self, event_id: &str) -> Result<Option<EventRoster>, RosterError> {
        if !self.event_exists(event_id).await? {
            return Ok(None);
        }

        let entries = self.list_participants(event_id).await?;

        Ok(Some(EventRoster {
            event_id: event_id.to_string(),
            entries,
        }))
    }
}
