use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::models::domain::{AttemptStatus, AttemptSummary, MatchingAttempt, MatchingGroup};

/// Response for match, preview and results endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptResponse {
    #[serde(rename = "attemptId")]
    pub attempt_id: Uuid,
    #[serde(rename = "eventId")]
    pub event_id: String,
    pub status: AttemptStatus,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "triggeredBy")]
    pub triggered_by: String,
    pub groups: Vec<MatchingGroup>,
    pub unmatched: Vec<String>,
}

impl From<MatchingAttempt> for AttemptResponse {
    fn from(attempt: MatchingAttempt) -> Self {
        Self {
            attempt_id: attempt.attempt_id,
            event_id: attempt.event_id,
            status: attempt.status,
            created_at: attempt.created_at,
            triggered_by: attempt.triggered_by,
            groups: attempt.groups,
            unmatched: attempt.unmatched,
        }
    }
}

/// Results endpoint body; `attempt` is absent until the event is matched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsResponse {
    #[serde(rename = "eventId")]
    pub event_id: String,
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<AttemptResponse>,
}

/// History endpoint body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    #[serde(rename = "eventId")]
    pub event_id: String,
    pub attempts: Vec<AttemptSummary>,
}

/// The caller's table in the committed attempt; `matched` is false without one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MyGroupResponse {
    #[serde(rename = "eventId")]
    pub event_id: String,
    #[serde(rename = "participantId")]
    pub participant_id: String,
    pub matched: bool,
    #[serde(rename = "attemptId", skip_serializing_if = "Option::is_none")]
    pub attempt_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<MatchingGroup>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
