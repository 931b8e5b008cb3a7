use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// How a participant feels about sharing a table with other genders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenderMixComfort {
    #[default]
    TotallyFine,
    PreferSameGender,
    Depends,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipStatus {
    Single,
    Married,
    #[default]
    PreferNotSay,
}

/// Attendance state of a roster entry as reported by the event service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Confirmed,
    Paid,
    #[default]
    Pending,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl AttendanceStatus {
    /// Only paid or confirmed attendees take part in matching
    pub fn is_eligible(self) -> bool {
        matches!(self, AttendanceStatus::Confirmed | AttendanceStatus::Paid)
    }
}

/// One answer from the persona questionnaire, already mapped to per-trait weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaAnswer {
    #[serde(rename = "questionId")]
    pub question_id: String,
    #[serde(rename = "traitWeights", default)]
    pub trait_weights: Vec<f64>,
}

/// Raw roster entry as delivered by the roster provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    #[serde(rename = "participantId", alias = "userId")]
    pub participant_id: String,
    #[serde(default)]
    pub status: AttendanceStatus,
    #[serde(default)]
    pub gender: String,
    #[serde(rename = "genderMixComfort", default)]
    pub gender_mix_comfort: GenderMixComfort,
    #[serde(rename = "relationshipStatus", default)]
    pub relationship_status: RelationshipStatus,
    #[serde(rename = "intentOnDaylight", alias = "intentTags", default)]
    pub intent_tags: Vec<String>,
    #[serde(rename = "traitVector", default)]
    pub trait_vector: Option<Vec<f64>>,
    #[serde(rename = "personaAnswers", default)]
    pub answers: Vec<PersonaAnswer>,
}

/// All roster entries of one event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRoster {
    #[serde(rename = "eventId")]
    pub event_id: String,
    pub entries: Vec<RosterEntry>,
}

/// An eligible, normalized participant of one matching run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(rename = "participantId")]
    pub participant_id: String,
    pub gender: String,
    #[serde(rename = "genderMixComfort")]
    pub gender_mix_comfort: GenderMixComfort,
    #[serde(rename = "relationshipStatus")]
    pub relationship_status: RelationshipStatus,
    #[serde(rename = "intentTags")]
    pub intent_tags: Vec<String>,
    #[serde(rename = "traitVector")]
    pub trait_vector: Vec<f64>,
}

/// Group size policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPolicy {
    #[serde(rename = "minSize")]
    pub min_size: usize,
    #[serde(rename = "maxSize")]
    pub max_size: usize,
    /// Desired number of tables; `None` means as many as fit
    #[serde(rename = "targetGroups")]
    pub target_groups: Option<usize>,
    #[serde(rename = "swapPassBudget")]
    pub swap_pass_budget: usize,
}

impl Default for GroupPolicy {
    fn default() -> Self {
        Self {
            min_size: 4,
            max_size: 6,
            target_groups: None,
            swap_pass_budget: 8,
        }
    }
}

/// Scoring weights
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub traits: f64,
    pub intents: f64,
    pub relationship: f64,
    /// Subtracted when a DEPENDS participant meets a different gender
    pub depends_mixed_penalty: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            traits: 0.70,
            intents: 0.20,
            relationship: 0.10,
            depends_mixed_penalty: 0.10,
        }
    }
}

/// One table of a matching attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingGroup {
    #[serde(rename = "tableNumber")]
    pub table_number: u32,
    #[serde(rename = "memberIds")]
    pub member_ids: Vec<String>,
    /// Mean pairwise compatibility of the members
    pub score: f64,
}

impl MatchingGroup {
    pub fn contains(&self, participant_id: &str) -> bool {
        self.member_ids.iter().any(|id| id == participant_id)
    }

    pub fn size(&self) -> usize {
        self.member_ids.len()
    }
}

/// Output of the group assigner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub groups: Vec<MatchingGroup>,
    pub unmatched: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    Preview,
    Committed,
    Superseded,
}

impl AttemptStatus {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Preview => "preview",
            AttemptStatus::Committed => "committed",
            AttemptStatus::Superseded => "superseded",
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "preview" => Ok(AttemptStatus::Preview),
            "committed" => Ok(AttemptStatus::Committed),
            "superseded" => Ok(AttemptStatus::Superseded),
            other => Err(format!("unknown attempt status: {}", other)),
        }
    }
}

/// One run of the matching pipeline against one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingAttempt {
    #[serde(rename = "attemptId")]
    pub attempt_id: Uuid,
    #[serde(rename = "eventId")]
    pub event_id: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "triggeredBy")]
    pub triggered_by: String,
    pub status: AttemptStatus,
    pub groups: Vec<MatchingGroup>,
    pub unmatched: Vec<String>,
}

impl MatchingAttempt {
    /// Wrap a freshly computed partition into a new attempt record
    pub fn from_partition(
        event_id: &str,
        triggered_by: &str,
        status: AttemptStatus,
        partition: Partition,
    ) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            event_id: event_id.to_string(),
            created_at: Utc::now(),
            triggered_by: triggered_by.to_string(),
            status,
            groups: partition.groups,
            unmatched: partition.unmatched,
        }
    }

    /// Group containing the participant, if any
    pub fn group_of(&self, participant_id: &str) -> Option<&MatchingGroup> {
        self.groups.iter().find(|g| g.contains(participant_id))
    }

    pub fn summary(&self) -> AttemptSummary {
        AttemptSummary {
            attempt_id: self.attempt_id,
            created_at: self.created_at,
            status: self.status,
            triggered_by: self.triggered_by.clone(),
            group_count: self.groups.len(),
            unmatched_count: self.unmatched.len(),
        }
    }
}

/// History row for audit listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptSummary {
    #[serde(rename = "attemptId")]
    pub attempt_id: Uuid,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    pub status: AttemptStatus,
    #[serde(rename = "triggeredBy")]
    pub triggered_by: String,
    #[serde(rename = "groupCount")]
    pub group_count: usize,
    #[serde(rename = "unmatchedCount")]
    pub unmatched_count: usize,
}
