// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    AttemptStatus, AttemptSummary, AttendanceStatus, EventRoster, GenderMixComfort, GroupPolicy,
    MatchingAttempt, MatchingGroup, Participant, Partition, PersonaAnswer, RelationshipStatus,
    RosterEntry, ScoringWeights,
};
pub use requests::CommitRequest;
pub use responses::{AttemptResponse, ErrorResponse, HealthResponse, HistoryResponse, MyGroupResponse, ResultsResponse};
