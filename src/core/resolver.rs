use std::collections::BTreeMap;

use crate::core::persona::{derive_trait_vector, normalize_trait_vector};
use crate::error::{MatchingError, MatchingResult};
use crate::models::{EventRoster, GroupPolicy, Participant, RosterEntry};

/// Resolve the eligible participants of an event roster
///
/// Keeps paid or confirmed entries, drops duplicates (first entry wins),
/// normalizes gender, intent tags and trait vectors and returns the
/// participants ordered by identifier. The order is what makes every later
/// stage reproducible, so callers must not reorder the result.
///
/// # Errors
/// `InsufficientParticipants` when fewer than `policy.min_size` participants
/// remain, since not even one table can be formed.
pub fn resolve_participants(
    roster: &EventRoster,
    policy: &GroupPolicy,
    trait_dimensions: usize,
) -> MatchingResult<Vec<Participant>> {
    let mut by_id: BTreeMap<&str, Participant> = BTreeMap::new();

    for entry in roster.entries.iter().filter(|e| e.status.is_eligible()) {
        let id = entry.participant_id.trim();
        if id.is_empty() {
            tracing::warn!("Skipping roster entry without participant id for event {}", roster.event_id);
            continue;
        }
        if by_id.contains_key(id) {
            tracing::debug!("Duplicate roster entry {} for event {}", id, roster.event_id);
            continue;
        }
        by_id.insert(id, resolve_entry(entry, id, trait_dimensions));
    }

    let participants: Vec<Participant> = by_id.into_values().collect();

    tracing::debug!(
        "Resolved {} eligible participants out of {} roster entries for event {}",
        participants.len(),
        roster.entries.len(),
        roster.event_id
    );

    if participants.len() < policy.min_size {
        return Err(MatchingError::InsufficientParticipants {
            event_id: roster.event_id.clone(),
            eligible: participants.len(),
            required: policy.min_size,
        });
    }

    Ok(participants)
}

fn resolve_entry(entry: &RosterEntry, id: &str, trait_dimensions: usize) -> Participant {
    let trait_vector = match &entry.trait_vector {
        Some(raw) => {
            if raw.len() != trait_dimensions {
                tracing::warn!(
                    "Trait vector of {} has {} entries, expected {}",
                    id,
                    raw.len(),
                    trait_dimensions
                );
            }
            normalize_trait_vector(raw, trait_dimensions)
        }
        None => derive_trait_vector(&entry.answers, trait_dimensions),
    };

    let mut intent_tags: Vec<String> = entry
        .intent_tags
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    intent_tags.sort();
    intent_tags.dedup();

    Participant {
        participant_id: id.to_string(),
        gender: entry.gender.trim().to_lowercase(),
        gender_mix_comfort: entry.gender_mix_comfort,
        relationship_status: entry.relationship_status,
        intent_tags,
        trait_vector,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendanceStatus, GenderMixComfort, PersonaAnswer, RelationshipStatus};

    fn entry(id: &str, status: AttendanceStatus) -> RosterEntry {
        RosterEntry {
            participant_id: id.to_string(),
            status,
            gender: " Female ".to_string(),
            gender_mix_comfort: GenderMixComfort::TotallyFine,
            relationship_status: RelationshipStatus::Single,
            intent_tags: vec!["Friends".to_string(), "friends".to_string(), " ".to_string()],
            trait_vector: None,
            answers: vec![PersonaAnswer {
                question_id: "q1".to_string(),
                trait_weights: vec![1.0, 1.0],
            }],
        }
    }

    fn roster(entries: Vec<RosterEntry>) -> EventRoster {
        EventRoster {
            event_id: "evt".to_string(),
            entries,
        }
    }

    #[test]
    fn test_filters_ineligible_and_sorts() {
        let roster = roster(vec![
            entry("d", AttendanceStatus::Paid),
            entry("b", AttendanceStatus::Confirmed),
            entry("x", AttendanceStatus::Cancelled),
            entry("a", AttendanceStatus::Confirmed),
            entry("p", AttendanceStatus::Pending),
            entry("c", AttendanceStatus::Confirmed),
        ]);
        let policy = GroupPolicy::default();

        let participants = resolve_participants(&roster, &policy, 2).unwrap();
        let ids: Vec<&str> = participants.iter().map(|p| p.participant_id.as_str()).collect();

        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_normalizes_fields() {
        let roster = roster((0..4).map(|i| entry(&i.to_string(), AttendanceStatus::Paid)).collect());
        let participants = resolve_participants(&roster, &GroupPolicy::default(), 3).unwrap();
        let first = &participants[0];

        assert_eq!(first.gender, "female");
        assert_eq!(first.intent_tags, vec!["friends"]);
        assert_eq!(first.trait_vector, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_precomputed_vector_wins_over_answers() {
        let mut e = entry("a", AttendanceStatus::Paid);
        e.trait_vector = Some(vec![0.0, 3.0]);
        let mut entries = vec![e];
        entries.extend((0..3).map(|i| entry(&format!("z{}", i), AttendanceStatus::Paid)));

        let participants = resolve_participants(&roster(entries), &GroupPolicy::default(), 2).unwrap();
        assert_eq!(participants[0].trait_vector, vec![0.0, 1.0]);
    }

    #[test]
    fn test_duplicates_are_collapsed() {
        let roster = roster(vec![
            entry("a", AttendanceStatus::Paid),
            entry("a", AttendanceStatus::Paid),
            entry("b", AttendanceStatus::Paid),
            entry("c", AttendanceStatus::Paid),
        ]);

        let err = resolve_participants(&roster, &GroupPolicy::default(), 2).unwrap_err();
        assert!(matches!(
            err,
            MatchingError::InsufficientParticipants { eligible: 3, required: 4, .. }
        ));
    }
}
