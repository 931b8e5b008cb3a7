use std::sync::Arc;

use crate::core::{
    assigner::{assign_groups, group_score, validate_assignment},
    filters::EligibilityRules,
    resolver::resolve_participants,
    scoring::{CompatibilityScorer, ScoreMatrix, TraitSimilarityScorer},
};
use crate::error::{MatchingError, MatchingResult};
use crate::models::{EventRoster, GroupPolicy, MatchingGroup, Partition};

/// Default number of trait dimensions
pub const DEFAULT_TRAIT_DIMENSIONS: usize = 8;

/// Main matching orchestrator - runs the pure part of the pipeline
///
/// # Pipeline Stages
/// 1. Profile resolution (eligible, normalized participants in id order)
/// 2. Score matrix and eligibility mask
/// 3. Group assignment
/// 4. Partition validation
///
/// No I/O happens here; the same roster and policy always give the same
/// partition.
#[derive(Debug, Clone)]
pub struct Matcher {
    scorer: Arc<dyn CompatibilityScorer>,
    rules: EligibilityRules,
    policy: GroupPolicy,
    trait_dimensions: usize,
}

impl Matcher {
    pub fn new(
        scorer: Arc<dyn CompatibilityScorer>,
        rules: EligibilityRules,
        policy: GroupPolicy,
        trait_dimensions: usize,
    ) -> MatchingResult<Self> {
        validate_policy(&policy)?;
        if trait_dimensions == 0 {
            return Err(MatchingError::InvalidPolicy(
                "trait dimensions must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            scorer,
            rules,
            policy,
            trait_dimensions,
        })
    }

    /// Matcher with the default scorer, no exclusive intents and the given policy
    pub fn with_policy(policy: GroupPolicy) -> MatchingResult<Self> {
        Self::new(
            Arc::new(TraitSimilarityScorer::default()),
            EligibilityRules::default(),
            policy,
            DEFAULT_TRAIT_DIMENSIONS,
        )
    }

    pub fn policy(&self) -> &GroupPolicy {
        &self.policy
    }

    /// Partition the roster of one event into tables
    ///
    /// # Errors
    /// `InsufficientParticipants` for rosters too small to seat one table,
    /// `InvariantViolation` if the assigner produced an invalid partition.
    pub fn run(&self, roster: &EventRoster) -> MatchingResult<Partition> {
        let participants = resolve_participants(roster, &self.policy, self.trait_dimensions)?;

        let matrix = ScoreMatrix::build(&participants, self.scorer.as_ref(), &self.rules);
        let assignment = assign_groups(&matrix, &self.policy);

        if let Err(e) = validate_assignment(&matrix, &self.policy, &assignment) {
            tracing::error!("Rejecting partition for event {}: {}", roster.event_id, e);
            return Err(e);
        }

        let groups = assignment
            .groups
            .iter()
            .enumerate()
            .map(|(table, members)| MatchingGroup {
                table_number: table as u32 + 1,
                member_ids: members
                    .iter()
                    .map(|&i| participants[i].participant_id.clone())
                    .collect(),
                score: group_score(&matrix, members),
            })
            .collect();

        let unmatched = assignment
            .unmatched
            .iter()
            .map(|&i| participants[i].participant_id.clone())
            .collect();

        Ok(Partition { groups, unmatched })
    }
}

/// Check a group policy for internal consistency
pub fn validate_policy(policy: &GroupPolicy) -> MatchingResult<()> {
    if policy.min_size < 2 {
        return Err(MatchingError::InvalidPolicy(format!(
            "minimum group size must be at least 2, got {}",
            policy.min_size
        )));
    }
    if policy.max_size < policy.min_size {
        return Err(MatchingError::InvalidPolicy(format!(
            "maximum group size {} is below minimum {}",
            policy.max_size, policy.min_size
        )));
    }
    if policy.target_groups == Some(0) {
        return Err(MatchingError::InvalidPolicy(
            "target group count must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendanceStatus, GenderMixComfort, RelationshipStatus, RosterEntry};

    fn create_entry(id: &str, gender: &str, comfort: GenderMixComfort, vector: Vec<f64>) -> RosterEntry {
        RosterEntry {
            participant_id: id.to_string(),
            status: AttendanceStatus::Confirmed,
            gender: gender.to_string(),
            gender_mix_comfort: comfort,
            relationship_status: RelationshipStatus::Single,
            intent_tags: vec!["friends".to_string()],
            trait_vector: Some(vector),
            answers: vec![],
        }
    }

    fn create_roster(count: usize) -> EventRoster {
        EventRoster {
            event_id: "evt".to_string(),
            entries: (0..count)
                .map(|i| {
                    create_entry(
                        &format!("p{:02}", i),
                        if i % 2 == 0 { "female" } else { "male" },
                        GenderMixComfort::TotallyFine,
                        vec![(i % 3) as f64 + 0.5, (i % 5) as f64, 1.0],
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_run_basic() {
        let matcher = Matcher::with_policy(GroupPolicy::default()).unwrap();
        let partition = matcher.run(&create_roster(12)).unwrap();

        let seated: usize = partition.groups.iter().map(|g| g.size()).sum();
        assert_eq!(seated + partition.unmatched.len(), 12);
        assert!(partition.groups.iter().all(|g| (4..=6).contains(&g.size())));
        assert!(partition.groups.iter().all(|g| (0.0..=1.0).contains(&g.score)));
        assert_eq!(partition.groups[0].table_number, 1);
    }

    #[test]
    fn test_same_gender_preference_is_respected() {
        let mut roster = create_roster(10);
        roster.entries[0].gender_mix_comfort = GenderMixComfort::PreferSameGender;
        let matcher = Matcher::with_policy(GroupPolicy::default()).unwrap();

        let partition = matcher.run(&roster).unwrap();

        if let Some(group) = partition.groups.iter().find(|g| g.contains("p00")) {
            for id in &group.member_ids {
                let entry = roster.entries.iter().find(|e| &e.participant_id == id).unwrap();
                assert_eq!(entry.gender, "female");
            }
        } else {
            assert!(partition.unmatched.contains(&"p00".to_string()));
        }
    }

    #[test]
    fn test_insufficient_roster() {
        let matcher = Matcher::with_policy(GroupPolicy::default()).unwrap();
        let err = matcher.run(&create_roster(3)).unwrap_err();

        assert!(matches!(err, MatchingError::InsufficientParticipants { eligible: 3, required: 4, .. }));
    }

    #[test]
    fn test_invalid_policies_are_rejected() {
        let mut policy = GroupPolicy::default();
        policy.min_size = 1;
        assert!(Matcher::with_policy(policy).is_err());

        let mut policy = GroupPolicy::default();
        policy.max_size = 3;
        assert!(Matcher::with_policy(policy).is_err());

        let mut policy = GroupPolicy::default();
        policy.target_groups = Some(0);
        assert!(Matcher::with_policy(policy).is_err());
    }
}
