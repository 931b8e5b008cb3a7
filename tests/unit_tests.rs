// Unit tests for Tablesetter

use tablesetter::core::{
    assign_groups, derive_trait_vector, gender_mix_allowed, normalize_trait_vector, planned_capacities,
    validate_assignment, weighted_cosine, CompatibilityScorer, EligibilityRules, ScoreMatrix,
    TraitSimilarityScorer,
};
use tablesetter::models::{
    GenderMixComfort, GroupPolicy, Participant, PersonaAnswer, RelationshipStatus, ScoringWeights,
};

fn create_participant(id: &str, gender: &str, vector: Vec<f64>) -> Participant {
    Participant {
        participant_id: id.to_string(),
        gender: gender.to_string(),
        gender_mix_comfort: GenderMixComfort::TotallyFine,
        relationship_status: RelationshipStatus::Single,
        intent_tags: vec!["friends".to_string()],
        trait_vector: vector,
    }
}

fn answer(id: &str, weights: Vec<f64>) -> PersonaAnswer {
    PersonaAnswer {
        question_id: id.to_string(),
        trait_weights: weights,
    }
}

#[test]
fn test_trait_vector_is_l1_normalized() {
    let vector = derive_trait_vector(
        &[answer("q1", vec![1.0, 0.0, 2.0]), answer("q2", vec![1.0, 2.0, 2.0])],
        3,
    );

    assert_eq!(vector.len(), 3);
    assert!((vector.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    assert!((vector[0] - 0.25).abs() < 1e-9);
    assert!((vector[2] - 0.5).abs() < 1e-9);
}

#[test]
fn test_trait_vector_ignores_negative_and_non_finite() {
    let vector = derive_trait_vector(&[answer("q1", vec![-3.0, f64::NAN, 1.0, f64::INFINITY])], 4);
    assert_eq!(vector, vec![0.0, 0.0, 1.0, 0.0]);
}

#[test]
fn test_trait_vector_without_answers() {
    assert_eq!(derive_trait_vector(&[], 3), vec![0.0, 0.0, 0.0]);
}

#[test]
fn test_normalize_pads_and_truncates() {
    assert_eq!(normalize_trait_vector(&[2.0, 2.0], 4), vec![0.5, 0.5, 0.0, 0.0]);
    assert_eq!(normalize_trait_vector(&[1.0, 1.0, 2.0], 2), vec![0.5, 0.5]);
}

#[test]
fn test_weighted_cosine() {
    let same = weighted_cosine(&[1.0, 2.0], &[2.0, 4.0], &[]).unwrap();
    assert!((same - 1.0).abs() < 1e-9);

    let orthogonal = weighted_cosine(&[1.0, 0.0], &[0.0, 1.0], &[]).unwrap();
    assert!(orthogonal.abs() < 1e-9);

    // A zero weight hides the only differing dimension
    let masked = weighted_cosine(&[1.0, 0.0], &[1.0, 5.0], &[1.0, 0.0]).unwrap();
    assert!((masked - 1.0).abs() < 1e-9);

    assert!(weighted_cosine(&[0.0, 0.0], &[1.0, 0.0], &[]).is_none());
}

#[test]
fn test_score_is_symmetric_and_bounded() {
    let scorer = TraitSimilarityScorer::default();
    let mut a = create_participant("a", "female", vec![0.6, 0.3, 0.1]);
    let mut b = create_participant("b", "male", vec![0.1, 0.2, 0.7]);
    a.gender_mix_comfort = GenderMixComfort::Depends;
    b.relationship_status = RelationshipStatus::PreferNotSay;

    let ab = scorer.score(&a, &b);
    let ba = scorer.score(&b, &a);

    assert_eq!(ab, ba);
    assert!((0.0..=1.0).contains(&ab));
}

#[test]
fn test_identical_profiles_score_highest() {
    let scorer = TraitSimilarityScorer::default();
    let a = create_participant("a", "female", vec![0.5, 0.5]);
    let twin = create_participant("b", "female", vec![0.5, 0.5]);
    let other = create_participant("c", "female", vec![1.0, 0.0]);

    let twin_score = scorer.score(&a, &twin);
    assert!((twin_score - 1.0).abs() < 1e-9);
    assert!(scorer.score(&a, &other) < twin_score);
}

#[test]
fn test_zero_vectors_are_neutral() {
    let weights = ScoringWeights {
        traits: 1.0,
        intents: 0.0,
        relationship: 0.0,
        depends_mixed_penalty: 0.0,
    };
    let scorer = TraitSimilarityScorer::new(weights, vec![]);
    let a = create_participant("a", "female", vec![0.0, 0.0]);
    let b = create_participant("b", "female", vec![1.0, 0.0]);

    assert!((scorer.score(&a, &b) - 0.5).abs() < 1e-9);
}

#[test]
fn test_depends_penalty_applies_to_mixed_pairs() {
    let scorer = TraitSimilarityScorer::default();
    let mut a = create_participant("a", "female", vec![0.5, 0.5]);
    let b = create_participant("b", "male", vec![0.5, 0.5]);

    let relaxed = scorer.score(&a, &b);
    a.gender_mix_comfort = GenderMixComfort::Depends;
    let cautious = scorer.score(&a, &b);

    assert!((relaxed - cautious - 0.10).abs() < 1e-9);
}

#[test]
fn test_same_gender_preference_blocks_mixed_pairs() {
    let mut a = create_participant("a", "female", vec![1.0]);
    let b = create_participant("b", "male", vec![1.0]);
    let c = create_participant("c", "female", vec![1.0]);
    a.gender_mix_comfort = GenderMixComfort::PreferSameGender;

    assert!(!gender_mix_allowed(&a, &b));
    assert!(gender_mix_allowed(&b, &a));
    assert!(gender_mix_allowed(&a, &c));

    let rules = EligibilityRules::default();
    assert!(!rules.is_eligible(&a, &b));
    assert!(!rules.is_eligible(&b, &a));
    assert!(rules.is_eligible(&a, &c));
}

#[test]
fn test_exclusive_intents_block_both_directions() {
    let rules = EligibilityRules::new(vec![("Dating".to_string(), "networking".to_string())]);
    let mut a = create_participant("a", "female", vec![1.0]);
    let mut b = create_participant("b", "female", vec![1.0]);
    a.intent_tags = vec!["dating".to_string()];
    b.intent_tags = vec!["networking".to_string()];

    assert!(!rules.is_eligible(&a, &b));
    assert!(!rules.is_eligible(&b, &a));

    b.intent_tags = vec!["friends".to_string()];
    assert!(rules.is_eligible(&a, &b));
}

#[test]
fn test_matrix_marks_ineligible_pairs() {
    let mut participants = vec![
        create_participant("a", "female", vec![1.0, 0.0]),
        create_participant("b", "male", vec![1.0, 0.0]),
        create_participant("c", "female", vec![0.0, 1.0]),
    ];
    participants[0].gender_mix_comfort = GenderMixComfort::PreferSameGender;

    let matrix = ScoreMatrix::build(&participants, &TraitSimilarityScorer::default(), &EligibilityRules::default());

    assert_eq!(matrix.len(), 3);
    assert!(!matrix.is_eligible(0, 1));
    assert_eq!(matrix.score(0, 1), f64::NEG_INFINITY);
    assert!(matrix.is_eligible(0, 2));
    assert_eq!(matrix.score(0, 2), matrix.score(2, 0));
    assert!(!matrix.is_eligible(1, 1));
}

#[test]
fn test_planned_capacities() {
    let policy = GroupPolicy {
        min_size: 4,
        max_size: 6,
        target_groups: None,
        swap_pass_budget: 0,
    };
    assert_eq!(planned_capacities(5, &policy), vec![5]);
    assert_eq!(planned_capacities(13, &policy), vec![5, 4, 4]);

    let targeted = GroupPolicy {
        target_groups: Some(2),
        ..policy
    };
    assert_eq!(planned_capacities(13, &targeted), vec![6, 6]);
}

#[test]
fn test_assignment_on_uniform_matrix() {
    let rows = (0..10)
        .map(|i| (0..10).map(|j| if i == j { 0.0 } else { 0.5 }).collect())
        .collect();
    let matrix = ScoreMatrix::from_rows(rows);
    let policy = GroupPolicy {
        min_size: 3,
        max_size: 4,
        target_groups: None,
        swap_pass_budget: 4,
    };

    let assignment = assign_groups(&matrix, &policy);

    assert!(validate_assignment(&matrix, &policy, &assignment).is_ok());
    let seated: usize = assignment.groups.iter().map(|g| g.len()).sum();
    assert_eq!(seated, 10);
    assert!(assignment.unmatched.is_empty());
}
