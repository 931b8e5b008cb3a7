use std::fmt;

use crate::core::filters::EligibilityRules;
use crate::core::persona::weighted_cosine;
use crate::models::{GenderMixComfort, Participant, RelationshipStatus, ScoringWeights};

/// Pluggable soft compatibility between two participants
///
/// Implementations must be symmetric, deterministic and return a value in
/// 0-1. Hard constraints are handled by [`EligibilityRules`], not here.
pub trait CompatibilityScorer: fmt::Debug + Send + Sync {
    fn score(&self, a: &Participant, b: &Participant) -> f64;
}

/// Default scorer: weighted trait similarity plus intent and relationship terms
///
/// Scoring formula:
/// score = (
///     trait_cosine * traits +          # Weighted cosine of trait vectors
///     intent_overlap * intents +       # Jaccard overlap of intent tags
///     relationship_fit * relationship  # Same relationship status
/// ) / (traits + intents + relationship)
///     - depends_mixed_penalty          # DEPENDS meeting a different gender
#[derive(Debug, Clone)]
pub struct TraitSimilarityScorer {
    weights: ScoringWeights,
    dimension_weights: Vec<f64>,
}

impl TraitSimilarityScorer {
    pub fn new(weights: ScoringWeights, dimension_weights: Vec<f64>) -> Self {
        Self {
            weights,
            dimension_weights,
        }
    }
}

impl Default for TraitSimilarityScorer {
    fn default() -> Self {
        Self::new(ScoringWeights::default(), Vec::new())
    }
}

impl CompatibilityScorer for TraitSimilarityScorer {
    fn score(&self, a: &Participant, b: &Participant) -> f64 {
        let w = &self.weights;
        let total_weight = w.traits + w.intents + w.relationship;
        if total_weight <= 0.0 {
            return 0.0;
        }

        let trait_score = weighted_cosine(&a.trait_vector, &b.trait_vector, &self.dimension_weights)
            .unwrap_or(0.5);
        let intent_score = calculate_intent_score(&a.intent_tags, &b.intent_tags);
        let relationship_score = calculate_relationship_score(a.relationship_status, b.relationship_status);

        let mut score = (trait_score * w.traits
            + intent_score * w.intents
            + relationship_score * w.relationship)
            / total_weight;

        if a.gender != b.gender
            && (a.gender_mix_comfort == GenderMixComfort::Depends
                || b.gender_mix_comfort == GenderMixComfort::Depends)
        {
            score -= w.depends_mixed_penalty;
        }

        score.clamp(0.0, 1.0)
    }
}

/// Jaccard overlap of two sorted, deduplicated tag lists (0-1)
#[inline]
fn calculate_intent_score(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.5;
    }

    let shared = a.iter().filter(|tag| b.contains(tag)).count();
    let union = a.len() + b.len() - shared;

    shared as f64 / union as f64
}

/// Relationship status alignment (0-1)
#[inline]
fn calculate_relationship_score(a: RelationshipStatus, b: RelationshipStatus) -> f64 {
    match (a, b) {
        (RelationshipStatus::PreferNotSay, _) | (_, RelationshipStatus::PreferNotSay) => 0.5,
        (x, y) if x == y => 1.0,
        _ => 0.0,
    }
}

/// Pairwise scores of one attempt
///
/// Ineligible pairs keep `f64::NEG_INFINITY` rather than being dropped, so
/// "incompatible" stays distinguishable from "merely low-scoring".
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreMatrix {
    size: usize,
    scores: Vec<f64>,
}

impl ScoreMatrix {
    /// Score every unordered pair once and mirror it
    pub fn build(
        participants: &[Participant],
        scorer: &dyn CompatibilityScorer,
        rules: &EligibilityRules,
    ) -> Self {
        let size = participants.len();
        let mut scores = vec![f64::NEG_INFINITY; size * size];

        for i in 0..size {
            for j in (i + 1)..size {
                let (a, b) = (&participants[i], &participants[j]);
                let value = if rules.is_eligible(a, b) {
                    let s = scorer.score(a, b);
                    if s.is_finite() { s.clamp(0.0, 1.0) } else { 0.0 }
                } else {
                    f64::NEG_INFINITY
                };
                scores[i * size + j] = value;
                scores[j * size + i] = value;
            }
        }

        Self { size, scores }
    }

    /// Build directly from a full row-major matrix; the diagonal is ignored
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        let size = rows.len();
        let mut scores = Vec::with_capacity(size * size);
        for (i, row) in rows.into_iter().enumerate() {
            for (j, value) in row.into_iter().take(size).enumerate() {
                scores.push(if i == j { f64::NEG_INFINITY } else { value });
            }
        }
        scores.resize(size * size, f64::NEG_INFINITY);
        Self { size, scores }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn score(&self, i: usize, j: usize) -> f64 {
        self.scores[i * self.size + j]
    }

    #[inline]
    pub fn is_eligible(&self, i: usize, j: usize) -> bool {
        i != j && self.score(i, j) > f64::NEG_INFINITY
    }
}
