// Core algorithm exports
pub mod assigner;
pub mod filters;
pub mod matcher;
pub mod persona;
pub mod resolver;
pub mod scoring;

pub use assigner::{assign_groups, group_score, planned_capacities, validate_assignment, Assignment};
pub use filters::{gender_mix_allowed, EligibilityRules};
pub use matcher::{validate_policy, Matcher, DEFAULT_TRAIT_DIMENSIONS};
pub use persona::{derive_trait_vector, normalize_trait_vector, weighted_cosine};
pub use resolver::resolve_participants;
pub use scoring::{CompatibilityScorer, ScoreMatrix, TraitSimilarityScorer};
