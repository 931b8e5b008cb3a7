use crate::models::{GenderMixComfort, Participant};

/// Hard constraints between two participants
///
/// A pair failing any rule can never share a table, no matter how well
/// their profiles score.
#[derive(Debug, Clone, Default)]
pub struct EligibilityRules {
    /// Intent tag pairs that must not meet, stored lowercase
    exclusive_intents: Vec<(String, String)>,
}

impl EligibilityRules {
    pub fn new(exclusive_intents: Vec<(String, String)>) -> Self {
        Self {
            exclusive_intents: exclusive_intents
                .into_iter()
                .map(|(a, b)| (a.trim().to_lowercase(), b.trim().to_lowercase()))
                .collect(),
        }
    }

    /// Check whether two participants may share a table
    #[inline]
    pub fn is_eligible(&self, a: &Participant, b: &Participant) -> bool {
        if a.participant_id == b.participant_id {
            return false;
        }

        if !gender_mix_allowed(a, b) || !gender_mix_allowed(b, a) {
            return false;
        }

        !self.has_exclusive_intents(a, b)
    }

    fn has_exclusive_intents(&self, a: &Participant, b: &Participant) -> bool {
        self.exclusive_intents.iter().any(|(x, y)| {
            (a.intent_tags.contains(x) && b.intent_tags.contains(y))
                || (a.intent_tags.contains(y) && b.intent_tags.contains(x))
        })
    }
}

/// Whether `who` accepts `other` at the same table given gender comfort
///
/// An unknown gender never satisfies a same-gender preference.
#[inline]
pub fn gender_mix_allowed(who: &Participant, other: &Participant) -> bool {
    match who.gender_mix_comfort {
        GenderMixComfort::PreferSameGender => !who.gender.is_empty() && who.gender == other.gender,
        GenderMixComfort::TotallyFine | GenderMixComfort::Depends => true,
    }
}
