use crate::models::PersonaAnswer;

/// Derive a trait vector from persona questionnaire answers
///
/// Every answer contributes its per-trait weights; contributions are summed,
/// negative or non-finite components are clamped to zero and the result is
/// L1-normalized so that profiles with many answers do not dominate.
///
/// # Arguments
/// * `answers` - Answers already mapped to trait weights
/// * `dimensions` - Fixed length of the resulting vector
pub fn derive_trait_vector(answers: &[PersonaAnswer], dimensions: usize) -> Vec<f64> {
    let mut vector = vec![0.0; dimensions];

    for answer in answers {
        for (slot, weight) in vector.iter_mut().zip(answer.trait_weights.iter()) {
            if weight.is_finite() {
                *slot += weight;
            }
        }
    }

    normalize_trait_vector(&vector, dimensions)
}

/// Fit a vector to `dimensions` entries and L1-normalize it
///
/// Missing entries are padded with zero, extra entries are dropped.
/// A vector with no positive mass comes back as all zeros.
pub fn normalize_trait_vector(raw: &[f64], dimensions: usize) -> Vec<f64> {
    let mut vector: Vec<f64> = raw
        .iter()
        .take(dimensions)
        .map(|v| if v.is_finite() && *v > 0.0 { *v } else { 0.0 })
        .collect();
    vector.resize(dimensions, 0.0);

    let mass: f64 = vector.iter().sum();
    if mass > 0.0 {
        for v in vector.iter_mut() {
            *v /= mass;
        }
    }

    vector
}

/// Weighted cosine similarity of two non-negative vectors (0-1)
///
/// `weights` shorter than the vectors leaves the remaining dimensions at 1.0.
/// Returns `None` if either vector has zero weighted norm.
#[inline]
pub fn weighted_cosine(a: &[f64], b: &[f64], weights: &[f64]) -> Option<f64> {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;

    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let w = weights.get(i).copied().unwrap_or(1.0).max(0.0);
        dot += w * x * y;
        norm_a += w * x * x;
        norm_b += w * y * y;
    }

    if norm_a <= 0.0 || norm_b <= 0.0 {
        return None;
    }

    Some((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(weights: &[f64]) -> PersonaAnswer {
        PersonaAnswer {
            question_id: "q".to_string(),
            trait_weights: weights.to_vec(),
        }
    }

    #[test]
    fn test_derive_sums_and_normalizes() {
        let answers = vec![answer(&[1.0, 0.0, 1.0]), answer(&[1.0, 2.0, 0.0])];
        let vector = derive_trait_vector(&answers, 3);

        assert_eq!(vector, vec![0.4, 0.4, 0.2]);
    }

    #[test]
    fn test_derive_without_answers_is_zero() {
        assert_eq!(derive_trait_vector(&[], 4), vec![0.0; 4]);
    }

    #[test]
    fn test_derive_ignores_extra_and_bad_weights() {
        let answers = vec![answer(&[f64::NAN, 1.0, 1.0, 5.0]), answer(&[-3.0])];
        let vector = derive_trait_vector(&answers, 3);

        // -3.0 sums into slot 0 and is clamped, 5.0 falls outside the dimensions
        assert_eq!(vector, vec![0.0, 0.5, 0.5]);
    }

    #[test]
    fn test_normalize_pads_short_vectors() {
        let vector = normalize_trait_vector(&[2.0], 3);
        assert_eq!(vector, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_weighted_cosine() {
        let same = weighted_cosine(&[0.5, 0.5], &[0.5, 0.5], &[]).unwrap();
        assert!((same - 1.0).abs() < 1e-9);

        let orthogonal = weighted_cosine(&[1.0, 0.0], &[0.0, 1.0], &[]).unwrap();
        assert_eq!(orthogonal, 0.0);

        // Zeroing the only shared dimension's weight removes the overlap
        let masked = weighted_cosine(&[1.0, 1.0], &[1.0, 0.0], &[1.0, 0.0]).unwrap();
        assert!((masked - 1.0).abs() < 1e-9);

        assert!(weighted_cosine(&[0.0, 0.0], &[1.0, 0.0], &[]).is_none());
    }
}
