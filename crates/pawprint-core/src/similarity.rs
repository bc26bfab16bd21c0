//! Weighted multi-view similarity
//!
//! The score of two fingerprints is the weighted mean of the per-view
//! cosine similarities over the views both records carry. Weights come from
//! a fixed per-species profile; views missing on either side drop out and
//! the remaining weights are renormalized.

use pawprint_fp::{FingerprintRecord, Species, View};

/// Relative importance of each view for one species
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightProfile {
    pub main: f64,
    pub face: f64,
    pub side: f64,
    pub fur: f64,
}

impl WeightProfile {
    pub fn weight(&self, view: View) -> f64 {
        match view {
            View::Main => self.main,
            View::Face => self.face,
            View::Side => self.side,
            View::Fur => self.fur,
        }
    }
}

/// Body shape is the most telling view for dogs
pub const DOG_PROFILE: WeightProfile = WeightProfile {
    main: 0.40,
    face: 0.25,
    side: 0.20,
    fur: 0.15,
};

/// Facial markings are the most telling view for cats
pub const CAT_PROFILE: WeightProfile = WeightProfile {
    main: 0.25,
    face: 0.40,
    side: 0.15,
    fur: 0.20,
};

pub fn weight_profile(species: Species) -> &'static WeightProfile {
    match species {
        Species::Dog => &DOG_PROFILE,
        Species::Cat => &CAT_PROFILE,
    }
}

/// Cosine similarity in f64.
///
/// Returns 0.0 when the lengths differ or either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Similarity of `target` to `source`.
///
/// The weight profile of `source.species` is used even when the species
/// differ; such calls are logged but still return a deterministic value.
pub fn score(source: &FingerprintRecord, target: &FingerprintRecord) -> f64 {
    if source.species != target.species {
        log::warn!(
            "Species mismatch scoring {} ({}) against {} ({}), using {} weights",
            source.subject_id,
            source.species,
            target.subject_id,
            target.species,
            source.species
        );
    }

    let profile = weight_profile(source.species);
    let mut weighted = 0.0f64;
    let mut weight_sum = 0.0f64;

    for view in View::ALL {
        let (Some(a), Some(b)) = (source.views.get(&view), target.views.get(&view)) else {
            continue;
        };

        if a.len() != b.len() {
            log::debug!(
                "View {} length mismatch: {} vs {} ({} / {})",
                view,
                a.len(),
                b.len(),
                source.subject_id,
                target.subject_id
            );
        }

        let weight = profile.weight(view);
        weighted += cosine_similarity(a, b) * weight;
        weight_sum += weight;
    }

    if weight_sum == 0.0 {
        return 0.0;
    }

    (weighted / weight_sum).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{complete_record, record_with};
    use approx::assert_relative_eq;

    const VERSION: &str = "test";

    fn pseudo_random_vector(seed: u64, len: usize) -> Vec<f32> {
        let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let mut values: Vec<f32> = (0..len)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 33) % 1000) as f32
            })
            .collect();
        let sum: f32 = values.iter().sum();
        values.iter_mut().for_each(|v| *v /= sum);
        values
    }

    fn random_record(id: &str, species: Species, seed: u64) -> pawprint_fp::FingerprintRecord {
        let views: Vec<_> = View::ALL
            .iter()
            .enumerate()
            .map(|(i, v)| (*v, pseudo_random_vector(seed * 10 + i as u64, 64)))
            .collect();
        record_with(id, species, VERSION, &views)
    }

    #[test]
    fn test_profiles_differ_by_species() {
        assert!(DOG_PROFILE.main > DOG_PROFILE.face);
        assert!(CAT_PROFILE.face > CAT_PROFILE.main);
        for profile in [&DOG_PROFILE, &CAT_PROFILE] {
            let total: f64 = View::ALL.iter().map(|v| profile.weight(*v)).sum();
            assert_relative_eq!(total, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_cosine_basics() {
        assert_relative_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_self_similarity() {
        for seed in 0..20 {
            let rec = random_record("1", Species::Cat, seed);
            assert!((score(&rec, &rec) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_symmetry_and_range() {
        for species in Species::ALL {
            for seed in 0..20 {
                let a = random_record("a", species, seed);
                let b = random_record("b", species, seed + 100);
                let ab = score(&a, &b);
                assert_eq!(ab, score(&b, &a));
                assert!((0.0..=1.0).contains(&ab));
            }
        }
    }

    #[test]
    fn test_disjoint_views_score_zero() {
        let a = record_with("a", Species::Dog, VERSION, &[(View::Main, vec![1.0, 0.0])]);
        let b = record_with("b", Species::Dog, VERSION, &[(View::Face, vec![1.0, 0.0])]);
        assert_eq!(score(&a, &b), 0.0);

        let empty = record_with("c", Species::Dog, VERSION, &[]);
        assert_eq!(score(&empty, &empty), 0.0);
    }

    #[test]
    fn test_missing_views_renormalize() {
        // Only main and face overlap: (1.0 * 0.40 + 0.0 * 0.25) / 0.65
        let a = record_with(
            "a",
            Species::Dog,
            VERSION,
            &[
                (View::Main, vec![1.0, 0.0]),
                (View::Face, vec![1.0, 0.0]),
                (View::Fur, vec![1.0, 0.0]),
            ],
        );
        let b = record_with(
            "b",
            Species::Dog,
            VERSION,
            &[(View::Main, vec![1.0, 0.0]), (View::Face, vec![0.0, 1.0])],
        );
        assert_relative_eq!(score(&a, &b), 0.40 / 0.65, epsilon = 1e-12);
    }

    #[test]
    fn test_species_weighting() {
        // Face matches, main does not: cats weigh face higher than dogs do
        let views_a = [(View::Main, vec![1.0, 0.0]), (View::Face, vec![1.0, 0.0])];
        let views_b = [(View::Main, vec![0.0, 1.0]), (View::Face, vec![1.0, 0.0])];

        let cat = score(
            &record_with("a", Species::Cat, VERSION, &views_a),
            &record_with("b", Species::Cat, VERSION, &views_b),
        );
        let dog = score(
            &record_with("a", Species::Dog, VERSION, &views_a),
            &record_with("b", Species::Dog, VERSION, &views_b),
        );
        assert_relative_eq!(cat, 0.40 / 0.65, epsilon = 1e-12);
        assert_relative_eq!(dog, 0.25 / 0.65, epsilon = 1e-12);
    }

    #[test]
    fn test_species_mismatch_uses_source_profile() {
        let views_a = [(View::Main, vec![1.0, 0.0]), (View::Face, vec![1.0, 0.0])];
        let views_b = [(View::Main, vec![0.0, 1.0]), (View::Face, vec![1.0, 0.0])];
        let dog = record_with("a", Species::Dog, VERSION, &views_a);
        let cat = record_with("b", Species::Cat, VERSION, &views_b);

        assert_relative_eq!(score(&dog, &cat), 0.25 / 0.65, epsilon = 1e-12);
        assert_relative_eq!(score(&cat, &dog), 0.40 / 0.65, epsilon = 1e-12);
        assert_eq!(score(&dog, &cat), score(&dog, &cat));
    }

    #[test]
    fn test_identical_vectors_across_views() {
        let a = complete_record("a", Species::Dog, VERSION, vec![0.5, 0.5, 0.0]);
        let b = complete_record("b", Species::Dog, VERSION, vec![0.5, 0.5, 0.0]);
        assert_relative_eq!(score(&a, &b), 1.0, epsilon = 1e-12);
    }
}
