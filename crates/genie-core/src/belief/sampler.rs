use crate::knowledge::EntityId;
use rand::Rng;

/// Draws an entity index proportionally to `weights` (a prior or posterior).
/// Returns `None` when no weight is positive and finite.
pub fn sample_entity<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Option<EntityId> {
    let mut total = 0.0_f64;
    for &weight in weights {
        if weight.is_finite() && weight > 0.0 {
            total += weight;
        }
    }
    if total <= 0.0 {
        return None;
    }

    let mut draw = rng.gen_range(0.0..total);
    let mut last_positive = None;
    for (idx, &weight) in weights.iter().enumerate() {
        if !weight.is_finite() || weight <= 0.0 {
            continue;
        }
        last_positive = Some(idx);
        if draw < weight {
            return Some(EntityId::from_index(idx));
        }
        draw -= weight;
    }

    // Float accumulation can leave a sliver past the final bucket.
    last_positive.map(EntityId::from_index)
}

#[cfg(test)]
mod tests {
    use super::sample_entity;
    use crate::knowledge::EntityId;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn zero_weights_yield_none() {
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(sample_entity(&[0.0, 0.0], &mut rng), None);
        assert_eq!(sample_entity(&[], &mut rng), None);
    }

    #[test]
    fn certain_weight_always_selected() {
        let mut rng = SmallRng::seed_from_u64(2);
        for _ in 0..64 {
            assert_eq!(
                sample_entity(&[0.0, 1.0, 0.0], &mut rng),
                Some(EntityId(1))
            );
        }
    }

    #[test]
    fn draws_follow_weights_roughly() {
        let mut rng = SmallRng::seed_from_u64(3);
        let weights = [0.1, 0.9];
        let mut heavy = 0usize;
        let draws = 2000;
        for _ in 0..draws {
            if sample_entity(&weights, &mut rng) == Some(EntityId(1)) {
                heavy += 1;
            }
        }
        let ratio = heavy as f64 / draws as f64;
        assert!((0.85..0.95).contains(&ratio), "ratio was {ratio}");
    }

    #[test]
    fn non_finite_weights_are_skipped() {
        let mut rng = SmallRng::seed_from_u64(4);
        for _ in 0..32 {
            let picked = sample_entity(&[f64::NAN, 1.0, f64::INFINITY], &mut rng);
            assert_eq!(picked, Some(EntityId(1)));
        }
    }
}
