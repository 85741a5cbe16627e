use crate::belief::answer::GradedAnswer;
use crate::knowledge::AttributeProb;
use std::env;

/// Tunable configuration for the noisy-answer likelihood.
#[derive(Debug, Clone, Copy)]
pub struct LikelihoodConfig {
    /// Floor applied to every emitted likelihood. Keeps a single wrong or
    /// sarcastic answer from driving any posterior to exactly zero.
    pub mistake_floor: f64,
}

impl Default for LikelihoodConfig {
    fn default() -> Self {
        Self { mistake_floor: 0.08 }
    }
}

impl LikelihoodConfig {
    pub fn from_env() -> Self {
        let base = Self::default();
        let floor = parse_env_f64("GENIE_MISTAKE_FLOOR", base.mistake_floor).clamp(0.01, 0.5);
        Self {
            mistake_floor: floor,
        }
    }
}

fn parse_env_f64(key: &str, fallback: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(fallback)
}

/// Pure mapping from (stored attribute probability, graded answer) to a
/// per-entity likelihood in `[mistake_floor, 1]`.
#[derive(Debug, Clone, Copy)]
pub struct LikelihoodModel {
    config: LikelihoodConfig,
}

impl LikelihoodModel {
    pub const fn new(config: LikelihoodConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> LikelihoodConfig {
        self.config
    }

    /// `match = a*p + (1-a)*(1-p)`: 1 on full agreement, 0 on full
    /// disagreement, 0.5 for a "don't know" answer regardless of `p`.
    /// Unknown matrix cells model as p = 0.5 and contribute no information.
    pub fn likelihood(&self, stored: AttributeProb, answer: GradedAnswer) -> f64 {
        let p = stored.modeled();
        let a = answer.value();
        let matched = a * p + (1.0 - a) * (1.0 - p);
        self.config.mistake_floor + (1.0 - self.config.mistake_floor) * matched
    }
}

impl Default for LikelihoodModel {
    fn default() -> Self {
        Self::new(LikelihoodConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agreement_yields_maximum() {
        let model = LikelihoodModel::default();
        assert_eq!(
            model.likelihood(AttributeProb::Known(1.0), GradedAnswer::Yes),
            1.0
        );
        assert_eq!(
            model.likelihood(AttributeProb::Known(0.0), GradedAnswer::No),
            1.0
        );
    }

    #[test]
    fn disagreement_is_floored_not_zero() {
        let model = LikelihoodModel::default();
        let value = model.likelihood(AttributeProb::Known(1.0), GradedAnswer::No);
        assert_eq!(value, model.config().mistake_floor);
        assert!(value > 0.0);
    }

    #[test]
    fn dont_know_is_constant_for_any_probability() {
        let model = LikelihoodModel::default();
        let at_zero = model.likelihood(AttributeProb::Known(0.0), GradedAnswer::DontKnow);
        let at_half = model.likelihood(AttributeProb::Known(0.5), GradedAnswer::DontKnow);
        let at_one = model.likelihood(AttributeProb::Known(1.0), GradedAnswer::DontKnow);
        assert!((at_zero - at_half).abs() < 1e-12);
        assert!((at_half - at_one).abs() < 1e-12);
    }

    #[test]
    fn unknown_cell_is_uninformative_for_every_answer() {
        let model = LikelihoodModel::default();
        for answer in GradedAnswer::ALL {
            let unknown = model.likelihood(AttributeProb::Unknown, answer);
            let half = model.likelihood(AttributeProb::Known(0.5), answer);
            assert!((unknown - half).abs() < 1e-12);
        }
    }

    #[test]
    fn graded_answers_interpolate() {
        let model = LikelihoodModel::default();
        let yes = model.likelihood(AttributeProb::Known(1.0), GradedAnswer::Yes);
        let probably = model.likelihood(AttributeProb::Known(1.0), GradedAnswer::Probably);
        let dont_know = model.likelihood(AttributeProb::Known(1.0), GradedAnswer::DontKnow);
        let probably_not = model.likelihood(AttributeProb::Known(1.0), GradedAnswer::ProbablyNot);
        let no = model.likelihood(AttributeProb::Known(1.0), GradedAnswer::No);
        assert!(yes > probably && probably > dont_know);
        assert!(dont_know > probably_not && probably_not > no);
    }

    #[test]
    fn bounds_hold_across_the_grid() {
        let model = LikelihoodModel::default();
        let floor = model.config().mistake_floor;
        for p in [0.0, 0.1, 0.25, 0.5, 0.75, 0.9, 1.0] {
            for answer in GradedAnswer::ALL {
                let value = model.likelihood(AttributeProb::Known(p), answer);
                assert!(value >= floor && value <= 1.0, "p={p} answer={answer}");
            }
        }
    }
}
