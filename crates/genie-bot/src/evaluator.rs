use genie_core::belief::BeliefState;
use genie_core::knowledge::{EntityId, KnowledgeBase};

/// Stop-condition tunables.
#[derive(Debug, Clone, Copy)]
pub struct EvaluatorConfig {
    /// Top posterior probability at which the engine proposes a guess.
    pub guess_threshold: f64,
    /// Hard cap on turns; past this the engine guesses with what it has.
    pub max_turns: u32,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            guess_threshold: 0.85,
            max_turns: 40,
        }
    }
}

impl EvaluatorConfig {
    pub fn from_env() -> Self {
        Self::from_reader(|key| std::env::var(key).ok())
    }

    fn from_reader<F>(mut read: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        let base = Self::default();
        let guess_threshold = read("GENIE_GUESS_THRESHOLD")
            .and_then(|raw| raw.parse::<f64>().ok())
            .filter(|value| value.is_finite())
            .map(|value| value.clamp(0.5, 0.999))
            .unwrap_or(base.guess_threshold);
        let max_turns = read("GENIE_MAX_TURNS")
            .and_then(|raw| raw.parse::<u32>().ok())
            .filter(|value| *value >= 1)
            .unwrap_or(base.max_turns);

        Self {
            guess_threshold,
            max_turns,
        }
    }
}

/// A proposed identification.
#[derive(Debug, Clone, PartialEq)]
pub struct Guess {
    pub entity: EntityId,
    pub name: String,
    pub confidence: f64,
}

/// Pure reads over a belief state: ranks candidates and decides when the
/// game should stop asking. No side effects.
#[derive(Debug, Clone, Copy)]
pub struct GuessEvaluator {
    config: EvaluatorConfig,
}

impl GuessEvaluator {
    pub const fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> EvaluatorConfig {
        self.config
    }

    pub fn top_candidate(&self, kb: &KnowledgeBase, belief: &BeliefState) -> Guess {
        let (entity, confidence) = belief.top_entity();
        Guess {
            entity,
            name: kb.entity_name(entity).to_string(),
            confidence,
        }
    }

    /// Best `n` candidates, most probable first.
    pub fn ranked(&self, kb: &KnowledgeBase, belief: &BeliefState, n: usize) -> Vec<Guess> {
        belief
            .top(n)
            .into_iter()
            .map(|(entity, confidence)| Guess {
                entity,
                name: kb.entity_name(entity).to_string(),
                confidence,
            })
            .collect()
    }

    pub fn is_confident(&self, belief: &BeliefState) -> bool {
        belief.top_entity().1 >= self.config.guess_threshold
    }

    /// True when the game should stop asking: confident, out of questions,
    /// or out of turns.
    pub fn should_guess(&self, belief: &BeliefState, questions_remaining: bool) -> bool {
        self.is_confident(belief)
            || !questions_remaining
            || belief.turns() >= self.config.max_turns
    }
}

impl Default for GuessEvaluator {
    fn default() -> Self {
        Self::new(EvaluatorConfig::default())
    }
}
