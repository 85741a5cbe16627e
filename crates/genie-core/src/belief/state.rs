use crate::belief::answer::GradedAnswer;
use crate::belief::likelihood::LikelihoodModel;
use crate::knowledge::{AttributeId, EntityId, KnowledgeBase};
use std::collections::BTreeSet;
use std::fmt;

/// Smallest value any posterior entry may take after an update. Keeps every
/// entity recoverable no matter how many answers contradicted it.
const POSTERIOR_FLOOR: f64 = 1e-300;

/// Per-game posterior over entities plus bookkeeping.
///
/// Invariants after every successful update: the vector sums to 1 within
/// floating tolerance, every entry is strictly positive, and the asked-set
/// size equals the turn counter.
#[derive(Debug, Clone)]
pub struct BeliefState {
    probs: Vec<f64>,
    asked: BTreeSet<AttributeId>,
    turns: u32,
}

impl BeliefState {
    /// Uniform belief over `entity_count` candidates.
    pub fn uniform(entity_count: usize) -> Self {
        debug_assert!(entity_count > 0);
        let p = 1.0 / entity_count as f64;
        Self {
            probs: vec![p; entity_count],
            asked: BTreeSet::new(),
            turns: 0,
        }
    }

    /// Belief seeded from a prior (already normalized by the knowledge base;
    /// renormalized here so the invariant never depends on the caller).
    pub fn from_prior(prior: &[f64]) -> Self {
        debug_assert!(!prior.is_empty());
        let mut probs: Vec<f64> = prior
            .iter()
            .map(|&p| if p > 0.0 { p } else { POSTERIOR_FLOOR })
            .collect();
        normalize(&mut probs);
        Self {
            probs,
            asked: BTreeSet::new(),
            turns: 0,
        }
    }

    pub fn entity_count(&self) -> usize {
        self.probs.len()
    }

    pub fn probability(&self, entity: EntityId) -> f64 {
        self.probs[entity.index()]
    }

    pub fn probabilities(&self) -> &[f64] {
        &self.probs
    }

    pub fn turns(&self) -> u32 {
        self.turns
    }

    pub fn asked(&self) -> &BTreeSet<AttributeId> {
        &self.asked
    }

    pub fn is_asked(&self, attribute: AttributeId) -> bool {
        self.asked.contains(&attribute)
    }

    /// Most probable entity and its posterior.
    pub fn top_entity(&self) -> (EntityId, f64) {
        let mut best = 0;
        for idx in 1..self.probs.len() {
            if self.probs[idx] > self.probs[best] {
                best = idx;
            }
        }
        (EntityId::from_index(best), self.probs[best])
    }

    /// Top `n` entities by posterior, descending; ties broken by index.
    pub fn top(&self, n: usize) -> Vec<(EntityId, f64)> {
        let mut ranked: Vec<(EntityId, f64)> = self
            .probs
            .iter()
            .enumerate()
            .map(|(idx, &p)| (EntityId::from_index(idx), p))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }

    /// Number of entities whose posterior is above `threshold`. Used to
    /// detect that the game has narrowed to a handful of candidates.
    pub fn effective_candidates(&self, threshold: f64) -> usize {
        self.probs.iter().filter(|&&p| p > threshold).count()
    }

    /// One Bayesian step: multiply by the per-entity likelihood of the
    /// answer, renormalize, record the attribute and bump the turn counter.
    ///
    /// Atomic: a rejected update leaves the state untouched.
    pub fn apply_answer(
        &mut self,
        kb: &KnowledgeBase,
        model: &LikelihoodModel,
        attribute: AttributeId,
        answer: GradedAnswer,
    ) -> Result<(), BeliefError> {
        if attribute.index() >= kb.attribute_count() {
            return Err(BeliefError::UnknownAttribute(attribute));
        }
        if self.asked.contains(&attribute) {
            return Err(BeliefError::AlreadyAsked(attribute));
        }

        let mut posterior = Vec::with_capacity(self.probs.len());
        for (idx, &prior) in self.probs.iter().enumerate() {
            let stored = kb.probability(EntityId::from_index(idx), attribute);
            let weighted = prior * model.likelihood(stored, answer);
            posterior.push(weighted.max(POSTERIOR_FLOOR));
        }
        normalize(&mut posterior);

        self.probs = posterior;
        self.asked.insert(attribute);
        self.turns += 1;
        Ok(())
    }
}

fn normalize(probs: &mut [f64]) {
    let total: f64 = probs.iter().sum();
    let total = total.max(POSTERIOR_FLOOR);
    for p in probs.iter_mut() {
        *p /= total;
    }
}

/// Rejected belief mutations. Both variants are defensive contracts: the
/// orchestration layer validates before calling, but a violation must be an
/// explicit error rather than a silent re-weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeliefError {
    AlreadyAsked(AttributeId),
    UnknownAttribute(AttributeId),
}

impl fmt::Display for BeliefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeliefError::AlreadyAsked(attribute) => {
                write!(f, "attribute {attribute} was already asked this game")
            }
            BeliefError::UnknownAttribute(attribute) => {
                write!(f, "attribute {attribute} does not exist in the knowledge base")
            }
        }
    }
}

impl std::error::Error for BeliefError {}
