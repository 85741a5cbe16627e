use genie_core::belief::{BeliefState, GradedAnswer};
use genie_core::knowledge::{AttributeId, Category, EntityId, KnowledgeBase};
use tracing::{Level, event};

/// Tunable constants for question selection.
///
/// None of these are load-bearing for correctness; they shape how quickly the
/// question flow narrows the field and how varied it feels.
#[derive(Debug, Clone, Copy)]
pub struct SelectorConfig {
    /// Number of leading candidates whose discrimination is weighted extra.
    pub top_k: usize,
    /// Weight of the top-K entropy term blended into the global entropy.
    pub top_k_beta: f64,
    /// Skip questions whose expected yes-mass falls outside these bounds
    /// while the field is still wide (such questions barely split anything).
    pub min_p_yes: f64,
    pub max_p_yes: f64,
    /// Maximum questions drawn from one category per game before the cap
    /// pass relaxes.
    pub max_per_category: u32,
    /// Answer value at or above which a category counts as resolved and is
    /// not probed again.
    pub resolve_threshold: f64,
    /// Once this few candidates hold meaningful mass, the yes-mass bounds
    /// are skipped so near-settled games still have questions to ask.
    pub narrowed_effective_n: usize,
    /// Posterior mass above which a candidate counts as effective.
    pub effective_prob: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            top_k: 20,
            top_k_beta: 0.3,
            min_p_yes: 0.03,
            max_p_yes: 0.97,
            max_per_category: 4,
            resolve_threshold: 0.7,
            narrowed_effective_n: 25,
            effective_prob: 1e-3,
        }
    }
}

impl SelectorConfig {
    pub fn from_env() -> Self {
        Self::from_reader(|key| std::env::var(key).ok())
    }

    fn from_reader<F>(mut read: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        let base = Self::default();
        let top_k = read("GENIE_TOP_K")
            .and_then(|raw| raw.parse::<usize>().ok())
            .filter(|value| *value >= 1)
            .unwrap_or(base.top_k);
        let top_k_beta = read_f64(&mut read, "GENIE_TOP_K_BETA", base.top_k_beta).clamp(0.0, 2.0);
        let min_p_yes = read_f64(&mut read, "GENIE_MIN_P_YES", base.min_p_yes).clamp(0.0, 0.49);
        let max_p_yes = read_f64(&mut read, "GENIE_MAX_P_YES", base.max_p_yes).clamp(0.51, 1.0);
        let max_per_category = read("GENIE_CATEGORY_CAP")
            .and_then(|raw| raw.parse::<u32>().ok())
            .filter(|value| *value >= 1)
            .unwrap_or(base.max_per_category);
        let resolve_threshold =
            read_f64(&mut read, "GENIE_RESOLVE_THRESHOLD", base.resolve_threshold).clamp(0.5, 1.0);
        let narrowed_effective_n = read("GENIE_NARROWED_N")
            .and_then(|raw| raw.parse::<usize>().ok())
            .unwrap_or(base.narrowed_effective_n);

        Self {
            top_k,
            top_k_beta,
            min_p_yes,
            max_p_yes,
            max_per_category,
            resolve_threshold,
            narrowed_effective_n,
            effective_prob: base.effective_prob,
        }
    }
}

fn read_f64<F>(read: &mut F, key: &str, fallback: f64) -> f64
where
    F: FnMut(&str) -> Option<String>,
{
    read(key)
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(fallback)
}

/// Per-game bookkeeping for the category rules: resolved categories are
/// never probed again, probing within one category is capped, and the same
/// category is not asked twice in a row while alternatives exist.
#[derive(Debug, Clone, Default)]
pub struct QuestionState {
    resolved: [bool; Category::COUNT],
    asked_per_category: [u32; Category::COUNT],
    last_category: Option<Category>,
}

impl QuestionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an answered question. A confident yes resolves the category.
    pub fn note_answer(
        &mut self,
        category: Option<Category>,
        answer: GradedAnswer,
        resolve_threshold: f64,
    ) {
        self.last_category = category;
        if let Some(category) = category {
            self.asked_per_category[category.index()] += 1;
            if answer.value() >= resolve_threshold {
                self.resolved[category.index()] = true;
            }
        }
    }

    pub fn is_resolved(&self, category: Category) -> bool {
        self.resolved[category.index()]
    }

    pub fn asked_in(&self, category: Category) -> u32 {
        self.asked_per_category[category.index()]
    }

    pub fn last_category(&self) -> Option<Category> {
        self.last_category
    }
}

/// Soft constraints applied when ranking candidate questions. Passes relax
/// these one notch at a time; the asked-set exclusion is never relaxed.
#[derive(Debug, Clone, Copy)]
struct MaskPolicy {
    skip_unknown_values: bool,
    p_yes_bounds: Option<(f64, f64)>,
    respect_resolved: bool,
    respect_cap: bool,
    avoid_last_category: bool,
}

/// Picks the unasked attribute expected to most reduce uncertainty about the
/// current front-runners.
#[derive(Debug, Clone, Copy)]
pub struct QuestionSelector {
    config: SelectorConfig,
}

impl QuestionSelector {
    pub const fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> SelectorConfig {
        self.config
    }

    /// Returns the best question, or `None` exactly when every attribute has
    /// already been asked. Deterministic: equal scores resolve to the lowest
    /// attribute index.
    pub fn select(
        &self,
        kb: &KnowledgeBase,
        belief: &BeliefState,
        state: &QuestionState,
    ) -> Option<AttributeId> {
        let attribute_count = kb.attribute_count();
        if belief.asked().len() >= attribute_count {
            return None;
        }

        let p_yes = expected_yes_mass(kb, belief.probabilities());
        let p_yes_top = self.top_k_yes_mass(kb, belief);
        let scores: Vec<f64> = (0..attribute_count)
            .map(|j| split_entropy(p_yes[j]) + self.config.top_k_beta * split_entropy(p_yes_top[j]))
            .collect();

        let narrowed = belief.effective_candidates(self.config.effective_prob)
            <= self.config.narrowed_effective_n;
        let pass1_bounds = if narrowed {
            None
        } else {
            Some((self.config.min_p_yes, self.config.max_p_yes))
        };

        let passes = [
            // Full constraints; the yes-mass bounds are skipped once the
            // field has narrowed (late-game questions are often near 0/1).
            MaskPolicy {
                skip_unknown_values: true,
                p_yes_bounds: pass1_bounds,
                respect_resolved: true,
                respect_cap: true,
                avoid_last_category: true,
            },
            // Wider yes-mass bounds.
            MaskPolicy {
                skip_unknown_values: true,
                p_yes_bounds: Some((0.01, 0.99)),
                respect_resolved: true,
                respect_cap: true,
                avoid_last_category: true,
            },
            // Drop the cap and the bounds.
            MaskPolicy {
                skip_unknown_values: true,
                p_yes_bounds: None,
                respect_resolved: true,
                respect_cap: false,
                avoid_last_category: true,
            },
            // Allow same-category repeats.
            MaskPolicy {
                skip_unknown_values: true,
                p_yes_bounds: None,
                respect_resolved: true,
                respect_cap: false,
                avoid_last_category: false,
            },
            // Last resort: every unasked attribute is eligible, so the
            // selector only reports exhaustion when the asked set covers the
            // whole attribute table.
            MaskPolicy {
                skip_unknown_values: false,
                p_yes_bounds: None,
                respect_resolved: false,
                respect_cap: false,
                avoid_last_category: false,
            },
        ];

        for (pass_index, mask) in passes.iter().enumerate() {
            if let Some(choice) = self.best_under(kb, belief, state, &scores, &p_yes, mask) {
                log_selection(belief, choice, scores[choice.index()], pass_index);
                return Some(choice);
            }
        }
        None
    }

    fn best_under(
        &self,
        kb: &KnowledgeBase,
        belief: &BeliefState,
        state: &QuestionState,
        scores: &[f64],
        p_yes: &[f64],
        mask: &MaskPolicy,
    ) -> Option<AttributeId> {
        let mut best: Option<(AttributeId, f64)> = None;
        for index in 0..kb.attribute_count() {
            let id = AttributeId::from_index(index);
            if belief.is_asked(id) {
                continue;
            }
            let attribute = kb.attribute(id);
            if mask.skip_unknown_values && attribute.is_unknown_value() {
                continue;
            }
            if let Some((min, max)) = mask.p_yes_bounds {
                if p_yes[index] < min || p_yes[index] > max {
                    continue;
                }
            }
            if let Some(category) = attribute.category() {
                if mask.respect_resolved && state.is_resolved(category) {
                    continue;
                }
                if mask.respect_cap && state.asked_in(category) >= self.config.max_per_category {
                    continue;
                }
                if mask.avoid_last_category && state.last_category() == Some(category) {
                    continue;
                }
            }
            if best.is_none_or(|(_, top)| scores[index] > top) {
                best = Some((id, scores[index]));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Expected yes-mass per attribute restricted to the top-K candidates,
    /// renormalized within that subset.
    fn top_k_yes_mass(&self, kb: &KnowledgeBase, belief: &BeliefState) -> Vec<f64> {
        let top = belief.top(self.config.top_k.min(belief.entity_count()));
        let top_sum: f64 = top.iter().map(|(_, p)| p).sum();
        let top_sum = top_sum.max(1e-12);

        let mut masses = vec![0.0; kb.attribute_count()];
        for &(entity, posterior) in &top {
            let row = kb.matrix().row(entity);
            let weight = posterior / top_sum;
            for (mass, stored) in masses.iter_mut().zip(row) {
                *mass += weight * stored.modeled();
            }
        }
        masses
    }
}

impl Default for QuestionSelector {
    fn default() -> Self {
        Self::new(SelectorConfig::default())
    }
}

/// Expected posterior mass answering yes, per attribute, over all entities.
fn expected_yes_mass(kb: &KnowledgeBase, posterior: &[f64]) -> Vec<f64> {
    let mut masses = vec![0.0; kb.attribute_count()];
    for (index, &weight) in posterior.iter().enumerate() {
        let row = kb.matrix().row(EntityId::from_index(index));
        for (mass, stored) in masses.iter_mut().zip(row) {
            *mass += weight * stored.modeled();
        }
    }
    masses
}

/// Binary split entropy in bits, clamped away from the 0/1 boundary.
fn split_entropy(p: f64) -> f64 {
    let p = p.clamp(1e-7, 1.0 - 1e-7);
    -(p * p.log2()) - ((1.0 - p) * (1.0 - p).log2())
}

fn log_selection(belief: &BeliefState, choice: AttributeId, score: f64, pass_index: usize) {
    if !tracing::enabled!(Level::INFO) {
        return;
    }

    event!(
        target: "genie_bot::select",
        Level::INFO,
        turn = belief.turns(),
        attribute = %choice,
        score,
        pass = pass_index,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use genie_core::belief::LikelihoodModel;
    use genie_core::knowledge::{AttributeRecord, EntityRecord, KnowledgeSnapshot};

    fn kb_from(
        popularities: Vec<f64>,
        attributes: Vec<AttributeRecord>,
        matrix: Vec<Vec<Option<f64>>>,
    ) -> KnowledgeBase {
        KnowledgeBase::from_snapshot(KnowledgeSnapshot {
            entities: popularities
                .into_iter()
                .enumerate()
                .map(|(idx, popularity)| EntityRecord {
                    name: format!("Person {idx}"),
                    popularity,
                })
                .collect(),
            attributes,
            matrix,
        })
        .expect("valid snapshot")
    }

    fn plain_attr(idx: usize) -> AttributeRecord {
        AttributeRecord {
            text: format!("Question {idx}?"),
            category: None,
            value: None,
        }
    }

    fn categorical_attr(category: &str, value: &str) -> AttributeRecord {
        AttributeRecord {
            text: format!("Is {category} {value}?"),
            category: Some(category.to_string()),
            value: Some(value.to_string()),
        }
    }

    #[test]
    fn never_repeats_and_signals_exhaustion() {
        let kb = kb_from(
            vec![0.0; 3],
            (0..4).map(plain_attr).collect(),
            vec![
                vec![Some(1.0), Some(0.0), Some(1.0), Some(0.5)],
                vec![Some(0.0), Some(1.0), Some(1.0), Some(0.5)],
                vec![Some(1.0), Some(1.0), Some(0.0), None],
            ],
        );
        let selector = QuestionSelector::default();
        let model = LikelihoodModel::default();
        let mut belief = BeliefState::uniform(3);
        let mut state = QuestionState::new();

        let mut chosen = Vec::new();
        while let Some(attribute) = selector.select(&kb, &belief, &state) {
            assert!(!chosen.contains(&attribute), "{attribute} repeated");
            chosen.push(attribute);
            belief
                .apply_answer(&kb, &model, attribute, GradedAnswer::Yes)
                .expect("accepted");
            state.note_answer(
                kb.attribute(attribute).category(),
                GradedAnswer::Yes,
                selector.config().resolve_threshold,
            );
        }

        assert_eq!(chosen.len(), kb.attribute_count());
        assert_eq!(selector.select(&kb, &belief, &state), None);
    }

    #[test]
    fn selection_is_deterministic() {
        let kb = kb_from(
            vec![3.0, 2.0, 1.0],
            (0..5).map(plain_attr).collect(),
            vec![
                vec![Some(1.0), Some(0.0), Some(0.3), Some(0.5), None],
                vec![Some(0.0), Some(1.0), Some(0.7), Some(0.5), Some(1.0)],
                vec![Some(1.0), Some(1.0), Some(0.5), None, Some(0.0)],
            ],
        );
        let selector = QuestionSelector::default();
        let belief = BeliefState::from_prior(kb.prior());
        let state = QuestionState::new();

        let first = selector.select(&kb, &belief, &state);
        for _ in 0..10 {
            assert_eq!(selector.select(&kb, &belief, &state), first);
        }
    }

    #[test]
    fn equal_scores_resolve_to_lowest_index() {
        // Two identical columns: identical scores, the lower index must win.
        let kb = kb_from(
            vec![0.0; 2],
            (0..2).map(plain_attr).collect(),
            vec![vec![Some(1.0), Some(1.0)], vec![Some(0.0), Some(0.0)]],
        );
        let selector = QuestionSelector::default();
        let belief = BeliefState::uniform(2);
        let state = QuestionState::new();
        assert_eq!(
            selector.select(&kb, &belief, &state),
            Some(AttributeId(0))
        );
    }

    #[test]
    fn prefers_question_that_splits_the_leaders() {
        // Attribute 0 splits only the tail pair; attribute 1 splits the two
        // front-runners. Both have a perfectly balanced global yes-mass, so
        // only the top-K term separates them.
        let config = SelectorConfig {
            top_k: 2,
            ..SelectorConfig::default()
        };
        let kb = kb_from(
            vec![0.0; 4],
            (0..2).map(plain_attr).collect(),
            vec![
                vec![Some(1.0), Some(1.0)],
                vec![Some(1.0), Some(0.0)],
                vec![Some(0.0), Some(1.0)],
                vec![Some(0.0), Some(0.0)],
            ],
        );
        let selector = QuestionSelector::new(config);
        let belief = BeliefState::uniform(4);
        let state = QuestionState::new();
        assert_eq!(
            selector.select(&kb, &belief, &state),
            Some(AttributeId(1))
        );
    }

    #[test]
    fn resolved_category_is_not_probed_again() {
        let kb = kb_from(
            vec![0.0; 2],
            vec![
                categorical_attr("gender", "male"),
                categorical_attr("gender", "female"),
                plain_attr(2),
            ],
            vec![
                vec![Some(1.0), Some(0.0), Some(1.0)],
                vec![Some(0.0), Some(1.0), Some(0.0)],
            ],
        );
        let selector = QuestionSelector::default();
        let belief = BeliefState::uniform(2);
        let mut state = QuestionState::new();
        state.note_answer(
            Some(Category::Gender),
            GradedAnswer::Yes,
            selector.config().resolve_threshold,
        );
        assert!(state.is_resolved(Category::Gender));

        assert_eq!(
            selector.select(&kb, &belief, &state),
            Some(AttributeId(2))
        );
    }

    #[test]
    fn same_category_is_not_asked_twice_in_a_row() {
        let kb = kb_from(
            vec![0.0; 2],
            vec![
                categorical_attr("country", "France"),
                categorical_attr("country", "Japan"),
                plain_attr(2),
            ],
            vec![
                vec![Some(1.0), Some(0.0), Some(1.0)],
                vec![Some(0.0), Some(1.0), Some(0.0)],
            ],
        );
        let selector = QuestionSelector::default();
        let belief = BeliefState::uniform(2);
        let mut state = QuestionState::new();
        // A country question was just answered No: not resolved, but the
        // next pick should rotate away from the category.
        state.note_answer(
            Some(Category::Country),
            GradedAnswer::No,
            selector.config().resolve_threshold,
        );

        assert_eq!(
            selector.select(&kb, &belief, &state),
            Some(AttributeId(2))
        );
    }

    #[test]
    fn unknown_value_questions_are_last_resort() {
        let kb = kb_from(
            vec![0.0; 2],
            vec![
                categorical_attr("gender", "Unknown"),
                plain_attr(1),
            ],
            vec![vec![Some(1.0), Some(1.0)], vec![Some(0.0), Some(0.0)]],
        );
        let selector = QuestionSelector::default();
        let model = LikelihoodModel::default();
        let mut belief = BeliefState::uniform(2);
        let state = QuestionState::new();

        assert_eq!(
            selector.select(&kb, &belief, &state),
            Some(AttributeId(1))
        );

        belief
            .apply_answer(&kb, &model, AttributeId(1), GradedAnswer::Yes)
            .expect("accepted");
        // Only the placeholder question is left; the final pass surfaces it
        // rather than reporting exhaustion early.
        assert_eq!(
            selector.select(&kb, &belief, &state),
            Some(AttributeId(0))
        );
    }

    #[test]
    fn resolved_category_still_surfaces_before_exhaustion() {
        let kb = kb_from(
            vec![0.0; 2],
            vec![categorical_attr("occupation", "actor")],
            vec![vec![Some(1.0)], vec![Some(0.0)]],
        );
        let selector = QuestionSelector::default();
        let belief = BeliefState::uniform(2);
        let mut state = QuestionState::new();
        state.note_answer(
            Some(Category::Occupation),
            GradedAnswer::Yes,
            selector.config().resolve_threshold,
        );

        // The only unasked attribute sits in a resolved category; it must
        // still be offered rather than returning None with questions left.
        assert_eq!(
            selector.select(&kb, &belief, &state),
            Some(AttributeId(0))
        );
    }

    #[test]
    fn config_from_reader_parses_and_clamps() {
        let config = SelectorConfig::from_reader(|key| match key {
            "GENIE_TOP_K" => Some("50".to_string()),
            "GENIE_TOP_K_BETA" => Some("9.5".to_string()),
            "GENIE_MIN_P_YES" => Some("not-a-number".to_string()),
            _ => None,
        });
        assert_eq!(config.top_k, 50);
        assert_eq!(config.top_k_beta, 2.0);
        assert_eq!(config.min_p_yes, SelectorConfig::default().min_p_yes);
    }

    #[test]
    fn split_entropy_is_safe_at_boundaries() {
        assert!(split_entropy(0.0).is_finite());
        assert!(split_entropy(1.0).is_finite());
        assert!((split_entropy(0.5) - 1.0).abs() < 1e-9);
        assert!(split_entropy(0.5) > split_entropy(0.9));
    }
}
