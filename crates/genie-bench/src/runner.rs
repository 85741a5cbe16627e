use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{Level, event};

use genie_bot::{
    EvaluatorConfig, GuessEvaluator, QuestionSelector, QuestionState, SelectorConfig,
};
use genie_core::belief::{
    BeliefState, GradedAnswer, LikelihoodModel, sample_entity,
};
use genie_core::knowledge::{AttributeProb, EntityId, KnowledgeBase};

use crate::analytics::{AnalyticsCollector, BenchReport};
use crate::config::{AnswererConfig, BenchConfig, ResolvedOutputs};

/// Why a simulated game stopped asking.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameOutcome {
    Confident,
    TurnLimit,
    OutOfQuestions,
}

/// One simulated game, as written to the JSONL output.
#[derive(Debug, Clone, Serialize)]
pub struct GameRow {
    pub game: usize,
    pub hidden: EntityId,
    pub hidden_name: String,
    pub guessed: EntityId,
    pub guessed_name: String,
    pub correct: bool,
    pub turns: u32,
    pub confidence: f64,
    pub outcome: GameOutcome,
}

/// Result handed back to the CLI after a run.
#[derive(Debug)]
pub struct BenchSummary {
    pub report: BenchReport,
    pub jsonl_path: PathBuf,
    pub summary_path: PathBuf,
}

/// Drives self-play: a hidden entity is drawn from the prior each game and a
/// simulated player answers from that entity's matrix row under the
/// configured noise model.
pub struct SimulationRunner {
    config: BenchConfig,
    outputs: ResolvedOutputs,
    kb: KnowledgeBase,
    selector: QuestionSelector,
    evaluator: GuessEvaluator,
    likelihood: LikelihoodModel,
}

impl SimulationRunner {
    pub fn new(config: BenchConfig, outputs: ResolvedOutputs) -> Result<Self> {
        let kb = KnowledgeBase::load(&config.snapshot)
            .with_context(|| format!("loading knowledge snapshot {}", config.snapshot))?;

        let selector_config = SelectorConfig {
            top_k: config.engine.top_k.unwrap_or(SelectorConfig::default().top_k),
            ..SelectorConfig::default()
        };
        let evaluator_config = EvaluatorConfig {
            guess_threshold: config
                .engine
                .guess_threshold
                .unwrap_or(EvaluatorConfig::default().guess_threshold),
            max_turns: config
                .engine
                .max_turns
                .unwrap_or(EvaluatorConfig::default().max_turns),
        };

        Ok(Self {
            config,
            outputs,
            kb,
            selector: QuestionSelector::new(selector_config),
            evaluator: GuessEvaluator::new(evaluator_config),
            likelihood: LikelihoodModel::default(),
        })
    }

    pub fn run(&self) -> Result<BenchSummary> {
        if let Some(parent) = self.outputs.jsonl.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("creating output directory {}", parent.display())
            })?;
        }
        let file = File::create(&self.outputs.jsonl)
            .with_context(|| format!("creating {}", self.outputs.jsonl.display()))?;
        let mut writer = BufWriter::new(file);

        let base_seed = self.config.games.seed.unwrap_or_else(rand::random);
        let mut collector = AnalyticsCollector::new();

        for game in 0..self.config.games.count {
            let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(game as u64));
            let row = self.play_one(game, &mut rng);
            serde_json::to_writer(&mut writer, &row).context("serializing game row")?;
            writer.write_all(b"\n").context("writing game row")?;
            collector.record(&row);
        }
        writer.flush().context("flushing game rows")?;

        let report = collector.finalize().context("aggregating results")?;
        report
            .write_markdown(&self.config, &self.outputs.summary_md)
            .context("writing summary")?;

        Ok(BenchSummary {
            report,
            jsonl_path: self.outputs.jsonl.clone(),
            summary_path: self.outputs.summary_md.clone(),
        })
    }

    fn play_one(&self, game: usize, rng: &mut StdRng) -> GameRow {
        let hidden = sample_entity(self.kb.prior(), rng)
            .expect("prior always carries positive mass");
        let mut belief = BeliefState::from_prior(self.kb.prior());
        let mut questions = QuestionState::new();

        let outcome = loop {
            let Some(attribute) = self.selector.select(&self.kb, &belief, &questions) else {
                break GameOutcome::OutOfQuestions;
            };

            let answer = simulate_answer(
                self.kb.probability(hidden, attribute),
                &self.config.answerer,
                rng,
            );
            belief
                .apply_answer(&self.kb, &self.likelihood, attribute, answer)
                .expect("selector never repeats an attribute");
            questions.note_answer(
                self.kb.attribute(attribute).category(),
                answer,
                self.selector.config().resolve_threshold,
            );

            if self.evaluator.is_confident(&belief) {
                break GameOutcome::Confident;
            }
            if belief.turns() >= self.evaluator.config().max_turns {
                break GameOutcome::TurnLimit;
            }
        };

        let guess = self.evaluator.top_candidate(&self.kb, &belief);
        let row = GameRow {
            game,
            hidden,
            hidden_name: self.kb.entity_name(hidden).to_string(),
            guessed: guess.entity,
            guessed_name: guess.name,
            correct: guess.entity == hidden,
            turns: belief.turns(),
            confidence: guess.confidence,
            outcome,
        };
        event!(
            target: "genie_bench::runner",
            Level::DEBUG,
            game,
            hidden = %row.hidden_name,
            guessed = %row.guessed_name,
            correct = row.correct,
            turns = row.turns,
        );
        row
    }
}

/// Answer from the hidden entity's matrix row under the noise model: shrug
/// with `dont_know_rate`, flip the truth with `mistake_rate`, soften to the
/// hedged grades with `hedge_rate`. Unknown cells always shrug.
fn simulate_answer<R: Rng + ?Sized>(
    stored: AttributeProb,
    answerer: &AnswererConfig,
    rng: &mut R,
) -> GradedAnswer {
    let AttributeProb::Known(p) = stored else {
        return GradedAnswer::DontKnow;
    };
    if rng.gen_bool(answerer.dont_know_rate) {
        return GradedAnswer::DontKnow;
    }

    let truth = rng.gen_bool(p.clamp(0.0, 1.0));
    let says_yes = truth != rng.gen_bool(answerer.mistake_rate);
    match (says_yes, rng.gen_bool(answerer.hedge_rate)) {
        (true, true) => GradedAnswer::Probably,
        (true, false) => GradedAnswer::Yes,
        (false, true) => GradedAnswer::ProbablyNot,
        (false, false) => GradedAnswer::No,
    }
}
