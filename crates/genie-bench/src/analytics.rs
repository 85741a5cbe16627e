use std::fs;
use std::path::Path;

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

use crate::config::BenchConfig;
use crate::runner::{GameOutcome, GameRow};

const CONFIDENCE_LEVEL: f64 = 0.95;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("no games were recorded")]
    Empty,
}

/// Aggregates per-game rows into the final report.
#[derive(Debug, Default)]
pub struct AnalyticsCollector {
    games: usize,
    correct: usize,
    turns_total: u64,
    confidence_total: f64,
    confident_stops: usize,
    turn_limit_stops: usize,
    out_of_questions: usize,
}

impl AnalyticsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, row: &GameRow) {
        self.games += 1;
        if row.correct {
            self.correct += 1;
        }
        self.turns_total += u64::from(row.turns);
        self.confidence_total += row.confidence;
        match row.outcome {
            GameOutcome::Confident => self.confident_stops += 1,
            GameOutcome::TurnLimit => self.turn_limit_stops += 1,
            GameOutcome::OutOfQuestions => self.out_of_questions += 1,
        }
    }

    pub fn finalize(self) -> Result<BenchReport, AnalyticsError> {
        if self.games == 0 {
            return Err(AnalyticsError::Empty);
        }

        let games = self.games as f64;
        let success_rate = self.correct as f64 / games;
        let (ci_low, ci_high) = wilson_interval(self.correct, self.games);

        Ok(BenchReport {
            games: self.games,
            correct: self.correct,
            success_rate,
            ci_low,
            ci_high,
            mean_turns: self.turns_total as f64 / games,
            mean_confidence: self.confidence_total / games,
            confident_stops: self.confident_stops,
            turn_limit_stops: self.turn_limit_stops,
            out_of_questions: self.out_of_questions,
        })
    }
}

/// Final aggregate over one simulation run.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BenchReport {
    pub games: usize,
    pub correct: usize,
    pub success_rate: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    pub mean_turns: f64,
    pub mean_confidence: f64,
    pub confident_stops: usize,
    pub turn_limit_stops: usize,
    pub out_of_questions: usize,
}

impl BenchReport {
    pub fn write_markdown(
        &self,
        config: &BenchConfig,
        path: &Path,
    ) -> Result<(), AnalyticsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| AnalyticsError::Io {
                context: "creating summary directory",
                source,
            })?;
        }

        let mut out = String::new();
        out.push_str(&format!("# Simulation summary — {}\n\n", config.run_id));
        out.push_str(&format!(
            "Simulated {} games against `{}` (mistake rate {:.2}, don't-know rate {:.2}, hedge rate {:.2}).\n\n",
            self.games,
            config.snapshot,
            config.answerer.mistake_rate,
            config.answerer.dont_know_rate,
            config.answerer.hedge_rate,
        ));
        out.push_str("| metric | value |\n|---|---|\n");
        out.push_str(&format!(
            "| identified correctly | {} / {} ({:.1}%) |\n",
            self.correct,
            self.games,
            self.success_rate * 100.0
        ));
        out.push_str(&format!(
            "| 95% CI | {:.1}% – {:.1}% |\n",
            self.ci_low * 100.0,
            self.ci_high * 100.0
        ));
        out.push_str(&format!("| mean turns | {:.1} |\n", self.mean_turns));
        out.push_str(&format!(
            "| mean final confidence | {:.2} |\n",
            self.mean_confidence
        ));
        out.push_str(&format!(
            "| stops (confident / turn limit / out of questions) | {} / {} / {} |\n",
            self.confident_stops, self.turn_limit_stops, self.out_of_questions
        ));

        fs::write(path, out).map_err(|source| AnalyticsError::Io {
            context: "writing summary markdown",
            source,
        })
    }
}

/// Wilson score interval for a binomial proportion at 95% confidence.
fn wilson_interval(successes: usize, trials: usize) -> (f64, f64) {
    let normal = Normal::new(0.0, 1.0).expect("standard normal is valid");
    let z = normal.inverse_cdf(0.5 + CONFIDENCE_LEVEL / 2.0);
    let n = trials as f64;
    let p = successes as f64 / n;

    let denom = 1.0 + z * z / n;
    let center = (p + z * z / (2.0 * n)) / denom;
    let margin = (z / denom) * (p * (1.0 - p) / n + z * z / (4.0 * n * n)).sqrt();
    ((center - margin).max(0.0), (center + margin).min(1.0))
}
