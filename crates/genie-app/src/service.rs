use crate::registry::{GameId, SessionEntry, SessionRegistry};
use genie_bot::{
    EvaluatorConfig, Guess, GuessEvaluator, QuestionSelector, QuestionState, SelectorConfig,
};
use genie_core::belief::{BeliefState, GradedAnswer, LikelihoodConfig, LikelihoodModel};
use genie_core::game::{GameSession, SessionError, SessionPhase};
use genie_core::knowledge::{AttributeId, KnowledgeBase};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{Level, event};

/// Engine tunables bundled for the service layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceConfig {
    pub selector: SelectorConfig,
    pub evaluator: EvaluatorConfig,
    pub likelihood: LikelihoodConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self {
            selector: SelectorConfig::from_env(),
            evaluator: EvaluatorConfig::from_env(),
            likelihood: LikelihoodConfig::from_env(),
        }
    }
}

/// Wire form of a proposed identification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuessBody {
    pub name: String,
    pub confidence: f64,
}

impl From<Guess> for GuessBody {
    fn from(guess: Guess) -> Self {
        Self {
            name: guess.name,
            confidence: guess.confidence,
        }
    }
}

/// Response to `start_game`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartedGame {
    pub game_id: GameId,
    pub question_id: AttributeId,
    pub question: String,
}

/// Response to `submit_answer` / `reject_guess`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// Keep playing. `top_guess` surfaces the current leader once it has
    /// crossed the confidence threshold but the game is continuing (the
    /// player already turned that candidate down).
    NextQuestion {
        question_id: AttributeId,
        question: String,
        top_guess: Option<GuessBody>,
    },
    /// The engine stops asking and proposes this candidate.
    GuessReady { guess: GuessBody },
    /// Out of questions with nothing left to propose; the game failed to
    /// identify the entity and this is its best remaining answer.
    Exhausted { guess: GuessBody },
}

/// Session-facing facade over the engine: owns the knowledge base, the
/// decision components and the registry of live games. The transport layer
/// calls these operations and never touches engine types directly.
pub struct GameService {
    kb: Arc<KnowledgeBase>,
    selector: QuestionSelector,
    evaluator: GuessEvaluator,
    likelihood: LikelihoodModel,
    registry: SessionRegistry,
}

impl GameService {
    pub fn new(kb: Arc<KnowledgeBase>, config: ServiceConfig) -> Self {
        Self {
            kb,
            selector: QuestionSelector::new(config.selector),
            evaluator: GuessEvaluator::new(config.evaluator),
            likelihood: LikelihoodModel::new(config.likelihood),
            registry: SessionRegistry::new(),
        }
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub fn live_games(&self) -> usize {
        self.registry.len()
    }

    /// Open a new game seeded from the popularity prior and pose the first
    /// question.
    pub fn start_game(&self) -> Result<StartedGame, ServiceError> {
        let mut session = GameSession::new(BeliefState::from_prior(self.kb.prior()));
        let questions = QuestionState::new();
        let attribute = self
            .selector
            .select(&self.kb, session.belief(), &questions)
            .ok_or(ServiceError::NoQuestionsRemaining)?;
        session.pose_question(attribute)?;

        let game_id = self.registry.insert(SessionEntry { session, questions });
        event!(
            target: "genie_app::service",
            Level::INFO,
            game = %game_id,
            first_question = %attribute,
            "game started"
        );
        Ok(StartedGame {
            game_id,
            question_id: attribute,
            question: self.kb.attribute_text(attribute).to_string(),
        })
    }

    /// Apply one graded answer to the outstanding question and advance the
    /// game. The raw value is validated against the five recognized grades
    /// before any state is touched.
    pub fn submit_answer(
        &self,
        game_id: GameId,
        attribute_id: AttributeId,
        answer_value: f64,
    ) -> Result<AnswerOutcome, ServiceError> {
        let answer = GradedAnswer::from_value(answer_value)
            .ok_or(ServiceError::InvalidAnswerValue(answer_value))?;
        let handle = self
            .registry
            .get(game_id)
            .ok_or(ServiceError::UnknownGameId(game_id))?;
        let mut entry = handle.lock();

        entry
            .session
            .apply_answer(&self.kb, &self.likelihood, attribute_id, answer)?;
        entry.questions.note_answer(
            self.kb.attribute(attribute_id).category(),
            answer,
            self.selector.config().resolve_threshold,
        );
        event!(
            target: "genie_app::service",
            Level::DEBUG,
            game = %game_id,
            attribute = %attribute_id,
            answer = %answer,
            turn = entry.session.turns(),
        );

        self.advance(&mut entry)
    }

    /// Best current candidate regardless of confidence: the "give up, show
    /// me" path.
    pub fn top_guess(&self, game_id: GameId) -> Result<GuessBody, ServiceError> {
        let handle = self
            .registry
            .get(game_id)
            .ok_or(ServiceError::UnknownGameId(game_id))?;
        let entry = handle.lock();
        Ok(self
            .evaluator
            .top_candidate(&self.kb, entry.session.belief())
            .into())
    }

    /// Ranked best candidates for the final reveal.
    pub fn ranked_guesses(
        &self,
        game_id: GameId,
        n: usize,
    ) -> Result<Vec<GuessBody>, ServiceError> {
        let handle = self
            .registry
            .get(game_id)
            .ok_or(ServiceError::UnknownGameId(game_id))?;
        let entry = handle.lock();
        Ok(self
            .evaluator
            .ranked(&self.kb, entry.session.belief(), n)
            .into_iter()
            .map(GuessBody::from)
            .collect())
    }

    /// Player confirmed the proposed guess. Terminal: the game is evicted.
    pub fn accept_guess(&self, game_id: GameId) -> Result<GuessBody, ServiceError> {
        let handle = self
            .registry
            .get(game_id)
            .ok_or(ServiceError::UnknownGameId(game_id))?;
        let guess = {
            let mut entry = handle.lock();
            let guess = self
                .best_unrejected(&entry.session)
                .unwrap_or_else(|| self.evaluator.top_candidate(&self.kb, entry.session.belief()));
            entry.session.accept_guess()?;
            guess
        };
        self.registry.remove(game_id);
        event!(
            target: "genie_app::service",
            Level::INFO,
            game = %game_id,
            name = %guess.name,
            confidence = guess.confidence,
            "guess accepted"
        );
        Ok(guess.into())
    }

    /// Player turned the proposed guess down. The game resumes asking while
    /// questions remain, otherwise it ends unidentified.
    pub fn reject_guess(&self, game_id: GameId) -> Result<AnswerOutcome, ServiceError> {
        let handle = self
            .registry
            .get(game_id)
            .ok_or(ServiceError::UnknownGameId(game_id))?;
        let mut entry = handle.lock();

        let proposed = self
            .best_unrejected(&entry.session)
            .unwrap_or_else(|| self.evaluator.top_candidate(&self.kb, entry.session.belief()));
        let next = self
            .selector
            .select(&self.kb, entry.session.belief(), &entry.questions);
        entry.session.reject_guess(proposed.entity, next.is_some())?;

        match entry.session.phase() {
            SessionPhase::Asking => {
                let attribute =
                    next.expect("a question remains when rejection resumes the game");
                entry.session.pose_question(attribute)?;
                Ok(AnswerOutcome::NextQuestion {
                    question_id: attribute,
                    question: self.kb.attribute_text(attribute).to_string(),
                    top_guess: self.confident_leader(&entry.session),
                })
            }
            _ => {
                let fallback = self
                    .best_unrejected(&entry.session)
                    .unwrap_or_else(|| {
                        self.evaluator.top_candidate(&self.kb, entry.session.belief())
                    });
                Ok(AnswerOutcome::Exhausted {
                    guess: fallback.into(),
                })
            }
        }
    }

    /// Decide whether to keep asking or stop and propose, then stage the
    /// next step. Called with the entry lock held.
    fn advance(&self, entry: &mut SessionEntry) -> Result<AnswerOutcome, ServiceError> {
        let next = self
            .selector
            .select(&self.kb, entry.session.belief(), &entry.questions);
        let questions_remaining = next.is_some();

        let top = self.evaluator.top_candidate(&self.kb, entry.session.belief());
        let stop = if entry.session.is_rejected(top.entity) {
            // The leader was already turned down: only hard stops apply.
            !questions_remaining
                || entry.session.turns() >= self.evaluator.config().max_turns
        } else {
            self.evaluator
                .should_guess(entry.session.belief(), questions_remaining)
        };

        if !stop {
            let attribute = next.expect("a question remains when the game continues");
            entry.session.pose_question(attribute)?;
            return Ok(AnswerOutcome::NextQuestion {
                question_id: attribute,
                question: self.kb.attribute_text(attribute).to_string(),
                top_guess: self.confident_leader(&entry.session),
            });
        }

        match self.best_unrejected(&entry.session) {
            Some(guess) => {
                entry.session.enter_guess_ready()?;
                Ok(AnswerOutcome::GuessReady {
                    guess: guess.into(),
                })
            }
            None => {
                entry.session.mark_exhausted()?;
                Ok(AnswerOutcome::Exhausted { guess: top.into() })
            }
        }
    }

    /// Most probable candidate the player has not rejected yet.
    fn best_unrejected(&self, session: &GameSession) -> Option<Guess> {
        self.evaluator
            .ranked(&self.kb, session.belief(), session.belief().entity_count())
            .into_iter()
            .find(|guess| !session.is_rejected(guess.entity))
    }

    /// Leader shown alongside the next question once it is past the
    /// threshold (only reachable after the player rejected it).
    fn confident_leader(&self, session: &GameSession) -> Option<GuessBody> {
        if self.evaluator.is_confident(session.belief()) {
            Some(
                self.evaluator
                    .top_candidate(&self.kb, session.belief())
                    .into(),
            )
        } else {
            None
        }
    }
}

/// Errors surfaced across the transport boundary. Every rejected operation
/// leaves the targeted session unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceError {
    UnknownGameId(GameId),
    InvalidAnswerValue(f64),
    NoQuestionsRemaining,
    Session(SessionError),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::UnknownGameId(id) => {
                write!(f, "unknown game id {id}; the session may have expired")
            }
            ServiceError::InvalidAnswerValue(value) => write!(
                f,
                "answer value {value} is not one of the five recognized grades"
            ),
            ServiceError::NoQuestionsRemaining => write!(f, "no questions remaining"),
            ServiceError::Session(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::Session(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SessionError> for ServiceError {
    fn from(err: SessionError) -> Self {
        ServiceError::Session(err)
    }
}
