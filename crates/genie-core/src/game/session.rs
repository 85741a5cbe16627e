use crate::belief::{BeliefError, BeliefState, GradedAnswer, LikelihoodModel};
use crate::knowledge::{AttributeId, EntityId, KnowledgeBase};
use std::collections::BTreeSet;
use std::fmt;

/// Lifecycle of one game.
///
/// `Asking` loops question/answer turns until the evaluator stops the game;
/// `GuessReady` awaits the player's verdict; `GuessAccepted` and `Exhausted`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Asking,
    GuessReady,
    GuessAccepted,
    Exhausted,
}

impl SessionPhase {
    pub const fn is_terminal(self) -> bool {
        matches!(self, SessionPhase::GuessAccepted | SessionPhase::Exhausted)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionPhase::Asking => "asking",
            SessionPhase::GuessReady => "guess-ready",
            SessionPhase::GuessAccepted => "guess-accepted",
            SessionPhase::Exhausted => "exhausted",
        };
        f.write_str(label)
    }
}

/// One game's mutable state: the posterior, the question currently awaiting
/// an answer, and the guesses the player has already turned down.
///
/// Owned exclusively by one caller; never shared across games.
#[derive(Debug, Clone)]
pub struct GameSession {
    belief: BeliefState,
    phase: SessionPhase,
    pending: Option<AttributeId>,
    rejected: BTreeSet<EntityId>,
}

impl GameSession {
    pub fn new(belief: BeliefState) -> Self {
        Self {
            belief,
            phase: SessionPhase::Asking,
            pending: None,
            rejected: BTreeSet::new(),
        }
    }

    pub fn belief(&self) -> &BeliefState {
        &self.belief
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn pending_question(&self) -> Option<AttributeId> {
        self.pending
    }

    pub fn turns(&self) -> u32 {
        self.belief.turns()
    }

    /// Entities the player has already rejected at the guess prompt. The
    /// evaluator skips these when deciding whether to stop on confidence.
    pub fn is_rejected(&self, entity: EntityId) -> bool {
        self.rejected.contains(&entity)
    }

    /// Stage the next question. Only legal while asking with no question
    /// outstanding.
    pub fn pose_question(&mut self, attribute: AttributeId) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::Asking)?;
        if let Some(pending) = self.pending {
            return Err(SessionError::QuestionPending(pending));
        }
        self.pending = Some(attribute);
        Ok(())
    }

    /// Apply the player's answer to the outstanding question. Exactly one
    /// belief update, one asked-set insertion and one turn increment; any
    /// rejection leaves the session untouched.
    pub fn apply_answer(
        &mut self,
        kb: &KnowledgeBase,
        model: &LikelihoodModel,
        attribute: AttributeId,
        answer: GradedAnswer,
    ) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::Asking)?;
        match self.pending {
            None => return Err(SessionError::NoQuestionPosed),
            Some(expected) if expected != attribute => {
                return Err(SessionError::QuestionMismatch {
                    expected,
                    got: attribute,
                });
            }
            Some(_) => {}
        }

        self.belief.apply_answer(kb, model, attribute, answer)?;
        self.pending = None;
        Ok(())
    }

    pub fn enter_guess_ready(&mut self) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::Asking)?;
        self.pending = None;
        self.phase = SessionPhase::GuessReady;
        Ok(())
    }

    pub fn accept_guess(&mut self) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::GuessReady)?;
        self.phase = SessionPhase::GuessAccepted;
        Ok(())
    }

    /// Player turned the proposed entity down. Returns to asking while
    /// questions remain, otherwise the game ends unidentified.
    pub fn reject_guess(
        &mut self,
        entity: EntityId,
        questions_remain: bool,
    ) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::GuessReady)?;
        self.rejected.insert(entity);
        self.phase = if questions_remain {
            SessionPhase::Asking
        } else {
            SessionPhase::Exhausted
        };
        Ok(())
    }

    pub fn mark_exhausted(&mut self) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::Asking)?;
        self.pending = None;
        self.phase = SessionPhase::Exhausted;
        Ok(())
    }

    fn require_phase(&self, expected: SessionPhase) -> Result<(), SessionError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(SessionError::WrongPhase {
                expected,
                actual: self.phase,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    WrongPhase {
        expected: SessionPhase,
        actual: SessionPhase,
    },
    QuestionPending(AttributeId),
    NoQuestionPosed,
    QuestionMismatch {
        expected: AttributeId,
        got: AttributeId,
    },
    Belief(BeliefError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::WrongPhase { expected, actual } => {
                write!(f, "session is {actual} but the operation requires {expected}")
            }
            SessionError::QuestionPending(attribute) => {
                write!(f, "question {attribute} is already awaiting an answer")
            }
            SessionError::NoQuestionPosed => write!(f, "no question is awaiting an answer"),
            SessionError::QuestionMismatch { expected, got } => {
                write!(f, "expected an answer for {expected} but got one for {got}")
            }
            SessionError::Belief(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Belief(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BeliefError> for SessionError {
    fn from(err: BeliefError) -> Self {
        SessionError::Belief(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{AttributeRecord, EntityRecord, KnowledgeSnapshot};

    fn kb() -> KnowledgeBase {
        KnowledgeBase::from_snapshot(KnowledgeSnapshot {
            entities: vec![
                EntityRecord {
                    name: "Person 0".to_string(),
                    popularity: 0.0,
                },
                EntityRecord {
                    name: "Person 1".to_string(),
                    popularity: 0.0,
                },
            ],
            attributes: vec![
                AttributeRecord {
                    text: "Question 0?".to_string(),
                    category: None,
                    value: None,
                },
                AttributeRecord {
                    text: "Question 1?".to_string(),
                    category: None,
                    value: None,
                },
            ],
            matrix: vec![vec![Some(1.0), Some(0.0)], vec![Some(0.0), Some(1.0)]],
        })
        .expect("valid")
    }

    fn session() -> GameSession {
        GameSession::new(BeliefState::uniform(2))
    }

    #[test]
    fn answer_requires_a_posed_question() {
        let kb = kb();
        let model = LikelihoodModel::default();
        let mut session = session();
        let err = session
            .apply_answer(&kb, &model, AttributeId(0), GradedAnswer::Yes)
            .expect_err("no question posed");
        assert_eq!(err, SessionError::NoQuestionPosed);
    }

    #[test]
    fn mismatched_answer_is_rejected_without_update() {
        let kb = kb();
        let model = LikelihoodModel::default();
        let mut session = session();
        session.pose_question(AttributeId(0)).expect("posed");

        let err = session
            .apply_answer(&kb, &model, AttributeId(1), GradedAnswer::Yes)
            .expect_err("wrong question");
        assert_eq!(
            err,
            SessionError::QuestionMismatch {
                expected: AttributeId(0),
                got: AttributeId(1),
            }
        );
        assert_eq!(session.turns(), 0);
        assert_eq!(session.pending_question(), Some(AttributeId(0)));
    }

    #[test]
    fn answer_clears_pending_and_counts_turn() {
        let kb = kb();
        let model = LikelihoodModel::default();
        let mut session = session();
        session.pose_question(AttributeId(0)).expect("posed");
        session
            .apply_answer(&kb, &model, AttributeId(0), GradedAnswer::Yes)
            .expect("accepted");
        assert_eq!(session.pending_question(), None);
        assert_eq!(session.turns(), 1);
        assert_eq!(session.phase(), SessionPhase::Asking);
    }

    #[test]
    fn double_pose_is_rejected() {
        let mut session = session();
        session.pose_question(AttributeId(0)).expect("posed");
        let err = session.pose_question(AttributeId(1)).expect_err("pending");
        assert_eq!(err, SessionError::QuestionPending(AttributeId(0)));
    }

    #[test]
    fn accept_path_terminates() {
        let mut session = session();
        session.enter_guess_ready().expect("ready");
        session.accept_guess().expect("accepted");
        assert_eq!(session.phase(), SessionPhase::GuessAccepted);
        assert!(session.phase().is_terminal());
        assert!(matches!(
            session.enter_guess_ready(),
            Err(SessionError::WrongPhase { .. })
        ));
    }

    #[test]
    fn reject_returns_to_asking_while_questions_remain() {
        let mut session = session();
        session.enter_guess_ready().expect("ready");
        session
            .reject_guess(EntityId(0), true)
            .expect("rejected");
        assert_eq!(session.phase(), SessionPhase::Asking);
        assert!(session.is_rejected(EntityId(0)));
    }

    #[test]
    fn reject_without_questions_exhausts() {
        let mut session = session();
        session.enter_guess_ready().expect("ready");
        session
            .reject_guess(EntityId(1), false)
            .expect("rejected");
        assert_eq!(session.phase(), SessionPhase::Exhausted);
        assert!(session.phase().is_terminal());
    }
}
