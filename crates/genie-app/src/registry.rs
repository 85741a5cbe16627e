use core::fmt;
use genie_bot::QuestionState;
use genie_core::game::GameSession;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Opaque handle identifying one in-flight game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(Uuid);

impl GameId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(Self)
    }
}

impl Default for GameId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything one game owns: the session state machine plus the category
/// bookkeeping the selector consults.
#[derive(Debug)]
pub struct SessionEntry {
    pub session: GameSession,
    pub questions: QuestionState,
}

/// Keyed store of live games.
///
/// The map lock guards membership only; each entry carries its own mutex so
/// concurrent answer submissions for the same game serialize against each
/// other without blocking unrelated games.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<GameId, Arc<Mutex<SessionEntry>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: SessionEntry) -> GameId {
        let id = GameId::new();
        self.sessions
            .write()
            .insert(id, Arc::new(Mutex::new(entry)));
        id
    }

    pub fn get(&self, id: GameId) -> Option<Arc<Mutex<SessionEntry>>> {
        self.sessions.read().get(&id).cloned()
    }

    pub fn remove(&self, id: GameId) -> bool {
        self.sessions.write().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genie_core::belief::BeliefState;

    fn entry() -> SessionEntry {
        SessionEntry {
            session: GameSession::new(BeliefState::uniform(2)),
            questions: QuestionState::new(),
        }
    }

    #[test]
    fn ids_are_unique_and_parseable() {
        let a = GameId::new();
        let b = GameId::new();
        assert_ne!(a, b);
        assert_eq!(GameId::parse(&a.to_string()), Some(a));
        assert_eq!(GameId::parse("not-a-uuid"), None);
    }

    #[test]
    fn insert_get_remove_round_trip() {
        let registry = SessionRegistry::new();
        assert!(registry.is_empty());

        let id = registry.insert(entry());
        assert_eq!(registry.len(), 1);
        assert!(registry.get(id).is_some());

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert!(registry.get(id).is_none());
    }

    #[test]
    fn entries_are_independent() {
        let registry = SessionRegistry::new();
        let first = registry.insert(entry());
        let second = registry.insert(entry());

        {
            let handle = registry.get(first).expect("present");
            let mut locked = handle.lock();
            locked.session.pose_question(genie_core::knowledge::AttributeId(0)).expect("posed");
        }

        let other = registry.get(second).expect("present");
        assert_eq!(other.lock().session.pending_question(), None);
    }

    #[test]
    fn game_id_serializes_as_string() {
        let id = GameId::new();
        let json = serde_json::to_string(&id).expect("serialize");
        assert!(json.starts_with('"'));
        let back: GameId = serde_json::from_str(&json).expect("parse");
        assert_eq!(back, id);
    }
}
