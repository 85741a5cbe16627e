mod session;

pub use session::{GameSession, SessionError, SessionPhase};
