pub mod registry;
pub mod service;

pub use registry::{GameId, SessionEntry, SessionRegistry};
pub use service::{
    AnswerOutcome, GameService, GuessBody, ServiceConfig, ServiceError, StartedGame,
};
