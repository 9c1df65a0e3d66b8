pub mod assistant_service;
pub mod envelope;
pub mod errors;
pub mod goal_parser;

pub use assistant_service::{Assistant, AssistantSettings, AssistantStatus, PRESENTED_OPTIONS};
pub use envelope::{NextAction, ResultEnvelope};
pub use errors::AssistantError;
pub use goal_parser::{GoalKind, GoalParser, ParsedGoal};
