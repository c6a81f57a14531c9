pub mod engine;
pub mod states;

pub use engine::IntakeFlow;
pub use states::{CompletionPolicy, IntakeState, TurnAction, TurnOutcome};
