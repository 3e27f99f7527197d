mod error;
mod events;
mod machine;
mod phase;

pub use error::{InvalidTransition, TransitionResult};
pub use events::CallEvent;
pub use machine::{ApplyOutcome, CallStateMachine};
pub use phase::{CallOutcome, CallPhase, CallRecord};
