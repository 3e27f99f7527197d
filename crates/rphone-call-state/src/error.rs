use crate::phase::CallPhase;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("event {event} is not legal while in phase {phase:?}")]
pub struct InvalidTransition {
    pub phase: CallPhase,
    pub event: &'static str,
}

/// Result of feeding an event to the machine when the call_id matched the
/// current call (or no current call was required, as for `StartOutgoing`/
/// `IncomingInvite`). A mismatched call_id is not an error — spec.md §4.4
/// says it is silently ignored — so it is represented as
/// [`crate::machine::ApplyOutcome::IgnoredCallIdMismatch`], not an `Err`.
pub type TransitionResult = Result<(), InvalidTransition>;
