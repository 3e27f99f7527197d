//! Pure state logic over call phases. No I/O: callers supply `now` as a
//! wall-clock seconds value for the record's `start_ts`/`end_ts`, and the
//! machine never calls out to a transport, a clock, or a UI — the "cross-
//! thread UI notification" design note in spec.md §9 is realized by
//! [`CallStateMachine::on_state_changed`] being a plain synchronous
//! callback the host wires to a channel, not a network call.

use rphone_identity::NodeId;

use crate::error::InvalidTransition;
use crate::events::CallEvent;
use crate::phase::{CallOutcome, CallPhase, CallRecord};

/// What happened when an event was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The event named a `call_id` that didn't match `current_call`.
    /// Silently dropped per spec.md §4.4 — not an error.
    IgnoredCallIdMismatch,
}

type StateChangedCallback = Box<dyn Fn(CallPhase, Option<&CallRecord>) + Send + Sync>;

pub struct CallStateMachine {
    local_id: NodeId,
    phase: CallPhase,
    current_call: Option<CallRecord>,
    on_state_changed: Option<StateChangedCallback>,
}

impl CallStateMachine {
    pub fn new(local_id: NodeId) -> Self {
        Self {
            local_id,
            phase: CallPhase::Idle,
            current_call: None,
            on_state_changed: None,
        }
    }

    /// Invoked synchronously after every successful transition, with the
    /// new phase and (if any) the current call record.
    pub fn set_on_state_changed(&mut self, cb: StateChangedCallback) {
        self.on_state_changed = Some(cb);
    }

    pub fn phase(&self) -> CallPhase {
        self.phase
    }

    pub fn current_call(&self) -> Option<&CallRecord> {
        self.current_call.as_ref()
    }

    /// `current_call.is_some() <=> phase != Idle`, always.
    fn invariant_holds(&self) -> bool {
        self.current_call.is_some() == (self.phase != CallPhase::Idle)
    }

    fn fire_callback(&self) {
        if let Some(cb) = &self.on_state_changed {
            cb(self.phase, self.current_call.as_ref());
        }
    }

    fn matches_current(&self, call_id: Option<uuid::Uuid>) -> bool {
        match (call_id, &self.current_call) {
            (Some(id), Some(call)) => id == call.call_id,
            (None, _) => true,
            (Some(_), None) => false,
        }
    }

    /// Apply one event. `now` is the caller-supplied wall-clock time in
    /// seconds, used only to stamp `start_ts`/`end_ts`.
    pub fn apply(&mut self, event: CallEvent, now: u64) -> Result<ApplyOutcome, InvalidTransition> {
        debug_assert!(self.invariant_holds());

        if !self.matches_current(event.call_id()) {
            return Ok(ApplyOutcome::IgnoredCallIdMismatch);
        }

        let invalid = || InvalidTransition {
            phase: self.phase,
            event: event.name(),
        };

        match (self.phase, &event) {
            (CallPhase::Idle, CallEvent::StartOutgoing { call_id, remote_id }) => {
                self.current_call = Some(CallRecord {
                    call_id: *call_id,
                    local_id: self.local_id,
                    remote_id: *remote_id,
                    display_name: None,
                    initiated_by_local: true,
                    remote_call_dest: None,
                    remote_public_key: None,
                    negotiated_codec: None,
                    start_ts: now,
                    end_ts: None,
                    outcome: None,
                });
                self.phase = CallPhase::OutgoingCall;
            }

            (CallPhase::OutgoingCall, CallEvent::RemoteRinging { .. }) => {
                self.phase = CallPhase::Ringing;
            }

            (
                CallPhase::OutgoingCall | CallPhase::Ringing,
                CallEvent::RemoteAccepted {
                    remote_call_dest,
                    codec,
                    ..
                },
            ) => {
                let call = self.current_call.as_mut().expect("invariant");
                call.remote_call_dest = Some(*remote_call_dest);
                call.negotiated_codec = Some(*codec);
                self.phase = CallPhase::InCall;
            }

            (CallPhase::OutgoingCall | CallPhase::Ringing, CallEvent::RemoteRejected { .. }) => {
                self.end_current(CallOutcome::Rejected, now);
            }

            (
                CallPhase::Idle,
                CallEvent::IncomingInvite {
                    call_id,
                    remote_id,
                    display_name,
                    remote_call_dest,
                },
            ) => {
                self.current_call = Some(CallRecord {
                    call_id: *call_id,
                    local_id: self.local_id,
                    remote_id: *remote_id,
                    display_name: display_name.clone(),
                    initiated_by_local: false,
                    remote_call_dest: Some(*remote_call_dest),
                    remote_public_key: None,
                    negotiated_codec: None,
                    start_ts: now,
                    end_ts: None,
                    outcome: None,
                });
                self.phase = CallPhase::IncomingCall;
            }

            (CallPhase::IncomingCall, CallEvent::AcceptLocal { negotiated_codec }) => {
                let call = self.current_call.as_mut().expect("invariant");
                call.negotiated_codec = Some(*negotiated_codec);
                self.phase = CallPhase::InCall;
            }

            (CallPhase::IncomingCall, CallEvent::RejectLocal) => {
                self.end_current(CallOutcome::Rejected, now);
            }

            (CallPhase::InCall, CallEvent::LocalHangup) => {
                self.end_current(CallOutcome::Completed, now);
            }
            (CallPhase::InCall, CallEvent::RemoteEnded) => {
                self.end_current(CallOutcome::Completed, now);
            }
            (CallPhase::InCall, CallEvent::LinkFailed) => {
                self.end_current(CallOutcome::LinkFailed, now);
            }
            (CallPhase::InCall, CallEvent::CodecFailed) => {
                self.end_current(CallOutcome::CodecError, now);
            }

            (CallPhase::Ended, CallEvent::Finalize) => {
                self.current_call = None;
                self.phase = CallPhase::Idle;
            }

            _ => return Err(invalid()),
        }

        debug_assert!(self.invariant_holds());
        self.fire_callback();
        Ok(ApplyOutcome::Applied)
    }

    fn end_current(&mut self, outcome: CallOutcome, now: u64) {
        if let Some(call) = self.current_call.as_mut() {
            call.outcome = Some(outcome);
            call.end_ts = Some(now);
        }
        self.phase = CallPhase::Ended;
    }
}
