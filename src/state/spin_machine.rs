use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier of a spin session.
pub type SessionId = Uuid;

/// Frozen data of one spin, fixed when the spin starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpinSession {
    /// Identifier used to tie animation callbacks to this session.
    pub id: SessionId,
    /// Group the options were taken from.
    pub group: String,
    /// Options spun over, in sector order. Never changes during the session.
    pub options: Arc<[String]>,
    /// Index of the winner, drawn before the animation starts.
    pub winner_index: usize,
}

impl SpinSession {
    /// Create a session with a fresh identifier.
    pub fn new(group: impl Into<String>, options: Arc<[String]>, winner_index: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            group: group.into(),
            options,
            winner_index,
        }
    }

    /// Label of the pre-drawn winner.
    pub fn winner(&self) -> &str {
        &self.options[self.winner_index]
    }
}

/// Phases of the selection engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpinPhase {
    /// No session exists.
    Idle,
    /// The wheel is animating towards the pre-drawn winner.
    Spinning(SpinSession),
    /// The winner is shown for the display delay.
    Revealing(SpinSession),
}

/// Data-free view of [`SpinPhase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpinStatus {
    /// No session exists.
    Idle,
    /// Animation running.
    Spinning,
    /// Winner displayed.
    Revealing,
}

impl From<&SpinPhase> for SpinStatus {
    fn from(value: &SpinPhase) -> Self {
        match value {
            SpinPhase::Idle => SpinStatus::Idle,
            SpinPhase::Spinning(_) => SpinStatus::Spinning,
            SpinPhase::Revealing(_) => SpinStatus::Revealing,
        }
    }
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpinEvent {
    /// A new session begins.
    Start(SpinSession),
    /// The animation reached its end; reveal the winner.
    Settle,
    /// The display delay elapsed.
    Finish,
    /// The user interrupted the animation.
    Cancel,
    /// The session hit an unrecoverable error.
    Fail,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// Status the state machine was in when the invalid event was received.
    pub from: SpinStatus,
    /// The event that cannot be applied from this status.
    pub event: SpinEvent,
}

/// Errors raised by session-scoped transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The event is not valid in the current phase.
    #[error(transparent)]
    Invalid(#[from] InvalidTransition),
    /// The addressed session is not the active one.
    #[error("session {got} is not active (active: {expected:?})")]
    SessionMismatch {
        /// Active session, if any.
        expected: Option<SessionId>,
        /// Session named by the caller.
        got: SessionId,
    },
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpinSnapshot {
    /// Current status.
    pub status: SpinStatus,
    /// Number of transitions applied so far.
    pub version: usize,
    /// Active session identifier.
    pub session_id: Option<SessionId>,
    /// Group of the active session.
    pub group: Option<String>,
}

/// State machine for one wheel: `Idle -> Spinning -> Revealing -> Idle`,
/// with `Spinning -> Idle` on cancel and any active phase to `Idle` on failure.
#[derive(Debug, Clone)]
pub struct SpinStateMachine {
    phase: SpinPhase,
    version: usize,
}

impl Default for SpinStateMachine {
    fn default() -> Self {
        Self {
            phase: SpinPhase::Idle,
            version: 0,
        }
    }
}

impl SpinStateMachine {
    /// Create a new state machine initialised in the idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status.
    pub fn status(&self) -> SpinStatus {
        SpinStatus::from(&self.phase)
    }

    /// Active session, if any.
    pub fn session(&self) -> Option<&SpinSession> {
        match &self.phase {
            SpinPhase::Spinning(session) | SpinPhase::Revealing(session) => Some(session),
            SpinPhase::Idle => None,
        }
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> SpinSnapshot {
        let session = self.session();
        SpinSnapshot {
            status: self.status(),
            version: self.version,
            session_id: session.map(|s| s.id),
            group: session.map(|s| s.group.clone()),
        }
    }

    /// Apply an event regardless of which session is active.
    pub fn apply(&mut self, event: SpinEvent) -> Result<SpinStatus, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        self.version += 1;
        Ok(self.status())
    }

    /// Apply an event on behalf of `session_id`, refusing if another session
    /// (or none) is active.
    pub fn apply_for(
        &mut self,
        session_id: SessionId,
        event: SpinEvent,
    ) -> Result<SpinStatus, TransitionError> {
        let active = self.session().map(|s| s.id);
        if active != Some(session_id) {
            return Err(TransitionError::SessionMismatch {
                expected: active,
                got: session_id,
            });
        }
        Ok(self.apply(event)?)
    }

    fn compute_transition(&self, event: SpinEvent) -> Result<SpinPhase, InvalidTransition> {
        let next = match (&self.phase, event) {
            (SpinPhase::Idle, SpinEvent::Start(session)) => SpinPhase::Spinning(session),
            (SpinPhase::Spinning(session), SpinEvent::Settle) => {
                SpinPhase::Revealing(session.clone())
            }
            (SpinPhase::Spinning(_), SpinEvent::Cancel) => SpinPhase::Idle,
            (SpinPhase::Revealing(_), SpinEvent::Finish) => SpinPhase::Idle,
            (SpinPhase::Spinning(_) | SpinPhase::Revealing(_), SpinEvent::Fail) => SpinPhase::Idle,
            (from, event) => {
                return Err(InvalidTransition {
                    from: SpinStatus::from(from),
                    event,
                });
            }
        };

        Ok(next)
    }
}
