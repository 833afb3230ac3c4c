use serde::{Deserialize, Serialize};
use std::fmt;

use sc_core::types::StageKind;

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Thinking,
    Observations,
    Approach,
    Plan,
    Done,
    Failed,
}

impl PipelineState {
    /// The stage running in this state, if any.
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            PipelineState::Thinking => Some(StageKind::Thinking),
            PipelineState::Observations => Some(StageKind::Observations),
            PipelineState::Approach => Some(StageKind::Approach),
            PipelineState::Plan => Some(StageKind::Plan),
            PipelineState::Idle | PipelineState::Done | PipelineState::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PipelineState::Idle => "Idle",
            PipelineState::Thinking => "Thinking",
            PipelineState::Observations => "Observations",
            PipelineState::Approach => "Approach",
            PipelineState::Plan => "Plan",
            PipelineState::Done => "Done",
            PipelineState::Failed => "Failed",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// PipelineEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineEvent {
    Start,
    StageCompleted,
    Fail,
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PipelineEvent::Start => "Start",
            PipelineEvent::StageCompleted => "StageCompleted",
            PipelineEvent::Fail => "Fail",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// An event was applied in a state that does not accept it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateMachineError {
    #[error("invalid transition: cannot apply {event} in state {state}")]
    InvalidTransition {
        state: PipelineState,
        event: PipelineEvent,
    },
}

// ---------------------------------------------------------------------------
// PipelineStateMachine
// ---------------------------------------------------------------------------

/// Tracks one pipeline run through its stages.
///
/// Stages only ever advance in order, so no stage can start before its
/// predecessor has completed.
#[derive(Debug, Clone)]
pub struct PipelineStateMachine {
    current: PipelineState,
    history: Vec<(PipelineState, PipelineEvent, PipelineState)>,
}

impl PipelineStateMachine {
    /// Create a new state machine starting in `Idle`.
    pub fn new() -> Self {
        Self {
            current: PipelineState::Idle,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.current
    }

    pub fn history(&self) -> &[(PipelineState, PipelineEvent, PipelineState)] {
        &self.history
    }

    /// Attempt a state transition driven by `event`.
    ///
    /// Valid transitions:
    /// - Idle         + Start          -> Thinking
    /// - Thinking     + StageCompleted -> Observations
    /// - Observations + StageCompleted -> Approach
    /// - Approach     + StageCompleted -> Plan
    /// - Plan         + StageCompleted -> Done
    /// - any stage    + Fail           -> Failed
    pub fn transition(&mut self, event: PipelineEvent) -> Result<PipelineState, StateMachineError> {
        let next = match (self.current, event) {
            (PipelineState::Idle, PipelineEvent::Start) => PipelineState::Thinking,
            (PipelineState::Thinking, PipelineEvent::StageCompleted) => PipelineState::Observations,
            (PipelineState::Observations, PipelineEvent::StageCompleted) => PipelineState::Approach,
            (PipelineState::Approach, PipelineEvent::StageCompleted) => PipelineState::Plan,
            (PipelineState::Plan, PipelineEvent::StageCompleted) => PipelineState::Done,
            (state, PipelineEvent::Fail) if state.stage().is_some() => PipelineState::Failed,
            _ => {
                return Err(StateMachineError::InvalidTransition {
                    state: self.current,
                    event,
                });
            }
        };

        let from = self.current;
        self.current = next;
        self.history.push((from, event, next));
        tracing::debug!(from = %from, event = %event, to = %next, "pipeline state transition");
        Ok(next)
    }

    /// Returns `true` if the given event is valid in the current state.
    pub fn can_transition(&self, event: PipelineEvent) -> bool {
        match event {
            PipelineEvent::Start => self.current == PipelineState::Idle,
            PipelineEvent::StageCompleted | PipelineEvent::Fail => self.current.stage().is_some(),
        }
    }
}

impl Default for PipelineStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_visits_stages_in_order() {
        let mut sm = PipelineStateMachine::new();
        sm.transition(PipelineEvent::Start).unwrap();
        let mut visited = vec![sm.state().stage().unwrap()];
        while sm.transition(PipelineEvent::StageCompleted).unwrap() != PipelineState::Done {
            visited.push(sm.state().stage().unwrap());
        }
        assert_eq!(visited, StageKind::ALL.to_vec());
        assert_eq!(sm.history().len(), 5);
        assert!(sm.state().is_terminal());
    }

    #[test]
    fn test_fail_from_active_stage() {
        let mut sm = PipelineStateMachine::new();
        sm.transition(PipelineEvent::Start).unwrap();
        sm.transition(PipelineEvent::StageCompleted).unwrap();
        assert_eq!(sm.transition(PipelineEvent::Fail).unwrap(), PipelineState::Failed);
        assert!(!sm.can_transition(PipelineEvent::StageCompleted));
    }

    #[test]
    fn test_cannot_complete_before_start() {
        let mut sm = PipelineStateMachine::new();
        assert!(!sm.can_transition(PipelineEvent::StageCompleted));
        let err = sm.transition(PipelineEvent::StageCompleted).unwrap_err();
        assert_eq!(
            err,
            StateMachineError::InvalidTransition {
                state: PipelineState::Idle,
                event: PipelineEvent::StageCompleted,
            }
        );
        assert!(sm.transition(PipelineEvent::Fail).is_err());
    }

    #[test]
    fn test_done_is_terminal() {
        let mut sm = PipelineStateMachine::new();
        sm.transition(PipelineEvent::Start).unwrap();
        for _ in 0..4 {
            sm.transition(PipelineEvent::StageCompleted).unwrap();
        }
        assert!(sm.transition(PipelineEvent::Start).is_err());
        assert!(sm.transition(PipelineEvent::Fail).is_err());
    }
}
