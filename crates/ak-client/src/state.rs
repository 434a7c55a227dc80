// state.rs: the simplified goal lifecycle and its projection from CommState.
//
// Callers only see three states:
//   Pending → Active → Done
//   Pending → Done          (rejected, recalled or lost before it started)
//
// The engine's acknowledgement bookkeeping (WaitingForGoalAck,
// WaitingForResult, WaitingForCancelAck) never shows up here. Within one
// tracked goal the state only moves forward; anything that would move it
// backwards is a protocol violation and is ignored.

use std::fmt;

use ak_protocol::CommState;
use serde::{Deserialize, Serialize};

/// The lifecycle state of the tracked goal as callers see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimpleGoalState {
    /// Submitted, not yet started by the server.
    Pending,

    /// The server is working on the goal.
    Active,

    /// The goal reached a terminal status.
    Done,
}

impl SimpleGoalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimpleGoalState::Pending => "pending",
            SimpleGoalState::Active => "active",
            SimpleGoalState::Done => "done",
        }
    }
}

impl fmt::Display for SimpleGoalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a notification was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// The communication state cannot follow the current simple state.
    UnexpectedState,

    /// A second `Done` for a goal that already finished.
    DuplicateDone,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::UnexpectedState => write!(f, "unexpected_state"),
            ViolationKind::DuplicateDone => write!(f, "duplicate_done"),
        }
    }
}

/// What a communication-state notification does to the simple state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Nothing visible changes.
    Unchanged,

    /// Pending → Active; `on_active` fires.
    Activate,

    /// → Done; `on_done` fires and waiters wake.
    Complete,

    /// The notification does not fit the lifecycle. Report and ignore.
    Violation(ViolationKind),
}

/// Project a communication-state notification onto the simple state.
pub fn project(comm: CommState, current: SimpleGoalState) -> Projection {
    use SimpleGoalState::{Active, Done, Pending};

    match (comm, current) {
        (CommState::Active | CommState::Preempting, Pending) => Projection::Activate,
        (CommState::Active | CommState::Preempting, Active) => Projection::Unchanged,
        (CommState::Active | CommState::Preempting, Done) => {
            Projection::Violation(ViolationKind::UnexpectedState)
        }

        (CommState::Recalling, Pending) => Projection::Unchanged,
        (CommState::Recalling, Active | Done) => {
            Projection::Violation(ViolationKind::UnexpectedState)
        }

        (CommState::Done, Pending | Active) => Projection::Complete,
        (CommState::Done, Done) => Projection::Violation(ViolationKind::DuplicateDone),

        (
            CommState::WaitingForGoalAck
            | CommState::Pending
            | CommState::WaitingForResult
            | CommState::WaitingForCancelAck,
            _,
        ) => Projection::Unchanged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_COMM: [CommState; 8] = [
        CommState::WaitingForGoalAck,
        CommState::Pending,
        CommState::Active,
        CommState::WaitingForResult,
        CommState::WaitingForCancelAck,
        CommState::Recalling,
        CommState::Preempting,
        CommState::Done,
    ];

    fn apply(state: SimpleGoalState, comm: CommState) -> SimpleGoalState {
        match project(comm, state) {
            Projection::Activate => SimpleGoalState::Active,
            Projection::Complete => SimpleGoalState::Done,
            Projection::Unchanged | Projection::Violation(_) => state,
        }
    }

    #[test]
    fn active_and_preempting_start_a_pending_goal() {
        assert_eq!(
            project(CommState::Active, SimpleGoalState::Pending),
            Projection::Activate
        );
        assert_eq!(
            project(CommState::Preempting, SimpleGoalState::Pending),
            Projection::Activate
        );
        assert_eq!(
            project(CommState::Active, SimpleGoalState::Active),
            Projection::Unchanged
        );
    }

    #[test]
    fn recalling_is_only_valid_while_pending() {
        assert_eq!(
            project(CommState::Recalling, SimpleGoalState::Pending),
            Projection::Unchanged
        );
        assert_eq!(
            project(CommState::Recalling, SimpleGoalState::Active),
            Projection::Violation(ViolationKind::UnexpectedState)
        );
        assert_eq!(
            project(CommState::Recalling, SimpleGoalState::Done),
            Projection::Violation(ViolationKind::UnexpectedState)
        );
    }

    #[test]
    fn done_completes_once() {
        assert_eq!(
            project(CommState::Done, SimpleGoalState::Pending),
            Projection::Complete
        );
        assert_eq!(
            project(CommState::Done, SimpleGoalState::Active),
            Projection::Complete
        );
        assert_eq!(
            project(CommState::Done, SimpleGoalState::Done),
            Projection::Violation(ViolationKind::DuplicateDone)
        );
    }

    #[test]
    fn nothing_reopens_a_finished_goal() {
        for comm in ALL_COMM {
            assert_eq!(apply(SimpleGoalState::Done, comm), SimpleGoalState::Done);
        }
    }

    #[test]
    fn bookkeeping_states_are_invisible() {
        for state in [
            SimpleGoalState::Pending,
            SimpleGoalState::Active,
            SimpleGoalState::Done,
        ] {
            for comm in [
                CommState::WaitingForGoalAck,
                CommState::Pending,
                CommState::WaitingForResult,
                CommState::WaitingForCancelAck,
            ] {
                assert_eq!(project(comm, state), Projection::Unchanged);
            }
        }
    }

    #[test]
    fn projection_never_regresses() {
        // Walk every pair of notifications from every start state.
        for start in [
            SimpleGoalState::Pending,
            SimpleGoalState::Active,
            SimpleGoalState::Done,
        ] {
            for first in ALL_COMM {
                for second in ALL_COMM {
                    let a = apply(start, first);
                    let b = apply(a, second);
                    assert!(a >= start && b >= a, "{start} -{first}-> {a} -{second}-> {b}");
                }
            }
        }
    }

    #[test]
    fn state_display_format() {
        assert_eq!(SimpleGoalState::Pending.to_string(), "pending");
        assert_eq!(SimpleGoalState::Active.to_string(), "active");
        assert_eq!(SimpleGoalState::Done.to_string(), "done");
        assert_eq!(ViolationKind::DuplicateDone.to_string(), "duplicate_done");
    }
}
