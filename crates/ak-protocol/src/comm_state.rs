// comm_state.rs: the engine's fine-grained view of one goal.
//
// The engine walks every goal through these states as acknowledgements,
// status updates and results arrive from the action server:
//
//   WaitingForGoalAck → Pending → Active → WaitingForResult → Done
//                         ↘ Recalling ↗    ↘ Preempting ↗
//   (WaitingForCancelAck after a cancel request, from Pending or Active)

use std::fmt;

use serde::{Deserialize, Serialize};

/// Communication state of a goal as tracked by the protocol engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommState {
    /// Goal sent, server has not acknowledged it yet.
    WaitingForGoalAck,

    /// Server acknowledged the goal but has not started it.
    Pending,

    /// Server is executing the goal.
    Active,

    /// Server reported a terminal status, result not received yet.
    WaitingForResult,

    /// Cancel sent, server has not acknowledged it yet.
    WaitingForCancelAck,

    /// Server is cancelling a goal it never started.
    Recalling,

    /// Server is cancelling a goal it already started.
    Preempting,

    /// Terminal status and result are both known.
    Done,
}

impl CommState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommState::WaitingForGoalAck => "WAITING_FOR_GOAL_ACK",
            CommState::Pending => "PENDING",
            CommState::Active => "ACTIVE",
            CommState::WaitingForResult => "WAITING_FOR_RESULT",
            CommState::WaitingForCancelAck => "WAITING_FOR_CANCEL_ACK",
            CommState::Recalling => "RECALLING",
            CommState::Preempting => "PREEMPTING",
            CommState::Done => "DONE",
        }
    }
}

impl fmt::Display for CommState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
