// status.rs: goal status codes reported by the action server.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of a goal as reported by the action server.
///
/// The discriminants are the wire codes of the action protocol. Only
/// `Preempted`, `Succeeded`, `Aborted`, `Rejected`, `Recalled` and `Lost`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum GoalStatus {
    Pending = 0,
    Active = 1,
    Preempted = 2,
    Succeeded = 3,
    Aborted = 4,
    Rejected = 5,
    Preempting = 6,
    Recalling = 7,
    Recalled = 8,
    /// The engine lost track of the goal (no status from the server).
    Lost = 9,
}

impl GoalStatus {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        let status = match code {
            0 => GoalStatus::Pending,
            1 => GoalStatus::Active,
            2 => GoalStatus::Preempted,
            3 => GoalStatus::Succeeded,
            4 => GoalStatus::Aborted,
            5 => GoalStatus::Rejected,
            6 => GoalStatus::Preempting,
            7 => GoalStatus::Recalling,
            8 => GoalStatus::Recalled,
            9 => GoalStatus::Lost,
            _ => return None,
        };
        Some(status)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            GoalStatus::Preempted
                | GoalStatus::Succeeded
                | GoalStatus::Aborted
                | GoalStatus::Rejected
                | GoalStatus::Recalled
                | GoalStatus::Lost
        )
    }

    /// Fold the cancellation-in-progress statuses into the state they
    /// cancel from: `Recalling` reads as `Pending`, `Preempting` as `Active`.
    pub fn folded(self) -> Self {
        match self {
            GoalStatus::Recalling => GoalStatus::Pending,
            GoalStatus::Preempting => GoalStatus::Active,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GoalStatus::Pending => "PENDING",
            GoalStatus::Active => "ACTIVE",
            GoalStatus::Preempted => "PREEMPTED",
            GoalStatus::Succeeded => "SUCCEEDED",
            GoalStatus::Aborted => "ABORTED",
            GoalStatus::Rejected => "REJECTED",
            GoalStatus::Preempting => "PREEMPTING",
            GoalStatus::Recalling => "RECALLING",
            GoalStatus::Recalled => "RECALLED",
            GoalStatus::Lost => "LOST",
        }
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_wire_values() {
        assert_eq!(GoalStatus::Pending.code(), 0);
        assert_eq!(GoalStatus::Succeeded.code(), 3);
        assert_eq!(GoalStatus::Lost.code(), 9);
        for code in 0..=9 {
            assert_eq!(GoalStatus::from_code(code).unwrap().code(), code);
        }
        assert!(GoalStatus::from_code(10).is_none());
    }

    #[test]
    fn terminal_statuses() {
        assert!(GoalStatus::Succeeded.is_terminal());
        assert!(GoalStatus::Lost.is_terminal());
        assert!(GoalStatus::Recalled.is_terminal());
        assert!(!GoalStatus::Active.is_terminal());
        assert!(!GoalStatus::Preempting.is_terminal());
    }

    #[test]
    fn folding_only_touches_cancel_in_progress() {
        assert_eq!(GoalStatus::Recalling.folded(), GoalStatus::Pending);
        assert_eq!(GoalStatus::Preempting.folded(), GoalStatus::Active);
        assert_eq!(GoalStatus::Preempted.folded(), GoalStatus::Preempted);
        assert_eq!(GoalStatus::Succeeded.folded(), GoalStatus::Succeeded);
    }
}
