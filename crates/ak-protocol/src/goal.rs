// goal.rs: goal identity and the action message-type descriptor.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Describes the message types of one kind of action.
///
/// Clients and engines are generic over an `ActionSpec`, so a goal of the
/// wrong type cannot be sent to an engine that carries another action.
pub trait ActionSpec: Send + Sync + 'static {
    /// Type name of the action, used in logs (e.g. `"nav/MoveBase"`).
    const ACTION_TYPE: &'static str;

    /// The request sent to the executor.
    type Goal: Send + 'static;

    /// Intermediate progress published while the goal runs.
    type Feedback: Send + 'static;

    /// The outcome payload delivered once the goal is done.
    type Result: Clone + Send + 'static;
}

/// Opaque identifier of one submitted goal.
///
/// Two goal handles refer to the same goal exactly when their ids are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoalId(Uuid);

impl GoalId {
    /// Generate a fresh, random goal id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for GoalId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for GoalId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for GoalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
