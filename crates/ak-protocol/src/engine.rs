// engine.rs: the interfaces a protocol engine exposes to action clients.

use std::time::Duration;

use crate::comm_state::CommState;
use crate::error::ProtocolError;
use crate::goal::{ActionSpec, GoalId};
use crate::status::GoalStatus;

/// Invoked by the engine whenever the communication state of a goal changes.
pub type TransitionHandler<H> = Box<dyn Fn(&H) + Send + Sync>;

/// Invoked by the engine for every feedback message published for a goal.
pub type FeedbackHandler<H, F> = Box<dyn Fn(&H, F) + Send + Sync>;

/// A reference to one outstanding goal.
///
/// Handles are cheap to clone. The goal's state lives in the engine's
/// registry; a handle only reads it, so a handle may outlive the engine's
/// interest in the goal. Once the engine forgets a goal its handles report
/// [`CommState::Done`] and [`GoalStatus::Lost`].
pub trait GoalHandle<A: ActionSpec>: Clone + Send + Sync + 'static {
    fn goal_id(&self) -> &GoalId;

    fn comm_state(&self) -> CommState;

    fn goal_status(&self) -> GoalStatus;

    /// The result, once one has been received.
    fn result(&self) -> Option<A::Result>;

    /// Ask the server to cancel this goal. Fire-and-forget.
    fn cancel(&self);
}

/// Owns the transport for one action namespace.
///
/// Handlers passed to [`send_goal`](ActionEngine::send_goal) may be invoked
/// from any thread, including the caller's thread before `send_goal`
/// returns. Engines must not hold their own locks while invoking handlers.
pub trait ActionEngine<A: ActionSpec>: Send + Sync {
    type Handle: GoalHandle<A>;

    /// Send a goal to the action server and register its handlers.
    fn send_goal(
        &self,
        goal: A::Goal,
        on_transition: TransitionHandler<Self::Handle>,
        on_feedback: FeedbackHandler<Self::Handle, A::Feedback>,
    ) -> Result<Self::Handle, ProtocolError>;

    /// Block until an action server is connected. A zero timeout waits
    /// forever. Returns `false` on timeout.
    fn wait_for_server(&self, timeout: Duration) -> bool;

    /// Ask the server to cancel every goal it is running, from any client.
    fn cancel_all_goals(&self);
}
