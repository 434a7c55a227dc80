// callbacks.rs: the user callbacks registered with a goal.

use std::sync::Arc;

use ak_protocol::{ActionSpec, GoalStatus};

/// Called once when the goal finishes, with its terminal status and result.
pub type DoneCallback<A> =
    Arc<dyn Fn(GoalStatus, Option<<A as ActionSpec>::Result>) + Send + Sync>;

/// Called once when the goal starts running.
pub type ActiveCallback = Arc<dyn Fn() + Send + Sync>;

/// Called for each feedback message while the goal runs.
pub type FeedbackCallback<A> = Arc<dyn Fn(<A as ActionSpec>::Feedback) + Send + Sync>;

/// Callbacks for one submitted goal. All are optional.
///
/// Callbacks run on whichever thread delivers the notification, never while
/// the client's lock is held, so they may call back into the client.
///
/// ```ignore
/// let callbacks = GoalCallbacks::<Fibonacci>::new()
///     .on_active(|| println!("started"))
///     .on_feedback(|fb| println!("partial: {:?}", fb.sequence))
///     .on_done(|status, result| println!("{status}: {result:?}"));
/// ```
pub struct GoalCallbacks<A: ActionSpec> {
    pub(crate) on_done: Option<DoneCallback<A>>,
    pub(crate) on_active: Option<ActiveCallback>,
    pub(crate) on_feedback: Option<FeedbackCallback<A>>,
}

impl<A: ActionSpec> GoalCallbacks<A> {
    /// No callbacks.
    pub fn new() -> Self {
        Self {
            on_done: None,
            on_active: None,
            on_feedback: None,
        }
    }

    pub fn on_done(
        mut self,
        callback: impl Fn(GoalStatus, Option<A::Result>) + Send + Sync + 'static,
    ) -> Self {
        self.on_done = Some(Arc::new(callback));
        self
    }

    pub fn on_active(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_active = Some(Arc::new(callback));
        self
    }

    pub fn on_feedback(mut self, callback: impl Fn(A::Feedback) + Send + Sync + 'static) -> Self {
        self.on_feedback = Some(Arc::new(callback));
        self
    }
}

impl<A: ActionSpec> Default for GoalCallbacks<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ActionSpec> Clone for GoalCallbacks<A> {
    fn clone(&self) -> Self {
        Self {
            on_done: self.on_done.clone(),
            on_active: self.on_active.clone(),
            on_feedback: self.on_feedback.clone(),
        }
    }
}
