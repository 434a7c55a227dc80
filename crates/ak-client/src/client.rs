// client.rs: SimpleActionClient, the single-goal facade over an engine.
//
// The client tracks at most one goal: the one submitted last. Submitting a
// new goal forgets the previous one without cancelling it. Callers see the
// goal's life as Pending → Active → Done and can block until Done.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ak_protocol::{
    ActionEngine, ActionSpec, FeedbackHandler, GoalHandle, GoalId, GoalStatus, ShutdownToken,
    TransitionHandler,
};

use crate::callbacks::GoalCallbacks;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::events::{EventDispatcher, EventSink, GoalEvent, JsonlSink};
use crate::state::SimpleGoalState;
use crate::tracker::Shared;

/// Tracks one goal at a time on an action namespace.
///
/// All methods take `&self`; share the client across threads with an `Arc`.
pub struct SimpleActionClient<A: ActionSpec, E: ActionEngine<A>> {
    engine: E,
    shared: Arc<Shared<A, E::Handle>>,
    config: ClientConfig,
    shutdown: ShutdownToken,
}

/// Builder for [`SimpleActionClient`].
pub struct ClientBuilder<A: ActionSpec, E: ActionEngine<A>> {
    namespace: String,
    engine: E,
    config: ClientConfig,
    shutdown: ShutdownToken,
    events: EventDispatcher,
    _spec: PhantomData<fn() -> A>,
}

impl<A: ActionSpec, E: ActionEngine<A>> ClientBuilder<A, E> {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Observe `token` instead of the process-wide shutdown token.
    pub fn shutdown(mut self, token: ShutdownToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.events.add_sink(sink);
        self
    }

    pub fn build(mut self) -> SimpleActionClient<A, E> {
        if let Some(path) = &self.config.events_log {
            self.events.add_sink(Box::new(JsonlSink::new(path)));
        }
        tracing::debug!(
            namespace = %self.namespace,
            action = A::ACTION_TYPE,
            "action client created"
        );
        SimpleActionClient {
            engine: self.engine,
            shared: Arc::new(Shared::new(self.namespace, self.events)),
            config: self.config,
            shutdown: self.shutdown,
        }
    }
}

impl<A: ActionSpec, E: ActionEngine<A>> SimpleActionClient<A, E> {
    /// Create a client for the action on `namespace`, with default config.
    pub fn new(namespace: impl Into<String>, engine: E) -> Self {
        Self::builder(namespace, engine).build()
    }

    pub fn builder(namespace: impl Into<String>, engine: E) -> ClientBuilder<A, E> {
        ClientBuilder {
            namespace: namespace.into(),
            engine,
            config: ClientConfig::default(),
            shutdown: ShutdownToken::process(),
            events: EventDispatcher::new(),
            _spec: PhantomData,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.shared.namespace
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Block until the action server is connected. A zero timeout waits
    /// forever. Returns `false` on timeout.
    pub fn await_server_ready(&self, timeout: Duration) -> bool {
        self.engine.wait_for_server(timeout)
    }

    /// Send a goal and start tracking it.
    ///
    /// Any goal tracked so far is forgotten, not cancelled: its callbacks
    /// stop firing and its notifications are ignored from here on.
    pub fn submit(&self, goal: A::Goal, callbacks: GoalCallbacks<A>) -> Result<(), ClientError> {
        let generation = {
            let mut tracker = self.shared.lock();
            if let Some(previous) = tracker.release() {
                if let Some(handle) = &previous.handle {
                    tracing::debug!(
                        namespace = %self.shared.namespace,
                        goal_id = %handle.goal_id(),
                        "forgetting tracked goal without cancelling it"
                    );
                }
            }
            let generation = tracker.begin(callbacks);
            tracker.emit(|| GoalEvent::goal_submitted(&self.shared.namespace, A::ACTION_TYPE));
            generation
        };
        self.shared.flush();

        // The engine's registry must not keep the client alive.
        let on_transition: TransitionHandler<E::Handle> = {
            let shared = Arc::downgrade(&self.shared);
            Box::new(move |handle: &E::Handle| {
                if let Some(shared) = shared.upgrade() {
                    shared.on_transition(generation, handle);
                }
            })
        };
        let on_feedback: FeedbackHandler<E::Handle, A::Feedback> = {
            let shared = Arc::downgrade(&self.shared);
            Box::new(move |handle: &E::Handle, feedback: A::Feedback| {
                if let Some(shared) = shared.upgrade() {
                    shared.on_feedback(generation, handle, feedback);
                }
            })
        };

        match self.engine.send_goal(goal, on_transition, on_feedback) {
            Ok(handle) => {
                let cancel_now = {
                    let mut tracker = self.shared.lock();
                    match tracker.tracked.as_mut() {
                        Some(tracked) if tracked.generation == generation => {
                            tracked.handle = Some(handle.clone());
                            std::mem::take(&mut tracked.cancel_on_send)
                        }
                        _ => {
                            tracing::debug!(
                                namespace = %self.shared.namespace,
                                goal_id = %handle.goal_id(),
                                "goal was replaced before its send completed"
                            );
                            false
                        }
                    }
                };
                tracing::info!(
                    namespace = %self.shared.namespace,
                    action = A::ACTION_TYPE,
                    goal_id = %handle.goal_id(),
                    "goal submitted"
                );
                if cancel_now {
                    handle.cancel();
                }
                Ok(())
            }
            Err(source) => {
                {
                    let mut tracker = self.shared.lock();
                    if tracker.is_current(generation) {
                        tracker.release();
                    }
                }
                self.shared.wake_waiters();
                tracing::error!(
                    namespace = %self.shared.namespace,
                    "failed to send goal: {}",
                    source
                );
                Err(ClientError::SendFailed {
                    namespace: self.shared.namespace.clone(),
                    source,
                })
            }
        }
    }

    /// Block until the tracked goal is done and its `on_done` callback has
    /// returned.
    ///
    /// Called from inside one of this client's callbacks, it returns `true`
    /// as soon as the goal is done, since the callback cannot finish first.
    ///
    /// A zero timeout waits with no time bound. Returns `false` on timeout,
    /// on shutdown, if tracking stops while waiting, or at once if no goal is
    /// tracked. A goal submitted while waiting replaces the one waited on.
    pub fn await_result(&self, timeout: Duration) -> bool {
        let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);
        let mut tracker = self.shared.lock();
        if tracker.tracked.is_none() {
            tracing::error!(
                namespace = %self.shared.namespace,
                "await_result called when no goal is tracked"
            );
            return false;
        }

        loop {
            if tracker.simple_state == SimpleGoalState::Done
                && (tracker.done_delivered || tracker.delivering_on_current_thread())
            {
                return true;
            }
            if tracker.tracked.is_none() {
                tracing::debug!(
                    namespace = %self.shared.namespace,
                    "tracking stopped while waiting for result"
                );
                return false;
            }
            if self.shutdown.is_triggered() {
                tracing::debug!(
                    namespace = %self.shared.namespace,
                    "shutdown while waiting for result"
                );
                return false;
            }

            let mut slice = self.config.wait_slice();
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return false;
                }
                slice = slice.min(deadline - now);
            }
            tracker = self.shared.wait_done(tracker, slice);
        }
    }

    /// Submit a goal and wait for it. If it does not finish within
    /// `execute_timeout`, cancel it and wait up to `preempt_timeout` for the
    /// cancellation to land. Zero timeouts wait forever.
    ///
    /// Returns the goal's status at the end, as [`current_status`] reports
    /// it.
    ///
    /// [`current_status`]: SimpleActionClient::current_status
    pub fn submit_and_wait(
        &self,
        goal: A::Goal,
        execute_timeout: Duration,
        preempt_timeout: Duration,
    ) -> Result<GoalStatus, ClientError> {
        self.submit(goal, GoalCallbacks::new())?;
        if !self.await_result(execute_timeout) {
            tracing::info!(
                namespace = %self.shared.namespace,
                "goal did not finish within {:?}, cancelling",
                execute_timeout
            );
            self.cancel();
            if self.await_result(preempt_timeout) {
                tracing::debug!(namespace = %self.shared.namespace, "preempt finished in time");
            } else {
                tracing::debug!(
                    namespace = %self.shared.namespace,
                    "preempt did not finish within {:?}",
                    preempt_timeout
                );
            }
        }
        Ok(self.current_status())
    }

    /// The simplified state of the tracked goal; `Done` when nothing is
    /// tracked.
    pub fn simple_state(&self) -> SimpleGoalState {
        let tracker = self.shared.lock();
        match tracker.tracked {
            Some(_) => tracker.simple_state,
            None => SimpleGoalState::Done,
        }
    }

    /// Status of the tracked goal as the server reports it, with `Recalling`
    /// read as `Pending` and `Preempting` as `Active`.
    ///
    /// Returns `Lost` if no goal is tracked, and `Pending` while the goal
    /// is still being sent.
    pub fn current_status(&self) -> GoalStatus {
        let handle = {
            let tracker = self.shared.lock();
            match tracker.tracked.as_ref() {
                Some(tracked) => tracked.handle.clone(),
                None => {
                    tracing::error!(
                        namespace = %self.shared.namespace,
                        "current_status called when no goal is tracked"
                    );
                    return GoalStatus::Lost;
                }
            }
        };
        match handle {
            Some(handle) => handle.goal_status().folded(),
            None => GoalStatus::Pending,
        }
    }

    /// The result of the tracked goal, once it has one.
    pub fn current_result(&self) -> Option<A::Result> {
        let handle = {
            let tracker = self.shared.lock();
            match tracker.tracked.as_ref() {
                Some(tracked) => tracked.handle.clone(),
                None => {
                    tracing::error!(
                        namespace = %self.shared.namespace,
                        "current_result called when no goal is tracked"
                    );
                    return None;
                }
            }
        };
        handle.and_then(|h| h.result())
    }

    /// Id of the tracked goal, once the engine has assigned one.
    pub fn goal_id(&self) -> Option<GoalId> {
        let tracker = self.shared.lock();
        tracker
            .tracked
            .as_ref()
            .and_then(|t| t.handle.as_ref())
            .map(|h| h.goal_id().clone())
    }

    pub fn is_tracking(&self) -> bool {
        self.shared.lock().tracked.is_some()
    }

    /// Ask the server to cancel the tracked goal. The goal stays tracked;
    /// its terminal status arrives through the usual notifications.
    pub fn cancel(&self) {
        let handle = {
            let mut tracker = self.shared.lock();
            let Some(tracked) = tracker.tracked.as_mut() else {
                tracing::warn!(
                    namespace = %self.shared.namespace,
                    "cancel called when no goal is tracked"
                );
                return;
            };
            match &tracked.handle {
                Some(handle) => handle.clone(),
                None => {
                    tracked.cancel_on_send = true;
                    return;
                }
            }
        };
        handle.cancel();
    }

    /// Ask the server to cancel every goal it runs, tracked or not.
    pub fn cancel_all(&self) {
        self.engine.cancel_all_goals();
    }

    /// Forget the tracked goal without cancelling it. Its callbacks stop
    /// firing and blocked waiters return `false`.
    ///
    /// A notification the engine is delivering at this very moment may
    /// still have its callbacks run.
    pub fn stop_tracking(&self) {
        {
            let mut tracker = self.shared.lock();
            let Some(previous) = tracker.release() else {
                return;
            };
            let goal_id = previous.handle.as_ref().map(|h| h.goal_id().clone());
            tracing::debug!(namespace = %self.shared.namespace, "stopped tracking goal");
            tracker.emit(|| GoalEvent::tracking_stopped(&self.shared.namespace, goal_id.as_ref()));
        }
        self.shared.wake_waiters();
        self.shared.flush();
    }
}
