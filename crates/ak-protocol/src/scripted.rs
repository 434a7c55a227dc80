// scripted.rs: an in-process protocol engine driven by code.
//
// ScriptedEngine keeps a goal registry in memory and never talks to a
// network. Whoever plays the action server (a test, or a simulated executor
// thread) pulls submitted goals from the inbox and pushes communication
// states, feedback and results back through the driver methods. Handlers
// run on the driver's thread with no engine lock held, the same way a real
// engine's receive loop would call them.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use crate::comm_state::CommState;
use crate::engine::{ActionEngine, FeedbackHandler, GoalHandle, TransitionHandler};
use crate::error::ProtocolError;
use crate::goal::{ActionSpec, GoalId};
use crate::status::GoalStatus;

type SharedTransition<A> = Arc<TransitionHandler<ScriptedHandle<A>>>;
type SharedFeedback<A> = Arc<FeedbackHandler<ScriptedHandle<A>, <A as ActionSpec>::Feedback>>;

struct GoalEntry<A: ActionSpec> {
    comm_state: CommState,
    status: GoalStatus,
    result: Option<A::Result>,
    cancel_requested: bool,
    on_transition: SharedTransition<A>,
    on_feedback: SharedFeedback<A>,
}

struct Registry<A: ActionSpec> {
    goals: HashMap<GoalId, GoalEntry<A>>,
    inbox: VecDeque<(GoalId, A::Goal)>,
    server_ready: bool,
    fail_next_send: Option<ProtocolError>,
    cancel_all_count: usize,
}

struct Inner<A: ActionSpec> {
    namespace: String,
    registry: Mutex<Registry<A>>,
    changed: Condvar,
}

impl<A: ActionSpec> Inner<A> {
    fn lock(&self) -> MutexGuard<'_, Registry<A>> {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait on the registry condition until `ready` holds. A zero timeout
    /// waits forever. Returns the guard and whether `ready` held.
    fn wait_until<'a>(
        &'a self,
        mut registry: MutexGuard<'a, Registry<A>>,
        timeout: Duration,
        ready: impl Fn(&Registry<A>) -> bool,
    ) -> (MutexGuard<'a, Registry<A>>, bool) {
        let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);
        while !ready(&registry) {
            registry = match deadline {
                None => self
                    .changed
                    .wait(registry)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return (registry, false);
                    }
                    self.changed
                        .wait_timeout(registry, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
        (registry, true)
    }
}

/// An [`ActionEngine`] whose server side is played by the caller.
///
/// Clones share the same registry.
pub struct ScriptedEngine<A: ActionSpec> {
    inner: Arc<Inner<A>>,
}

impl<A: ActionSpec> Clone for ScriptedEngine<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: ActionSpec> ScriptedEngine<A> {
    /// Create an engine for `namespace`. The server starts out connected.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                namespace: namespace.into(),
                registry: Mutex::new(Registry {
                    goals: HashMap::new(),
                    inbox: VecDeque::new(),
                    server_ready: true,
                    fail_next_send: None,
                    cancel_all_count: 0,
                }),
                changed: Condvar::new(),
            }),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    // ── Server side ─────────────────────────────────────────────

    pub fn set_server_ready(&self, ready: bool) {
        self.inner.lock().server_ready = ready;
        self.inner.changed.notify_all();
    }

    /// Make the next `send_goal` fail with `error`.
    pub fn fail_next_send(&self, error: ProtocolError) {
        self.inner.lock().fail_next_send = Some(error);
    }

    /// Take the oldest submitted goal without blocking.
    pub fn try_recv_goal(&self) -> Option<(GoalId, A::Goal)> {
        self.inner.lock().inbox.pop_front()
    }

    /// Take the oldest submitted goal, waiting up to `timeout` for one to
    /// arrive. A zero timeout waits forever.
    pub fn recv_goal(&self, timeout: Duration) -> Option<(GoalId, A::Goal)> {
        let registry = self.inner.lock();
        let (mut registry, _) = self
            .inner
            .wait_until(registry, timeout, |r| !r.inbox.is_empty());
        registry.inbox.pop_front()
    }

    /// Move a goal to `state` and notify its transition handler.
    ///
    /// Returns `false` if the engine does not know the goal. Works for any
    /// known goal, including ones a client no longer tracks.
    pub fn set_comm_state(&self, id: &GoalId, state: CommState) -> bool {
        let handler = {
            let mut registry = self.inner.lock();
            let Some(entry) = registry.goals.get_mut(id) else {
                tracing::debug!(goal_id = %id, "transition for unknown goal ignored");
                return false;
            };
            entry.comm_state = state;
            entry.status = match state {
                CommState::Pending => GoalStatus::Pending,
                CommState::Active => GoalStatus::Active,
                CommState::Recalling => GoalStatus::Recalling,
                CommState::Preempting => GoalStatus::Preempting,
                _ => entry.status,
            };
            Arc::clone(&entry.on_transition)
        };
        self.inner.changed.notify_all();
        handler(&self.handle(id));
        true
    }

    /// Record a terminal status and result and move the goal to `Done`.
    pub fn complete(&self, id: &GoalId, status: GoalStatus, result: Option<A::Result>) -> bool {
        {
            let mut registry = self.inner.lock();
            let Some(entry) = registry.goals.get_mut(id) else {
                return false;
            };
            entry.status = status;
            entry.result = result;
        }
        self.set_comm_state(id, CommState::Done)
    }

    /// Deliver one feedback message to the goal's feedback handler.
    pub fn publish_feedback(&self, id: &GoalId, feedback: A::Feedback) -> bool {
        let handler = {
            let registry = self.inner.lock();
            match registry.goals.get(id) {
                Some(entry) => Arc::clone(&entry.on_feedback),
                None => return false,
            }
        };
        handler(&self.handle(id), feedback);
        true
    }

    /// Drop a goal from the registry. Outstanding handles report it lost.
    pub fn forget(&self, id: &GoalId) -> bool {
        self.inner.lock().goals.remove(id).is_some()
    }

    pub fn comm_state(&self, id: &GoalId) -> Option<CommState> {
        self.inner.lock().goals.get(id).map(|e| e.comm_state)
    }

    pub fn cancel_requested(&self, id: &GoalId) -> bool {
        self.inner
            .lock()
            .goals
            .get(id)
            .is_some_and(|e| e.cancel_requested)
    }

    pub fn cancel_all_count(&self) -> usize {
        self.inner.lock().cancel_all_count
    }

    /// Number of goals the registry still knows about.
    pub fn goal_count(&self) -> usize {
        self.inner.lock().goals.len()
    }

    /// A handle to `id`, whether or not the engine still knows it.
    pub fn handle(&self, id: &GoalId) -> ScriptedHandle<A> {
        ScriptedHandle {
            id: id.clone(),
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl<A: ActionSpec> ActionEngine<A> for ScriptedEngine<A> {
    type Handle = ScriptedHandle<A>;

    fn send_goal(
        &self,
        goal: A::Goal,
        on_transition: TransitionHandler<Self::Handle>,
        on_feedback: FeedbackHandler<Self::Handle, A::Feedback>,
    ) -> Result<Self::Handle, ProtocolError> {
        let id = GoalId::new();
        {
            let mut registry = self.inner.lock();
            if let Some(error) = registry.fail_next_send.take() {
                return Err(error);
            }
            registry.goals.insert(
                id.clone(),
                GoalEntry {
                    comm_state: CommState::WaitingForGoalAck,
                    status: GoalStatus::Pending,
                    result: None,
                    cancel_requested: false,
                    on_transition: Arc::new(on_transition),
                    on_feedback: Arc::new(on_feedback),
                },
            );
            registry.inbox.push_back((id.clone(), goal));
        }
        self.inner.changed.notify_all();
        tracing::debug!(
            namespace = %self.inner.namespace,
            action = A::ACTION_TYPE,
            goal_id = %id,
            "goal sent"
        );
        Ok(self.handle(&id))
    }

    fn wait_for_server(&self, timeout: Duration) -> bool {
        let registry = self.inner.lock();
        let (_registry, ready) = self.inner.wait_until(registry, timeout, |r| r.server_ready);
        ready
    }

    fn cancel_all_goals(&self) {
        {
            let mut registry = self.inner.lock();
            registry.cancel_all_count += 1;
            for entry in registry.goals.values_mut() {
                entry.cancel_requested = true;
            }
        }
        self.inner.changed.notify_all();
    }
}

/// Handle to a goal held in a [`ScriptedEngine`] registry.
pub struct ScriptedHandle<A: ActionSpec> {
    id: GoalId,
    inner: Weak<Inner<A>>,
}

impl<A: ActionSpec> Clone for ScriptedHandle<A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<A: ActionSpec> std::fmt::Debug for ScriptedHandle<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ScriptedHandle({})", self.id)
    }
}

impl<A: ActionSpec> ScriptedHandle<A> {
    fn with_entry<T>(&self, read: impl FnOnce(&GoalEntry<A>) -> T) -> Option<T> {
        let inner = self.inner.upgrade()?;
        let registry = inner.lock();
        registry.goals.get(&self.id).map(read)
    }
}

impl<A: ActionSpec> GoalHandle<A> for ScriptedHandle<A> {
    fn goal_id(&self) -> &GoalId {
        &self.id
    }

    fn comm_state(&self) -> CommState {
        self.with_entry(|e| e.comm_state)
            .unwrap_or(CommState::Done)
    }

    fn goal_status(&self) -> GoalStatus {
        self.with_entry(|e| e.status).unwrap_or(GoalStatus::Lost)
    }

    fn result(&self) -> Option<A::Result> {
        self.with_entry(|e| e.result.clone()).flatten()
    }

    fn cancel(&self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        if let Some(entry) = inner.lock().goals.get_mut(&self.id) {
            entry.cancel_requested = true;
        }
        inner.changed.notify_all();
        tracing::debug!(goal_id = %self.id, "cancel requested");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    struct Echo;

    impl ActionSpec for Echo {
        const ACTION_TYPE: &'static str = "test/Echo";
        type Goal = String;
        type Feedback = u32;
        type Result = String;
    }

    fn send(engine: &ScriptedEngine<Echo>, goal: &str) -> ScriptedHandle<Echo> {
        engine
            .send_goal(goal.to_string(), Box::new(|_| {}), Box::new(|_, _| {}))
            .unwrap()
    }

    #[test]
    fn sent_goals_land_in_inbox_in_order() {
        let engine = ScriptedEngine::<Echo>::new("echo");
        let a = send(&engine, "a");
        let b = send(&engine, "b");
        assert_eq!(engine.try_recv_goal(), Some((a.goal_id().clone(), "a".to_string())));
        assert_eq!(engine.try_recv_goal(), Some((b.goal_id().clone(), "b".to_string())));
        assert!(engine.try_recv_goal().is_none());
        assert_eq!(a.comm_state(), CommState::WaitingForGoalAck);
    }

    #[test]
    fn transitions_reach_the_handler_and_the_handle() {
        let engine = ScriptedEngine::<Echo>::new("echo");
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let handle = engine
            .send_goal(
                "x".to_string(),
                Box::new(move |_| {
                    seen.fetch_add(1, Ordering::SeqCst);
                }),
                Box::new(|_, _| {}),
            )
            .unwrap();

        assert!(engine.set_comm_state(handle.goal_id(), CommState::Active));
        assert_eq!(handle.goal_status(), GoalStatus::Active);
        assert!(engine.complete(
            handle.goal_id(),
            GoalStatus::Succeeded,
            Some("ok".to_string())
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(handle.comm_state(), CommState::Done);
        assert_eq!(handle.goal_status(), GoalStatus::Succeeded);
        assert_eq!(handle.result(), Some("ok".to_string()));
    }

    #[test]
    fn forgotten_goals_read_as_lost() {
        let engine = ScriptedEngine::<Echo>::new("echo");
        let handle = send(&engine, "x");
        assert!(engine.forget(handle.goal_id()));
        assert_eq!(handle.comm_state(), CommState::Done);
        assert_eq!(handle.goal_status(), GoalStatus::Lost);
        assert!(handle.result().is_none());
        assert!(!engine.set_comm_state(handle.goal_id(), CommState::Active));
    }

    #[test]
    fn injected_send_failure_is_returned_once() {
        let engine = ScriptedEngine::<Echo>::new("echo");
        engine.fail_next_send(ProtocolError::Transport("link down".into()));
        let first = engine.send_goal("x".into(), Box::new(|_| {}), Box::new(|_, _| {}));
        assert!(matches!(first, Err(ProtocolError::Transport(_))));
        assert!(engine
            .send_goal("y".into(), Box::new(|_| {}), Box::new(|_, _| {}))
            .is_ok());
    }

    #[test]
    fn cancel_requests_are_recorded() {
        let engine = ScriptedEngine::<Echo>::new("echo");
        let a = send(&engine, "a");
        let b = send(&engine, "b");
        a.cancel();
        assert!(engine.cancel_requested(a.goal_id()));
        assert!(!engine.cancel_requested(b.goal_id()));
        engine.cancel_all_goals();
        assert!(engine.cancel_requested(b.goal_id()));
        assert_eq!(engine.cancel_all_count(), 1);
    }

    #[test]
    fn wait_for_server_times_out_then_succeeds() {
        let engine = ScriptedEngine::<Echo>::new("echo");
        engine.set_server_ready(false);
        assert!(!engine.wait_for_server(Duration::from_millis(20)));

        let server = engine.clone();
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            server.set_server_ready(true);
        });
        assert!(engine.wait_for_server(Duration::ZERO));
        t.join().unwrap();
    }

    #[test]
    fn recv_goal_blocks_until_a_goal_arrives() {
        let engine = ScriptedEngine::<Echo>::new("echo");
        assert!(engine.recv_goal(Duration::from_millis(10)).is_none());

        let client = engine.clone();
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            send(&client, "late");
        });
        let (_, goal) = engine.recv_goal(Duration::from_secs(5)).unwrap();
        assert_eq!(goal, "late");
        t.join().unwrap();
    }
}
