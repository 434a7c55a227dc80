// tracker.rs: shared state of a client and the notification path into it.
//
// The protocol engine calls into `Shared` from its own threads. Every field
// that changes lives in one `Tracker` behind one mutex. State changes never
// invoke user code directly: they queue a `Notice` in the tracker's outbox
// and `flush()` delivers queued notices in order after the lock is dropped.
// Only one thread drains at a time, so callbacks for one client never run
// concurrently and a callback that re-enters the client just adds to the
// queue the current drainer is working through.
//
// Each submission gets a generation number. The handlers registered with
// the engine carry it, and a notification only counts if its generation is
// the tracked one. Notifications for replaced or released goals, and for
// goals whose send failed, fall through.
//
// A goal counts as finished for waiters only once its on_done callback has
// returned. The Done notice is queued after every notice before it, so by
// then all earlier callbacks of the goal have run too.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::Duration;

use ak_protocol::{ActionSpec, CommState, GoalHandle, GoalId, GoalStatus};

use crate::callbacks::{ActiveCallback, DoneCallback, FeedbackCallback, GoalCallbacks};
use crate::events::{EventDispatcher, GoalEvent};
use crate::state::{project, Projection, SimpleGoalState, ViolationKind};

/// Work queued for delivery outside the lock.
pub(crate) enum Notice<A: ActionSpec> {
    Active(ActiveCallback),
    Done {
        callback: Option<DoneCallback<A>>,
        status: GoalStatus,
        result: Option<A::Result>,
        generation: u64,
    },
    Feedback(FeedbackCallback<A>, A::Feedback),
    Event(GoalEvent),
}

/// The goal currently being tracked.
pub(crate) struct Tracked<H> {
    pub(crate) generation: u64,
    /// `None` while `send_goal` has not returned yet.
    pub(crate) handle: Option<H>,
    /// Cancel requested before the handle was known.
    pub(crate) cancel_on_send: bool,
}

pub(crate) struct Tracker<A: ActionSpec, H> {
    pub(crate) simple_state: SimpleGoalState,
    pub(crate) tracked: Option<Tracked<H>>,
    /// The tracked goal is done and its `on_done` has returned.
    pub(crate) done_delivered: bool,
    callbacks: GoalCallbacks<A>,
    next_generation: u64,
    outbox: VecDeque<Notice<A>>,
    /// Thread currently delivering the outbox.
    drainer: Option<ThreadId>,
    record_events: bool,
}

impl<A: ActionSpec, H> Tracker<A, H> {
    /// Start tracking a new submission and return its generation.
    pub(crate) fn begin(&mut self, callbacks: GoalCallbacks<A>) -> u64 {
        self.next_generation += 1;
        self.callbacks = callbacks;
        self.simple_state = SimpleGoalState::Pending;
        self.done_delivered = false;
        self.tracked = Some(Tracked {
            generation: self.next_generation,
            handle: None,
            cancel_on_send: false,
        });
        self.next_generation
    }

    /// Stop tracking whatever is tracked. Queued notices still go out.
    pub(crate) fn release(&mut self) -> Option<Tracked<H>> {
        self.callbacks = GoalCallbacks::new();
        self.tracked.take()
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.tracked
            .as_ref()
            .is_some_and(|t| t.generation == generation)
    }

    /// True when called from inside one of this client's callbacks.
    pub(crate) fn delivering_on_current_thread(&self) -> bool {
        self.drainer == Some(thread::current().id())
    }

    pub(crate) fn emit(&mut self, event: impl FnOnce() -> GoalEvent) {
        if self.record_events {
            self.outbox.push_back(Notice::Event(event()));
        }
    }

    fn post(&mut self, notice: Notice<A>) {
        self.outbox.push_back(notice);
    }

    fn advance(&mut self, namespace: &str, goal_id: &GoalId, to: SimpleGoalState) {
        let from = std::mem::replace(&mut self.simple_state, to);
        tracing::debug!(namespace, goal_id = %goal_id, "goal {} -> {}", from, to);
        self.emit(|| GoalEvent::state_changed(namespace, goal_id, from, to));
    }
}

pub(crate) struct Shared<A: ActionSpec, H> {
    pub(crate) namespace: String,
    state: Mutex<Tracker<A, H>>,
    done: Condvar,
    events: EventDispatcher,
}

impl<A: ActionSpec, H> Shared<A, H> {
    pub(crate) fn new(namespace: String, events: EventDispatcher) -> Self {
        let record_events = !events.is_empty();
        Self {
            namespace,
            state: Mutex::new(Tracker {
                simple_state: SimpleGoalState::Done,
                tracked: None,
                done_delivered: false,
                callbacks: GoalCallbacks::new(),
                next_generation: 0,
                outbox: VecDeque::new(),
                drainer: None,
                record_events,
            }),
            done: Condvar::new(),
            events,
        }
    }

    /// Lock the tracker. The tracker stays consistent even if a thread
    /// panicked while holding it (no user code runs under the lock), so a
    /// poisoned lock is taken over.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Tracker<A, H>> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!(namespace = %self.namespace, "recovering poisoned client lock");
            poisoned.into_inner()
        })
    }

    /// Release the lock for at most `slice` or until the completion
    /// condition is signalled, then reacquire it.
    pub(crate) fn wait_done<'a>(
        &'a self,
        tracker: MutexGuard<'a, Tracker<A, H>>,
        slice: Duration,
    ) -> MutexGuard<'a, Tracker<A, H>> {
        self.done
            .wait_timeout(tracker, slice)
            .map(|(guard, _)| guard)
            .unwrap_or_else(|poisoned| poisoned.into_inner().0)
    }

    /// Wake every thread blocked in `wait_done`.
    pub(crate) fn wake_waiters(&self) {
        self.done.notify_all();
    }

    /// Deliver queued notices, in order, with no lock held.
    ///
    /// Returns at once if another thread (or an outer frame of this one) is
    /// already draining; that drainer picks up whatever was queued.
    pub(crate) fn flush(&self) {
        {
            let mut tracker = self.lock();
            if tracker.drainer.is_some() || tracker.outbox.is_empty() {
                return;
            }
            tracker.drainer = Some(thread::current().id());
        }

        let mut guard = DrainGuard {
            shared: self,
            finished: false,
        };
        loop {
            let next = {
                let mut tracker = self.lock();
                let next = tracker.outbox.pop_front();
                if next.is_none() {
                    tracker.drainer = None;
                }
                next
            };
            match next {
                Some(notice) => self.deliver(notice),
                None => break,
            }
        }
        guard.finished = true;
    }

    fn deliver(&self, notice: Notice<A>) {
        match notice {
            Notice::Active(callback) => callback(),
            Notice::Done {
                callback,
                status,
                result,
                generation,
            } => {
                let _delivered = DoneDelivered {
                    shared: self,
                    generation,
                };
                if let Some(callback) = callback {
                    callback(status, result);
                }
            }
            Notice::Feedback(callback, feedback) => callback(feedback),
            Notice::Event(event) => self.events.dispatch(&event),
        }
    }
}

impl<A: ActionSpec, H: GoalHandle<A>> Shared<A, H> {
    /// Called by the engine when the goal of submission `generation` changed
    /// communication state.
    pub(crate) fn on_transition(&self, generation: u64, handle: &H) {
        // Read everything needed from the handle before taking our lock.
        let comm_state = handle.comm_state();
        let terminal =
            (comm_state == CommState::Done).then(|| (handle.goal_status(), handle.result()));
        let goal_id = handle.goal_id();

        {
            let mut tracker = self.lock();
            if !tracker.is_current(generation) {
                tracing::debug!(
                    namespace = %self.namespace,
                    goal_id = %goal_id,
                    "ignoring {} for a goal that is not tracked",
                    comm_state
                );
                return;
            }

            let current = tracker.simple_state;
            match project(comm_state, current) {
                Projection::Unchanged => {}
                Projection::Activate => {
                    tracker.advance(&self.namespace, goal_id, SimpleGoalState::Active);
                    if let Some(callback) = tracker.callbacks.on_active.clone() {
                        tracker.post(Notice::Active(callback));
                    }
                }
                Projection::Complete => {
                    let (status, result) = terminal.unwrap_or((GoalStatus::Lost, None));
                    tracker.advance(&self.namespace, goal_id, SimpleGoalState::Done);
                    let callback = tracker.callbacks.on_done.clone();
                    tracker.post(Notice::Done {
                        callback,
                        status,
                        result,
                        generation,
                    });
                }
                Projection::Violation(kind) => {
                    match kind {
                        ViolationKind::DuplicateDone => tracing::error!(
                            namespace = %self.namespace,
                            goal_id = %goal_id,
                            "received DONE twice"
                        ),
                        ViolationKind::UnexpectedState => tracing::error!(
                            namespace = %self.namespace,
                            goal_id = %goal_id,
                            "received comm state {} when in simple state {}",
                            comm_state,
                            current
                        ),
                    }
                    tracker.emit(|| {
                        GoalEvent::protocol_violation(
                            &self.namespace,
                            goal_id,
                            kind,
                            comm_state,
                            current,
                        )
                    });
                }
            }
        }

        self.flush();
    }

    /// Called by the engine for each feedback message of submission
    /// `generation`.
    pub(crate) fn on_feedback(&self, generation: u64, handle: &H, feedback: A::Feedback) {
        let goal_id = handle.goal_id();

        {
            let mut tracker = self.lock();
            if !tracker.is_current(generation) {
                tracing::error!(
                    namespace = %self.namespace,
                    goal_id = %goal_id,
                    "got feedback for a goal that is not tracked"
                );
                tracker.emit(|| GoalEvent::feedback_dropped(&self.namespace, goal_id));
            } else if tracker.simple_state == SimpleGoalState::Done {
                tracing::debug!(
                    namespace = %self.namespace,
                    goal_id = %goal_id,
                    "dropping feedback for a finished goal"
                );
            } else if let Some(callback) = tracker.callbacks.on_feedback.clone() {
                tracker.post(Notice::Feedback(callback, feedback));
            }
        }

        self.flush();
    }
}

/// Marks the goal of `generation` as delivered and wakes waiters, also when
/// `on_done` unwinds.
struct DoneDelivered<'a, A: ActionSpec, H> {
    shared: &'a Shared<A, H>,
    generation: u64,
}

impl<A: ActionSpec, H> Drop for DoneDelivered<'_, A, H> {
    fn drop(&mut self) {
        {
            let mut tracker = self.shared.lock();
            if tracker.is_current(self.generation) {
                tracker.done_delivered = true;
            }
        }
        self.shared.done.notify_all();
    }
}

/// Clears the drainer if a callback unwinds out of `flush`.
struct DrainGuard<'a, A: ActionSpec, H> {
    shared: &'a Shared<A, H>,
    finished: bool,
}

impl<A: ActionSpec, H> Drop for DrainGuard<'_, A, H> {
    fn drop(&mut self) {
        if !self.finished {
            self.shared.lock().drainer = None;
        }
    }
}
