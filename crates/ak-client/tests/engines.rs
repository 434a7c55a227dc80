// engines.rs: engines that notify while send_goal is still running.

mod common;

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use ak_client::SimpleGoalState;
use ak_protocol::{
    ActionEngine, CommState, FeedbackHandler, GoalHandle, GoalStatus, ProtocolError,
    ScriptedHandle, TransitionHandler,
};

use common::{with_engine, Engine, Fibonacci, Recorder};

/// Runs the whole goal before `send_goal` returns.
struct EagerEngine(Engine);

impl ActionEngine<Fibonacci> for EagerEngine {
    type Handle = ScriptedHandle<Fibonacci>;

    fn send_goal(
        &self,
        goal: u32,
        on_transition: TransitionHandler<Self::Handle>,
        on_feedback: FeedbackHandler<Self::Handle, Vec<u64>>,
    ) -> Result<Self::Handle, ProtocolError> {
        let handle = self.0.send_goal(goal, on_transition, on_feedback)?;
        let id = handle.goal_id().clone();
        self.0.set_comm_state(&id, CommState::Active);
        self.0.publish_feedback(&id, vec![0]);
        self.0.complete(&id, GoalStatus::Succeeded, Some(vec![0, 1]));
        Ok(handle)
    }

    fn wait_for_server(&self, timeout: Duration) -> bool {
        self.0.wait_for_server(timeout)
    }

    fn cancel_all_goals(&self) {
        self.0.cancel_all_goals()
    }
}

#[test]
fn notifications_during_send_count_for_the_new_goal() {
    let client = with_engine(EagerEngine(Engine::new("fibonacci")));
    let recorder = Recorder::default();

    client.submit(2, recorder.callbacks()).unwrap();

    assert_eq!(
        recorder.calls(),
        vec!["active", "feedback:[0]", "done:SUCCEEDED:Some([0, 1])"]
    );
    assert!(client.await_result(Duration::from_millis(10)));
    assert_eq!(client.current_status(), GoalStatus::Succeeded);
}

/// Holds `send_goal` open until the test releases it.
struct GatedEngine {
    inner: Engine,
    gate: Mutex<Receiver<()>>,
}

impl ActionEngine<Fibonacci> for GatedEngine {
    type Handle = ScriptedHandle<Fibonacci>;

    fn send_goal(
        &self,
        goal: u32,
        on_transition: TransitionHandler<Self::Handle>,
        on_feedback: FeedbackHandler<Self::Handle, Vec<u64>>,
    ) -> Result<Self::Handle, ProtocolError> {
        let handle = self.inner.send_goal(goal, on_transition, on_feedback)?;
        self.gate
            .lock()
            .unwrap()
            .recv()
            .map_err(|e| ProtocolError::Transport(e.to_string()))?;
        Ok(handle)
    }

    fn wait_for_server(&self, timeout: Duration) -> bool {
        self.inner.wait_for_server(timeout)
    }

    fn cancel_all_goals(&self) {
        self.inner.cancel_all_goals()
    }
}

fn gated() -> (Arc<common::Client<GatedEngine>>, Engine, Sender<()>) {
    let inner = Engine::new("fibonacci");
    let (open, gate) = mpsc::channel();
    let client = with_engine(GatedEngine {
        inner: inner.clone(),
        gate: Mutex::new(gate),
    });
    (Arc::new(client), inner, open)
}

#[test]
fn cancel_during_send_is_applied_once_sent() {
    let (client, inner, open) = gated();

    let submitter = {
        let client = Arc::clone(&client);
        thread::spawn(move || client.submit(3, Default::default()))
    };

    let (id, _) = inner.recv_goal(Duration::from_secs(5)).unwrap();
    assert!(client.is_tracking());
    assert_eq!(client.goal_id(), None);
    assert_eq!(client.current_status(), GoalStatus::Pending);
    assert_eq!(client.current_result(), None);

    client.cancel();
    assert!(!inner.cancel_requested(&id));

    open.send(()).unwrap();
    submitter.join().unwrap().unwrap();
    assert!(inner.cancel_requested(&id));
    assert_eq!(client.goal_id(), Some(id));
}

#[test]
fn goal_replaced_during_send_is_not_tracked() {
    let (client, inner, open) = gated();

    let first = {
        let client = Arc::clone(&client);
        thread::spawn(move || client.submit(3, Default::default()))
    };
    let (g1, _) = inner.recv_goal(Duration::from_secs(5)).unwrap();

    // Second submit runs while the first is still inside send_goal.
    let second = {
        let client = Arc::clone(&client);
        thread::spawn(move || client.submit(4, Default::default()))
    };
    let (g2, _) = inner.recv_goal(Duration::from_secs(5)).unwrap();

    open.send(()).unwrap();
    open.send(()).unwrap();
    first.join().unwrap().unwrap();
    second.join().unwrap().unwrap();

    assert_eq!(client.goal_id(), Some(g2.clone()));
    inner.set_comm_state(&g1, CommState::Active);
    assert_eq!(client.simple_state(), SimpleGoalState::Pending);
    inner.set_comm_state(&g2, CommState::Active);
    assert_eq!(client.simple_state(), SimpleGoalState::Active);
}
