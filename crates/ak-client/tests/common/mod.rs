// Shared fixtures for the ak-client integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use ak_client::{ClientConfig, GoalCallbacks, SimpleActionClient};
use ak_protocol::{ActionEngine, ActionSpec, GoalId, ScriptedEngine, ShutdownToken};

/// Fibonacci: goal is the order, feedback and result are the sequence.
pub struct Fibonacci;

impl ActionSpec for Fibonacci {
    const ACTION_TYPE: &'static str = "demo/Fibonacci";
    type Goal = u32;
    type Feedback = Vec<u64>;
    type Result = Vec<u64>;
}

pub type Engine = ScriptedEngine<Fibonacci>;
pub type Client<E = Engine> = SimpleActionClient<Fibonacci, E>;

pub fn fast_config() -> ClientConfig {
    ClientConfig {
        wait_slice_ms: 10,
        ..ClientConfig::default()
    }
}

/// A client on a fresh scripted engine, with its own shutdown token.
pub fn client() -> (Client, Engine) {
    let engine = Engine::new("fibonacci");
    let client = with_engine(engine.clone());
    (client, engine)
}

pub fn with_engine<E: ActionEngine<Fibonacci>>(engine: E) -> Client<E> {
    SimpleActionClient::builder("fibonacci", engine)
        .config(fast_config())
        .shutdown(ShutdownToken::new())
        .build()
}

/// Records callback invocations in order.
#[derive(Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn callbacks(&self) -> GoalCallbacks<Fibonacci> {
        let active = self.clone();
        let feedback = self.clone();
        let done = self.clone();
        GoalCallbacks::<Fibonacci>::new()
            .on_active(move || active.push("active".to_string()))
            .on_feedback(move |seq| feedback.push(format!("feedback:{:?}", seq)))
            .on_done(move |status, result| done.push(format!("done:{}:{:?}", status, result)))
    }

    pub fn push(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

/// Submit a goal and return the id the engine gave it.
pub fn submit(client: &Client, engine: &Engine, order: u32, recorder: &Recorder) -> GoalId {
    client.submit(order, recorder.callbacks()).unwrap();
    let (id, goal) = engine.try_recv_goal().expect("goal reached the engine");
    assert_eq!(goal, order);
    id
}
