// countdown.rs: the demo action and a simulated server that executes it.
//
// The server thread pulls goals from a ScriptedEngine and walks each one
// through the protocol: acknowledge, start, publish the remaining count
// every tick, then finish. A cancel request preempts the goal at the next
// tick.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use ak_protocol::{ActionSpec, CommState, GoalId, GoalStatus, ScriptedEngine, ShutdownToken};

/// Counts down from the goal to zero, one step per tick.
pub struct Countdown;

impl ActionSpec for Countdown {
    const ACTION_TYPE: &'static str = "demo/Countdown";
    /// Number of ticks.
    type Goal = u32;
    /// Ticks remaining.
    type Feedback = u32;
    type Result = String;
}

/// Start the simulated server. It stops once `shutdown` is triggered.
pub fn spawn_server(
    engine: ScriptedEngine<Countdown>,
    tick: Duration,
    shutdown: ShutdownToken,
) -> JoinHandle<()> {
    thread::spawn(move || {
        tracing::debug!("countdown server started");
        while !shutdown.is_triggered() {
            if let Some((id, ticks)) = engine.recv_goal(Duration::from_millis(100)) {
                execute(&engine, &id, ticks, tick, &shutdown);
            }
        }
        tracing::debug!("countdown server stopped");
    })
}

fn execute(
    engine: &ScriptedEngine<Countdown>,
    id: &GoalId,
    ticks: u32,
    tick: Duration,
    shutdown: &ShutdownToken,
) {
    engine.set_comm_state(id, CommState::Pending);
    if ticks == 0 {
        engine.complete(id, GoalStatus::Rejected, None);
        return;
    }
    engine.set_comm_state(id, CommState::Active);

    for remaining in (0..ticks).rev() {
        if engine.cancel_requested(id) || shutdown.is_triggered() {
            engine.set_comm_state(id, CommState::Preempting);
            engine.complete(
                id,
                GoalStatus::Preempted,
                Some(format!("stopped with {} to go", remaining + 1)),
            );
            return;
        }
        thread::sleep(tick);
        engine.publish_feedback(id, remaining);
    }

    engine.set_comm_state(id, CommState::WaitingForResult);
    engine.complete(id, GoalStatus::Succeeded, Some(format!("liftoff after {} ticks", ticks)));
}
