// run.rs: `ak run` drives one countdown goal against the simulated server.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Args;

use ak_client::{ClientConfig, GoalCallbacks, SimpleActionClient};
use ak_protocol::{ScriptedEngine, ShutdownToken};

use crate::countdown::{self, Countdown};

const NAMESPACE: &str = "countdown";

#[derive(Args)]
pub struct RunArgs {
    /// Ticks to count down from.
    #[arg(long, default_value_t = 5)]
    pub count: u32,

    /// Milliseconds per tick.
    #[arg(long, default_value_t = 200)]
    pub tick_ms: u64,

    /// Give up waiting after this many milliseconds (0 waits forever).
    #[arg(long, default_value_t = 0)]
    pub timeout_ms: u64,

    /// Cancel the goal after this many milliseconds.
    #[arg(long)]
    pub cancel_after_ms: Option<u64>,
}

pub fn execute(args: &RunArgs, config: &ClientConfig) -> Result<()> {
    let shutdown = ShutdownToken::process();
    let server_stop = ShutdownToken::new();
    let engine = ScriptedEngine::<Countdown>::new(NAMESPACE);
    let server = countdown::spawn_server(
        engine.clone(),
        Duration::from_millis(args.tick_ms),
        server_stop.clone(),
    );

    let client = Arc::new(
        SimpleActionClient::builder(NAMESPACE, engine)
            .config(config.clone())
            .shutdown(shutdown)
            .build(),
    );

    if !client.await_server_ready(config.server_timeout()) {
        server_stop.trigger();
        bail!("action server on '{}' did not come up", NAMESPACE);
    }

    let callbacks = GoalCallbacks::<Countdown>::new()
        .on_active(|| println!("goal active"))
        .on_feedback(|remaining| println!("  {} to go", remaining))
        .on_done(|status, result| {
            println!("goal done: {}", status);
            if let Some(result) = result {
                println!("  {}", result);
            }
        });
    client.submit(args.count, callbacks)?;

    if let Some(delay) = args.cancel_after_ms {
        let canceller = Arc::clone(&client);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(delay));
            tracing::info!("cancelling goal after {}ms", delay);
            canceller.cancel();
        });
    }

    let finished = client.await_result(Duration::from_millis(args.timeout_ms));
    if !finished {
        println!("goal still {} after {}ms, cancelling", client.simple_state(), args.timeout_ms);
        client.cancel();
        client.await_result(Duration::from_millis(args.tick_ms.saturating_mul(2).max(100)));
    }
    println!("final status: {}", client.current_status());

    server_stop.trigger();
    if server.join().is_err() {
        bail!("countdown server panicked");
    }
    Ok(())
}
