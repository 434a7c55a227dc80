//! # ak-client
//!
//! A single-goal action client with a simplified lifecycle.
//!
//! A [`SimpleActionClient`] sends goals through a protocol engine
//! ([`ak_protocol::ActionEngine`]) and tracks the one sent last. The engine
//! reports a fine-grained [`ak_protocol::CommState`] per goal, from its own
//! threads and sometimes out of order; the client projects that onto a
//! three-state [`SimpleGoalState`] that only moves forward, fires the user's
//! callbacks once per milestone, and lets callers block until the goal is
//! done.
//!
//! ## Key components
//!
//! - [`SimpleActionClient`]: submit, wait, query, cancel
//! - [`GoalCallbacks`]: `on_active`, `on_feedback`, `on_done`
//! - [`SimpleGoalState`] and [`project`]: the state projection
//! - [`GoalEvent`] / [`EventSink`]: lifecycle events for observers
//! - [`ClientConfig`]: wait slice, server timeout, event log

pub mod callbacks;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod state;
mod tracker;

pub use callbacks::GoalCallbacks;
pub use client::{ClientBuilder, SimpleActionClient};
pub use config::ClientConfig;
pub use error::ClientError;
pub use events::{EventDispatcher, EventSink, GoalEvent, JsonlSink};
pub use state::{project, Projection, SimpleGoalState, ViolationKind};
