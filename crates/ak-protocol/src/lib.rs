//! # ak-protocol
//!
//! The vocabulary shared between an action client and the protocol engine
//! that carries its goals.
//!
//! A protocol engine owns the transport. It accepts goals, hands back a
//! [`GoalHandle`] per goal, and later invokes the handlers registered with
//! the goal whenever the goal's [`CommState`] changes or feedback arrives.
//! This crate defines those seams and nothing above them.
//!
//! ## Key components
//!
//! - [`ActionSpec`]: the message-type descriptor (goal, feedback, result)
//! - [`CommState`]: fine-grained communication state of one goal
//! - [`GoalStatus`]: status codes reported by the action server
//! - [`GoalHandle`] / [`ActionEngine`]: the engine interfaces
//! - [`ShutdownToken`]: process-wide shutdown flag observed by waiters
//! - [`ScriptedEngine`]: an in-process engine driven programmatically

pub mod comm_state;
pub mod engine;
pub mod error;
pub mod goal;
pub mod scripted;
pub mod shutdown;
pub mod status;

pub use comm_state::CommState;
pub use engine::{ActionEngine, FeedbackHandler, GoalHandle, TransitionHandler};
pub use error::ProtocolError;
pub use goal::{ActionSpec, GoalId};
pub use scripted::{ScriptedEngine, ScriptedHandle};
pub use shutdown::ShutdownToken;
pub use status::GoalStatus;
