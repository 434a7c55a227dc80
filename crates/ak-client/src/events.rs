// events.rs: lifecycle events and the sinks that record them.
//
// The client emits a GoalEvent at each point of interest in a goal's life.
// Sinks subscribe to them (a JSONL log file today). Events leave the client
// through the same ordered outbox as user callbacks, so a sink never runs
// while the client's lock is held and never sees events out of order.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use ak_protocol::{CommState, GoalId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::state::{SimpleGoalState, ViolationKind};

/// Events emitted by the action client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GoalEvent {
    /// A goal was handed to the protocol engine.
    GoalSubmitted {
        namespace: String,
        action_type: String,
        timestamp: DateTime<Utc>,
    },

    /// The tracked goal changed simple state.
    StateChanged {
        namespace: String,
        goal_id: GoalId,
        from_state: SimpleGoalState,
        to_state: SimpleGoalState,
        timestamp: DateTime<Utc>,
    },

    /// A notification did not fit the goal's lifecycle and was ignored.
    ProtocolViolation {
        namespace: String,
        goal_id: GoalId,
        kind: ViolationKind,
        comm_state: CommState,
        simple_state: SimpleGoalState,
        timestamp: DateTime<Utc>,
    },

    /// Feedback arrived for a goal that is no longer tracked.
    FeedbackDropped {
        namespace: String,
        goal_id: GoalId,
        timestamp: DateTime<Utc>,
    },

    /// The client stopped tracking a goal without cancelling it.
    TrackingStopped {
        namespace: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        goal_id: Option<GoalId>,
        timestamp: DateTime<Utc>,
    },
}

impl GoalEvent {
    /// Get the event type name as a string.
    pub fn event_type(&self) -> &str {
        match self {
            GoalEvent::GoalSubmitted { .. } => "goal_submitted",
            GoalEvent::StateChanged { .. } => "state_changed",
            GoalEvent::ProtocolViolation { .. } => "protocol_violation",
            GoalEvent::FeedbackDropped { .. } => "feedback_dropped",
            GoalEvent::TrackingStopped { .. } => "tracking_stopped",
        }
    }

    pub fn goal_submitted(namespace: &str, action_type: &str) -> Self {
        GoalEvent::GoalSubmitted {
            namespace: namespace.to_string(),
            action_type: action_type.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn state_changed(
        namespace: &str,
        goal_id: &GoalId,
        from: SimpleGoalState,
        to: SimpleGoalState,
    ) -> Self {
        GoalEvent::StateChanged {
            namespace: namespace.to_string(),
            goal_id: goal_id.clone(),
            from_state: from,
            to_state: to,
            timestamp: Utc::now(),
        }
    }

    pub fn protocol_violation(
        namespace: &str,
        goal_id: &GoalId,
        kind: ViolationKind,
        comm_state: CommState,
        simple_state: SimpleGoalState,
    ) -> Self {
        GoalEvent::ProtocolViolation {
            namespace: namespace.to_string(),
            goal_id: goal_id.clone(),
            kind,
            comm_state,
            simple_state,
            timestamp: Utc::now(),
        }
    }

    pub fn feedback_dropped(namespace: &str, goal_id: &GoalId) -> Self {
        GoalEvent::FeedbackDropped {
            namespace: namespace.to_string(),
            goal_id: goal_id.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn tracking_stopped(namespace: &str, goal_id: Option<&GoalId>) -> Self {
        GoalEvent::TrackingStopped {
            namespace: namespace.to_string(),
            goal_id: goal_id.cloned(),
            timestamp: Utc::now(),
        }
    }
}

/// Receives client lifecycle events.
///
/// Errors are logged by the dispatcher and never reach the client's caller.
pub trait EventSink: Send + Sync {
    fn send(&self, event: &GoalEvent) -> Result<(), ClientError>;
}

/// Appends events as JSON lines to a file.
///
/// The file is opened on the first event and kept open. If a write fails
/// the handle is dropped and the next event opens the file again.
pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl JsonlSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> ClientError {
        ClientError::IoError {
            path: self.path.clone(),
            source,
        }
    }

    fn open(&self) -> Result<File, ClientError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| ClientError::IoError {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))
    }
}

impl EventSink for JsonlSink {
    fn send(&self, event: &GoalEvent) -> Result<(), ClientError> {
        // Each event goes out as a single write of a whole line.
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut slot = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let file = match slot.take() {
            Some(file) => file,
            None => self.open()?,
        };
        let file = slot.insert(file);
        if let Err(source) = file.write_all(line.as_bytes()) {
            *slot = None;
            return Err(self.io_error(source));
        }
        Ok(())
    }
}

/// Fans events out to every registered sink.
#[derive(Default)]
pub struct EventDispatcher {
    sinks: Vec<Box<dyn EventSink>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Send an event to all sinks. A failing sink does not stop the others.
    pub fn dispatch(&self, event: &GoalEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.send(event) {
                tracing::warn!(event_type = event.event_type(), "dropping goal event: {}", e);
            }
        }
    }
}
