use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a writer engine.
///
/// `Starting -> Initializing -> Ready -> (Sending <-> Waiting) -> Stopping -> Stopped`,
/// with `Failed` reachable from `Initializing`. `Stopped` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriterState {
    Starting,
    Initializing,
    Ready,
    Sending,
    Waiting,
    Stopping,
    Stopped,
    Failed,
}

impl WriterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriterState::Starting => "starting",
            WriterState::Initializing => "initializing",
            WriterState::Ready => "ready",
            WriterState::Sending => "sending",
            WriterState::Waiting => "waiting",
            WriterState::Stopping => "stopping",
            WriterState::Stopped => "stopped",
            WriterState::Failed => "failed",
        }
    }

    /// True once initialization succeeded and the main loop is (or was) running.
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            WriterState::Ready | WriterState::Sending | WriterState::Waiting
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WriterState::Stopped | WriterState::Failed)
    }
}

impl fmt::Display for WriterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
