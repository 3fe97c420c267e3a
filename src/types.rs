use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// How much of the tree below a watched path is of interest.
///
/// - `Children`: the path itself and its direct entries (default).
/// - `Descendants`: everything below the path.
///
/// The scope is carried into every task and shows up in logs, but neither
/// strategy changes its request based on it: WebDAV always sends `Depth: 1`
/// and Dropbox cursors are always non-recursive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationScope {
    Children,
    Descendants,
}

impl Default for ObservationScope {
    fn default() -> Self {
        ObservationScope::Children
    }
}

impl FromStr for ObservationScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "children" => Ok(ObservationScope::Children),
            "descendants" => Ok(ObservationScope::Descendants),
            other => Err(format!(
                "invalid observation scope: {other} (expected \"children\" or \"descendants\")"
            )),
        }
    }
}

impl fmt::Display for ObservationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservationScope::Children => f.write_str("children"),
            ObservationScope::Descendants => f.write_str("descendants"),
        }
    }
}

/// Lifecycle of an observation task.
///
/// `Created -> Running -> Stopped`. `Stopped` is terminal; a task that is
/// stopped before its loop begins goes straight from `Created` to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Running,
    Stopped,
}

impl TaskState {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            TaskState::Created => 0,
            TaskState::Running => 1,
            TaskState::Stopped => 2,
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TaskState::Created,
            1 => TaskState::Running,
            _ => TaskState::Stopped,
        }
    }
}
