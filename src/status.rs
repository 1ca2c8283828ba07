use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CIStatusError;

/// Lifecycle state shared by job records and the pipelines that aggregate them.
///
/// The set is closed: unknown labels are rejected when parsing or deserializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
    Skipped,
    Manual,
}

impl Status {
    pub const ALL: [Status; 7] = [
        Status::Pending,
        Status::Running,
        Status::Success,
        Status::Failed,
        Status::Canceled,
        Status::Skipped,
        Status::Manual,
    ];

    /// Rank used when reducing many statuses into one; the highest rank wins.
    ///
    /// `running > pending > failed > canceled > success > skipped`. A job that
    /// waits for a manual trigger does not hold its pipeline in flight, so
    /// `manual` ranks with `skipped`.
    pub fn precedence(self) -> u8 {
        match self {
            Status::Running => 5,
            Status::Pending => 4,
            Status::Failed => 3,
            Status::Canceled => 2,
            Status::Success => 1,
            Status::Skipped | Status::Manual => 0,
        }
    }

    /// Whether a job in this status has stopped executing for good.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Status::Success | Status::Failed | Status::Canceled | Status::Skipped
        )
    }

    /// Whether a job in this status no longer keeps its pipeline from finishing.
    ///
    /// Terminal statuses plus `manual`, which waits on a trigger that may
    /// never come.
    pub fn is_settled(self) -> bool {
        self.is_terminal() || self == Status::Manual
    }

    /// Whether a job in this status is queued or executing.
    pub fn is_active(self) -> bool {
        matches!(self, Status::Pending | Status::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Running => "running",
            Status::Success => "success",
            Status::Failed => "failed",
            Status::Canceled => "canceled",
            Status::Skipped => "skipped",
            Status::Manual => "manual",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = CIStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == lower)
            .ok_or_else(|| CIStatusError::Validation(format!("unknown status '{s}'")))
    }
}
