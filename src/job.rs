use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::status::Status;

/// Unique, monotonically increasing job record identifier.
///
/// Creation order doubles as the tiebreak for "latest attempt", so ids must
/// be handed out in the order records are created.
pub type JobId = u64;

/// A single unit of work inside a pipeline.
///
/// Several records may share a `name` when a job is retried; only the record
/// with the greatest `id` counts towards the pipeline's derived state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    /// Owning pipeline; snapshots nest jobs under their pipeline and leave it out
    #[serde(default)]
    pub pipeline_id: u64,
    /// Job name as defined in the pipeline configuration
    pub name: String,
    /// Stage label (e.g., "build", "test")
    pub stage: String,
    /// Position of the stage from left to right
    #[serde(default)]
    pub stage_order: i32,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub allow_failure: bool,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Set only once the job reaches a terminal status
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Test coverage percentage reported by the job
    #[serde(default)]
    pub coverage: Option<f64>,
}

impl JobRecord {
    pub fn new(id: JobId, pipeline_id: u64, name: &str, stage: &str, stage_order: i32) -> Self {
        Self {
            id,
            pipeline_id,
            name: name.to_string(),
            stage: stage.to_string(),
            stage_order,
            status: Status::Pending,
            allow_failure: false,
            started_at: None,
            finished_at: None,
            coverage: None,
        }
    }

    /// Status used for aggregation: a failure that is allowed counts as success.
    pub fn effective_status(&self) -> Status {
        if self.has_warning() {
            Status::Success
        } else {
            self.status
        }
    }

    /// An allowed failure: does not fail the pipeline but flags it.
    pub fn has_warning(&self) -> bool {
        self.status == Status::Failed && self.allow_failure
    }

    /// Time between start and finish, when both are known.
    pub fn span(&self) -> Option<Duration> {
        match (self.started_at, self.finished_at) {
            (Some(started), Some(finished)) => Some(finished - started),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_job(status: Status, allow_failure: bool) -> JobRecord {
        JobRecord {
            status,
            allow_failure,
            ..JobRecord::new(1, 1, "rspec", "test", 1)
        }
    }

    #[test]
    fn allowed_failure_is_effectively_success() {
        let job = create_job(Status::Failed, true);
        assert_eq!(job.effective_status(), Status::Success);
        assert!(job.has_warning(), "Allowed failure should carry a warning");
    }

    #[test]
    fn plain_failure_stays_failed() {
        let job = create_job(Status::Failed, false);
        assert_eq!(job.effective_status(), Status::Failed);
        assert!(!job.has_warning());
    }

    #[test]
    fn allow_failure_has_no_effect_on_success() {
        let job = create_job(Status::Success, true);
        assert_eq!(job.effective_status(), Status::Success);
        assert!(!job.has_warning());
    }

    #[test]
    fn span_requires_both_timestamps() {
        let now = Utc::now();
        let mut job = create_job(Status::Running, false);
        job.started_at = Some(now - Duration::seconds(90));
        assert_eq!(job.span(), None);

        job.finished_at = Some(now);
        assert_eq!(job.span(), Some(Duration::seconds(90)));
    }

    #[test]
    fn deserializes_with_defaults() {
        let job: JobRecord = serde_json::from_str(
            r#"{"id": 7, "pipeline_id": 3, "name": "lint", "stage": "test"}"#,
        )
        .unwrap();
        assert_eq!(job.status, Status::Pending);
        assert_eq!(job.stage_order, 0);
        assert!(!job.allow_failure);
        assert!(job.coverage.is_none());
    }
}
