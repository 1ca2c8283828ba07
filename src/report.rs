use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregation::Coverage;
use crate::job::{JobId, JobRecord};
use crate::notification::{
    HasNotificationSettings, NotificationSettings, NotificationSource, UserId,
};
use crate::pipeline::{Pipeline, PipelineId, StatusChange};
use crate::status::Status;

/// Result of reconciling a batch of pipelines, as rendered by the CLI.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusReport {
    pub generated_at: DateTime<Utc>,
    pub total_pipelines: usize,
    pub total_jobs: usize,
    pub status_changes: usize,
    pub stages: Vec<String>,
    pub pipelines: Vec<PipelineReport>,
    #[serde(default)]
    pub notifications: Vec<StatusNotification>,
}

/// A status edge together with the users who would hear about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusNotification {
    pub pipeline_id: PipelineId,
    pub old_status: Status,
    pub new_status: Status,
    pub recipients: Vec<UserId>,
}

/// Read-only query surface of one pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub id: PipelineId,
    pub sha: String,
    pub short_sha: String,
    #[serde(rename = "ref")]
    pub ref_: String,
    pub branch: bool,
    pub project_id: u64,
    pub user_id: Option<u64>,
    pub git_author_name: Option<String>,
    pub status: Status,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration: Option<i64>,
    pub wall_clock_duration: Option<i64>,
    pub coverage: Option<Coverage>,
    pub retryable: bool,
    pub has_warnings: bool,
    pub manual_actions: Vec<String>,
    pub jobs: Vec<JobReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub id: JobId,
    pub name: String,
    pub stage: String,
    pub status: Status,
    pub allow_failure: bool,
    pub retried: bool,
    pub duration: Option<i64>,
    pub coverage: Option<f64>,
}

impl PipelineReport {
    pub fn from_pipeline(pipeline: &Pipeline) -> Self {
        let current: HashSet<JobId> = pipeline.current_jobs().iter().map(|j| j.id).collect();
        let derived = pipeline.derived();

        let mut jobs: Vec<JobReport> = pipeline
            .jobs()
            .iter()
            .map(|job| JobReport::new(job, !current.contains(&job.id)))
            .collect();
        jobs.sort_by_key(|j| j.id);

        Self {
            id: pipeline.id(),
            sha: pipeline.sha().to_string(),
            short_sha: pipeline.short_sha().to_string(),
            ref_: pipeline.ref_name().to_string(),
            branch: pipeline.is_branch(),
            project_id: pipeline.project_id(),
            user_id: pipeline.user_id(),
            git_author_name: pipeline.git_author_name().map(str::to_string),
            status: derived.status,
            started_at: derived.timing.started_at,
            finished_at: derived.timing.finished_at,
            duration: derived.timing.duration,
            wall_clock_duration: derived.timing.wall_clock_duration,
            coverage: derived.coverage,
            retryable: pipeline.is_retryable(),
            has_warnings: pipeline.has_warnings(),
            manual_actions: pipeline
                .manual_actions()
                .iter()
                .map(|j| j.name.clone())
                .collect(),
            jobs,
        }
    }
}

impl HasNotificationSettings for PipelineReport {
    fn notification_source(&self) -> NotificationSource {
        NotificationSource::Project(self.project_id)
    }
}

/// Resolves recipients for each status edge, in the order the edges arrived.
///
/// The user who triggered a pipeline gets a setting at the registry's default
/// level if they have none yet. Edges of pipelines missing from `pipelines`
/// are dropped.
pub fn resolve_notifications(
    settings: &mut NotificationSettings,
    changes: &[StatusChange],
    pipelines: &[PipelineReport],
) -> Vec<StatusNotification> {
    changes
        .iter()
        .filter_map(|change| {
            let pipeline = pipelines.iter().find(|p| p.id == change.pipeline_id)?;
            if let Some(user_id) = pipeline.user_id {
                settings.find_or_create_for(user_id, pipeline);
            }
            Some(StatusNotification {
                pipeline_id: change.pipeline_id,
                old_status: change.old_status,
                new_status: change.new_status,
                recipients: settings.recipients(pipeline),
            })
        })
        .collect()
}

impl JobReport {
    fn new(job: &JobRecord, retried: bool) -> Self {
        Self {
            id: job.id,
            name: job.name.clone(),
            stage: job.stage.clone(),
            status: job.status,
            allow_failure: job.allow_failure,
            retried,
            duration: job.span().map(|span| span.num_seconds()),
            coverage: job.coverage,
        }
    }
}
