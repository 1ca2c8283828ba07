use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::aggregation::{
    aggregate_coverage, aggregate_status, aggregate_timing, current_jobs, retried_jobs, Coverage,
    Timing,
};
use crate::error::{CIStatusError, Result};
use crate::job::{JobId, JobRecord};
use crate::status::Status;

pub type PipelineId = u64;

const SHA_LEN: usize = 40;
const SHORT_SHA_LEN: usize = 8;

/// A validated 40-character commit hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sha(String);

impl Sha {
    /// Validates a commit sha.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the sha is blank, is not 40 hexadecimal
    /// characters, or is the all-zero hash git uses for a missing commit.
    pub fn parse(raw: &str) -> Result<Self> {
        let sha = raw.trim();
        if sha.is_empty() {
            return Err(CIStatusError::Validation("sha can't be blank".into()));
        }
        if sha.len() != SHA_LEN || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CIStatusError::Validation(format!(
                "sha must be {SHA_LEN} hexadecimal characters, got '{sha}'"
            )));
        }
        if sha.chars().all(|c| c == '0') {
            return Err(CIStatusError::Validation(
                "sha can't be 00000000 (branch removal)".into(),
            ));
        }
        Ok(Self(sha.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        &self.0[..SHORT_SHA_LEN]
    }
}

impl TryFrom<String> for Sha {
    type Error = CIStatusError;

    fn try_from(value: String) -> Result<Self> {
        Sha::parse(&value)
    }
}

impl From<Sha> for String {
    fn from(sha: Sha) -> Self {
        sha.0
    }
}

impl fmt::Display for Sha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Attributes supplied by whoever creates a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPipeline {
    pub id: PipelineId,
    pub sha: String,
    /// Git ref that was built (branch or tag name)
    #[serde(default, rename = "ref")]
    pub ref_: String,
    #[serde(default)]
    pub tag: bool,
    #[serde(default)]
    pub user_id: Option<u64>,
    pub project_id: u64,
    #[serde(default)]
    pub git_author_name: Option<String>,
    #[serde(default)]
    pub git_author_email: Option<String>,
}

/// Cached values recomputed by [`Pipeline::reconcile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedState {
    pub status: Status,
    #[serde(flatten)]
    pub timing: Timing,
    pub coverage: Option<Coverage>,
}

impl DerivedState {
    fn initial(status: Status) -> Self {
        Self {
            status,
            timing: Timing::default(),
            coverage: None,
        }
    }
}

/// Edge produced when reconciling changes the cached status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub pipeline_id: PipelineId,
    pub old_status: Status,
    pub new_status: Status,
}

/// A pipeline and the job records it owns.
///
/// Derived fields are never set directly; they change only through
/// [`Pipeline::reconcile`].
#[derive(Debug, Clone)]
pub struct Pipeline {
    id: PipelineId,
    sha: Sha,
    ref_: String,
    tag: bool,
    user_id: Option<u64>,
    project_id: u64,
    git_author_name: Option<String>,
    git_author_email: Option<String>,
    jobs: Vec<JobRecord>,
    derived: DerivedState,
}

impl Pipeline {
    /// Builds a pipeline from validated attributes.
    ///
    /// `initial_status` is the status reported until the first reconcile.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the sha is rejected; nothing is created.
    pub fn new(attrs: NewPipeline, initial_status: Status) -> Result<Self> {
        let sha = Sha::parse(&attrs.sha)?;

        Ok(Self {
            id: attrs.id,
            sha,
            ref_: attrs.ref_,
            tag: attrs.tag,
            user_id: attrs.user_id,
            project_id: attrs.project_id,
            git_author_name: attrs.git_author_name,
            git_author_email: attrs.git_author_email,
            jobs: Vec::new(),
            derived: DerivedState::initial(initial_status),
        })
    }

    pub fn id(&self) -> PipelineId {
        self.id
    }

    pub fn sha(&self) -> &Sha {
        &self.sha
    }

    pub fn short_sha(&self) -> &str {
        self.sha.short()
    }

    pub fn ref_name(&self) -> &str {
        &self.ref_
    }

    pub fn is_branch(&self) -> bool {
        !self.tag
    }

    pub fn user_id(&self) -> Option<u64> {
        self.user_id
    }

    pub fn project_id(&self) -> u64 {
        self.project_id
    }

    pub fn git_author_name(&self) -> Option<&str> {
        self.git_author_name.as_deref()
    }

    pub fn git_author_email(&self) -> Option<&str> {
        self.git_author_email.as_deref()
    }

    pub fn jobs(&self) -> &[JobRecord] {
        &self.jobs
    }

    pub fn derived(&self) -> &DerivedState {
        &self.derived
    }

    pub fn status(&self) -> Status {
        self.derived.status
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.derived.timing.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.derived.timing.finished_at
    }

    pub fn duration(&self) -> Option<i64> {
        self.derived.timing.duration
    }

    pub fn coverage(&self) -> Option<Coverage> {
        self.derived.coverage
    }

    /// Inserts a job record, or replaces the stored record with the same id.
    ///
    /// The derived state is left untouched until the next reconcile.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the record belongs to another pipeline.
    pub fn upsert_job(&mut self, job: JobRecord) -> Result<()> {
        if job.pipeline_id != self.id {
            return Err(CIStatusError::Validation(format!(
                "job {} belongs to pipeline {}, not {}",
                job.id, job.pipeline_id, self.id
            )));
        }

        match self.jobs.iter_mut().find(|existing| existing.id == job.id) {
            Some(existing) => *existing = job,
            None => self.jobs.push(job),
        }
        Ok(())
    }

    pub fn job(&self, job_id: JobId) -> Option<&JobRecord> {
        self.jobs.iter().find(|j| j.id == job_id)
    }

    /// Latest attempt per job name.
    pub fn current_jobs(&self) -> Vec<&JobRecord> {
        current_jobs(&self.jobs)
    }

    /// Superseded attempts.
    pub fn retried(&self) -> Vec<&JobRecord> {
        retried_jobs(&self.jobs)
    }

    /// Recomputes status, timing and coverage from the current jobs.
    ///
    /// Returns the status edge when the recomputed status differs from the
    /// cached one; re-running with unchanged jobs returns `None`.
    pub fn reconcile(&mut self) -> Option<StatusChange> {
        let current = self.current_jobs();
        let next = DerivedState {
            status: aggregate_status(&current),
            timing: aggregate_timing(&current),
            coverage: aggregate_coverage(&current),
        };

        debug!(
            "Reconciled pipeline {}: {} current jobs, status {}",
            self.id,
            current.len(),
            next.status
        );

        let old_status = self.derived.status;
        self.derived = next;

        (old_status != self.derived.status).then_some(StatusChange {
            pipeline_id: self.id,
            old_status,
            new_status: self.derived.status,
        })
    }

    /// True when any current job failed, including allowed failures.
    pub fn is_retryable(&self) -> bool {
        self.current_jobs()
            .iter()
            .any(|j| j.status == Status::Failed)
    }

    /// True when any current job failed but was allowed to.
    pub fn has_warnings(&self) -> bool {
        self.current_jobs().iter().any(|j| j.has_warning())
    }

    pub fn manual_actions(&self) -> Vec<&JobRecord> {
        self.current_jobs()
            .into_iter()
            .filter(|j| j.status == Status::Manual)
            .collect()
    }
}

/// Distinct stage names across the given pipelines, left to right.
///
/// Stages are ordered by the smallest `stage_order` any record gives them;
/// stages with equal order sort by name.
pub fn stages<'a, I>(pipelines: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Pipeline>,
{
    let mut min_order: HashMap<&str, i32> = HashMap::new();
    for job in pipelines.into_iter().flat_map(|p| p.jobs.iter()) {
        min_order
            .entry(job.stage.as_str())
            .and_modify(|order| *order = (*order).min(job.stage_order))
            .or_insert(job.stage_order);
    }

    let mut ordered: Vec<(&str, i32)> = min_order.into_iter().collect();
    ordered.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
    ordered.into_iter().map(|(name, _)| name.to_string()).collect()
}
