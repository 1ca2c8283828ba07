use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info, warn};
use tokio::sync::{broadcast, Mutex};

use crate::error::{CIStatusError, Result};
use crate::events::EventEmitter;
use crate::job::{JobId, JobRecord};
use crate::pipeline::{NewPipeline, Pipeline, PipelineId, StatusChange};
use crate::report::PipelineReport;
use crate::status::Status;

type SharedPipeline = Arc<Mutex<Pipeline>>;

/// Keeps pipelines in memory and reconciles them as their jobs change.
///
/// Each pipeline sits behind its own async mutex: reconciles of one pipeline
/// are serialized while different pipelines proceed independently. The id
/// indexes are guarded by short-lived locks that are never held across an
/// `.await`.
pub struct PipelineEngine {
    pipelines: RwLock<HashMap<PipelineId, SharedPipeline>>,
    job_owners: RwLock<HashMap<JobId, PipelineId>>,
    events: EventEmitter,
    default_status: Status,
}

impl PipelineEngine {
    /// Creates an engine that publishes status edges through `events`.
    ///
    /// `default_status` is the status new pipelines report before their
    /// first reconcile.
    pub fn new(events: EventEmitter, default_status: Status) -> Self {
        Self {
            pipelines: RwLock::new(HashMap::new()),
            job_owners: RwLock::new(HashMap::new()),
            events,
            default_status,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.events.subscribe()
    }

    /// Validates and registers a pipeline.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a rejected sha, or
    /// `DuplicatePipeline` if the id is taken. Nothing is stored on error.
    pub fn create_pipeline(&self, attrs: NewPipeline) -> Result<PipelineId> {
        let pipeline = Pipeline::new(attrs, self.default_status)?;
        let id = pipeline.id();

        let mut pipelines = write(&self.pipelines);
        if pipelines.contains_key(&id) {
            return Err(CIStatusError::DuplicatePipeline(id));
        }
        pipelines.insert(id, Arc::new(Mutex::new(pipeline)));

        info!("Registered pipeline {id}");
        Ok(id)
    }

    /// Removes a pipeline together with all of its job records.
    pub async fn remove_pipeline(&self, pipeline_id: PipelineId) -> Result<()> {
        let shared = write(&self.pipelines)
            .remove(&pipeline_id)
            .ok_or(CIStatusError::PipelineNotFound(pipeline_id))?;

        let pipeline = shared.lock().await;
        let mut owners = write(&self.job_owners);
        for job in pipeline.jobs() {
            owners.remove(&job.id);
        }

        info!(
            "Removed pipeline {pipeline_id} and {} job records",
            pipeline.jobs().len()
        );
        Ok(())
    }

    /// Stores a job record written by the persistence layer.
    ///
    /// Does not reconcile; call [`PipelineEngine::job_changed`] afterwards.
    ///
    /// # Errors
    ///
    /// Returns `PipelineNotFound` for an unknown owner, including one removed
    /// while the call waited for its lock, and `DuplicateJob` if the job id is
    /// already owned by a different pipeline.
    pub async fn record_job(&self, job: JobRecord) -> Result<()> {
        let shared = self.pipeline(job.pipeline_id)?;
        let (job_id, pipeline_id) = (job.id, job.pipeline_id);

        let mut pipeline = shared.lock().await;
        // The pipeline may have been removed while we waited for its lock.
        let still_registered = read(&self.pipelines)
            .get(&pipeline_id)
            .is_some_and(|current| Arc::ptr_eq(current, &shared));
        if !still_registered {
            warn!("Pipeline {pipeline_id} removed before job {job_id} was recorded");
            return Err(CIStatusError::PipelineNotFound(pipeline_id));
        }

        {
            let mut owners = write(&self.job_owners);
            match owners.get(&job_id) {
                Some(&owner) if owner != pipeline_id => {
                    return Err(CIStatusError::DuplicateJob {
                        job_id,
                        pipeline_id: owner,
                    });
                }
                Some(_) => {}
                None => {
                    owners.insert(job_id, pipeline_id);
                }
            }
        }
        pipeline.upsert_job(job)?;

        debug!("Recorded job {job_id} for pipeline {pipeline_id}");
        Ok(())
    }

    /// Reacts to a write of a job's status, timestamps or coverage.
    ///
    /// Safe to deliver more than once: redundant calls leave the derived
    /// state unchanged and emit nothing.
    ///
    /// # Errors
    ///
    /// Returns `JobNotFound` if the job was never recorded.
    pub async fn job_changed(&self, job_id: JobId) -> Result<Option<StatusChange>> {
        let owner = read(&self.job_owners).get(&job_id).copied();
        let Some(pipeline_id) = owner else {
            warn!("Change notification for unknown job {job_id}");
            return Err(CIStatusError::JobNotFound(job_id));
        };

        self.reconcile(pipeline_id).await
    }

    /// Reconciles one pipeline and publishes the status edge, if any.
    ///
    /// # Errors
    ///
    /// Returns `PipelineNotFound` for an unknown id. A pipeline without jobs
    /// is not an error; it reconciles to `pending`.
    pub async fn reconcile(&self, pipeline_id: PipelineId) -> Result<Option<StatusChange>> {
        let shared = self.pipeline(pipeline_id)?;
        let mut pipeline = shared.lock().await;

        let change = pipeline.reconcile();
        if let Some(change) = change {
            info!(
                "Pipeline {} status changed: {} -> {}",
                change.pipeline_id, change.old_status, change.new_status
            );
            // Emitted under the pipeline lock so edges of one pipeline stay ordered.
            self.events.emit(change);
        }

        Ok(change)
    }

    /// Read-only view of a pipeline's derived state and queries.
    ///
    /// # Errors
    ///
    /// Returns `PipelineNotFound` for an unknown id.
    pub async fn report(&self, pipeline_id: PipelineId) -> Result<PipelineReport> {
        let shared = self.pipeline(pipeline_id)?;
        let pipeline = shared.lock().await;
        Ok(PipelineReport::from_pipeline(&pipeline))
    }

    /// Stage ordering across the given pipelines; unknown ids are skipped.
    pub async fn stages(&self, pipeline_ids: &[PipelineId]) -> Vec<String> {
        let shared: Vec<SharedPipeline> = {
            let pipelines = read(&self.pipelines);
            pipeline_ids
                .iter()
                .filter_map(|id| pipelines.get(id).cloned())
                .collect()
        };

        // Clones keep the lock scope per pipeline.
        let mut snapshots = Vec::with_capacity(shared.len());
        for pipeline in &shared {
            snapshots.push(pipeline.lock().await.clone());
        }

        crate::pipeline::stages(&snapshots)
    }

    pub fn pipeline_ids(&self) -> Vec<PipelineId> {
        let mut ids: Vec<PipelineId> = read(&self.pipelines).keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn pipeline(&self, pipeline_id: PipelineId) -> Result<SharedPipeline> {
        read(&self.pipelines)
            .get(&pipeline_id)
            .cloned()
            .ok_or(CIStatusError::PipelineNotFound(pipeline_id))
    }
}

// A poisoned index only means another thread panicked mid-update of a plain
// map; the map itself is still consistent.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(std::sync::PoisonError::into_inner)
}
