use std::collections::HashSet;

use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::job::{JobId, JobRecord};

/// Selects the latest attempt for every job name.
///
/// Records are grouped by `name` and the one with the greatest `id` wins.
/// Result order follows the first appearance of each name in `jobs`, so the
/// same input always renders the same way.
pub fn current_jobs(jobs: &[JobRecord]) -> Vec<&JobRecord> {
    latest_by_name(jobs).into_values().collect()
}

/// Returns every superseded attempt, in input order.
pub fn retried_jobs(jobs: &[JobRecord]) -> Vec<&JobRecord> {
    let current: HashSet<JobId> = latest_by_name(jobs).values().map(|j| j.id).collect();
    jobs.iter().filter(|j| !current.contains(&j.id)).collect()
}

fn latest_by_name(jobs: &[JobRecord]) -> IndexMap<&str, &JobRecord> {
    let mut latest: IndexMap<&str, &JobRecord> = IndexMap::with_capacity(jobs.len());
    for job in jobs {
        match latest.entry(job.name.as_str()) {
            Entry::Occupied(mut best) => {
                if job.id > best.get().id {
                    best.insert(job);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(job);
            }
        }
    }
    latest
}
