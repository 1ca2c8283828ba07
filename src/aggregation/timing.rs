use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::job::JobRecord;

/// Pipeline-level timestamps derived from the current job set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Timing {
    /// Earliest job start
    pub started_at: Option<DateTime<Utc>>,
    /// Latest job finish, only once every current job is settled
    pub finished_at: Option<DateTime<Utc>>,
    /// Sum of per-job run times in seconds (parallel jobs are not overlapped)
    pub duration: Option<i64>,
    /// Seconds from `started_at` to `finished_at`
    pub wall_clock_duration: Option<i64>,
}

pub fn aggregate_timing(current: &[&JobRecord]) -> Timing {
    if current.is_empty() {
        return Timing::default();
    }

    let started_at = current.iter().filter_map(|j| j.started_at).min();

    let all_settled = current.iter().all(|j| j.status.is_settled());
    let finished_at = if all_settled {
        current.iter().filter_map(|j| j.finished_at).max()
    } else {
        None
    };

    let duration = current
        .iter()
        .filter_map(|j| j.span())
        .fold(Duration::zero(), |total, span| total + span);

    let wall_clock_duration = match (started_at, finished_at) {
        (Some(started), Some(finished)) => Some((finished - started).num_seconds()),
        _ => None,
    };

    Timing {
        started_at,
        finished_at,
        duration: Some(duration.num_seconds()),
        wall_clock_duration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;

    fn create_job(
        id: u64,
        status: Status,
        started_ago: Option<i64>,
        finished_ago: Option<i64>,
        now: DateTime<Utc>,
    ) -> JobRecord {
        JobRecord {
            status,
            started_at: started_ago.map(|s| now - Duration::seconds(s)),
            finished_at: finished_ago.map(|s| now - Duration::seconds(s)),
            ..JobRecord::new(id, 1, &format!("job-{id}"), "test", 1)
        }
    }

    #[test]
    fn empty_set_has_no_timings() {
        let timing = aggregate_timing(&[]);
        assert_eq!(timing, Timing::default());
        assert!(timing.duration.is_none());
    }

    #[test]
    fn single_job_timings_are_copied() {
        let now = Utc::now();
        let job = create_job(1, Status::Success, Some(120), Some(60), now);
        let timing = aggregate_timing(&[&job]);

        assert_eq!(timing.started_at, job.started_at);
        assert_eq!(timing.finished_at, job.finished_at);
        assert_eq!(timing.duration, Some(60));
        assert_eq!(timing.wall_clock_duration, Some(60));
    }

    #[test]
    fn finished_at_is_latest_finish() {
        let now = Utc::now();
        let late = create_job(1, Status::Success, Some(300), Some(60), now);
        let early = create_job(2, Status::Failed, Some(300), Some(120), now);
        let timing = aggregate_timing(&[&late, &early]);

        assert_eq!(timing.finished_at, late.finished_at);
    }

    #[test]
    fn started_at_is_earliest_start() {
        let now = Utc::now();
        let first = create_job(1, Status::Success, Some(500), Some(400), now);
        let second = create_job(2, Status::Success, Some(300), Some(200), now);
        let timing = aggregate_timing(&[&second, &first]);

        assert_eq!(timing.started_at, first.started_at);
    }

    #[test]
    fn in_flight_job_clears_finished_at() {
        let now = Utc::now();
        let done = create_job(1, Status::Success, Some(120), Some(60), now);
        let running = create_job(2, Status::Running, Some(30), None, now);
        let timing = aggregate_timing(&[&done, &running]);

        assert!(timing.finished_at.is_none());
        assert!(timing.wall_clock_duration.is_none());
        assert_eq!(timing.started_at, done.started_at);
        assert_eq!(timing.duration, Some(60));
    }

    #[test]
    fn waiting_manual_job_does_not_hold_finished_at() {
        let now = Utc::now();
        let build = create_job(1, Status::Success, Some(120), Some(60), now);
        let deploy = create_job(2, Status::Manual, None, None, now);
        let timing = aggregate_timing(&[&build, &deploy]);

        assert_eq!(timing.finished_at, build.finished_at);
        assert_eq!(timing.wall_clock_duration, Some(60));
    }

    #[test]
    fn nothing_started_gives_null_start_and_zero_duration() {
        let now = Utc::now();
        let job = create_job(1, Status::Pending, None, None, now);
        let timing = aggregate_timing(&[&job]);

        assert!(timing.started_at.is_none());
        assert!(timing.finished_at.is_none());
        assert_eq!(timing.duration, Some(0));
    }

    #[test]
    fn duration_sums_parallel_jobs() {
        let now = Utc::now();
        let a = create_job(1, Status::Success, Some(100), Some(40), now);
        let b = create_job(2, Status::Success, Some(100), Some(70), now);
        let timing = aggregate_timing(&[&a, &b]);

        assert_eq!(timing.duration, Some(90), "Spans add up without overlap removal");
        assert_eq!(timing.wall_clock_duration, Some(60));
    }

    #[test]
    fn jobs_missing_a_timestamp_contribute_nothing() {
        let now = Utc::now();
        let full = create_job(1, Status::Success, Some(100), Some(50), now);
        let finished_only = create_job(2, Status::Canceled, None, Some(10), now);
        let timing = aggregate_timing(&[&full, &finished_only]);

        assert_eq!(timing.duration, Some(50));
        assert_eq!(timing.finished_at, finished_only.finished_at);
    }
}
