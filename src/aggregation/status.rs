use crate::job::JobRecord;
use crate::status::Status;

/// Reduces the current job set into one pipeline status.
///
/// Each job contributes its effective status (an allowed failure counts as
/// success) and the highest-precedence one wins. An empty set is `pending`.
pub fn aggregate_status(current: &[&JobRecord]) -> Status {
    current
        .iter()
        .map(|job| job.effective_status())
        .max_by_key(|status| status.precedence())
        .map_or(Status::Pending, collapse_manual)
}

// `manual` shares a rank with `skipped`; report the weaker signal as skipped.
fn collapse_manual(status: Status) -> Status {
    match status {
        Status::Manual => Status::Skipped,
        other => other,
    }
}
