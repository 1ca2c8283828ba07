//! Pure reductions from a pipeline's job records to its derived state.
//!
//! Every function here reads a snapshot and returns a value; none of them
//! mutates anything, so they are safe to call from any thread.

mod coverage;
mod retry;
mod status;
mod timing;

pub use coverage::{aggregate_coverage, Coverage};
pub use retry::{current_jobs, retried_jobs};
pub use status::aggregate_status;
pub use timing::{aggregate_timing, Timing};
