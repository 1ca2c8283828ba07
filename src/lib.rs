//! Pipeline status aggregation for CI systems.
//!
//! A pipeline's status, timing and coverage are derived from the latest
//! attempt of each of its jobs. [`engine::PipelineEngine`] reconciles that
//! derived state whenever a job changes and publishes status edges through
//! [`events::EventEmitter`].

pub mod aggregation;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod job;
pub mod notification;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod snapshot;
pub mod status;
