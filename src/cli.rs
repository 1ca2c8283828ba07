use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use futures::future::join_all;
use log::{info, warn};
use tokio::sync::broadcast::error::TryRecvError;

use crate::config::{Config, OutputFormat};
use crate::engine::PipelineEngine;
use crate::events::EventEmitter;
use crate::notification::NotificationSettings;
use crate::pipeline::{PipelineId, Sha};
use crate::report::{resolve_notifications, StatusReport};
use crate::snapshot::Snapshot;

use crate::output::{self, PhaseProgress};

#[derive(Parser)]
#[command(name = "cistatus")]
#[command(author, version, about = "CI pipeline status aggregation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./cistatus.toml or the user config dir)
    #[arg(short, long, global = true, env = "CISTATUS_CONFIG")]
    config: Option<PathBuf>,

    /// Write output to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile every pipeline in a snapshot and report the derived state
    Reconcile {
        /// JSON, YAML or TOML file with pipelines and their job records
        snapshot: PathBuf,

        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },
    /// Print the stage ordering across all pipelines in a snapshot
    Stages { snapshot: PathBuf },
    /// Check whether a commit sha would be accepted for a pipeline
    CheckSha { sha: String },
}

impl Cli {
    async fn execute_reconcile(
        &self,
        config: &Config,
        snapshot_path: &Path,
        format: OutputFormat,
    ) -> Result<()> {
        info!("Reconciling pipelines from: {}", snapshot_path.display());

        // Phase 1: Loading snapshot
        let progress = PhaseProgress::start_loading();
        let snapshot = Snapshot::load(snapshot_path)
            .with_context(|| format!("Failed to load snapshot: {}", snapshot_path.display()))?;

        // Phase 2: Recording jobs
        let progress = progress.finish_loading_start_recording(snapshot.total_jobs());
        let engine = Arc::new(build_engine(config)?);
        let mut events = engine.subscribe();
        let pipeline_ids = register(&engine, &snapshot).await?;

        // Phase 3: Reconciling
        let progress = progress.finish_recording_start_reconciling();

        // Change notifications arrive concurrently and in no particular order.
        let deliveries = snapshot
            .pipelines
            .iter()
            .flat_map(|p| p.jobs.iter().map(|j| j.id))
            .map(|job_id| {
                let engine = Arc::clone(&engine);
                async move { engine.job_changed(job_id).await }
            });
        for result in join_all(deliveries).await {
            result?;
        }

        // One more pass after bulk creation covers pipelines without jobs.
        for &id in &pipeline_ids {
            engine.reconcile(id).await?;
        }

        let mut changes = Vec::new();
        loop {
            match events.try_recv() {
                Ok(change) => changes.push(change),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Status change events lagged, {skipped} not counted");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }

        let mut pipelines = Vec::with_capacity(pipeline_ids.len());
        for &id in &pipeline_ids {
            pipelines.push(engine.report(id).await?);
        }

        let mut settings = NotificationSettings::new(config.notifications.default_level);
        for setting in &snapshot.notification_settings {
            settings.insert(setting.clone())?;
        }
        let notifications = resolve_notifications(&mut settings, &changes, &pipelines);

        let report = StatusReport {
            generated_at: Utc::now(),
            total_pipelines: pipelines.len(),
            total_jobs: snapshot.total_jobs(),
            status_changes: changes.len(),
            stages: engine.stages(&pipeline_ids).await,
            pipelines,
            notifications,
        };

        progress.finish_reconciling();

        match format {
            OutputFormat::Summary if self.output.is_none() => output::print_summary(&report),
            OutputFormat::Summary => self.emit(&output::render_summary(&report))?,
            OutputFormat::Json => {
                let json_output = if self.pretty || config.output.pretty {
                    serde_json::to_string_pretty(&report)?
                } else {
                    serde_json::to_string(&report)?
                };
                self.emit(&json_output)?;
            }
        }

        Ok(())
    }

    async fn execute_stages(&self, config: &Config, snapshot_path: &Path) -> Result<()> {
        let snapshot = Snapshot::load(snapshot_path)
            .with_context(|| format!("Failed to load snapshot: {}", snapshot_path.display()))?;

        let engine = build_engine(config)?;
        let pipeline_ids = register(&engine, &snapshot).await?;
        let stages = engine.stages(&pipeline_ids).await;

        if self.output.is_some() {
            self.emit(&stages.join("\n"))?;
        } else {
            output::print_stages(&stages);
        }
        Ok(())
    }

    fn execute_check_sha(sha: &str) -> Result<()> {
        match Sha::parse(sha) {
            Ok(sha) => {
                println!("{} {}", output::bright_green("✓ valid"), sha.short());
                Ok(())
            }
            Err(err) => {
                eprintln!("{} {err}", output::bright_red("✗ rejected"));
                Err(err.into())
            }
        }
    }

    fn emit(&self, contents: &str) -> Result<()> {
        if let Some(output_path) = &self.output {
            std::fs::write(output_path, contents)
                .with_context(|| format!("Failed to write output: {}", output_path.display()))?;
            info!("Report written to: {}", output_path.display());
        } else {
            println!("{contents}");
        }
        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Reconcile { snapshot, format } => {
                let format = format.unwrap_or(config.output.format);
                self.execute_reconcile(&config, snapshot, format).await
            }
            Commands::Stages { snapshot } => self.execute_stages(&config, snapshot).await,
            Commands::CheckSha { sha } => Self::execute_check_sha(sha),
        }
    }
}

fn build_engine(config: &Config) -> Result<PipelineEngine> {
    let events = EventEmitter::new(config.engine.event_capacity)?;
    Ok(PipelineEngine::new(events, config.engine.default_status))
}

/// Registers every pipeline and stores its job records, in snapshot order.
async fn register(engine: &PipelineEngine, snapshot: &Snapshot) -> Result<Vec<PipelineId>> {
    let mut ids = Vec::with_capacity(snapshot.pipelines.len());
    for entry in &snapshot.pipelines {
        let id = engine
            .create_pipeline(entry.pipeline.clone())
            .with_context(|| format!("Pipeline {} rejected", entry.pipeline.id))?;
        for job in entry.owned_jobs() {
            engine.record_job(job).await?;
        }
        ids.push(id);
    }
    Ok(ids)
}
