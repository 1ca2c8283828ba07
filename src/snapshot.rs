use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::job::JobRecord;
use crate::notification::NotificationSetting;
use crate::pipeline::NewPipeline;

/// Pipelines and their job records as handed over by a persistence layer.
///
/// Accepted as JSON, YAML or TOML; jobs are nested under their pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub pipelines: Vec<PipelineSnapshot>,
    /// Stored per-user notification preferences
    #[serde(default)]
    pub notification_settings: Vec<NotificationSetting>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    #[serde(flatten)]
    pub pipeline: NewPipeline,
    #[serde(default)]
    pub jobs: Vec<JobRecord>,
}

impl PipelineSnapshot {
    /// Job records stamped with the owning pipeline id.
    pub fn owned_jobs(&self) -> impl Iterator<Item = JobRecord> + '_ {
        self.jobs.iter().cloned().map(|mut job| {
            job.pipeline_id = self.pipeline.id;
            job
        })
    }
}

impl Snapshot {
    /// Reads a snapshot, picking the format from the file extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;

        let snapshot: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => serde_yaml::from_str(&contents)?,
            Some("toml") => toml::from_str(&contents)?,
            _ => serde_json::from_str(&contents)?,
        };

        debug!("Loaded snapshot from: {}", path.display());
        Ok(snapshot)
    }

    pub fn total_jobs(&self) -> usize {
        self.pipelines.iter().map(|p| p.jobs.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{NotificationLevel, NotificationSource};
    use crate::status::Status;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const JSON: &str = r#"{
  "pipelines": [
    {
      "id": 1,
      "sha": "97de212e80737a608d939f648d959671fb0a0142",
      "ref": "main",
      "project_id": 3,
      "jobs": [
        {"id": 1, "name": "rspec", "stage": "test", "stage_order": 1, "status": "failed"},
        {"id": 2, "name": "rspec", "stage": "test", "stage_order": 1, "status": "success", "coverage": 81.5}
      ]
    }
  ]
}"#;

    #[test]
    fn loads_json_snapshot() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        write!(file, "{JSON}").unwrap();

        let snapshot = Snapshot::load(file.path()).unwrap();
        assert_eq!(snapshot.pipelines.len(), 1);
        assert_eq!(snapshot.total_jobs(), 2);

        let pipeline = &snapshot.pipelines[0];
        assert_eq!(pipeline.pipeline.ref_, "main");
        assert!(!pipeline.pipeline.tag);
        assert_eq!(pipeline.jobs[1].status, Status::Success);
        assert!(snapshot.notification_settings.is_empty());
    }

    #[test]
    fn loads_notification_settings() {
        let snapshot: Snapshot = serde_json::from_str(
            r#"{
  "notification_settings": [
    {"user_id": 5, "source": {"type": "project", "id": 3}, "level": 2},
    {"user_id": 6, "source": {"type": "group", "id": 1}, "level": "disabled"}
  ]
}"#,
        )
        .unwrap();

        assert_eq!(snapshot.notification_settings.len(), 2);
        assert_eq!(
            snapshot.notification_settings[0].source,
            NotificationSource::Project(3)
        );
        assert_eq!(
            snapshot.notification_settings[1].level,
            NotificationLevel::Disabled
        );
    }

    #[test]
    fn stamps_owner_on_jobs() {
        let snapshot: Snapshot = serde_json::from_str(JSON).unwrap();
        let jobs: Vec<JobRecord> = snapshot.pipelines[0].owned_jobs().collect();
        assert!(jobs.iter().all(|j| j.pipeline_id == 1));
    }

    #[test]
    fn loads_yaml_snapshot() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        write!(
            file,
            r#"
pipelines:
  - id: 4
    sha: 97de212e80737a608d939f648d959671fb0a0142
    tag: true
    project_id: 1
    jobs:
      - id: 10
        name: build
        stage: build
        status: running
"#
        )
        .unwrap();

        let snapshot = Snapshot::load(file.path()).unwrap();
        assert!(snapshot.pipelines[0].pipeline.tag);
        assert_eq!(snapshot.pipelines[0].jobs[0].status, Status::Running);
    }

    #[test]
    fn rejects_unknown_job_status() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        write!(file, "{}", JSON.replace("\"failed\"", "\"exploded\"")).unwrap();

        assert!(Snapshot::load(file.path()).is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Snapshot::load(Path::new("no/such/snapshot.json")).unwrap_err();
        assert!(matches!(err, crate::error::CIStatusError::Io(_)));
    }
}
