use thiserror::Error;

#[derive(Error, Debug)]
pub enum CIStatusError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Job not found: {0}")]
    JobNotFound(u64),

    #[error("Pipeline not found: {0}")]
    PipelineNotFound(u64),

    #[error("Pipeline already registered: {0}")]
    DuplicatePipeline(u64),

    #[error("Job {job_id} already belongs to pipeline {pipeline_id}")]
    DuplicateJob { job_id: u64, pipeline_id: u64 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CIStatusError>;
