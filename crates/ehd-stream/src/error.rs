use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Stream is not configured")]
    NotConfigured,
    #[error("Endpoint index {index} out of range ({len} endpoints)")]
    EndpointIndexOutOfRange { index: usize, len: usize },
    #[error("Failed to launch pipeline: {0}")]
    PipelineLaunchFailure(String),
    #[error("Pipeline runtime error: {0}")]
    PipelineRuntimeError(String),
    #[error("Failed to spawn pipeline thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}
