// Error types shared by every stage of a job run

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("File upload failed: {0}")]
    Upload(String),

    #[error("Job API error: {0}")]
    JobApi(String),

    #[error("Invalid response from job API: {0}")]
    InvalidResponse(String),

    #[error("Job {id} failed: {reason}")]
    JobFailed { id: String, reason: String },

    #[error("Job {id} did not finish after {attempts} status checks")]
    PollTimeout { id: String, attempts: u32 },

    #[error("Credential storage error: {0}")]
    Credentials(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type AppResult<T> = std::result::Result<T, AppError>;
