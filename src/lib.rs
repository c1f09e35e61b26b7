// Media Jobs - upload media, run a queued inference job and fetch the result

pub mod config;
pub mod credentials;
pub mod jobs;
pub mod keygen;
pub mod render;
pub mod storage;
pub mod types;
pub mod utils;
pub mod workflow;

// Re-exports for convenience
pub use config::Config;
pub use types::{AppError, AppResult};
pub use workflow::{JobResult, TaskArgs, Workflow};
