use anyhow::Result;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::jobs::{PollConfig, Task};
use crate::types::{AppError, AppResult};

pub const DEFAULT_BUCKET: &str = "assistos-demo-bucket";
pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://assistos-demo-bucket.fra1.digitaloceanspaces.com";
pub const DEFAULT_REGION: &str = "fra1";
pub const DEFAULT_API_BASE: &str = "https://api.runpod.ai/v2";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub api: ApiConfig,
    pub poll: PollSettings,
    pub credentials_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub endpoints: EndpointIds,
}

/// Queue endpoint id for each task.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointIds {
    pub upscale: Option<String>,
    pub face_swap: Option<String>,
    pub text_to_image: Option<String>,
    pub image_to_video: Option<String>,
    pub text_to_speech: Option<String>,
    pub lip_sync: Option<String>,
    pub inpaint: Option<String>,
    pub sketch_to_image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollSettings {
    pub interval_ms: u64,
    /// Zero disables the limit.
    pub max_attempts: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            endpoint: DEFAULT_STORAGE_ENDPOINT.to_string(),
            region: DEFAULT_REGION.to_string(),
        }
    }
}

impl Default for EndpointIds {
    fn default() -> Self {
        Self {
            upscale: Some("xufpmrxai3j5ee".to_string()),
            face_swap: Some("nvxq25nz8lnrm7".to_string()),
            text_to_image: Some("ynfas564lyueuq".to_string()),
            image_to_video: Some("n8mjvng9jjxist".to_string()),
            text_to_speech: Some("ynfas564lyueuq".to_string()),
            lip_sync: None,
            inpaint: None,
            sketch_to_image: None,
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: 5000,
            max_attempts: 720,
        }
    }
}

impl EndpointIds {
    pub fn for_task(&self, task: Task) -> Option<&str> {
        let id = match task {
            Task::Upscale => &self.upscale,
            Task::FaceSwap => &self.face_swap,
            Task::TextToImage => &self.text_to_image,
            Task::ImageToVideo => &self.image_to_video,
            Task::TextToSpeech => &self.text_to_speech,
            Task::LipSync => &self.lip_sync,
            Task::Inpaint => &self.inpaint,
            Task::SketchToImage => &self.sketch_to_image,
        };
        id.as_deref().filter(|id| !id.is_empty())
    }
}

impl PollSettings {
    pub fn to_poll_config(&self) -> AppResult<PollConfig> {
        if self.interval_ms == 0 {
            return Err(AppError::Config(
                "poll interval must be at least 1 ms".to_string(),
            ));
        }
        Ok(PollConfig {
            interval: Duration::from_millis(self.interval_ms),
            max_attempts: (self.max_attempts > 0).then_some(self.max_attempts),
        })
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = EndpointIds::default();
        let endpoint_id = |var: &str, default: Option<String>| env::var(var).ok().or(default);

        Ok(Self {
            storage: StorageConfig {
                bucket: env::var("S3_BUCKET").unwrap_or_else(|_| DEFAULT_BUCKET.to_string()),
                endpoint: env::var("S3_ENDPOINT")
                    .unwrap_or_else(|_| DEFAULT_STORAGE_ENDPOINT.to_string()),
                region: env::var("S3_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            },
            api: ApiConfig {
                base_url: env::var("JOB_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
                endpoints: EndpointIds {
                    upscale: endpoint_id("UPSCALE_ENDPOINT_ID", defaults.upscale),
                    face_swap: endpoint_id("FACE_SWAP_ENDPOINT_ID", defaults.face_swap),
                    text_to_image: endpoint_id("TEXT_TO_IMAGE_ENDPOINT_ID", defaults.text_to_image),
                    image_to_video: endpoint_id("IMAGE_TO_VIDEO_ENDPOINT_ID", defaults.image_to_video),
                    text_to_speech: endpoint_id("TEXT_TO_SPEECH_ENDPOINT_ID", defaults.text_to_speech),
                    lip_sync: endpoint_id("LIP_SYNC_ENDPOINT_ID", defaults.lip_sync),
                    inpaint: endpoint_id("INPAINT_ENDPOINT_ID", defaults.inpaint),
                    sketch_to_image: endpoint_id("SKETCH_TO_IMAGE_ENDPOINT_ID", defaults.sketch_to_image),
                },
            },
            poll: PollSettings {
                interval_ms: env::var("POLL_INTERVAL_MS")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()?,
                max_attempts: env::var("POLL_MAX_ATTEMPTS")
                    .unwrap_or_else(|_| "720".to_string())
                    .parse()?,
            },
            credentials_dir: env::var("MEDIA_JOBS_DATA_DIR").ok().map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_lookup() {
        let ids = EndpointIds::default();
        assert_eq!(ids.for_task(Task::Upscale), Some("xufpmrxai3j5ee"));
        assert_eq!(ids.for_task(Task::ImageToVideo), Some("n8mjvng9jjxist"));
        assert_eq!(ids.for_task(Task::LipSync), None);

        let blank = EndpointIds {
            inpaint: Some(String::new()),
            ..EndpointIds::default()
        };
        assert_eq!(blank.for_task(Task::Inpaint), None);
    }

    #[test]
    fn test_poll_settings() {
        let config = PollSettings::default().to_poll_config().unwrap();
        assert_eq!(config.interval, Duration::from_millis(5000));
        assert_eq!(config.max_attempts, Some(720));

        let unbounded = PollSettings { interval_ms: 10, max_attempts: 0 }
            .to_poll_config()
            .unwrap();
        assert_eq!(unbounded.max_attempts, None);
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let err = PollSettings { interval_ms: 0, max_attempts: 1 }
            .to_poll_config()
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
