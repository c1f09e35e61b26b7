//! Queue-based inference jobs
//!
//! Request and status payloads for the job API, the tasks it can run and the
//! client and poller that drive a job to completion.

pub mod client;
pub mod poller;

pub use client::{JobApi, RunpodClient};
pub use poller::{PollConfig, PollState, Poller};

use serde::{Deserialize, Serialize};

use crate::render::ResultKind;

/// Tasks served by the inference endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    Upscale,
    FaceSwap,
    TextToImage,
    ImageToVideo,
    TextToSpeech,
    LipSync,
    Inpaint,
    SketchToImage,
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Task::Upscale => write!(f, "upscale"),
            Task::FaceSwap => write!(f, "face-swap"),
            Task::TextToImage => write!(f, "text-to-image"),
            Task::ImageToVideo => write!(f, "image-to-video"),
            Task::TextToSpeech => write!(f, "text-to-speech"),
            Task::LipSync => write!(f, "lip-sync"),
            Task::Inpaint => write!(f, "inpaint"),
            Task::SketchToImage => write!(f, "sketch-to-image"),
        }
    }
}

impl Task {
    /// Media produced by the task
    pub fn result_kind(&self) -> ResultKind {
        match self {
            Task::ImageToVideo | Task::LipSync => ResultKind::Video,
            Task::TextToSpeech => ResultKind::Audio,
            _ => ResultKind::Image,
        }
    }

    /// Prefix and extension of the generated output key
    pub fn output_key_format(&self) -> (Option<&'static str>, Option<&'static str>) {
        match self {
            Task::ImageToVideo | Task::LipSync => (None, Some("mp4")),
            Task::TextToSpeech => (Some("output_"), Some("wav")),
            _ => (None, None),
        }
    }
}

/// Identifier returned by the queue for a submitted job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of a `/run` request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRequest {
    pub input: JobInput,
}

/// Fields every handler reads, plus the task specific ones
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobInput {
    pub bucket_name: String,
    pub output_key: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub endpoint: String,
    pub aws_region: String,
    #[serde(flatten)]
    pub task: TaskInput,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TaskInput {
    Upscale {
        input_key: String,
    },
    FaceSwap {
        source_file_key: String,
        destination_file_key: String,
        source_file_index: u32,
        destination_file_index: u32,
    },
    TextToImage {
        hf_auth_token: String,
        hf_prompt: String,
    },
    ImageToVideo {
        input_key: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        prompt: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        negative_prompt: Option<String>,
    },
    TextToSpeech {
        text: String,
        language: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reference_key: Option<String>,
    },
    LipSync {
        video_input_key: String,
        audio_input_key: String,
    },
    Inpaint {
        input_key: String,
        hf_prompt: String,
    },
    SketchToImage {
        input_key: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        prompt: Option<String>,
        #[serde(rename = "negativePrompt", skip_serializing_if = "Option::is_none")]
        negative_prompt: Option<String>,
    },
}

impl TaskInput {
    pub fn task(&self) -> Task {
        match self {
            TaskInput::Upscale { .. } => Task::Upscale,
            TaskInput::FaceSwap { .. } => Task::FaceSwap,
            TaskInput::TextToImage { .. } => Task::TextToImage,
            TaskInput::ImageToVideo { .. } => Task::ImageToVideo,
            TaskInput::TextToSpeech { .. } => Task::TextToSpeech,
            TaskInput::LipSync { .. } => Task::LipSync,
            TaskInput::Inpaint { .. } => Task::Inpaint,
            TaskInput::SketchToImage { .. } => Task::SketchToImage,
        }
    }
}

/// Job state as reported by `/status`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum JobStatus {
    InQueue,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
    Unknown(String),
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "IN_QUEUE" => JobStatus::InQueue,
            "IN_PROGRESS" => JobStatus::InProgress,
            "COMPLETED" => JobStatus::Completed,
            "FAILED" => JobStatus::Failed,
            "CANCELLED" => JobStatus::Cancelled,
            "TIMED_OUT" => JobStatus::TimedOut,
            _ => JobStatus::Unknown(value),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::InQueue => write!(f, "IN_QUEUE"),
            JobStatus::InProgress => write!(f, "IN_PROGRESS"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Failed => write!(f, "FAILED"),
            JobStatus::Cancelled => write!(f, "CANCELLED"),
            JobStatus::TimedOut => write!(f, "TIMED_OUT"),
            JobStatus::Unknown(other) => write!(f, "{}", other),
        }
    }
}

impl JobStatus {
    /// No further transition happens from a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled | JobStatus::TimedOut
        )
    }
}

/// Response of `/run`
#[derive(Debug, Clone, Deserialize)]
pub struct RunResponse {
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<JobStatus>,
}

/// Response of `/status/{id}`
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub id: Option<String>,
    pub status: JobStatus,
    #[serde(default)]
    pub output: Option<JobOutput>,
    #[serde(default)]
    pub error: Option<String>,
}

/// What a completed handler returned: a URL or a small object holding one
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum JobOutput {
    Url(String),
    Object(OutputObject),
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct OutputObject {
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub output_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl JobOutput {
    pub fn url(&self) -> Option<&str> {
        match self {
            JobOutput::Url(url) => Some(url.as_str()),
            JobOutput::Object(object) => object
                .audio_url
                .as_deref()
                .or(object.video_url.as_deref())
                .or(object.image_url.as_deref())
                .or(object.output_url.as_deref())
                .or(object.url.as_deref()),
        }
    }

    /// Error reported by the handler inside an otherwise completed job
    pub fn error(&self) -> Option<&str> {
        match self {
            JobOutput::Url(_) => None,
            JobOutput::Object(object) => object.error.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_shape() {
        let request = JobRequest {
            input: JobInput {
                bucket_name: "bucket".to_string(),
                output_key: "out".to_string(),
                aws_access_key_id: "ak".to_string(),
                aws_secret_access_key: "sk".to_string(),
                endpoint: "https://bucket.fra1.digitaloceanspaces.com".to_string(),
                aws_region: "fra1".to_string(),
                task: TaskInput::FaceSwap {
                    source_file_key: "src.jpg".to_string(),
                    destination_file_key: "dst.jpg".to_string(),
                    source_file_index: 1,
                    destination_file_index: 0,
                },
            },
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "input": {
                    "bucket_name": "bucket",
                    "output_key": "out",
                    "aws_access_key_id": "ak",
                    "aws_secret_access_key": "sk",
                    "endpoint": "https://bucket.fra1.digitaloceanspaces.com",
                    "aws_region": "fra1",
                    "source_file_key": "src.jpg",
                    "destination_file_key": "dst.jpg",
                    "source_file_index": 1,
                    "destination_file_index": 0
                }
            })
        );
    }

    #[test]
    fn test_optional_task_fields_are_omitted() {
        let speech = serde_json::to_value(TaskInput::TextToSpeech {
            text: "hello".to_string(),
            language: "en".to_string(),
            reference_key: None,
        })
        .unwrap();
        assert_eq!(speech, json!({"text": "hello", "language": "en"}));

        let sketch = serde_json::to_value(TaskInput::SketchToImage {
            input_key: "k.png".to_string(),
            prompt: None,
            negative_prompt: Some("blurry".to_string()),
        })
        .unwrap();
        assert_eq!(sketch, json!({"input_key": "k.png", "negativePrompt": "blurry"}));

        let video = serde_json::to_value(TaskInput::ImageToVideo {
            input_key: "still.png".to_string(),
            prompt: Some("slow pan".to_string()),
            negative_prompt: None,
        })
        .unwrap();
        assert_eq!(video, json!({"input_key": "still.png", "prompt": "slow pan"}));

        let bare = serde_json::to_value(TaskInput::ImageToVideo {
            input_key: "still.png".to_string(),
            prompt: None,
            negative_prompt: None,
        })
        .unwrap();
        assert_eq!(bare, json!({"input_key": "still.png"}));
    }

    #[test]
    fn test_status_parsing() {
        let response: StatusResponse = serde_json::from_value(json!({
            "id": "abc-123",
            "status": "COMPLETED",
            "output": "https://x/y.png"
        }))
        .unwrap();
        assert_eq!(response.status, JobStatus::Completed);
        assert_eq!(response.output.unwrap().url(), Some("https://x/y.png"));

        let queued: StatusResponse = serde_json::from_value(json!({"status": "IN_QUEUE"})).unwrap();
        assert_eq!(queued.status, JobStatus::InQueue);
        assert!(queued.output.is_none());

        let odd: StatusResponse = serde_json::from_value(json!({"status": "PAUSED"})).unwrap();
        assert_eq!(odd.status, JobStatus::Unknown("PAUSED".to_string()));
        assert!(!odd.status.is_terminal());
    }

    #[test]
    fn test_object_output() {
        let output: JobOutput = serde_json::from_value(json!({
            "audio_url": "https://x/speech.wav",
            "language": "en",
            "used_voice_cloning": false
        }))
        .unwrap();
        assert_eq!(output.url(), Some("https://x/speech.wav"));
        assert_eq!(output.error(), None);

        let failed: JobOutput = serde_json::from_value(json!({"error": "CUDA out of memory"})).unwrap();
        assert_eq!(failed.url(), None);
        assert_eq!(failed.error(), Some("CUDA out of memory"));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::TimedOut.is_terminal());
        assert!(!JobStatus::InQueue.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_task_input_maps_back_to_task() {
        let input = TaskInput::LipSync {
            video_input_key: "v.mp4".to_string(),
            audio_input_key: "a.wav".to_string(),
        };
        assert_eq!(input.task(), Task::LipSync);
        assert_eq!(Task::LipSync.result_kind(), ResultKind::Video);
        assert_eq!(Task::TextToSpeech.output_key_format(), (Some("output_"), Some("wav")));
    }
}
