//! Job workflow
//!
//! One run is strictly sequential: upload the inputs, submit the job, poll
//! its status and hand the output to the caller. Any failure ends the run
//! with an [`AppError`]; nothing is retried.

use std::path::PathBuf;
use tracing::{info, instrument};

use crate::config::StorageConfig;
use crate::credentials::Credentials;
use crate::jobs::{JobApi, JobId, JobInput, JobOutput, JobRequest, PollConfig, Poller, Task, TaskInput};
use crate::keygen;
use crate::storage::{upload_all, ObjectStore, UploadSource, UploadedObject};
use crate::types::{AppError, AppResult};

/// User input for one task
#[derive(Debug, Clone)]
pub enum TaskArgs {
    Upscale {
        image: PathBuf,
    },
    FaceSwap {
        source: PathBuf,
        destination: PathBuf,
        source_index: u32,
        destination_index: u32,
    },
    TextToImage {
        prompt: String,
    },
    ImageToVideo {
        image: PathBuf,
        prompt: Option<String>,
        negative_prompt: Option<String>,
    },
    TextToSpeech {
        text: String,
        language: String,
        reference_audio: Option<PathBuf>,
    },
    LipSync {
        video: PathBuf,
        audio: PathBuf,
    },
    Inpaint {
        image: PathBuf,
        prompt: String,
    },
    SketchToImage {
        image: PathBuf,
        prompt: Option<String>,
        negative_prompt: Option<String>,
    },
}

impl TaskArgs {
    pub fn task(&self) -> Task {
        match self {
            TaskArgs::Upscale { .. } => Task::Upscale,
            TaskArgs::FaceSwap { .. } => Task::FaceSwap,
            TaskArgs::TextToImage { .. } => Task::TextToImage,
            TaskArgs::ImageToVideo { .. } => Task::ImageToVideo,
            TaskArgs::TextToSpeech { .. } => Task::TextToSpeech,
            TaskArgs::LipSync { .. } => Task::LipSync,
            TaskArgs::Inpaint { .. } => Task::Inpaint,
            TaskArgs::SketchToImage { .. } => Task::SketchToImage,
        }
    }

    /// Local files to upload, in the order the request expects them
    pub fn files(&self) -> Vec<(&PathBuf, Option<&'static str>)> {
        match self {
            TaskArgs::Upscale { image }
            | TaskArgs::ImageToVideo { image, .. }
            | TaskArgs::Inpaint { image, .. }
            | TaskArgs::SketchToImage { image, .. } => vec![(image, None)],
            TaskArgs::FaceSwap { source, destination, .. } => vec![(source, None), (destination, None)],
            TaskArgs::TextToImage { .. } => vec![],
            TaskArgs::TextToSpeech { reference_audio, .. } => reference_audio
                .iter()
                .map(|path| (path, Some("reference_")))
                .collect(),
            TaskArgs::LipSync { video, audio } => vec![(video, None), (audio, None)],
        }
    }

    pub fn needs_storage(&self) -> bool {
        !self.files().is_empty()
    }

    fn validate(&self, credentials: &Credentials) -> AppResult<()> {
        for (path, _) in self.files() {
            if !path.is_file() {
                return Err(AppError::InvalidRequest(format!(
                    "Please select a file to upload: {} does not exist",
                    path.display()
                )));
            }
        }

        match self {
            TaskArgs::TextToImage { prompt } | TaskArgs::Inpaint { prompt, .. } if prompt.trim().is_empty() => {
                Err(AppError::InvalidRequest("a prompt is required".to_string()))
            }
            TaskArgs::TextToSpeech { text, .. } if text.trim().is_empty() => {
                Err(AppError::InvalidRequest("text to synthesize is required".to_string()))
            }
            TaskArgs::TextToImage { .. }
                if credentials.auth_token.as_deref().unwrap_or_default().is_empty() =>
            {
                Err(AppError::InvalidRequest(
                    "text-to-image needs a model hub auth token".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Task payload, with uploaded keys in the order of [`TaskArgs::files`]
    fn task_input(&self, uploaded: &[UploadedObject], credentials: &Credentials) -> AppResult<TaskInput> {
        let key = |index: usize| -> AppResult<String> {
            uploaded
                .get(index)
                .map(|object| object.key.clone())
                .ok_or_else(|| AppError::Upload(format!("missing uploaded file #{}", index + 1)))
        };

        let input = match self {
            TaskArgs::Upscale { .. } => TaskInput::Upscale { input_key: key(0)? },
            TaskArgs::FaceSwap {
                source_index,
                destination_index,
                ..
            } => TaskInput::FaceSwap {
                source_file_key: key(0)?,
                destination_file_key: key(1)?,
                source_file_index: *source_index,
                destination_file_index: *destination_index,
            },
            TaskArgs::TextToImage { prompt } => TaskInput::TextToImage {
                hf_auth_token: credentials.auth_token.clone().unwrap_or_default(),
                hf_prompt: prompt.clone(),
            },
            TaskArgs::ImageToVideo {
                prompt,
                negative_prompt,
                ..
            } => TaskInput::ImageToVideo {
                input_key: key(0)?,
                prompt: prompt.clone(),
                negative_prompt: negative_prompt.clone(),
            },
            TaskArgs::TextToSpeech { text, language, .. } => TaskInput::TextToSpeech {
                text: text.clone(),
                language: language.clone(),
                reference_key: uploaded.first().map(|object| object.key.clone()),
            },
            TaskArgs::LipSync { .. } => TaskInput::LipSync {
                video_input_key: key(0)?,
                audio_input_key: key(1)?,
            },
            TaskArgs::Inpaint { prompt, .. } => TaskInput::Inpaint {
                input_key: key(0)?,
                hf_prompt: prompt.clone(),
            },
            TaskArgs::SketchToImage {
                prompt,
                negative_prompt,
                ..
            } => TaskInput::SketchToImage {
                input_key: key(0)?,
                prompt: prompt.clone(),
                negative_prompt: negative_prompt.clone(),
            },
        };
        Ok(input)
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct JobResult {
    pub task: Task,
    pub job_id: JobId,
    pub output_key: String,
    pub uploads: Vec<UploadedObject>,
    pub output: JobOutput,
}

pub struct Workflow<'a, S: ObjectStore + ?Sized, J: JobApi + ?Sized> {
    store: &'a S,
    api: &'a J,
    storage: StorageConfig,
    credentials: Credentials,
    poll: PollConfig,
}

impl<'a, S: ObjectStore + ?Sized, J: JobApi + ?Sized> Workflow<'a, S, J> {
    pub fn new(
        store: &'a S,
        api: &'a J,
        storage: StorageConfig,
        credentials: Credentials,
        poll: PollConfig,
    ) -> Self {
        Self {
            store,
            api,
            storage,
            credentials,
            poll,
        }
    }

    /// Upload the inputs and build the `/run` request.
    pub async fn prepare(&self, args: &TaskArgs) -> AppResult<(JobRequest, Vec<UploadedObject>)> {
        args.validate(&self.credentials)?;

        let sources: Vec<UploadSource> = args
            .files()
            .into_iter()
            .map(|(path, prefix)| UploadSource::new(path.clone(), prefix))
            .collect();
        let uploaded = if sources.is_empty() {
            Vec::new()
        } else {
            upload_all(self.store, &sources).await?
        };

        let (prefix, extension) = args.task().output_key_format();
        let request = JobRequest {
            input: JobInput {
                bucket_name: self.storage.bucket.clone(),
                output_key: keygen::output_key(prefix, extension),
                aws_access_key_id: self.credentials.access_key_id.clone(),
                aws_secret_access_key: self.credentials.secret_access_key.clone(),
                endpoint: self.storage.endpoint.clone(),
                aws_region: self.storage.region.clone(),
                task: args.task_input(&uploaded, &self.credentials)?,
            },
        };
        Ok((request, uploaded))
    }

    #[instrument(skip_all, fields(task = %args.task()))]
    pub async fn run(&self, args: &TaskArgs) -> AppResult<JobResult> {
        let (request, uploads) = self.prepare(args).await?;

        let job_id = self.api.submit(&request).await?;
        info!("Submitted job {}, polling every {:?}", job_id, self.poll.interval);

        let mut poller = Poller::new(self.api, self.poll.clone());
        let output = poller.run(&job_id).await?;

        Ok(JobResult {
            task: args.task(),
            job_id,
            output_key: request.input.output_key,
            uploads,
            output,
        })
    }
}
