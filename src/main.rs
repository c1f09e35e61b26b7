use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};

use media_jobs::{
    config::Config,
    credentials::{CredentialOverrides, CredentialStatus, CredentialStore},
    jobs::RunpodClient,
    render::ResultRenderer,
    storage::S3Client,
    utils::init_logger,
    TaskArgs, Workflow,
};

#[derive(Parser, Debug)]
#[command(name = "media-jobs", version, about = "Run media inference jobs against a queue API")]
struct Cli {
    #[command(flatten)]
    credentials: CredentialArgs,

    /// Do not cache the credentials used for this run
    #[arg(long, global = true)]
    no_save: bool,

    /// Also write the result as an HTML snippet
    #[arg(long, global = true, value_name = "PATH")]
    html: Option<PathBuf>,

    /// Milliseconds between status checks (overrides POLL_INTERVAL_MS)
    #[arg(long, global = true, value_name = "MS")]
    poll_interval_ms: Option<u64>,

    /// Status checks before giving up, 0 for no limit (overrides POLL_MAX_ATTEMPTS)
    #[arg(long, global = true)]
    max_attempts: Option<u32>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct CredentialArgs {
    /// Object storage access key id
    #[arg(long, global = true, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    access_key_id: Option<String>,

    /// Object storage secret key
    #[arg(long, global = true, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    secret_access_key: Option<String>,

    /// Job API key
    #[arg(long, global = true, env = "RUNPOD_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model hub token (text-to-image)
    #[arg(long, global = true, env = "HF_AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,
}

impl From<CredentialArgs> for CredentialOverrides {
    fn from(args: CredentialArgs) -> Self {
        Self {
            access_key_id: args.access_key_id,
            secret_access_key: args.secret_access_key,
            api_key: args.api_key,
            auth_token: args.auth_token,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Restore and upscale a face image
    Upscale {
        #[arg(long)]
        image: PathBuf,
    },
    /// Swap a face from one image onto another
    FaceSwap {
        #[arg(long)]
        source: PathBuf,
        #[arg(long)]
        destination: PathBuf,
        /// Face to take from the source image
        #[arg(long, default_value_t = 1)]
        source_index: u32,
        /// Face to replace in the destination image
        #[arg(long, default_value_t = 1)]
        destination_index: u32,
    },
    /// Generate an image from a prompt
    TextToImage {
        #[arg(long)]
        prompt: String,
    },
    /// Animate a still image into a video
    ImageToVideo {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long)]
        negative_prompt: Option<String>,
    },
    /// Synthesize speech, optionally cloning a reference voice
    TextToSpeech {
        #[arg(long)]
        text: String,
        #[arg(long, default_value = "en")]
        language: String,
        #[arg(long)]
        reference_audio: Option<PathBuf>,
    },
    /// Sync a video's lip movement to an audio track
    LipSync {
        #[arg(long)]
        video: PathBuf,
        #[arg(long)]
        audio: PathBuf,
    },
    /// Edit an image following a prompt
    Inpaint {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        prompt: String,
    },
    /// Turn a sketch or caricature into a realistic image
    SketchToImage {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long)]
        negative_prompt: Option<String>,
    },
    /// Manage cached credentials
    Credentials {
        #[command(subcommand)]
        action: CredentialsAction,
    },
}

#[derive(Subcommand, Debug)]
enum CredentialsAction {
    /// Store the credentials given on the command line
    Save,
    /// Show which credentials are cached
    Show,
}

impl Command {
    fn into_task_args(self) -> Option<TaskArgs> {
        let args = match self {
            Command::Upscale { image } => TaskArgs::Upscale { image },
            Command::FaceSwap {
                source,
                destination,
                source_index,
                destination_index,
            } => TaskArgs::FaceSwap {
                source,
                destination,
                source_index,
                destination_index,
            },
            Command::TextToImage { prompt } => TaskArgs::TextToImage { prompt },
            Command::ImageToVideo {
                image,
                prompt,
                negative_prompt,
            } => TaskArgs::ImageToVideo {
                image,
                prompt,
                negative_prompt,
            },
            Command::TextToSpeech {
                text,
                language,
                reference_audio,
            } => TaskArgs::TextToSpeech {
                text,
                language,
                reference_audio,
            },
            Command::LipSync { video, audio } => TaskArgs::LipSync { video, audio },
            Command::Inpaint { image, prompt } => TaskArgs::Inpaint { image, prompt },
            Command::SketchToImage {
                image,
                prompt,
                negative_prompt,
            } => TaskArgs::SketchToImage {
                image,
                prompt,
                negative_prompt,
            },
            Command::Credentials { .. } => return None,
        };
        Some(args)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let mut config = Config::from_env()?;
    if let Some(interval_ms) = cli.poll_interval_ms {
        config.poll.interval_ms = interval_ms;
    }
    if let Some(max) = cli.max_attempts {
        config.poll.max_attempts = max;
    }

    let poll = config.poll.to_poll_config()?;

    let store = match &config.credentials_dir {
        Some(dir) => CredentialStore::with_path(dir.clone()),
        None => CredentialStore::new(),
    };
    let credentials = store
        .load()
        .await
        .context("Failed to restore cached credentials")?
        .merge(cli.credentials.into());

    let task_args = match cli.command {
        Command::Credentials { action } => {
            match action {
                CredentialsAction::Save => {
                    store.save(&credentials).await?;
                    println!("Credentials saved to {}", store.path().display());
                }
                CredentialsAction::Show => println!("{}", CredentialStatus::from(&credentials)),
            }
            return Ok(());
        }
        command => command
            .into_task_args()
            .context("command does not run a job")?,
    };

    let missing = credentials.missing_fields(task_args.needs_storage());
    if !missing.is_empty() {
        anyhow::bail!("Missing credentials: {}", missing.join(", "));
    }

    if !cli.no_save {
        if let Err(e) = store.save(&credentials).await {
            warn!("Could not cache credentials: {}", e);
        }
    }

    let task = task_args.task();
    let endpoint_id = config
        .api
        .endpoints
        .for_task(task)
        .with_context(|| format!("No queue endpoint id configured for {}", task))?;

    let object_store = S3Client::new(&config.storage, &credentials)?;
    let api = RunpodClient::new(&config.api.base_url, endpoint_id, &credentials.api_key);
    let workflow = Workflow::new(
        &object_store,
        &api,
        config.storage.clone(),
        credentials,
        poll,
    );

    info!("Running {} job", task);
    let result = match workflow.run(&task_args).await {
        Ok(result) => result,
        Err(e) => {
            error!("{} job failed: {}", task, e);
            return Err(e.into());
        }
    };

    let renderer = ResultRenderer::new(task.result_kind());
    println!("{}", renderer.render_text(&result.output));
    if let Some(path) = cli.html {
        tokio::fs::write(&path, renderer.render_html(&result.output))
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote result snippet to {}", path.display());
    }

    Ok(())
}
