//! Status polling
//!
//! Checks a submitted job on a fixed interval until it reaches a terminal
//! status. The first check happens one full interval after the poller starts.
//! Every exit path returns out of the loop, so the ticker is dropped once and
//! no status request is made after a terminal state.

use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::{JobApi, JobId, JobOutput, JobStatus};
use crate::types::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    /// `None` polls until the job reaches a terminal status.
    pub max_attempts: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(5000),
            max_attempts: Some(720),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Polling,
    Completed,
    Failed,
    AbortedOnError,
    Exhausted,
}

pub struct Poller<'a, J: JobApi + ?Sized> {
    api: &'a J,
    config: PollConfig,
    state: PollState,
    attempts: u32,
}

impl<'a, J: JobApi + ?Sized> Poller<'a, J> {
    pub fn new(api: &'a J, config: PollConfig) -> Self {
        Self {
            api,
            config,
            state: PollState::Polling,
            attempts: 0,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Poll until the job completes, fails or the attempt limit is reached.
    pub async fn run(&mut self, id: &JobId) -> AppResult<JobOutput> {
        if self.state != PollState::Polling {
            return Err(AppError::InvalidRequest(format!(
                "poller for job {} already finished ({:?})",
                id, self.state
            )));
        }

        if self.config.interval.is_zero() {
            return Err(AppError::Config(
                "poll interval must be greater than zero".to_string(),
            ));
        }

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.attempts += 1;

            let response = match self.api.status(id).await {
                Ok(response) => response,
                Err(e) => {
                    error!("Error checking status of job {}: {}", id, e);
                    self.state = PollState::AbortedOnError;
                    return Err(e);
                }
            };
            debug!("Job {} status: {} (check {})", id, response.status, self.attempts);

            match response.status {
                JobStatus::Completed => return self.complete(id, response.output),
                JobStatus::Failed | JobStatus::Cancelled | JobStatus::TimedOut => {
                    self.state = PollState::Failed;
                    let reason = response
                        .error
                        .or_else(|| response.output.as_ref().and_then(|o| o.error().map(String::from)))
                        .unwrap_or_else(|| format!("job reported {}", response.status));
                    warn!("Job {} failed: {}", id, reason);
                    return Err(AppError::JobFailed {
                        id: id.to_string(),
                        reason,
                    });
                }
                JobStatus::Unknown(ref status) => {
                    warn!("Job {} reported unrecognised status {}", id, status);
                }
                JobStatus::InQueue | JobStatus::InProgress => {}
            }

            if let Some(max) = self.config.max_attempts {
                if self.attempts >= max {
                    self.state = PollState::Exhausted;
                    warn!("Giving up on job {} after {} status checks", id, self.attempts);
                    return Err(AppError::PollTimeout {
                        id: id.to_string(),
                        attempts: self.attempts,
                    });
                }
            }
        }
    }

    fn complete(&mut self, id: &JobId, output: Option<JobOutput>) -> AppResult<JobOutput> {
        let output = match output {
            Some(output) => output,
            None => {
                self.state = PollState::AbortedOnError;
                return Err(AppError::InvalidResponse(format!(
                    "job {} completed without output",
                    id
                )));
            }
        };

        if let Some(reason) = output.error() {
            self.state = PollState::Failed;
            return Err(AppError::JobFailed {
                id: id.to_string(),
                reason: reason.to_string(),
            });
        }

        self.state = PollState::Completed;
        info!("Job {} completed after {} status checks", id, self.attempts);
        Ok(output)
    }
}
