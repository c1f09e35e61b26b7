// Job queue HTTP client
// Endpoints: POST {base}/{endpoint_id}/run, GET {base}/{endpoint_id}/status/{id}

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use super::{JobId, JobRequest, RunResponse, StatusResponse};
use crate::types::{AppError, AppResult};

#[async_trait]
pub trait JobApi: Send + Sync {
    async fn submit(&self, request: &JobRequest) -> AppResult<JobId>;
    async fn status(&self, id: &JobId) -> AppResult<StatusResponse>;
}

pub struct RunpodClient {
    client: Client,
    base_url: String,
    endpoint_id: String,
    api_key: String,
}

impl RunpodClient {
    pub fn new(base_url: &str, endpoint_id: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoint_id: endpoint_id.to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn run_url(&self) -> String {
        format!("{}/{}/run", self.base_url, self.endpoint_id)
    }

    fn status_url(&self, id: &JobId) -> String {
        format!("{}/{}/status/{}", self.base_url, self.endpoint_id, id)
    }

    async fn error_for(response: reqwest::Response, action: &str) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        AppError::JobApi(format!("{} returned {}: {}", action, status, body))
    }
}

#[async_trait]
impl JobApi for RunpodClient {
    async fn submit(&self, request: &JobRequest) -> AppResult<JobId> {
        let url = self.run_url();
        debug!("Submitting job to {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::JobApi(format!("Job submission failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_for(response, "Job submission").await);
        }

        let run: RunResponse = response
            .json()
            .await
            .map_err(|e| AppError::InvalidResponse(format!("Failed to parse run response: {}", e)))?;

        let id = run
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::InvalidResponse("run response has no job id".to_string()))?;

        info!("Request ID: {}", id);
        Ok(JobId(id))
    }

    async fn status(&self, id: &JobId) -> AppResult<StatusResponse> {
        let response = self
            .client
            .get(self.status_url(id))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| AppError::JobApi(format!("Status request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_for(response, "Status request").await);
        }

        let status: StatusResponse = response
            .json()
            .await
            .map_err(|e| AppError::InvalidResponse(format!("Failed to parse status response: {}", e)))?;

        debug!("Status: {}", status.status);
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobInput, JobStatus, TaskInput};
    use mockito::Matcher;
    use serde_json::json;

    fn request() -> JobRequest {
        JobRequest {
            input: JobInput {
                bucket_name: "assistos-demo-bucket".to_string(),
                output_key: "out-key".to_string(),
                aws_access_key_id: "ak".to_string(),
                aws_secret_access_key: "sk".to_string(),
                endpoint: "https://assistos-demo-bucket.fra1.digitaloceanspaces.com".to_string(),
                aws_region: "fra1".to_string(),
                task: TaskInput::Upscale {
                    input_key: "in-key.png".to_string(),
                },
            },
        }
    }

    #[test]
    fn test_urls() {
        let client = RunpodClient::new("https://api.runpod.ai/v2/", "abc123", "key");
        assert_eq!(client.run_url(), "https://api.runpod.ai/v2/abc123/run");
        assert_eq!(
            client.status_url(&JobId("job-1".to_string())),
            "https://api.runpod.ai/v2/abc123/status/job-1"
        );
    }

    #[tokio::test]
    async fn test_submit_sends_bearer_and_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/ep/run")
            .match_header("authorization", "Bearer secret-token")
            .match_body(Matcher::PartialJson(json!({
                "input": {"input_key": "in-key.png", "output_key": "out-key"}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"job-42","status":"IN_QUEUE"}"#)
            .create_async()
            .await;

        let client = RunpodClient::new(&server.url(), "ep", "secret-token");
        let id = client.submit(&request()).await.unwrap();

        assert_eq!(id, JobId("job-42".to_string()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_submit_http_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/ep/run")
            .with_status(401)
            .with_body("Unauthorized")
            .create_async()
            .await;

        let client = RunpodClient::new(&server.url(), "ep", "bad");
        let err = client.submit(&request()).await.unwrap_err();

        match err {
            AppError::JobApi(message) => {
                assert!(message.contains("401"), "{}", message);
                assert!(message.contains("Unauthorized"), "{}", message);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_without_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/ep/run")
            .with_status(200)
            .with_body(r#"{"status":"IN_QUEUE"}"#)
            .create_async()
            .await;

        let client = RunpodClient::new(&server.url(), "ep", "key");
        let err = client.submit(&request()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_status_completed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ep/status/job-42")
            .match_header("authorization", "Bearer key")
            .with_status(200)
            .with_body(r#"{"id":"job-42","status":"COMPLETED","output":"https://x/y.png"}"#)
            .create_async()
            .await;

        let client = RunpodClient::new(&server.url(), "ep", "key");
        let status = client.status(&JobId("job-42".to_string())).await.unwrap();

        assert_eq!(status.status, JobStatus::Completed);
        assert_eq!(status.output.unwrap().url(), Some("https://x/y.png"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_garbage_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ep/status/job-42")
            .with_status(200)
            .with_body("<html>gateway</html>")
            .create_async()
            .await;

        let client = RunpodClient::new(&server.url(), "ep", "key");
        let err = client.status(&JobId("job-42".to_string())).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidResponse(_)));
    }
}
