//! HTTP client for the remote synthesis provider.
//!
//! Submissions carry the async protocol flag so the provider may either
//! answer with a finished result or queue the work under a task id. Status
//! queries are single-shot; `await_completion` wraps them in a bounded
//! polling loop for callers that want to block until a terminal state.

use std::time::Duration;

use log::{debug, warn};

use crate::config::Config;
use crate::error::JobError;
use crate::synthesis::dashscope::{
    self, SynthesisReply, ASYNC_HEADER, EDIT_PATH, GENERATION_PATH, TASKS_PATH,
};
use crate::synthesis::types::{EditRequest, PollOutcome, SynthesisOutcome, SynthesisRequest};

/// TCP connect budget, shared by all calls
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Overall budget for a generation submission
const GENERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Overall budget for an edit submission (the embedded image makes the
/// request body large)
const EDIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Overall budget for a single status query
const POLL_TIMEOUT: Duration = Duration::from_secs(15);

/// Caller-side policy for `await_completion`.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Base delay between status queries
    pub interval: Duration,
    /// Give up (returning Pending) after this many queries
    pub max_attempts: u32,
    /// Random extra delay added to each interval so concurrent pollers
    /// don't phase-lock
    pub jitter_ms: u64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: 100, // 5 minutes at 3 sec intervals
            jitter_ms: 500,
        }
    }
}

impl PollPolicy {
    fn sleep_duration(&self) -> Duration {
        let jitter = if self.jitter_ms > 0 {
            use rand::Rng;
            rand::thread_rng().gen_range(0..self.jitter_ms)
        } else {
            0
        };
        self.interval + Duration::from_millis(jitter)
    }
}

/// Synthesis provider API client.
pub struct SynthesisClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SynthesisClient {
    pub fn new(config: &Config) -> Self {
        Self::with_base_url(&config.api_base_url, &config.api_key)
    }

    /// Build a client against an explicit endpoint.
    pub fn with_base_url(base_url: &str, api_key: &str) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Submit a generation job.
    ///
    /// The reply is classified into `Immediate` (a finished image URL was
    /// already in the submission reply) or `Queued` (poll with the task id).
    pub async fn submit(
        &self,
        request: &SynthesisRequest,
    ) -> Result<SynthesisOutcome, JobError> {
        request.validate()?;

        let url = format!("{}{}", self.base_url, GENERATION_PATH);
        let payload = dashscope::generation_payload(request);

        debug!("Submitting generation job: size={}", request.size);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(ASYNC_HEADER, "enable")
            .json(&payload)
            .timeout(GENERATION_TIMEOUT)
            .send()
            .await?;

        let reply = Self::read_reply(response).await?;
        dashscope::classify_submission(&reply)
    }

    /// Submit an edit job for a staged image and an instruction.
    ///
    /// The staged artifact stays owned by the caller's `EditRequest`; this
    /// call only reads it.
    pub async fn edit(&self, request: &EditRequest) -> Result<SynthesisOutcome, JobError> {
        request.validate()?;

        if request.expansion.enabled {
            debug!(
                "Edit expansion requested: ratio={}, max_dimension={}",
                request.expansion.target_ratio, request.expansion.max_dimension
            );
        }

        let image_bytes = request.image.read().await?;
        let data_url = dashscope::data_url_for(&image_bytes);

        let url = format!("{}{}", self.base_url, EDIT_PATH);
        let payload = dashscope::edit_payload(&data_url, &request.instruction);

        debug!("Submitting edit job: {} image bytes", image_bytes.len());

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .timeout(EDIT_TIMEOUT)
            .send()
            .await?;

        let reply = Self::read_reply(response).await?;
        dashscope::classify_submission(&reply)
    }

    /// Query the status of a queued job once.
    ///
    /// Unknown remote statuses map to `Pending`; only transport-level and
    /// provider-rejection problems are errors.
    pub async fn poll(&self, task_id: &str) -> Result<PollOutcome, JobError> {
        if task_id.trim().is_empty() {
            return Err(JobError::Validation(
                "task id must not be empty".to_string(),
            ));
        }

        let url = format!("{}{}/{}", self.base_url, TASKS_PATH, task_id);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(POLL_TIMEOUT)
            .send()
            .await?;

        let reply = Self::read_reply(response).await?;
        Ok(dashscope::classify_poll(&reply))
    }

    /// Poll until the job reaches a terminal state or the policy's attempt
    /// budget is exhausted. Exhaustion returns the last `Pending`, not an
    /// error; transient poll failures keep the loop alive.
    pub async fn await_completion(
        &self,
        task_id: &str,
        policy: &PollPolicy,
    ) -> Result<PollOutcome, JobError> {
        if task_id.trim().is_empty() {
            return Err(JobError::Validation(
                "task id must not be empty".to_string(),
            ));
        }

        for attempt in 0..policy.max_attempts {
            tokio::time::sleep(policy.sleep_duration()).await;

            match self.poll(task_id).await {
                Ok(PollOutcome::Pending) => {
                    debug!(
                        "Poll attempt {}: task {} still pending",
                        attempt + 1,
                        task_id
                    );
                }
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    warn!("Poll error (attempt {}): {}", attempt + 1, e);
                }
            }
        }

        Ok(PollOutcome::Pending)
    }

    async fn read_reply(response: reqwest::Response) -> Result<SynthesisReply, JobError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JobError::RemoteRejected {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let reply = serde_json::from_str(&body)?;
        Ok(reply)
    }
}
