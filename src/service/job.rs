//! Background job submission and polling.

use super::ApiService;
use crate::defaults::jobs;
use crate::envelope::{ApiError, ApiResponse};
use crate::params::Params;
use crate::request::{Endpoint, RequestOptions};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Result of [`ApiService::submit_job`].
#[derive(Debug)]
pub struct JobSubmission {
    pub response: ApiResponse,
    /// Present when the API accepted the request as a job (HTTP 202).
    pub job: Option<JobWaiter>,
}

/// How a [`JobWaiter::wait`] loop ended.
#[derive(Debug)]
pub enum JobOutcome {
    /// The status endpoint reported a completion time.
    Completed(ApiResponse),
    TimedOut,
    /// [`JobWaiter::stop_waiting`] was called.
    Stopped,
}

type CompleteFn = Box<dyn FnOnce(&ApiResponse) + Send>;
type TimeoutFn = Box<dyn FnOnce() + Send>;

/// Callbacks and timing for [`JobWaiter::wait`].
pub struct WaitOptions {
    on_complete: Option<CompleteFn>,
    on_timeout: Option<TimeoutFn>,
    recheck_interval: Duration,
    timeout: Duration,
}

impl WaitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_complete(mut self, f: impl FnOnce(&ApiResponse) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    pub fn on_timeout(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_timeout = Some(Box::new(f));
        self
    }

    pub fn recheck_interval(mut self, interval: Duration) -> Self {
        self.recheck_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            on_complete: None,
            on_timeout: None,
            recheck_interval: jobs::RECHECK_INTERVAL,
            timeout: jobs::TIMEOUT,
        }
    }
}

impl fmt::Debug for WaitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitOptions")
            .field("on_complete", &self.on_complete.is_some())
            .field("on_timeout", &self.on_timeout.is_some())
            .field("recheck_interval", &self.recheck_interval)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Polls the job status endpoint for a submitted job.
#[derive(Debug, Clone)]
pub struct JobWaiter {
    service: ApiService,
    job_id: String,
    stop: CancellationToken,
}

impl JobWaiter {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Poll until the job completes, the timeout passes or
    /// [`stop_waiting`](Self::stop_waiting) is called.
    ///
    /// The first check happens one interval after the call.
    pub fn wait(&self, options: WaitOptions) -> JoinHandle<JobOutcome> {
        let service = self.service.clone();
        let job_id = self.job_id.clone();
        let stop = self.stop.clone();

        let poll = async move {
            let WaitOptions {
                on_complete,
                on_timeout,
                recheck_interval,
                timeout,
            } = options;
            let started = Instant::now();
            let mut ticks = tokio::time::interval_at(started + recheck_interval, recheck_interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let endpoint = format!("{}/{}", jobs::STATUS_ENDPOINT, job_id);

            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => return JobOutcome::Stopped,
                    _ = ticks.tick() => {}
                }

                if started.elapsed() >= timeout {
                    tracing::warn!(
                        target: "api_service::http",
                        job_id = %job_id,
                        "Stopped checking API job status after {} milliseconds",
                        timeout.as_millis()
                    );
                    if let Some(f) = on_timeout {
                        f();
                    }
                    return JobOutcome::TimedOut;
                }

                let mut check = service.get(
                    endpoint.as_str(),
                    Params::new().with("uuid", job_id.as_str()),
                    RequestOptions::new(),
                );
                let result = tokio::select! {
                    biased;
                    _ = stop.cancelled() => {
                        check.abort();
                        return JobOutcome::Stopped;
                    }
                    result = &mut check => result,
                };

                match result {
                    Ok(response) if is_completed(&response) => {
                        tracing::debug!(target: "api_service::http", job_id = %job_id, "job completed");
                        if let Some(f) = on_complete {
                            f(&response);
                        }
                        return JobOutcome::Completed(response);
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::debug!(target: "api_service::http", job_id = %job_id, err = %err, "job status check failed");
                    }
                }
            }
        };
        tokio::spawn(poll.in_current_span())
    }

    /// Stop polling. Any status check in flight is aborted.
    pub fn stop_waiting(&self) {
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}

fn is_completed(response: &ApiResponse) -> bool {
    match response.data().and_then(|data| data.get("completed_at")) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(_) => true,
    }
}

fn job_id(response: &ApiResponse) -> Option<String> {
    match response.data()?.get("job_id")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

impl ApiService {
    /// POST `payload` asking the API to run it as a background job.
    ///
    /// When the API answers 202 with a `job_id`, the returned submission
    /// carries a [`JobWaiter`] for it.
    pub async fn submit_job(
        &self,
        endpoint: impl Into<Endpoint>,
        payload: &impl Serialize,
        options: RequestOptions,
    ) -> Result<JobSubmission, ApiError> {
        let options = options.header(jobs::SUBMIT_AS_JOB_HEADER, "1");
        let response = self.post(endpoint, payload, options).await?;
        let job = if response.status() == 202 {
            job_id(&response).map(|job_id| JobWaiter {
                service: self.clone(),
                job_id,
                stop: CancellationToken::new(),
            })
        } else {
            None
        };
        Ok(JobSubmission { response, job })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ApiRequest;
    use crate::transport::TransportResponse;
    use reqwest::Method;
    use serde_json::json;
    use std::sync::Arc;

    fn response(data: Value) -> ApiResponse {
        let request = ApiRequest::new(Method::GET, "/a", Params::new(), None, RequestOptions::new());
        ApiResponse::new(Arc::new(request), TransportResponse::json(200, &data))
    }

    #[test]
    fn completion_requires_truthy_timestamp() {
        assert!(!is_completed(&response(json!({"completed_at": null}))));
        assert!(!is_completed(&response(json!({"completed_at": ""}))));
        assert!(!is_completed(&response(json!({"status": "running"}))));
        assert!(is_completed(&response(json!({"completed_at": "2020-01-01 00:00:00"}))));
    }

    #[test]
    fn job_ids_can_be_numbers() {
        assert_eq!(job_id(&response(json!({"job_id": 17}))), Some("17".into()));
        assert_eq!(job_id(&response(json!({"job_id": "abc"}))), Some("abc".into()));
        assert_eq!(job_id(&response(json!({}))), None);
    }

    #[test]
    fn wait_options_defaults() {
        let options = WaitOptions::new();
        assert_eq!(options.recheck_interval, Duration::from_secs(5));
        assert_eq!(options.timeout, Duration::from_secs(1800));
    }
}
