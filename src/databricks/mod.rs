//! Databricks Jobs API 2.1 — the three calls the trigger pipeline makes:
//! list jobs, run-now, get run status.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Credentials;
use crate::error::{Error, Result};

const JOBS_API_BASE: &str = "api/2.1/jobs";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Fixed marker sent with every run so the job can tell deployment
/// triggers apart from scheduled or manual runs.
pub const TRIGGERED_BY: &str = "goldengate_deployment";

#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub job_id: u64,
    pub settings: JobSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobSettings {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunHandle {
    pub run_id: u64,
}

/// Two-axis run status: `life_cycle_state` says whether the run is still
/// going, `result_state` is only populated once it is not.
#[derive(Debug, Clone, Deserialize)]
pub struct RunState {
    #[serde(default)]
    pub life_cycle_state: String,
    #[serde(default)]
    pub result_state: Option<String>,
}

impl RunState {
    pub fn is_success(&self) -> bool {
        self.life_cycle_state == "TERMINATED" && self.result_state.as_deref() == Some("SUCCESS")
    }

    /// Terminal without success: TERMINATED with any other result,
    /// INTERNAL_ERROR, or SKIPPED.
    pub fn is_terminal_failure(&self) -> bool {
        match self.life_cycle_state.as_str() {
            "TERMINATED" => !self.is_success(),
            "INTERNAL_ERROR" | "SKIPPED" => true,
            _ => false,
        }
    }
}

/// Parameters handed to the job as `notebook_params`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RunParams {
    pub table_list: String,
    pub environment: String,
    pub triggered_by: &'static str,
}

impl RunParams {
    pub fn new(table_list: String, environment: String) -> Self {
        Self {
            table_list,
            environment,
            triggered_by: TRIGGERED_BY,
        }
    }
}

/// The remote Jobs API as the pipeline sees it. The HTTP client lives
/// behind this trait so tests can drive the pipeline with scripted fakes.
pub trait JobsApi {
    fn list_jobs(&self) -> Result<Vec<Job>>;
    fn run_now(&self, job_id: u64, params: &RunParams) -> Result<RunHandle>;
    fn get_run(&self, run: RunHandle) -> Result<RunState>;
    /// Workspace URL an operator can open to watch the run.
    fn run_url(&self, job_id: u64, run: RunHandle) -> String;
}

#[derive(Deserialize)]
struct JobListResponse {
    #[serde(default)]
    jobs: Vec<Job>,
}

#[derive(Deserialize)]
struct RunNowResponse {
    #[serde(default)]
    run_id: Option<u64>,
}

#[derive(Deserialize)]
struct RunGetResponse {
    state: RunState,
}

pub struct HttpJobsClient {
    http: reqwest::blocking::Client,
    host: String,
    token: String,
}

impl HttpJobsClient {
    pub fn new(credentials: &Credentials) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|source| Error::ToolUnavailable { source })?;

        Ok(Self {
            http,
            host: credentials.host.clone(),
            token: credentials.token.clone(),
        })
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, context: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .map_err(|source| Error::Api {
                context: context.to_string(),
                source,
            })?;
        Self::read_json(response, context)
    }

    fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::blocking::Response,
        context: &str,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::ApiStatus {
                context: context.to_string(),
                status: status.as_u16(),
                body: truncate(&body, 300),
            });
        }
        response.json().map_err(|source| Error::Api {
            context: context.to_string(),
            source,
        })
    }
}

impl JobsApi for HttpJobsClient {
    fn list_jobs(&self) -> Result<Vec<Job>> {
        let url = format!("{}/{}/list", self.host, JOBS_API_BASE);
        let listing: JobListResponse = self.get_json(&url, "listing jobs")?;
        Ok(listing.jobs)
    }

    fn run_now(&self, job_id: u64, params: &RunParams) -> Result<RunHandle> {
        let url = format!("{}/{}/run-now", self.host, JOBS_API_BASE);
        let body = serde_json::json!({
            "job_id": job_id,
            "notebook_params": params,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .map_err(|source| Error::Api {
                context: "submitting run".to_string(),
                source,
            })?;

        let status = response.status();
        let raw = response.text().map_err(|source| Error::Api {
            context: "submitting run".to_string(),
            source,
        })?;
        if !status.is_success() {
            return Err(Error::ApiStatus {
                context: "submitting run".to_string(),
                status: status.as_u16(),
                body: truncate(&raw, 300),
            });
        }

        parse_run_now_body(&raw)
    }

    fn get_run(&self, run: RunHandle) -> Result<RunState> {
        let url = format!(
            "{}/{}/runs/get?run_id={}",
            self.host, JOBS_API_BASE, run.run_id
        );
        let status: RunGetResponse = self.get_json(&url, "querying run status")?;
        Ok(status.state)
    }

    fn run_url(&self, job_id: u64, run: RunHandle) -> String {
        format!("{}/#job/{}/run/{}", self.host, job_id, run.run_id)
    }
}

/// A 2xx run-now response with no usable run_id still means no run was
/// created; the raw body is surfaced for diagnosis. Unparsable bodies
/// land here too rather than as a decode error.
fn parse_run_now_body(raw: &str) -> Result<RunHandle> {
    let parsed: RunNowResponse =
        serde_json::from_str(raw).unwrap_or(RunNowResponse { run_id: None });
    match parsed.run_id {
        Some(run_id) if run_id > 0 => Ok(RunHandle { run_id }),
        _ => Err(Error::Submission {
            body: truncate(raw, 300),
        }),
    }
}

fn truncate(body: &str, limit: usize) -> String {
    if body.len() <= limit {
        body.to_string()
    } else {
        body.chars().take(limit).collect()
    }
}
