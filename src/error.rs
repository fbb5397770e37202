use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Everything that can stop a trigger run. Every variant is fatal to the
/// current invocation; the only internal retry lives in the polling loop.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read config file {path:?}: {source}")]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {path:?} is not valid JSON: {source}")]
    ConfigInvalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no TABLE statements found in {path:?}")]
    NoTablesFound { path: PathBuf },

    #[error("missing required environment variables: {}", vars.join(", "))]
    MissingCredentials { vars: Vec<String> },

    #[error("failed to build HTTPS client: {source}")]
    ToolUnavailable {
        #[source]
        source: reqwest::Error,
    },

    #[error("{context}: {source}")]
    Api {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{context}: HTTP {status}: {body}")]
    ApiStatus {
        context: String,
        status: u16,
        body: String,
    },

    #[error("job '{name}' not found; available jobs: {}", available.join(", "))]
    JobNotFound { name: String, available: Vec<String> },

    #[error("run submission returned no run_id: {body}")]
    Submission { body: String },

    #[error("job run finished unsuccessfully: life_cycle_state={life_cycle_state}, result_state={}", result_state.as_deref().unwrap_or("none"))]
    JobFailed {
        life_cycle_state: String,
        result_state: Option<String>,
    },

    #[error("job run {run_id} still not terminal after {}s; check {url}", waited.as_secs())]
    Timeout {
        run_id: u64,
        waited: Duration,
        url: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
