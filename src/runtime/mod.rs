//! The trigger pipeline: resolve the job by name, submit a run with the
//! extracted table list, and optionally block until the run is terminal.

use std::thread;
use std::time::{Duration, Instant};

use crate::databricks::{Job, JobsApi, RunHandle, RunParams};
use crate::error::{Error, Result};
use crate::output;
use crate::tables::TableList;

/// Status queries between polls are best-effort; this many consecutive
/// failures escalate the last error instead of retrying forever.
const MAX_POLL_FAILURES: u32 = 3;

pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct TriggerRequest {
    pub job_name: String,
    pub environment: String,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub wait: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Dry run: table list printed, no remote call made.
    DryRun,
    /// Run submitted; caller did not ask to wait.
    Submitted(RunHandle),
    /// Run submitted and observed to finish successfully.
    Completed(RunHandle),
}

/// Runs the pipeline against an already-extracted table list. Exactly one
/// remote run is created per successful call; concurrent invocations are
/// intentionally unguarded and submit independent runs.
pub fn execute(api: &dyn JobsApi, request: &TriggerRequest, tables: &TableList) -> Result<Outcome> {
    output::info(&format!(
        "{} table(s) referenced: {}",
        tables.count(),
        tables.joined()
    ));

    if request.dry_run {
        for name in tables.names() {
            println!("  {}", name);
        }
        output::ok("dry run: no job submitted");
        return Ok(Outcome::DryRun);
    }

    let jobs = api.list_jobs()?;
    let job = locate_job(&jobs, &request.job_name)?;
    output::info(&format!(
        "resolved job '{}' to id {}",
        request.job_name, job.job_id
    ));

    let params = RunParams::new(tables.joined(), request.environment.clone());
    let run = api.run_now(job.job_id, &params)?;
    let url = api.run_url(job.job_id, run);
    output::ok(&format!("submitted run {}: {}", run.run_id, url));

    if !request.wait {
        return Ok(Outcome::Submitted(run));
    }

    wait_for_run(api, job.job_id, run, request.timeout, request.poll_interval)?;
    output::ok(&format!("run {} finished successfully", run.run_id));
    Ok(Outcome::Completed(run))
}

/// Exact, case-sensitive match on the settings name. Duplicate names are
/// a listing ambiguity; the first listed job wins and a warning says so.
pub fn locate_job<'a>(jobs: &'a [Job], name: &str) -> Result<&'a Job> {
    let mut matches = jobs.iter().filter(|job| job.settings.name == name);
    let found = matches.next().ok_or_else(|| Error::JobNotFound {
        name: name.to_string(),
        available: jobs.iter().map(|job| job.settings.name.clone()).collect(),
    })?;
    if matches.next().is_some() {
        output::warn(&format!(
            "multiple jobs named '{}'; using first listed (id {})",
            name, found.job_id
        ));
    }
    Ok(found)
}

/// Polls at a fixed interval until the run is terminal or the wall-clock
/// timeout passes. Timeout does not cancel the remote run.
pub fn wait_for_run(
    api: &dyn JobsApi,
    job_id: u64,
    run: RunHandle,
    timeout: Duration,
    interval: Duration,
) -> Result<()> {
    let started = Instant::now();
    let mut consecutive_failures = 0u32;

    loop {
        match api.get_run(run) {
            Ok(state) => {
                consecutive_failures = 0;
                if state.is_success() {
                    return Ok(());
                }
                if state.is_terminal_failure() {
                    return Err(Error::JobFailed {
                        life_cycle_state: state.life_cycle_state,
                        result_state: state.result_state,
                    });
                }
                output::info(&format!(
                    "run {} is {}; waiting",
                    run.run_id, state.life_cycle_state
                ));
            }
            Err(err) => {
                consecutive_failures += 1;
                if consecutive_failures >= MAX_POLL_FAILURES {
                    return Err(err);
                }
                output::warn(&format!(
                    "status query failed ({}); retrying next interval",
                    err
                ));
            }
        }

        if started.elapsed() >= timeout {
            return Err(Error::Timeout {
                run_id: run.run_id,
                waited: started.elapsed(),
                url: api.run_url(job_id, run),
            });
        }
        thread::sleep(interval);
    }
}
