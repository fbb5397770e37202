use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

mod config;
mod databricks;
mod error;
mod output;
mod runtime;
mod tables;

use config::{Credentials, ExtractsConfig};
use databricks::HttpJobsClient;
use error::Result;
use runtime::TriggerRequest;
use tables::RegexTableExtractor;

#[derive(Parser)]
#[command(name = "ggtrigger")]
#[command(about = "Trigger the Databricks refresh job for tables referenced by GoldenGate extracts", long_about = None)]
struct Cli {
    /// Path to the deployed extracts configuration
    #[arg(long, default_value = "config/extracts.json")]
    config: PathBuf,

    /// Databricks job name to trigger (settings name, exact match)
    #[arg(long)]
    job_name: String,

    /// Target environment passed to the job
    #[arg(long, env = "TARGET_ENV", default_value = "dev")]
    environment: String,

    /// Seconds to wait for the run when --wait is set
    #[arg(long, default_value_t = 1800)]
    timeout: u64,

    /// Block until the run reaches a terminal state
    #[arg(long)]
    wait: bool,

    /// Print the extracted table list and stop without submitting
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::fail(&err.to_string());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let credentials = Credentials::from_env()?;

    let extracts = ExtractsConfig::load(&cli.config)?;
    output::info(&format!(
        "loaded {} with {} extract(s)",
        cli.config.display(),
        extracts.extract_count()
    ));
    let tables = extracts.table_names(&RegexTableExtractor::new())?;

    let request = TriggerRequest {
        job_name: cli.job_name.clone(),
        environment: cli.environment.clone(),
        timeout: Duration::from_secs(cli.timeout),
        poll_interval: runtime::POLL_INTERVAL,
        wait: cli.wait,
        dry_run: cli.dry_run,
    };

    let api = HttpJobsClient::new(&credentials)?;
    runtime::execute(&api, &request, &tables)?;
    Ok(())
}
