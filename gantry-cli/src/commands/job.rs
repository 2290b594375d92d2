//! Job command handlers
//!
//! Handles all job-related CLI commands: submission, listing, watching,
//! cancellation, and retry.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Subcommand;
use colored::*;
use uuid::Uuid;

use gantry_client::{OrchestratorClient, PollerConfig, watch_job};
use gantry_core::domain::job::{Job, JobKind, JobStatus};
use gantry_core::dto::job::{CancelScope, CreateJob, JobFilter};

use crate::config::Config;

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// Submit a new job
    Submit {
        /// Job kind: run, package_install, docker_build, ai_analyze
        kind: String,
        /// Target resource (repository, environment, or report id)
        resource: String,
        /// Kind-specific input as JSON
        #[arg(long, default_value = "{}")]
        input: String,
        /// Acting identity recorded on the job
        #[arg(long, default_value = "cli")]
        actor: String,
        /// Poll until the job settles
        #[arg(long)]
        watch: bool,
    },
    /// Get job details
    Get {
        /// Job ID
        id: Uuid,
    },
    /// List jobs
    List {
        /// Filter by target resource
        #[arg(long)]
        resource: Option<String>,
        /// Filter by kind
        #[arg(long)]
        kind: Option<String>,
        /// Filter by status
        #[arg(long)]
        status: Option<String>,
    },
    /// Poll a job until it reaches a terminal state
    Watch {
        /// Job ID
        id: Uuid,
        /// Polling interval in seconds
        #[arg(long, default_value_t = 5)]
        interval: u64,
        /// Stop observing after this many seconds even if not settled
        #[arg(long)]
        ceiling: Option<u64>,
    },
    /// Request cancellation of a job
    Cancel {
        /// Job ID
        id: Uuid,
    },
    /// Cancel every active job in a scope
    CancelAll {
        /// Limit to jobs triggered by this actor
        #[arg(long)]
        actor: Option<String>,
        /// Limit to jobs on this resource
        #[arg(long)]
        resource: Option<String>,
        /// Limit to jobs of this kind
        #[arg(long)]
        kind: Option<String>,
    },
    /// Re-submit a failed job as a new job
    Retry {
        /// Job ID
        id: Uuid,
        /// Poll the new job until it settles
        #[arg(long)]
        watch: bool,
    },
}

/// Handle job commands
pub async fn handle_job_command(command: JobCommands, config: &Config) -> Result<()> {
    let client = OrchestratorClient::new(&config.orchestrator_url);

    match command {
        JobCommands::Submit {
            kind,
            resource,
            input,
            actor,
            watch,
        } => submit_job(&client, &kind, resource, &input, actor, watch).await,
        JobCommands::Get { id } => get_job(&client, id).await,
        JobCommands::List {
            resource,
            kind,
            status,
        } => list_jobs(&client, resource, kind, status).await,
        JobCommands::Watch {
            id,
            interval,
            ceiling,
        } => watch_until_settled(&client, id, interval, ceiling).await,
        JobCommands::Cancel { id } => cancel_job(&client, id).await,
        JobCommands::CancelAll {
            actor,
            resource,
            kind,
        } => cancel_all_jobs(&client, actor, resource, kind).await,
        JobCommands::Retry { id, watch } => retry_job(&client, id, watch).await,
    }
}

/// Submit a new job and optionally watch it
async fn submit_job(
    client: &OrchestratorClient,
    kind: &str,
    resource: String,
    input: &str,
    actor: String,
    watch: bool,
) -> Result<()> {
    let kind = parse_kind(kind)?;
    let input: serde_json::Value =
        serde_json::from_str(input).map_err(|e| anyhow::anyhow!("--input is not valid JSON: {e}"))?;

    let job = client
        .create_job(CreateJob {
            kind,
            resource_ref: resource,
            input,
            triggered_by: actor,
        })
        .await?;

    println!("{}", "Job submitted:".bold());
    print_job_details(&job);

    if watch {
        println!();
        watch_until_settled(client, job.id, 5, None).await?;
    }

    Ok(())
}

/// Get and display a single job
async fn get_job(client: &OrchestratorClient, id: Uuid) -> Result<()> {
    let job = client.get_job(id).await?;
    print_job_details(&job);
    Ok(())
}

/// List jobs matching the given filters
async fn list_jobs(
    client: &OrchestratorClient,
    resource: Option<String>,
    kind: Option<String>,
    status: Option<String>,
) -> Result<()> {
    let filter = JobFilter {
        resource_ref: resource,
        kind: kind.as_deref().map(parse_kind).transpose()?,
        status: status.as_deref().map(parse_status).transpose()?,
    };

    let jobs = client.list_jobs(&filter).await?;

    if jobs.is_empty() {
        println!("{}", "No jobs found.".yellow());
    } else {
        println!("{}", format!("Found {} job(s):", jobs.len()).bold());
        println!();
        for job in jobs {
            print_job_summary(&job);
        }
    }

    Ok(())
}

/// Poll a job until it settles, printing each status change
async fn watch_until_settled(
    client: &OrchestratorClient,
    id: Uuid,
    interval: u64,
    ceiling: Option<u64>,
) -> Result<()> {
    let mut poller_config = PollerConfig::with_interval(Duration::from_secs(interval));
    if let Some(ceiling) = ceiling {
        poller_config = poller_config.with_ceiling(Duration::from_secs(ceiling));
    }

    println!("{}", format!("Watching job {}...", id).bold());

    let mut watch = watch_job(Arc::new(client.clone()), id, poller_config);
    let mut last_status = None;
    let mut settled = None;

    while let Some(job) = watch.recv().await {
        if last_status != Some(job.status) {
            println!("  {} {}", "▸".cyan(), colorize_status(&job.status));
            last_status = Some(job.status);
        }
        if job.status.is_terminal() {
            settled = Some(job);
        }
    }

    match settled {
        Some(job) => {
            println!();
            print_job_details(&job);
        }
        None => println!("{}", "Watch ended before the job settled.".yellow()),
    }

    Ok(())
}

/// Request cancellation of a job
async fn cancel_job(client: &OrchestratorClient, id: Uuid) -> Result<()> {
    let job = client.cancel_job(id).await?;

    if job.status == JobStatus::Cancelled {
        println!("{}", format!("Job {} cancelled.", id).green());
    } else {
        println!(
            "{}",
            format!("Cancellation requested; job {} is {}.", id, job.status).yellow()
        );
    }

    Ok(())
}

/// Cancel every active job in a scope
async fn cancel_all_jobs(
    client: &OrchestratorClient,
    actor: Option<String>,
    resource: Option<String>,
    kind: Option<String>,
) -> Result<()> {
    let scope = CancelScope {
        triggered_by: actor,
        resource_ref: resource,
        kind: kind.as_deref().map(parse_kind).transpose()?,
    };

    let response = client.cancel_all(&scope).await?;
    println!(
        "{}",
        format!("Cancelled {} job(s).", response.cancelled).bold()
    );

    Ok(())
}

/// Retry a failed job and optionally watch the new one
async fn retry_job(client: &OrchestratorClient, id: Uuid, watch: bool) -> Result<()> {
    let job = client.retry_job(id).await?;

    println!("{}", format!("Job {} retried as {}.", id, job.id).bold());
    print_job_details(&job);

    if watch {
        println!();
        watch_until_settled(client, job.id, 5, None).await?;
    }

    Ok(())
}

fn parse_kind(s: &str) -> Result<JobKind> {
    match s.replace('-', "_").as_str() {
        "run" => Ok(JobKind::Run),
        "package_install" => Ok(JobKind::PackageInstall),
        "docker_build" => Ok(JobKind::DockerBuild),
        "ai_analyze" => Ok(JobKind::AiAnalyze),
        other => bail!(
            "unknown kind '{}': expected run, package_install, docker_build, or ai_analyze",
            other
        ),
    }
}

fn parse_status(s: &str) -> Result<JobStatus> {
    match s.replace('-', "_").as_str() {
        "pending" => Ok(JobStatus::Pending),
        "running" => Ok(JobStatus::Running),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        "error" => Ok(JobStatus::Error),
        "cancelled" => Ok(JobStatus::Cancelled),
        "timed_out" => Ok(JobStatus::TimedOut),
        other => bail!("unknown status '{}'", other),
    }
}

/// Print a one-paragraph job summary
fn print_job_summary(job: &Job) {
    println!("  {} Job {}", "▸".cyan(), job.id.to_string().dimmed());
    println!("    Kind:     {}", job.kind);
    println!("    Resource: {}", job.resource_ref.dimmed());
    println!("    Status:   {}", colorize_status(&job.status));
    println!(
        "    Created:  {}",
        job.created_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    println!();
}

/// Print detailed job information
fn print_job_details(job: &Job) {
    println!("{}", "Job Details:".bold());
    println!("  ID:        {}", job.id.to_string().cyan());
    println!("  Kind:      {}", job.kind);
    println!("  Resource:  {}", job.resource_ref);
    println!("  Status:    {}", colorize_status(&job.status));
    println!("  Actor:     {}", job.triggered_by);
    println!("  Created:   {}", job.created_at.format("%Y-%m-%d %H:%M:%S"));

    if let Some(retry_of) = job.retry_of {
        println!("  Retry of:  {}", retry_of.to_string().dimmed());
    }

    if let Some(started) = job.started_at {
        println!("  Started:   {}", started.format("%Y-%m-%d %H:%M:%S"));
    }

    if let Some(completed) = job.completed_at {
        println!("  Completed: {}", completed.format("%Y-%m-%d %H:%M:%S"));

        if let Some(started) = job.started_at {
            let duration = completed.signed_duration_since(started);
            println!("  Duration:  {}s", duration.num_seconds());
        }
    }

    if !job.input.is_null() {
        if let Ok(pretty) = serde_json::to_string_pretty(&job.input) {
            println!("\n{}", "Input:".bold());
            println!("{}", pretty);
        }
    }

    if let Some(result) = &job.result {
        println!("\n{}", "Result:".bold());
        if let Ok(pretty) = serde_json::to_string_pretty(result) {
            println!("{}", pretty);
        } else {
            println!("{:?}", result);
        }
    }

    if let Some(error) = &job.error_message {
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
    }
}

/// Colorize job status for display
fn colorize_status(status: &JobStatus) -> colored::ColoredString {
    let status_str = status.to_string();
    match status {
        JobStatus::Pending => status_str.yellow(),
        JobStatus::Running => status_str.cyan(),
        JobStatus::Completed => status_str.green(),
        JobStatus::Failed => status_str.red(),
        JobStatus::Error => status_str.red(),
        JobStatus::Cancelled => status_str.dimmed(),
        JobStatus::TimedOut => status_str.red(),
    }
}
