use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use log::{info, warn};

use crate::config::GitHubConfig;
use crate::error::{Result, VisualizerError};
use crate::model::{LogLine, PipelineRun, RunSource, Severity, Stage, StageStatus};

use super::client::GitHubClient;
use super::types::{GitHubJob, GitHubStep, GitHubWorkflowRun};

/// Fetches recent GitHub Actions runs for one public repository.
pub struct GitHubProvider {
    client: GitHubClient,
    pub(super) owner: String,
    pub(super) repo: String,
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl GitHubProvider {
    /// Create a provider for `repo`, given as `owner/name`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when `repo` is not of the form `owner/name`
    /// or the HTTP client cannot be built from `config`.
    pub fn new(config: &GitHubConfig, repo: &str) -> Result<Self> {
        let (owner, name) = repo
            .trim()
            .split_once('/')
            .filter(|(owner, name)| valid_segment(owner) && valid_segment(name))
            .ok_or_else(|| {
                VisualizerError::invalid_config(format!(
                    "Repository must be in format 'owner/repo', got '{repo}'"
                ))
            })?;

        Ok(Self {
            client: GitHubClient::new(config)?,
            owner: owner.to_string(),
            repo: name.to_string(),
        })
    }

    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Fetch up to `limit` recent runs, oldest first, with one stage per job.
    ///
    /// # Errors
    ///
    /// Every failure is reported as `LiveDataUnavailable`; nothing is
    /// substituted here.
    pub async fn fetch_runs(&self, limit: usize) -> Result<Vec<PipelineRun>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        info!("Fetching up to {limit} workflow runs for {}", self.slug());

        let runs = self
            .client
            .fetch_workflow_runs(&self.owner, &self.repo, limit)
            .await
            .map_err(|reason| self.unavailable(reason))?;

        let jobs = join_all(
            runs.iter()
                .map(|run| self.client.fetch_jobs_for_run(&self.owner, &self.repo, run.id)),
        )
        .await;

        let mut converted = Vec::with_capacity(runs.len());
        for (run, jobs) in runs.iter().zip(jobs) {
            let jobs = jobs.map_err(|reason| self.unavailable(reason))?;
            let run = convert_run(run, &jobs);
            for problem in run.violations() {
                warn!("Run {} from {} is inconsistent: {problem}", run.id, self.slug());
            }
            converted.push(run);
        }
        converted.reverse();

        info!("Fetched {} workflow runs", converted.len());
        Ok(converted)
    }

    fn unavailable(&self, reason: crate::error::LiveDataFailure) -> VisualizerError {
        warn!("Live data unavailable for {}: {reason}", self.slug());
        VisualizerError::live(self.slug(), reason)
    }
}

pub(super) fn stage_status(status: Option<&str>, conclusion: Option<&str>) -> StageStatus {
    match status.unwrap_or("queued") {
        "in_progress" => StageStatus::Running,
        "completed" => match conclusion {
            Some("success" | "neutral" | "skipped") => StageStatus::Succeeded,
            _ => StageStatus::Failed,
        },
        _ => StageStatus::Pending,
    }
}

pub(super) fn step_severity(conclusion: Option<&str>) -> Severity {
    match conclusion {
        Some("failure" | "timed_out" | "startup_failure") => Severity::Error,
        Some("cancelled" | "skipped") => Severity::Warn,
        _ => Severity::Info,
    }
}

/// Appends a line, nudging its timestamp forward when the API reports
/// steps that finished within the same instant.
fn push_nudged(stage: &mut Stage, mut line: LogLine) {
    if let Some(last) = stage.logs().last() {
        if line.timestamp <= last.timestamp {
            line.timestamp = last.timestamp + Duration::milliseconds(1);
        }
    }
    stage.push_log(line);
}

/// Applies status and timestamps so the stage passes its own invariants.
fn settle(
    stage: &mut Stage,
    status: StageStatus,
    started: Option<DateTime<Utc>>,
    ended: Option<DateTime<Utc>>,
    fallback: DateTime<Utc>,
) {
    if status == StageStatus::Pending {
        return;
    }
    let start = started.or(ended).unwrap_or(fallback);
    stage.start(start);
    if status.is_terminal() {
        let mut end = ended.unwrap_or(start).max(start);
        if let Some(last) = stage.logs().last() {
            end = end.max(last.timestamp);
        }
        stage.finish(status, end);
    }
}

fn step_line(step: &GitHubStep, at: DateTime<Utc>) -> LogLine {
    let outcome = step.conclusion.as_deref().unwrap_or(&step.status);
    LogLine::new(
        step.completed_at.or(step.started_at).unwrap_or(at),
        step_severity(step.conclusion.as_deref()),
        format!("{} ({outcome})", step.name),
    )
}

fn convert_job(job: &GitHubJob, run_start: DateTime<Utc>) -> Stage {
    let mut stage = Stage::pending(job.name.clone());
    let status = stage_status(Some(&job.status), job.conclusion.as_deref());
    if status == StageStatus::Pending {
        return stage;
    }

    let start = job.started_at.unwrap_or(run_start);
    let mut steps: Vec<&GitHubStep> = job.steps.iter().filter(|s| s.status != "queued").collect();
    steps.sort_by_key(|s| s.number);
    for step in steps {
        push_nudged(&mut stage, step_line(step, start));
    }
    settle(&mut stage, status, job.started_at, job.completed_at, run_start);
    stage
}

pub(super) fn convert_run(run: &GitHubWorkflowRun, jobs: &[GitHubJob]) -> PipelineRun {
    let name = run
        .name
        .clone()
        .or_else(|| run.display_title.clone())
        .unwrap_or_else(|| format!("run {}", run.id));
    let started = run.run_started_at.unwrap_or(run.created_at);

    let stages = if jobs.is_empty() {
        let status = stage_status(run.status.as_deref(), run.conclusion.as_deref());
        let mut stage = Stage::pending(name.clone());
        if status != StageStatus::Pending {
            let outcome = run
                .conclusion
                .as_deref()
                .or(run.status.as_deref())
                .unwrap_or("unknown");
            push_nudged(
                &mut stage,
                LogLine::new(
                    started,
                    step_severity(run.conclusion.as_deref()),
                    format!("{name} ({outcome})"),
                ),
            );
        }
        settle(&mut stage, status, Some(started), run.updated_at, started);
        vec![stage]
    } else {
        jobs.iter().map(|job| convert_job(job, started)).collect()
    };

    let mut converted = PipelineRun::new(run.id.to_string(), name, RunSource::Live, stages);
    converted.url = run.html_url.clone();
    converted.started_at = Some(started);
    if converted.status.is_terminal() {
        let last_stage_end = converted.stages().iter().filter_map(|s| s.ended_at).max();
        let end = run
            .updated_at
            .into_iter()
            .chain(last_stage_end)
            .max()
            .unwrap_or(started)
            .max(started);
        converted.ended_at = Some(end);
    }
    converted
}
