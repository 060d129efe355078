use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::{ClusterGraph, PipelineRun, RunStatus, StageStatus};
use crate::topology::ClusterEvent;

/// Headline numbers for the pipeline panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub total_runs: usize,
    pub completed_runs: usize,
    pub succeeded_runs: usize,
    pub failed_runs: usize,
    /// Percent of completed runs that succeeded.
    pub success_rate: f64,
    /// Mean wall time of completed runs, in seconds.
    pub average_duration_secs: f64,
    /// Mean seconds per stage name, in first-seen order.
    pub stage_timeline: IndexMap<String, f64>,
    pub failures_by_stage: IndexMap<String, usize>,
}

#[allow(clippy::cast_precision_loss)]
fn calculate_rate(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (count as f64 / total as f64) * 100.0
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl Kpis {
    pub fn from_runs(runs: &[PipelineRun]) -> Self {
        let completed: Vec<&PipelineRun> = runs.iter().filter(|r| r.status.is_terminal()).collect();
        let succeeded = completed
            .iter()
            .filter(|r| r.status == RunStatus::Succeeded)
            .count();

        #[allow(clippy::cast_precision_loss)]
        let durations: Vec<f64> = completed
            .iter()
            .filter_map(|r| r.duration())
            .map(|d| d.num_milliseconds() as f64 / 1000.0)
            .collect();

        let mut stage_samples: IndexMap<String, Vec<f64>> = IndexMap::new();
        let mut failures_by_stage: IndexMap<String, usize> = IndexMap::new();
        for stage in runs.iter().flat_map(|r| r.stages()) {
            let samples = stage_samples.entry(stage.name.clone()).or_default();
            #[allow(clippy::cast_precision_loss)]
            if let Some(d) = stage.duration() {
                samples.push(d.num_milliseconds() as f64 / 1000.0);
            }
            if stage.status == StageStatus::Failed {
                *failures_by_stage.entry(stage.name.clone()).or_default() += 1;
            }
        }

        Self {
            total_runs: runs.len(),
            completed_runs: completed.len(),
            succeeded_runs: succeeded,
            failed_runs: completed.len() - succeeded,
            success_rate: calculate_rate(succeeded, completed.len()),
            average_duration_secs: mean(&durations),
            stage_timeline: stage_samples
                .into_iter()
                .map(|(name, samples)| (name, mean(&samples)))
                .collect(),
            failures_by_stage,
        }
    }
}

/// Where a run history came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum HistorySource {
    Simulated,
    Live { repo: String },
    /// Live fetch failed and simulated runs are shown instead.
    Fallback { repo: String, reason: String },
}

impl HistorySource {
    pub fn describe(&self) -> String {
        match self {
            Self::Simulated => "simulated".to_string(),
            Self::Live { repo } => format!("live ({repo})"),
            Self::Fallback { repo, .. } => format!("simulated (live data for {repo} unavailable)"),
        }
    }
}

/// A run list together with the KPIs computed from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub source: HistorySource,
    pub kpis: Kpis,
    pub runs: Vec<PipelineRun>,
}

impl History {
    pub fn new(source: HistorySource, runs: Vec<PipelineRun>) -> Self {
        Self {
            kpis: Kpis::from_runs(&runs),
            source,
            runs,
        }
    }
}

/// Everything the single-page view shows, ready to render or export.
#[derive(Debug, Serialize, Deserialize)]
pub struct Dashboard {
    pub generated_at: DateTime<Utc>,
    pub current_run: PipelineRun,
    pub history: History,
    pub cluster: ClusterGraph,
    pub cluster_events: Vec<ClusterEvent>,
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::model::{RunSource, Stage};
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    fn stage(name: &str, status: StageStatus, secs: i64) -> Stage {
        let mut stage = Stage::pending(name);
        if status != StageStatus::Pending {
            stage.start(at(0));
            stage.finish(status, at(secs));
        }
        stage
    }

    fn run(stages: Vec<Stage>, secs: Option<i64>) -> PipelineRun {
        let mut run = PipelineRun::new("r", "ci", RunSource::Simulated, stages);
        if let Some(secs) = secs {
            run.started_at = Some(at(0));
            run.ended_at = Some(at(secs));
        }
        run
    }

    mod calculate_rate {
        use super::*;

        #[test]
        fn returns_zero_when_total_is_zero() {
            assert_eq!(calculate_rate(5, 0), 0.0);
        }

        #[test]
        fn calculates_percentage_correctly() {
            assert_eq!(calculate_rate(25, 100), 25.0);
        }

        #[test]
        fn handles_fractional_percentages() {
            let result = calculate_rate(1, 3);
            assert!((result - 33.333_333).abs() < 0.001, "got {result}");
        }
    }

    mod history {
        use super::*;

        #[test]
        fn computes_kpis_on_construction() {
            let runs = vec![run(vec![stage("build", StageStatus::Succeeded, 10)], Some(10))];
            let history = History::new(HistorySource::Simulated, runs);
            assert_eq!(history.kpis.total_runs, 1);
            assert_eq!(history.kpis.success_rate, 100.0);
        }

        #[test]
        fn fallback_mentions_repo() {
            let source = HistorySource::Fallback {
                repo: "octo/app".to_string(),
                reason: "request timed out".to_string(),
            };
            assert!(source.describe().contains("octo/app"));
        }
    }

    mod from_runs {
        use super::*;

        #[test]
        fn empty_input_is_all_zero() {
            let kpis = Kpis::from_runs(&[]);
            assert_eq!(kpis.total_runs, 0);
            assert_eq!(kpis.success_rate, 0.0);
            assert!(kpis.stage_timeline.is_empty());
        }

        #[test]
        fn counts_only_completed_runs_in_rate() {
            let runs = vec![
                run(vec![stage("build", StageStatus::Succeeded, 10)], Some(10)),
                run(vec![stage("build", StageStatus::Failed, 20)], Some(20)),
                run(vec![stage("build", StageStatus::Pending, 0)], None),
            ];
            let kpis = Kpis::from_runs(&runs);
            assert_eq!(kpis.total_runs, 3);
            assert_eq!(kpis.completed_runs, 2);
            assert_eq!(kpis.failed_runs, 1);
            assert_eq!(kpis.success_rate, 50.0);
            assert_eq!(kpis.average_duration_secs, 15.0);
        }

        #[test]
        fn timeline_keeps_stage_order() {
            let runs = vec![
                run(
                    vec![
                        stage("checkout", StageStatus::Succeeded, 4),
                        stage("build", StageStatus::Succeeded, 30),
                        stage("test", StageStatus::Failed, 12),
                    ],
                    Some(46),
                ),
                run(
                    vec![
                        stage("checkout", StageStatus::Succeeded, 6),
                        stage("build", StageStatus::Succeeded, 10),
                        stage("test", StageStatus::Failed, 8),
                    ],
                    Some(24),
                ),
            ];
            let kpis = Kpis::from_runs(&runs);
            let names: Vec<_> = kpis.stage_timeline.keys().map(String::as_str).collect();
            assert_eq!(names, ["checkout", "build", "test"]);
            assert_eq!(kpis.stage_timeline["checkout"], 5.0);
            assert_eq!(kpis.stage_timeline["build"], 20.0);
            assert_eq!(kpis.failures_by_stage["test"], 2);
            assert!(!kpis.failures_by_stage.contains_key("build"));
        }
    }
}
