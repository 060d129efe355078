use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Where a run's records came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunSource {
    Simulated,
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    /// Overall status implied by a run's stages.
    ///
    /// `Failed` if any stage failed, `Succeeded` if every stage succeeded,
    /// `Pending` if nothing has started yet, `Running` otherwise.
    pub fn derive(stages: &[Stage]) -> Self {
        if stages.iter().any(|s| s.status == StageStatus::Failed) {
            Self::Failed
        } else if !stages.is_empty() && stages.iter().all(|s| s.status == StageStatus::Succeeded)
        {
            Self::Succeeded
        } else if stages.iter().all(|s| s.status == StageStatus::Pending) {
            Self::Pending
        } else {
            Self::Running
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl StageStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// A single line of stage output. Never edited after it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub text: String,
}

impl LogLine {
    pub fn new(timestamp: DateTime<Utc>, severity: Severity, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            severity,
            text: text.into(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "> {} [{}] {}",
            self.timestamp.format("%H:%M:%S"),
            self.severity.label(),
            self.text
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    pub status: StageStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    logs: Vec<LogLine>,
}

impl Stage {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StageStatus::Pending,
            started_at: None,
            ended_at: None,
            logs: Vec::new(),
        }
    }

    pub fn logs(&self) -> &[LogLine] {
        &self.logs
    }

    /// Appends a line, keeping timestamps strictly increasing.
    ///
    /// Returns `false` (and drops the line) when it would go back in time.
    pub(crate) fn push_log(&mut self, line: LogLine) -> bool {
        if let Some(last) = self.logs.last() {
            if line.timestamp <= last.timestamp {
                return false;
            }
        }
        self.logs.push(line);
        true
    }

    pub(crate) fn start(&mut self, at: DateTime<Utc>) {
        self.status = StageStatus::Running;
        self.started_at = Some(at);
        self.ended_at = None;
    }

    pub(crate) fn finish(&mut self, status: StageStatus, at: DateTime<Utc>) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.ended_at = Some(at);
    }

    /// Elapsed time of a stage that has both timestamps.
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        let name = &self.name;

        if let (Some(start), Some(end)) = (self.started_at, self.ended_at) {
            if end < start {
                out.push(format!("stage {name}: ends before it starts"));
            }
        }

        match self.status {
            StageStatus::Pending => {
                if self.started_at.is_some() || self.ended_at.is_some() {
                    out.push(format!("stage {name}: pending stage has timestamps"));
                }
                if !self.logs.is_empty() {
                    out.push(format!("stage {name}: pending stage has log lines"));
                }
            }
            StageStatus::Running => {
                if self.started_at.is_none() {
                    out.push(format!("stage {name}: running stage has no start time"));
                }
                if self.ended_at.is_some() {
                    out.push(format!("stage {name}: running stage has an end time"));
                }
            }
            StageStatus::Succeeded | StageStatus::Failed => {
                if self.started_at.is_none() || self.ended_at.is_none() {
                    out.push(format!("stage {name}: finished stage is missing timestamps"));
                }
            }
        }

        if self
            .logs
            .windows(2)
            .any(|pair| pair[1].timestamp <= pair[0].timestamp)
        {
            out.push(format!("stage {name}: log timestamps are not increasing"));
        }

        out
    }
}

/// One pipeline execution, simulated or fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: String,
    pub name: String,
    pub source: RunSource,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub url: Option<String>,
    pub(crate) stages: Vec<Stage>,
}

impl PipelineRun {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        source: RunSource,
        stages: Vec<Stage>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source,
            status: RunStatus::derive(&stages),
            started_at: None,
            ended_at: None,
            url: None,
            stages,
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    #[cfg(test)]
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// All log lines across stages, in stage order.
    pub fn log_lines(&self) -> impl Iterator<Item = (&str, &LogLine)> {
        self.stages
            .iter()
            .flat_map(|s| s.logs.iter().map(move |l| (s.name.as_str(), l)))
    }

    /// Lists every broken invariant. An empty list means the run is consistent.
    pub fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();

        if self.stages.is_empty() {
            out.push(format!("run {}: has no stages", self.id));
        }

        let derived = RunStatus::derive(&self.stages);
        if derived != self.status {
            out.push(format!(
                "run {}: status is {} but stages imply {}",
                self.id, self.status, derived
            ));
        }

        if self.status.is_terminal() && self.ended_at.is_none() {
            out.push(format!("run {}: finished run has no end time", self.id));
        }
        if !self.status.is_terminal() && self.ended_at.is_some() {
            out.push(format!("run {}: unfinished run has an end time", self.id));
        }
        if let (Some(start), Some(end)) = (self.started_at, self.ended_at) {
            if end < start {
                out.push(format!("run {}: ends before it starts", self.id));
            }
        }

        for stage in &self.stages {
            out.extend(stage.violations());
        }

        out
    }
}
