use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::VisualizerError;

/// Longest simulated tick accepted, one day.
pub const MAX_TICK_SECONDS: u64 = 86_400;
/// Upper bound on a stage's duration, in ticks.
pub const MAX_STAGE_TICKS: i64 = 10_000;
/// Upper bound on any capacity or request amount.
pub const MAX_RESOURCE_UNITS: i64 = u32::MAX as i64;
pub const MAX_NODES: i64 = 1_000;
pub const MAX_PODS: i64 = 10_000;

/// Configuration file structure for pipeviz.
///
/// Every section is optional; anything left out falls back to the demo
/// defaults (four-stage pipeline, three-node cluster, public GitHub API).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Pipeline simulator settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Cluster topology settings
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Live GitHub Actions settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Presentation refresh settings
    #[serde(default)]
    pub display: DisplayConfig,

    /// Output format preferences
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SimulationMode {
    /// Fixed script: same config, same run.
    #[default]
    Replay,
    /// Seeded randomness within the configured bounds.
    Random,
}

/// Inclusive bounds, in ticks, for a stage's simulated duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRange {
    pub min: i64,
    pub max: i64,
}

impl TickRange {
    #[cfg(test)]
    pub fn fixed(ticks: i64) -> Self {
        Self {
            min: ticks,
            max: ticks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StageConfig {
    pub name: String,

    #[serde(default = "default_stage_duration")]
    pub duration: TickRange,

    #[serde(default)]
    pub failure_probability: f64,
}

impl StageConfig {
    pub fn new(name: impl Into<String>, duration: TickRange, failure_probability: f64) -> Self {
        Self {
            name: name.into(),
            duration,
            failure_probability,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PipelineConfig {
    #[serde(default)]
    pub mode: SimulationMode,

    /// Seed for random mode
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Simulated seconds per tick, used for timestamps
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,

    /// Stages in execution order
    #[serde(default = "default_stages")]
    pub stages: Vec<StageConfig>,
}

/// Inclusive bounds for sampled resource amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub min: i64,
    pub max: i64,
}

impl Range {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    #[cfg(test)]
    pub fn fixed(value: i64) -> Self {
        Self::new(value, value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterConfig {
    #[serde(default = "default_control_plane_nodes")]
    pub control_plane_nodes: i64,

    #[serde(default = "default_worker_nodes")]
    pub worker_nodes: i64,

    #[serde(default = "default_node_cpu")]
    pub node_cpu: Range,

    #[serde(default = "default_node_memory")]
    pub node_memory: Range,

    #[serde(default = "default_pods")]
    pub pods: i64,

    #[serde(default = "default_pod_cpu")]
    pub pod_cpu: Range,

    #[serde(default = "default_pod_memory")]
    pub pod_memory: Range,

    /// Workload names; pods cycle through them and each gets a service
    #[serde(default = "default_apps")]
    pub apps: Vec<String>,

    /// Allow pods on control-plane nodes
    #[serde(default)]
    pub schedule_on_control_plane: bool,

    /// Reject configs that leave pods with no node to run on
    #[serde(default)]
    pub strict_placement: bool,

    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Upper bound of simulated events applied by one perturbation
    #[serde(default = "default_perturb_events")]
    pub perturb_events: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitHubConfig {
    /// GitHub API base URL
    #[serde(default = "default_github_base_url")]
    pub base_url: String,

    /// Repository path (e.g., 'owner/repo')
    pub repo: Option<String>,

    /// Optional token, only needed to raise the rate limit
    pub token: Option<String>,

    /// Maximum number of workflow runs to fetch
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DisplayConfig {
    /// Delay between ticks when streaming a run
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Stream log lines as they are produced
    #[serde(default = "default_true")]
    pub stream: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Summary,
    Json,
    Csv,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: SimulationMode::default(),
            seed: default_seed(),
            tick_seconds: default_tick_seconds(),
            stages: default_stages(),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            control_plane_nodes: default_control_plane_nodes(),
            worker_nodes: default_worker_nodes(),
            node_cpu: default_node_cpu(),
            node_memory: default_node_memory(),
            pods: default_pods(),
            pod_cpu: default_pod_cpu(),
            pod_memory: default_pod_memory(),
            apps: default_apps(),
            schedule_on_control_plane: false,
            strict_placement: false,
            seed: default_seed(),
            perturb_events: default_perturb_events(),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            base_url: default_github_base_url(),
            repo: None,
            token: None,
            limit: default_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            stream: true,
        }
    }
}

fn default_stage_duration() -> TickRange {
    TickRange { min: 2, max: 6 }
}

fn default_stages() -> Vec<StageConfig> {
    vec![
        StageConfig::new("checkout", TickRange { min: 1, max: 3 }, 0.0),
        StageConfig::new("build", TickRange { min: 3, max: 8 }, 0.1),
        StageConfig::new("test", TickRange { min: 2, max: 6 }, 0.15),
        StageConfig::new("deploy", TickRange { min: 2, max: 4 }, 0.05),
    ]
}

fn default_seed() -> u64 {
    42
}

fn default_tick_seconds() -> u64 {
    5
}

fn default_control_plane_nodes() -> i64 {
    1
}

fn default_worker_nodes() -> i64 {
    2
}

fn default_node_cpu() -> Range {
    Range::new(4, 8)
}

fn default_node_memory() -> Range {
    Range::new(8192, 16384)
}

fn default_pods() -> i64 {
    6
}

fn default_pod_cpu() -> Range {
    Range::new(1, 2)
}

fn default_pod_memory() -> Range {
    Range::new(256, 2048)
}

fn default_apps() -> Vec<String> {
    vec![
        "frontend".to_string(),
        "backend".to_string(),
        "db".to_string(),
    ]
}

fn default_perturb_events() -> u32 {
    2
}

fn default_github_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_limit() -> usize {
    10
}

fn default_timeout_secs() -> u64 {
    8
}

fn default_tick_interval_ms() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

fn check_range(what: &str, min: i64, max: i64, limit: i64) -> crate::error::Result<()> {
    if min < 0 || max < 0 {
        return Err(VisualizerError::invalid_config(format!(
            "{what}: bounds must not be negative (got {min}..={max})"
        )));
    }
    if min > max {
        return Err(VisualizerError::invalid_config(format!(
            "{what}: min {min} is greater than max {max}"
        )));
    }
    if max > limit {
        return Err(VisualizerError::invalid_config(format!(
            "{what}: max {max} exceeds the limit of {limit}"
        )));
    }
    Ok(())
}

impl PipelineConfig {
    /// Checks the config before any run state is created.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.stages.is_empty() {
            return Err(VisualizerError::invalid_config(
                "pipeline: at least one stage is required",
            ));
        }

        if self.tick_seconds == 0 || self.tick_seconds > MAX_TICK_SECONDS {
            return Err(VisualizerError::invalid_config(format!(
                "pipeline: tick-seconds must be within 1..={MAX_TICK_SECONDS} (got {})",
                self.tick_seconds
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for stage in &self.stages {
            let name = stage.name.trim();
            if name.is_empty() {
                return Err(VisualizerError::invalid_config(
                    "pipeline: stage names must not be blank",
                ));
            }
            if !seen.insert(name) {
                return Err(VisualizerError::invalid_config(format!(
                    "pipeline: duplicate stage '{name}'"
                )));
            }
            check_range(
                &format!("stage '{name}' duration"),
                stage.duration.min,
                stage.duration.max,
                MAX_STAGE_TICKS,
            )?;
            if !(0.0..=1.0).contains(&stage.failure_probability) {
                return Err(VisualizerError::invalid_config(format!(
                    "stage '{name}': failure probability must be within 0..=1 (got {})",
                    stage.failure_probability
                )));
            }
        }

        Ok(())
    }

    /// Replaces the stage list, keeping settings of stages that already exist.
    pub fn with_stage_names(mut self, names: &[String]) -> Self {
        self.stages = names
            .iter()
            .map(|name| {
                self.stages
                    .iter()
                    .find(|s| &s.name == name)
                    .cloned()
                    .unwrap_or_else(|| {
                        StageConfig::new(name.clone(), default_stage_duration(), 0.0)
                    })
            })
            .collect();
        self
    }
}

impl ClusterConfig {
    pub fn node_count(&self) -> i64 {
        self.control_plane_nodes.saturating_add(self.worker_nodes)
    }

    /// Checks the config before any node is created.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.control_plane_nodes < 0 || self.worker_nodes < 0 {
            return Err(VisualizerError::invalid_config(
                "cluster: node counts must not be negative",
            ));
        }
        if self.pods < 0 {
            return Err(VisualizerError::invalid_config(
                "cluster: pod count must not be negative",
            ));
        }
        if self.node_count() > MAX_NODES {
            return Err(VisualizerError::invalid_config(format!(
                "cluster: at most {MAX_NODES} nodes are supported"
            )));
        }
        if self.pods > MAX_PODS {
            return Err(VisualizerError::invalid_config(format!(
                "cluster: at most {MAX_PODS} pods are supported"
            )));
        }

        let limit = MAX_RESOURCE_UNITS;
        check_range("cluster node-cpu", self.node_cpu.min, self.node_cpu.max, limit)?;
        check_range("cluster node-memory", self.node_memory.min, self.node_memory.max, limit)?;
        check_range("cluster pod-cpu", self.pod_cpu.min, self.pod_cpu.max, limit)?;
        check_range("cluster pod-memory", self.pod_memory.min, self.pod_memory.max, limit)?;

        if self.node_count() > 0 && (self.node_cpu.max == 0 || self.node_memory.max == 0) {
            return Err(VisualizerError::invalid_config(
                "cluster: node capacity ranges must allow a non-zero capacity",
            ));
        }

        if self.pods > 0 {
            if self.apps.iter().all(|a| a.trim().is_empty()) {
                return Err(VisualizerError::invalid_config(
                    "cluster: at least one app name is required when pods are requested",
                ));
            }

            let schedulable = if self.schedule_on_control_plane {
                self.node_count()
            } else {
                self.worker_nodes
            };
            if self.strict_placement && schedulable == 0 {
                return Err(VisualizerError::invalid_config(
                    "cluster: strict placement needs at least one schedulable node",
                ));
            }
        }

        Ok(())
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./pipeviz.toml, ./pipeviz.json, ./pipeviz.yaml, ./pipeviz.yml
    /// 3. The user config directory (e.g. `~/.config/pipeviz/config.toml`)
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                log::warn!(
                    "Config file {} not found, using defaults",
                    path.display()
                );
                return Ok(Self::default());
            }
            return Self::load_from_path(path);
        }

        let candidates = ["pipeviz.toml", "pipeviz.json", "pipeviz.yaml", "pipeviz.yml"];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        if let Some(path) = user_config_path() {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        log::debug!("Loading configuration from {}", path.display());

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("yaml") | Some("yml") => serde_yaml::to_string(self)?,
            _ => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pipeviz").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        let names: Vec<_> = config.pipeline.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["checkout", "build", "test", "deploy"]);
        assert_eq!(config.pipeline.mode, SimulationMode::Replay);
        assert_eq!(config.cluster.worker_nodes, 2);
        assert_eq!(config.github.base_url, "https://api.github.com");
        assert_eq!(config.github.timeout_secs, 8);
        assert_eq!(config.display.tick_interval_ms, 600);
        assert!(config.pipeline.validate().is_ok());
        assert!(config.cluster.validate().is_ok());
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[pipeline]
mode = "random"
seed = 7

[[pipeline.stages]]
name = "lint"
duration = { min = 1, max = 2 }

[[pipeline.stages]]
name = "build"
failure-probability = 0.5

[cluster]
worker-nodes = 4
pods = 12
node-cpu = { min = 2, max = 2 }

[github]
repo = "octo/hello"
timeout-secs = 3
"#;
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.pipeline.mode, SimulationMode::Random);
        assert_eq!(config.pipeline.seed, 7);
        assert_eq!(config.pipeline.stages.len(), 2);
        assert_eq!(config.pipeline.stages[0].duration, TickRange { min: 1, max: 2 });
        assert_eq!(config.pipeline.stages[1].duration, default_stage_duration());
        assert_eq!(config.pipeline.stages[1].failure_probability, 0.5);
        assert_eq!(config.cluster.worker_nodes, 4);
        assert_eq!(config.cluster.pods, 12);
        assert_eq!(config.cluster.node_cpu, Range::fixed(2));
        assert_eq!(config.cluster.control_plane_nodes, 1);
        assert_eq!(config.github.repo.as_deref(), Some("octo/hello"));
        assert_eq!(config.github.timeout_secs, 3);
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "cluster": { "pods": 3, "strict-placement": true },
  "output": { "format": "csv" }
}"#;
        write!(temp_file, "{}", json_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.cluster.pods, 3);
        assert!(config.cluster.strict_placement);
        assert_eq!(config.output.format, OutputFormat::Csv);
    }

    #[test]
    fn test_load_yaml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        write!(temp_file, "display:\n  tick-interval-ms: 10\n  stream: false\n").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.display.tick_interval_ms, 10);
        assert!(!config.display.stream);
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load(Some(Path::new("nonexistent.toml"))).unwrap();
        assert_eq!(config.pipeline.stages.len(), 4);
        assert_eq!(config.github.limit, 10);
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("pipeviz.toml");

        let mut config = Config::default();
        config.cluster.pods = 9;
        config.pipeline.mode = SimulationMode::Random;
        config.save(&path).unwrap();

        let reloaded = Config::load(Some(&path)).unwrap();
        assert_eq!(reloaded.cluster.pods, 9);
        assert_eq!(reloaded.pipeline, config.pipeline);
    }

    mod pipeline_validate {
        use super::*;

        fn with_stages(stages: Vec<StageConfig>) -> PipelineConfig {
            PipelineConfig {
                stages,
                ..PipelineConfig::default()
            }
        }

        #[test]
        fn rejects_empty_stage_list() {
            let err = with_stages(vec![]).validate().unwrap_err();
            assert!(err.is_config_error());
        }

        #[test]
        fn rejects_negative_duration_bound() {
            let config = with_stages(vec![StageConfig::new(
                "build",
                TickRange { min: -1, max: 3 },
                0.0,
            )]);
            assert!(config.validate().unwrap_err().to_string().contains("negative"));
        }

        #[test]
        fn rejects_inverted_duration_bounds() {
            let config = with_stages(vec![StageConfig::new(
                "build",
                TickRange { min: 5, max: 3 },
                0.0,
            )]);
            assert!(config.validate().is_err());
        }

        #[test]
        fn rejects_probability_out_of_range() {
            let config = with_stages(vec![StageConfig::new("build", TickRange::fixed(1), 1.5)]);
            assert!(config.validate().is_err());

            let config =
                with_stages(vec![StageConfig::new("build", TickRange::fixed(1), f64::NAN)]);
            assert!(config.validate().is_err());
        }

        #[test]
        fn rejects_duplicate_names() {
            let config = with_stages(vec![
                StageConfig::new("build", TickRange::fixed(1), 0.0),
                StageConfig::new("build", TickRange::fixed(1), 0.0),
            ]);
            assert!(config.validate().unwrap_err().to_string().contains("duplicate"));
        }

        #[test]
        fn rejects_zero_tick_length() {
            let config = PipelineConfig {
                tick_seconds: 0,
                ..PipelineConfig::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn rejects_tick_length_over_a_day() {
            let config = PipelineConfig {
                tick_seconds: 10_000_000_000_000,
                ..PipelineConfig::default()
            };
            assert!(config.validate().unwrap_err().is_config_error());

            let config = PipelineConfig {
                tick_seconds: MAX_TICK_SECONDS,
                ..PipelineConfig::default()
            };
            assert!(config.validate().is_ok());
        }

        #[test]
        fn rejects_stage_duration_beyond_limit() {
            let config = with_stages(vec![StageConfig::new(
                "build",
                TickRange {
                    min: 1,
                    max: MAX_STAGE_TICKS + 1,
                },
                0.0,
            )]);
            assert!(config.validate().unwrap_err().to_string().contains("limit"));
        }

        #[test]
        fn accepts_zero_duration() {
            let config = with_stages(vec![StageConfig::new("build", TickRange::fixed(0), 0.0)]);
            assert!(config.validate().is_ok());
        }

        #[test]
        fn with_stage_names_keeps_known_settings() {
            let config = PipelineConfig::default()
                .with_stage_names(&["build".to_string(), "package".to_string()]);
            assert_eq!(config.stages[0].failure_probability, 0.1);
            assert_eq!(config.stages[1].name, "package");
            assert_eq!(config.stages[1].failure_probability, 0.0);
        }
    }

    mod cluster_validate {
        use super::*;

        #[test]
        fn rejects_negative_counts() {
            let config = ClusterConfig {
                worker_nodes: -1,
                ..ClusterConfig::default()
            };
            assert!(config.validate().is_err());

            let config = ClusterConfig {
                pods: -3,
                ..ClusterConfig::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn rejects_resource_bounds_beyond_limit() {
            let config = ClusterConfig {
                node_cpu: Range::fixed(i64::MAX),
                ..ClusterConfig::default()
            };
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("exceeds the limit"));

            let config = ClusterConfig {
                pod_memory: Range::new(1, MAX_RESOURCE_UNITS + 1),
                ..ClusterConfig::default()
            };
            assert!(config.validate().unwrap_err().is_config_error());

            let config = ClusterConfig {
                node_cpu: Range::fixed(MAX_RESOURCE_UNITS),
                ..ClusterConfig::default()
            };
            assert!(config.validate().is_ok());
        }

        #[test]
        fn rejects_oversized_cluster() {
            let config = ClusterConfig {
                worker_nodes: MAX_NODES + 1,
                ..ClusterConfig::default()
            };
            assert!(config.validate().is_err());

            let config = ClusterConfig {
                pods: MAX_PODS + 1,
                ..ClusterConfig::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn rejects_strict_placement_without_nodes() {
            let config = ClusterConfig {
                control_plane_nodes: 0,
                worker_nodes: 0,
                pods: 2,
                strict_placement: true,
                ..ClusterConfig::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn allows_zero_nodes_when_not_strict() {
            let config = ClusterConfig {
                control_plane_nodes: 0,
                worker_nodes: 0,
                pods: 2,
                ..ClusterConfig::default()
            };
            assert!(config.validate().is_ok());
        }

        #[test]
        fn strict_placement_ignores_tainted_control_plane() {
            let config = ClusterConfig {
                control_plane_nodes: 1,
                worker_nodes: 0,
                pods: 1,
                strict_placement: true,
                ..ClusterConfig::default()
            };
            assert!(config.validate().is_err());

            let config = ClusterConfig {
                schedule_on_control_plane: true,
                ..config
            };
            assert!(config.validate().is_ok());
        }
    }
}
