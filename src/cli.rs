use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{Config, OutputFormat, SimulationMode};
use crate::error::{LiveDataFailure, VisualizerError};
use crate::insights::{Dashboard, History, HistorySource};
use crate::output::{self, bright_yellow, CsvExport, FetchProgress};
use crate::providers::GitHubProvider;
use crate::simulator::{simulate_history, start_run};
use crate::model::PipelineRun;
use crate::topology::{generate, perturb, perturb_with_events};

#[derive(Parser)]
#[command(name = "pipeviz")]
#[command(author, version, about = "CI/CD pipeline and cluster visualizer", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write the report to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one simulated pipeline, streaming its log tick by tick
    Simulate {
        #[arg(short, long, value_enum)]
        mode: Option<SimulationMode>,

        #[arg(short, long)]
        seed: Option<u64>,

        /// Stage names, comma separated
        #[arg(long, value_delimiter = ',')]
        stages: Vec<String>,

        /// Print only the final stage table
        #[arg(long, default_value_t = false)]
        no_stream: bool,
    },
    /// Generate a cluster snapshot and optionally evolve it
    Cluster {
        #[arg(short, long)]
        seed: Option<u64>,

        #[arg(short, long)]
        workers: Option<i64>,

        #[arg(long)]
        pods: Option<i64>,

        /// Number of perturbation steps to apply
        #[arg(long, default_value_t = 0)]
        perturb: u32,
    },
    /// Recent GitHub Actions runs with KPIs
    Runs {
        /// Repository as owner/name
        #[arg(short, long)]
        repo: Option<String>,

        #[arg(short, long)]
        limit: Option<usize>,

        #[arg(short, long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Fail instead of showing simulated runs when GitHub is unreachable
        #[arg(long, default_value_t = false)]
        no_fallback: bool,
    },
    /// One run, run history and the cluster map in a single view
    Dashboard {
        #[arg(short, long)]
        repo: Option<String>,

        #[arg(short, long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
    /// Write the default configuration file
    Init {
        #[arg(default_value = "pipeviz.toml")]
        path: PathBuf,

        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

/// Format and destination resolved from flags and config.
struct Sink<'a> {
    format: OutputFormat,
    pretty: bool,
    path: Option<&'a Path>,
}

impl Sink<'_> {
    fn emit<T>(&self, value: &T, render: impl FnOnce(&T) -> String) -> Result<()>
    where
        T: Serialize + CsvExport,
    {
        let text = if self.format == OutputFormat::Summary {
            render(value)
        } else {
            let mut buffer = Vec::new();
            output::export(value, self.format, self.pretty, &mut buffer)?;
            String::from_utf8(buffer).context("Export produced invalid UTF-8")?
        };

        if let Some(path) = self.path {
            std::fs::write(path, console::strip_ansi_codes(&text).as_bytes())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Report written to: {}", path.display());
        } else {
            print!("{text}");
        }
        Ok(())
    }
}

/// Logs every broken invariant of a finished run.
fn warn_on_violations(run: &PipelineRun) {
    for problem in run.violations() {
        warn!("Inconsistent run: {problem}");
    }
}

impl Cli {
    fn sink<'a>(&'a self, config: &Config) -> Sink<'a> {
        Sink {
            format: self.format.unwrap_or(config.output.format),
            pretty: self.pretty || config.output.pretty,
            path: self.output.as_deref(),
        }
    }

    async fn execute_simulate(
        &self,
        mut config: Config,
        mode: Option<SimulationMode>,
        seed: Option<u64>,
        stages: &[String],
        no_stream: bool,
    ) -> Result<()> {
        if let Some(mode) = mode {
            config.pipeline.mode = mode;
        }
        if let Some(seed) = seed {
            config.pipeline.seed = seed;
        }
        if !stages.is_empty() {
            config.pipeline = config.pipeline.with_stage_names(stages);
        }

        let sink = self.sink(&config);
        let stream = !no_stream && config.display.stream && sink.format == OutputFormat::Summary;
        let delay = Duration::from_millis(config.display.tick_interval_ms);

        let mut handle = start_run(&config.pipeline, Utc::now()).context("Cannot start simulation")?;
        while !handle.is_complete() {
            let advance = handle.advance();
            if stream {
                output::print_advance(&advance);
            }
            if stream && !advance.is_complete() && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        info!("Run {} finished after {} ticks", handle.run().id, handle.ticks());
        warn_on_violations(handle.run());

        sink.emit(handle.run(), |run| output::render_run(run, !stream))
    }

    fn execute_cluster(
        &self,
        mut config: Config,
        seed: Option<u64>,
        workers: Option<i64>,
        pods: Option<i64>,
        steps: u32,
    ) -> Result<()> {
        if let Some(seed) = seed {
            config.cluster.seed = seed;
        }
        if let Some(workers) = workers {
            config.cluster.worker_nodes = workers;
        }
        if let Some(pods) = pods {
            config.cluster.pods = pods;
        }

        let sink = self.sink(&config);
        let mut graph = generate(&config.cluster).context("Cannot generate cluster")?;
        // Only the summary view lists events.
        let mut events = Vec::new();
        for _ in 0..steps {
            if sink.format == OutputFormat::Summary {
                let (next, applied) = perturb_with_events(&graph);
                graph = next;
                events.extend(applied);
            } else {
                graph = perturb(&graph);
            }
        }

        sink.emit(&graph, |graph| output::render_cluster(graph, &events))
    }

    /// Live runs for `repo`, or simulated ones when GitHub cannot be reached
    /// and `fallback` is set.
    async fn load_history(
        config: &Config,
        repo: &str,
        limit: usize,
        token: Option<&str>,
        fallback: bool,
    ) -> Result<History> {
        let mut github = config.github.clone();
        if let Some(token) = token {
            github.token = Some(token.to_string());
        }
        let provider = GitHubProvider::new(&github, repo)?;

        let progress = FetchProgress::start(&provider.slug());
        let deadline = Duration::from_secs(github.timeout_secs.max(1).saturating_mul(2));
        let fetched = match tokio::time::timeout(deadline, provider.fetch_runs(limit)).await {
            Ok(result) => result,
            Err(_) => Err(VisualizerError::live(provider.slug(), LiveDataFailure::Timeout)),
        };

        match fetched {
            Ok(runs) => {
                progress.finish(runs.len());
                Ok(History::new(HistorySource::Live { repo: provider.slug() }, runs))
            }
            Err(error) => {
                progress.fail(&error);
                if !fallback || error.is_config_error() {
                    return Err(error).context("Failed to fetch live runs");
                }
                let reason = match &error {
                    VisualizerError::LiveDataUnavailable { reason, .. } => reason.to_string(),
                    other => other.to_string(),
                };
                warn!("Falling back to simulated runs: {error}");
                eprintln!(
                    "{}",
                    bright_yellow(format!("⚠️  {error}. Showing simulated runs instead."))
                );
                let runs = simulate_history(&config.pipeline, limit, Utc::now())?;
                Ok(History::new(
                    HistorySource::Fallback {
                        repo: provider.slug(),
                        reason,
                    },
                    runs,
                ))
            }
        }
    }

    async fn execute_runs(
        &self,
        config: Config,
        repo: Option<&str>,
        limit: Option<usize>,
        token: Option<&str>,
        no_fallback: bool,
    ) -> Result<()> {
        let Some(repo) = repo.or(config.github.repo.as_deref()) else {
            bail!("No repository given; pass --repo owner/name or set github.repo in the config");
        };
        let limit = limit.unwrap_or(config.github.limit);
        info!("Collecting runs for repository: {repo}");

        let history = Self::load_history(&config, repo, limit, token, !no_fallback).await?;
        self.sink(&config).emit(&history, output::render_history)
    }

    async fn execute_dashboard(
        &self,
        config: Config,
        repo: Option<&str>,
        token: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now();

        let mut handle = start_run(&config.pipeline, now).context("Cannot start simulation")?;
        handle.run_to_completion();
        warn_on_violations(handle.run());

        let history = match repo.or(config.github.repo.as_deref()) {
            Some(repo) => {
                Self::load_history(&config, repo, config.github.limit, token, true).await?
            }
            None => History::new(
                HistorySource::Simulated,
                simulate_history(&config.pipeline, config.github.limit, now)?,
            ),
        };

        let initial = generate(&config.cluster).context("Cannot generate cluster")?;
        let (cluster, cluster_events) = perturb_with_events(&initial);

        let dashboard = Dashboard {
            generated_at: now,
            current_run: handle.into_run(),
            history,
            cluster,
            cluster_events,
        };
        self.sink(&config).emit(&dashboard, output::render_dashboard)
    }

    fn execute_init(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            bail!("{} already exists; pass --force to overwrite it", path.display());
        }
        Config::default().save(path)?;
        info!("Default configuration written to: {}", path.display());
        eprintln!("Wrote {}", path.display());
        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        if let Commands::Init { path, force } = &self.command {
            return Self::execute_init(path, *force);
        }

        let config = Config::load(self.config.as_deref()).context("Failed to load configuration")?;

        match &self.command {
            Commands::Simulate {
                mode,
                seed,
                stages,
                no_stream,
            } => {
                self.execute_simulate(config, *mode, *seed, stages, *no_stream)
                    .await
            }
            Commands::Cluster {
                seed,
                workers,
                pods,
                perturb,
            } => self.execute_cluster(config, *seed, *workers, *pods, *perturb),
            Commands::Runs {
                repo,
                limit,
                token,
                no_fallback,
            } => {
                self.execute_runs(config, repo.as_deref(), *limit, token.as_deref(), *no_fallback)
                    .await
            }
            Commands::Dashboard { repo, token } => {
                self.execute_dashboard(config, repo.as_deref(), token.as_deref())
                    .await
            }
            Commands::Init { .. } => Ok(()),
        }
    }
}
