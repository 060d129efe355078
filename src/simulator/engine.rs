use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::{PipelineConfig, SimulationMode};
use crate::error::Result;
use crate::model::{LogLine, PipelineRun, RunSource, RunStatus, Severity, Stage, StageStatus};

use super::script;

/// Chance that a tick in random mode prints a warning instead of script output.
const WARNING_PROBABILITY: f64 = 0.1;

/// What one tick did to a run that is still going.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum StageEvent {
    /// The run and its first stage started.
    Started { stage: String, line: LogLine },
    /// The running stage printed a line.
    Log { stage: String, line: LogLine },
    /// A stage finished and the next one started in the same tick.
    Transitioned {
        finished: String,
        status: StageStatus,
        closing: LogLine,
        started: String,
        opening: LogLine,
    },
}

impl StageEvent {
    /// Lines appended by this tick, tagged with their stage.
    pub fn lines(&self) -> Vec<(&str, &LogLine)> {
        match self {
            Self::Started { stage, line } | Self::Log { stage, line } => {
                vec![(stage.as_str(), line)]
            }
            Self::Transitioned {
                finished,
                closing,
                started,
                opening,
                ..
            } => vec![(finished.as_str(), closing), (started.as_str(), opening)],
        }
    }
}

/// Emitted once the run reaches a terminal status, and on every call after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunComplete {
    pub run_id: String,
    pub status: RunStatus,
    pub ended_at: DateTime<Utc>,
    /// Stage whose terminal transition ended the run.
    pub last_stage: String,
    pub closing: LogLine,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Stage(StageEvent),
    Complete(RunComplete),
}

impl Advance {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

/// Outcome decided for a stage when the run is created.
#[derive(Debug, Clone, Copy)]
struct StagePlan {
    ticks: u64,
    fails: bool,
}

/// A simulated run in progress.
///
/// Owns its `PipelineRun` and all state needed to step it; nothing is
/// shared between handles.
#[derive(Debug, Clone)]
pub struct RunHandle {
    run: PipelineRun,
    plan: Vec<StagePlan>,
    mode: SimulationMode,
    rng: ChaCha8Rng,
    origin: DateTime<Utc>,
    tick_seconds: u64,
    tick: u64,
    current: Option<usize>,
    stage_started_tick: u64,
    stage_lines: usize,
    completion: Option<RunComplete>,
}

/// Validates `config` and creates a pending run.
///
/// `origin` is the simulated wall-clock time of tick 0.
///
/// # Errors
///
/// Returns `InvalidConfig` if the stage list is empty, a duration bound is
/// negative or inverted, or a failure probability is outside `0..=1`.
pub fn start_run(config: &PipelineConfig, origin: DateTime<Utc>) -> Result<RunHandle> {
    config.validate()?;

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let plan: Vec<StagePlan> = config
        .stages
        .iter()
        .map(|stage| {
            let min = stage.duration.min.unsigned_abs();
            let max = stage.duration.max.unsigned_abs();
            let (ticks, fails) = match config.mode {
                SimulationMode::Replay => (min, stage.failure_probability >= 1.0),
                SimulationMode::Random => (
                    rng.random_range(min..=max),
                    rng.random_bool(stage.failure_probability),
                ),
            };
            StagePlan {
                ticks: ticks.max(1),
                fails,
            }
        })
        .collect();

    let id = match config.mode {
        SimulationMode::Replay => "sim-replay".to_string(),
        SimulationMode::Random => format!("sim-{}", config.seed),
    };
    let stages = config
        .stages
        .iter()
        .map(|s| Stage::pending(s.name.trim()))
        .collect();
    let run = PipelineRun::new(id, "Simulated pipeline", RunSource::Simulated, stages);

    debug!(
        "Planned run {}: {:?}",
        run.id,
        plan.iter().map(|p| (p.ticks, p.fails)).collect::<Vec<_>>()
    );

    Ok(RunHandle {
        run,
        plan,
        mode: config.mode,
        rng,
        origin,
        tick_seconds: config.tick_seconds,
        tick: 0,
        current: None,
        stage_started_tick: 0,
        stage_lines: 0,
        completion: None,
    })
}

impl RunHandle {
    pub fn run(&self) -> &PipelineRun {
        &self.run
    }

    pub fn into_run(self) -> PipelineRun {
        self.run
    }

    pub fn is_complete(&self) -> bool {
        self.completion.is_some()
    }

    /// Ticks consumed so far.
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Simulated time at `tick`.
    fn clock(&self, tick: u64) -> DateTime<Utc> {
        let secs = i64::try_from(tick.saturating_mul(self.tick_seconds)).unwrap_or(i64::MAX);
        Duration::try_seconds(secs)
            .and_then(|offset| self.origin.checked_add_signed(offset))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Steps the run by one tick.
    ///
    /// The first call starts the run and its first stage. Later calls print
    /// output for the running stage until its duration has elapsed, then
    /// finish it and start the next one. A failed stage ends the run at once
    /// and leaves the remaining stages pending. Once complete, every call
    /// returns the same `RunComplete`.
    pub fn advance(&mut self) -> Advance {
        if let Some(done) = &self.completion {
            return Advance::Complete(done.clone());
        }

        let now = self.clock(self.tick);
        let event = match self.current {
            None => {
                info!("Starting run {}", self.run.id);
                self.run.started_at = Some(now);
                let line = self.start_stage(0, now);
                self.run.status = RunStatus::derive(&self.run.stages);
                Advance::Stage(StageEvent::Started {
                    stage: self.run.stages[0].name.clone(),
                    line,
                })
            }
            Some(index) => {
                let elapsed = self.tick - self.stage_started_tick;
                if elapsed < self.plan[index].ticks {
                    let line = self.next_line(index, now);
                    self.run.stages[index].push_log(line.clone());
                    Advance::Stage(StageEvent::Log {
                        stage: self.run.stages[index].name.clone(),
                        line,
                    })
                } else {
                    self.finish_stage(index, now)
                }
            }
        };

        self.tick += 1;
        event
    }

    /// Advances until the run completes.
    pub fn run_to_completion(&mut self) -> RunComplete {
        loop {
            if let Advance::Complete(done) = self.advance() {
                return done;
            }
        }
    }

    fn start_stage(&mut self, index: usize, now: DateTime<Utc>) -> LogLine {
        self.current = Some(index);
        self.stage_started_tick = self.tick;
        self.stage_lines = 0;

        let stage = &mut self.run.stages[index];
        stage.start(now);
        debug!("Stage {} started at tick {}", stage.name, self.tick);

        let line = LogLine::new(now, Severity::Info, script::line(&stage.name, 0));
        stage.push_log(line.clone());
        self.stage_lines = 1;
        line
    }

    fn next_line(&mut self, index: usize, now: DateTime<Utc>) -> LogLine {
        let name = &self.run.stages[index].name;
        let line = match self.mode {
            SimulationMode::Replay => {
                LogLine::new(now, Severity::Info, script::line(name, self.stage_lines))
            }
            SimulationMode::Random => {
                if self.rng.random_bool(WARNING_PROBABILITY) {
                    let pick = self.rng.random_range(0..script::warning_count());
                    LogLine::new(now, Severity::Warn, script::warning(pick))
                } else {
                    LogLine::new(now, Severity::Info, script::line(name, self.stage_lines))
                }
            }
        };
        self.stage_lines += 1;
        line
    }

    fn finish_stage(&mut self, index: usize, now: DateTime<Utc>) -> Advance {
        let plan = self.plan[index];
        let status = if plan.fails {
            StageStatus::Failed
        } else {
            StageStatus::Succeeded
        };

        let name = self.run.stages[index].name.clone();
        let closing = match status {
            StageStatus::Failed => LogLine::new(now, Severity::Error, script::failure_line(&name)),
            _ => LogLine::new(
                now,
                Severity::Info,
                script::success_line(&name, plan.ticks.saturating_mul(self.tick_seconds)),
            ),
        };

        let stage = &mut self.run.stages[index];
        stage.push_log(closing.clone());
        stage.finish(status, now);
        debug!("Stage {name} {status} at tick {}", self.tick);

        let next = index + 1;
        if status == StageStatus::Failed || next == self.run.stages.len() {
            self.current = None;
            self.run.status = RunStatus::derive(&self.run.stages);
            self.run.ended_at = Some(now);
            info!("Run {} finished: {}", self.run.id, self.run.status);

            let done = RunComplete {
                run_id: self.run.id.clone(),
                status: self.run.status,
                ended_at: now,
                last_stage: name,
                closing,
            };
            self.completion = Some(done.clone());
            return Advance::Complete(done);
        }

        let opening = self.start_stage(next, now);
        self.run.status = RunStatus::derive(&self.run.stages);
        Advance::Stage(StageEvent::Transitioned {
            finished: name,
            status,
            closing,
            started: self.run.stages[next].name.clone(),
            opening,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StageConfig, TickRange};
    use chrono::TimeZone;

    fn origin() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn four_stages(ticks: i64, failing: Option<&str>) -> PipelineConfig {
        let stages = ["checkout", "build", "test", "deploy"]
            .iter()
            .map(|name| {
                let p = if Some(*name) == failing { 1.0 } else { 0.0 };
                StageConfig::new(*name, TickRange::fixed(ticks), p)
            })
            .collect();
        PipelineConfig {
            stages,
            ..PipelineConfig::default()
        }
    }

    fn drive(handle: &mut RunHandle) -> Vec<Advance> {
        let mut events = Vec::new();
        for _ in 0..1_000 {
            let step = handle.advance();
            let done = step.is_complete();
            events.push(step);
            if done {
                break;
            }
        }
        events
    }

    fn statuses(run: &PipelineRun) -> Vec<StageStatus> {
        run.stages().iter().map(|s| s.status).collect()
    }

    mod start_run {
        use super::*;

        #[test]
        fn creates_pending_run() {
            let handle = start_run(&PipelineConfig::default(), origin()).unwrap();
            let run = handle.run();
            assert_eq!(run.status, RunStatus::Pending);
            assert!(run.started_at.is_none());
            assert!(run
                .stages()
                .iter()
                .all(|s| s.status == StageStatus::Pending && s.logs().is_empty()));
            assert!(run.violations().is_empty(), "{:?}", run.violations());
        }

        #[test]
        fn run_id_names_mode_and_seed() {
            let mut config = PipelineConfig::default();
            config.seed = 77;
            assert_eq!(start_run(&config, origin()).unwrap().run().id, "sim-replay");
            config.mode = SimulationMode::Random;
            assert_eq!(start_run(&config, origin()).unwrap().run().id, "sim-77");
        }

        #[test]
        fn rejects_empty_stage_list() {
            let config = PipelineConfig {
                stages: vec![],
                ..PipelineConfig::default()
            };
            let err = start_run(&config, origin()).unwrap_err();
            assert!(err.is_config_error());
        }

        #[test]
        fn rejects_negative_duration() {
            let mut config = four_stages(1, None);
            config.stages[2].duration = TickRange { min: -2, max: 1 };
            assert!(start_run(&config, origin()).is_err());
        }
    }

    mod advance {
        use super::*;

        #[test]
        fn one_tick_stages_complete_on_fifth_call() {
            let mut handle = start_run(&four_stages(1, None), origin()).unwrap();

            match handle.advance() {
                Advance::Stage(StageEvent::Started { stage, .. }) => assert_eq!(stage, "checkout"),
                other => panic!("unexpected {other:?}"),
            }
            for (finished, started) in [("checkout", "build"), ("build", "test"), ("test", "deploy")]
            {
                match handle.advance() {
                    Advance::Stage(StageEvent::Transitioned {
                        finished: f,
                        status,
                        started: s,
                        ..
                    }) => {
                        assert_eq!(f, finished);
                        assert_eq!(s, started);
                        assert_eq!(status, StageStatus::Succeeded);
                    }
                    other => panic!("unexpected {other:?}"),
                }
            }
            match handle.advance() {
                Advance::Complete(done) => {
                    assert_eq!(done.status, RunStatus::Succeeded);
                    assert_eq!(done.last_stage, "deploy");
                }
                other => panic!("unexpected {other:?}"),
            }

            assert_eq!(handle.run().status, RunStatus::Succeeded);
            assert!(handle.run().violations().is_empty());
        }

        #[test]
        fn failing_build_stops_the_run() {
            let mut handle = start_run(&four_stages(1, Some("build")), origin()).unwrap();
            let events = drive(&mut handle);

            assert_eq!(events.len(), 3, "start, checkout->build, build fails");
            match events.last() {
                Some(Advance::Complete(done)) => {
                    assert_eq!(done.status, RunStatus::Failed);
                    assert_eq!(done.last_stage, "build");
                    assert_eq!(done.closing.severity, Severity::Error);
                }
                other => panic!("unexpected {other:?}"),
            }

            let run = handle.run();
            assert_eq!(
                statuses(run),
                [
                    StageStatus::Succeeded,
                    StageStatus::Failed,
                    StageStatus::Pending,
                    StageStatus::Pending
                ]
            );
            assert!(run.stage("test").unwrap().logs().is_empty());
            assert!(run.stage("deploy").unwrap().started_at.is_none());
            assert!(run.violations().is_empty(), "{:?}", run.violations());
        }

        #[test]
        fn failure_applies_in_random_mode_too() {
            let mut config = four_stages(1, Some("build"));
            config.mode = SimulationMode::Random;
            let mut handle = start_run(&config, origin()).unwrap();
            let done = handle.run_to_completion();
            assert_eq!(done.status, RunStatus::Failed);
            assert_eq!(handle.run().stage("deploy").unwrap().status, StageStatus::Pending);
        }

        #[test]
        fn longer_stages_emit_log_lines_between_transitions() {
            let mut handle = start_run(&four_stages(3, None), origin()).unwrap();
            let events = drive(&mut handle);

            // 1 start + per stage (2 log ticks + 1 transition/complete)
            assert_eq!(events.len(), 1 + 4 * 3);
            let logs = events
                .iter()
                .filter(|e| matches!(e, Advance::Stage(StageEvent::Log { .. })))
                .count();
            assert_eq!(logs, 8);

            // opening, two script lines, closing
            for stage in handle.run().stages() {
                assert_eq!(stage.logs().len(), 4, "stage {}", stage.name);
            }
        }

        #[test]
        fn zero_duration_behaves_as_one_tick() {
            let mut handle = start_run(&four_stages(0, None), origin()).unwrap();
            assert_eq!(drive(&mut handle).len(), 5);
        }

        #[test]
        fn calls_after_completion_repeat_the_result() {
            let mut handle = start_run(&four_stages(1, None), origin()).unwrap();
            let first = handle.run_to_completion();
            let snapshot = handle.run().clone();

            for _ in 0..3 {
                assert_eq!(handle.advance(), Advance::Complete(first.clone()));
            }
            assert_eq!(handle.run(), &snapshot);
        }

        #[test]
        fn timestamps_follow_the_tick_clock() {
            let mut handle = start_run(&four_stages(2, None), origin()).unwrap();
            handle.run_to_completion();
            let run = handle.run();

            assert_eq!(run.started_at, Some(origin()));
            // 4 stages x 2 ticks x 5 seconds
            assert_eq!(run.duration(), Some(Duration::seconds(40)));
            let checkout = run.stage("checkout").unwrap();
            assert_eq!(checkout.duration(), Some(Duration::seconds(10)));
            assert_eq!(
                run.stage("build").unwrap().started_at,
                checkout.ended_at,
                "next stage starts on the transition tick"
            );
        }

        #[test]
        fn completion_takes_one_tick_more_than_the_stages() {
            let mut handle = start_run(&four_stages(3, None), origin()).unwrap();
            assert!(!handle.is_complete());
            handle.run_to_completion();
            assert!(handle.is_complete());
            assert_eq!(handle.ticks(), 1 + 4 * 3);
        }

        #[test]
        fn longest_allowed_ticks_and_stages_keep_a_valid_clock() {
            let mut config = four_stages(crate::config::MAX_STAGE_TICKS, None);
            config.tick_seconds = crate::config::MAX_TICK_SECONDS;
            let mut handle = start_run(&config, origin()).unwrap();
            let done = handle.run_to_completion();

            assert_eq!(done.status, RunStatus::Succeeded);
            let expected = 4 * crate::config::MAX_STAGE_TICKS
                * i64::try_from(crate::config::MAX_TICK_SECONDS).unwrap();
            assert_eq!(handle.run().duration(), Some(Duration::seconds(expected)));
            assert!(handle.run().violations().is_empty());
        }

        #[test]
        fn clock_saturates_instead_of_overflowing() {
            let mut handle = start_run(&four_stages(1, None), origin()).unwrap();
            handle.tick_seconds = 10_000_000_000_000;
            let done = handle.run_to_completion();

            assert_eq!(done.status, RunStatus::Succeeded);
            assert_eq!(handle.run().started_at, Some(origin()));
            assert_eq!(handle.run().ended_at, Some(DateTime::<Utc>::MAX_UTC));
        }

        #[test]
        fn run_is_consistent_after_every_tick() {
            let mut config = PipelineConfig::default();
            config.mode = SimulationMode::Random;
            for seed in 0..20 {
                config.seed = seed;
                let mut handle = start_run(&config, origin()).unwrap();
                loop {
                    let step = handle.advance();
                    assert!(
                        handle.run().violations().is_empty(),
                        "seed {seed}: {:?}",
                        handle.run().violations()
                    );
                    if step.is_complete() {
                        break;
                    }
                }
            }
        }
    }

    mod determinism {
        use super::*;

        fn log_text(run: &PipelineRun) -> Vec<String> {
            run.log_lines().map(|(_, l)| l.to_string()).collect()
        }

        #[test]
        fn replay_runs_are_identical() {
            let config = PipelineConfig::default();
            let mut a = start_run(&config, origin()).unwrap();
            let mut b = start_run(&config, origin()).unwrap();
            assert_eq!(drive(&mut a), drive(&mut b));
            assert_eq!(log_text(a.run()), log_text(b.run()));
            assert_eq!(statuses(a.run()), statuses(b.run()));
        }

        #[test]
        fn replay_ignores_the_seed() {
            let mut config = PipelineConfig::default();
            let mut a = start_run(&config, origin()).unwrap();
            config.seed = 9_999;
            let mut b = start_run(&config, origin()).unwrap();
            a.run_to_completion();
            b.run_to_completion();
            assert_eq!(log_text(a.run()), log_text(b.run()));
        }

        #[test]
        fn replay_only_prints_info_until_a_failure() {
            let mut handle = start_run(&PipelineConfig::default(), origin()).unwrap();
            handle.run_to_completion();
            assert_eq!(handle.run().status, RunStatus::Succeeded);
            assert!(handle
                .run()
                .log_lines()
                .all(|(_, l)| l.severity == Severity::Info));
        }

        #[test]
        fn same_seed_same_random_run() {
            let mut config = PipelineConfig::default();
            config.mode = SimulationMode::Random;
            config.seed = 1234;
            let mut a = start_run(&config, origin()).unwrap();
            let mut b = start_run(&config, origin()).unwrap();
            assert_eq!(drive(&mut a), drive(&mut b));
            assert_eq!(a.run(), b.run());
        }

        #[test]
        fn different_seeds_vary_durations() {
            let mut config = PipelineConfig::default();
            config.mode = SimulationMode::Random;
            for stage in &mut config.stages {
                stage.duration = TickRange { min: 1, max: 50 };
                stage.failure_probability = 0.0;
            }

            let durations: std::collections::HashSet<u64> = (0..10)
                .map(|seed| {
                    config.seed = seed;
                    let mut handle = start_run(&config, origin()).unwrap();
                    handle.run_to_completion();
                    handle.ticks()
                })
                .collect();
            assert!(durations.len() > 1, "all seeds produced {durations:?}");
        }
    }
}
