use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::config::{PipelineConfig, SimulationMode};
use crate::error::Result;
use crate::model::PipelineRun;

use super::engine::start_run;

/// Simulates `count` finished runs, one hour apart, the last one at `until`.
///
/// Each run uses random mode with seed `config.seed + i`, so the history is
/// reproducible from the configured seed. Runs are returned oldest first.
///
/// # Errors
///
/// Returns `InvalidConfig` if the pipeline config is invalid.
pub fn simulate_history(
    config: &PipelineConfig,
    count: usize,
    until: DateTime<Utc>,
) -> Result<Vec<PipelineRun>> {
    config.validate()?;

    let mut runs = Vec::with_capacity(count);
    for i in 0..count {
        let seed = config.seed.wrapping_add(i as u64);
        let run_config = PipelineConfig {
            mode: SimulationMode::Random,
            seed,
            ..config.clone()
        };
        let origin = i64::try_from(count - 1 - i)
            .ok()
            .and_then(Duration::try_hours)
            .and_then(|back| until.checked_sub_signed(back))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut handle = start_run(&run_config, origin)?;
        handle.run_to_completion();

        let mut run = handle.into_run();
        run.name = format!("CI #{}", i + 1);
        debug!("Simulated history run {} ({})", run.name, run.status);
        runs.push(run);
    }

    Ok(runs)
}
