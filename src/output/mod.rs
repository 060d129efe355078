mod exports;
mod progress;
mod styling;
mod summary;
mod tables;

use crate::simulator::{Advance, StageEvent};

pub use exports::{export, CsvExport};
pub use progress::FetchProgress;
pub use styling::bright_yellow;
pub use summary::{render_cluster, render_dashboard, render_history, render_run};

use styling::{bright, bright_green, bright_red, dim, magenta_bold, severity};

/// Prints the `pipeviz` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("📈 pipeviz"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("CI/CD pipeline and cluster visualizer")
    );
}

/// Prints the lines produced by one simulator tick as they arrive.
pub fn print_advance(advance: &Advance) {
    match advance {
        Advance::Stage(event) => {
            if let StageEvent::Transitioned {
                finished,
                status,
                started,
                ..
            } = event
            {
                let status = match status {
                    crate::model::StageStatus::Failed => bright_red(status),
                    _ => bright_green(status),
                };
                println!("{}", dim(format!("── {finished} {status}, starting {started} ──")));
            } else if let StageEvent::Started { stage, .. } = event {
                println!("{}", bright(format!("── starting {stage} ──")));
            }
            for (_, line) in event.lines() {
                println!("{}", severity(line.severity, line));
            }
        }
        Advance::Complete(done) => {
            println!("{}", severity(done.closing.severity, &done.closing));
            let status = match done.status {
                crate::model::RunStatus::Succeeded => bright_green(done.status),
                _ => bright_red(done.status),
            };
            println!("{}\n", bright(format!("── run {} {status} ──", done.run_id)));
        }
    }
}
