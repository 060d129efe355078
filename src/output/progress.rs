use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright_green, bright_red, bright_yellow};

/// Spinner shown while live runs are fetched.
pub struct FetchProgress {
    pb: ProgressBar,
}

impl FetchProgress {
    pub fn start(repo: &str) -> Self {
        let pb = create_spinner(bright_yellow(format!("Fetching workflow runs for {repo}")).to_string());
        Self { pb }
    }

    pub fn finish(self, count: usize) {
        self.pb
            .finish_with_message(bright_green(format!("Fetched {count} workflow runs ✓")).to_string());
    }

    pub fn fail(self, reason: impl std::fmt::Display) {
        self.pb
            .finish_with_message(bright_red(format!("Live data unavailable: {reason}")).to_string());
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::default_spinner().template("  {msg} {spinner}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
