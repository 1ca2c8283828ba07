use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright, bright_green, bright_yellow};

/// Progress tracking for multi-phase operations
pub struct PhaseProgress {
    pb: ProgressBar,
}

impl PhaseProgress {
    pub fn start_loading() -> Self {
        eprintln!("{}  {}", bright("⚙️"), bright("Phases").underlined());
        let pb = create_spinner(bright_yellow("Phase 1/3: Loading snapshot").to_string());
        Self { pb }
    }

    pub fn finish_loading_start_recording(self, jobs: usize) -> Self {
        self.pb
            .finish_with_message(bright_green("Phase 1/3: Loaded snapshot ✓").to_string());
        let pb = create_spinner(
            bright_yellow(format!("Phase 2/3: Recording {jobs} job records")).to_string(),
        );
        Self { pb }
    }

    pub fn finish_recording_start_reconciling(self) -> Self {
        self.pb
            .finish_with_message(bright_green("Phase 2/3: Recorded job records ✓").to_string());
        let pb = create_spinner(bright_yellow("Phase 3/3: Reconciling pipelines").to_string());
        Self { pb }
    }

    pub fn finish_reconciling(self) {
        self.pb.finish_with_message(
            bright_green("Phase 3/3: Pipelines reconciled successfully ✓").to_string(),
        );
        eprintln!();
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    // The template is a literal; fall back to the default style rather than fail.
    let style = ProgressStyle::default_spinner()
        .template("  {msg} {spinner}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
