use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright, bright_green, bright_yellow};

/// Progress tracking for the three collection phases
pub struct PhaseProgress {
    pb: ProgressBar,
    visible: bool,
}

impl PhaseProgress {
    pub fn start_phase_1(visible: bool) -> Self {
        if visible {
            eprintln!("{}  {}", bright("⚙️"), bright("Phases").underlined());
        }
        let pb = create_spinner(
            bright_yellow("Phase 1/3: Fetching repositories").to_string(),
            visible,
        );
        Self { pb, visible }
    }

    pub fn finish_phase_1_start_phase_2(self, repositories: usize) -> Self {
        self.pb.finish_with_message(
            bright_green(format!("Phase 1/3: Fetched {repositories} repositories ✓")).to_string(),
        );
        let pb = create_bar(
            repositories as u64,
            bright_yellow("Phase 2/3: Collecting workflow runs").to_string(),
            self.visible,
        );
        Self {
            pb,
            visible: self.visible,
        }
    }

    /// One repository finished collecting.
    pub fn inc(&self) {
        self.pb.inc(1);
    }

    pub fn finish_phase_2_start_phase_3(self) -> Self {
        self.pb.finish_with_message(
            bright_green("Phase 2/3: Collected workflow runs ✓").to_string(),
        );
        let pb = create_spinner(
            bright_yellow("Phase 3/3: Saving usage data").to_string(),
            self.visible,
        );
        Self {
            pb,
            visible: self.visible,
        }
    }

    pub fn finish_phase_3(self) {
        self.pb
            .finish_with_message(bright_green("Phase 3/3: Usage data saved ✓").to_string());
        if self.visible {
            eprintln!();
        }
    }

    /// Stop early, leaving the current phase message in place.
    pub fn abandon(self, message: &str) {
        self.pb.abandon_with_message(message.to_string());
    }
}

fn draw_target(visible: bool) -> ProgressDrawTarget {
    if visible {
        ProgressDrawTarget::stderr()
    } else {
        ProgressDrawTarget::hidden()
    }
}

fn create_spinner(message: String, visible: bool) -> ProgressBar {
    let pb = ProgressBar::with_draw_target(None, draw_target(visible));
    if let Ok(style) = ProgressStyle::default_spinner().template("  {msg} {spinner}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    if visible {
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
    }
    pb
}

fn create_bar(len: u64, message: String, visible: bool) -> ProgressBar {
    let pb = ProgressBar::with_draw_target(Some(len), draw_target(visible));
    if let Ok(style) = ProgressStyle::default_bar().template("  {msg} [{bar:30}] {pos}/{len}") {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.set_message(message);
    pb
}
