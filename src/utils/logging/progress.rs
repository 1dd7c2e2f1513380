//! Progress reporting for pipeline runs
//!
//! Stage progress is shown with indicatif. Bars are hidden when the
//! pipeline runs without a terminal (tests, batch jobs), so callers never
//! need to special-case them.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Template of the stage progress bar
pub const STAGE_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}";

/// Template of the spinner used for single long operations
pub const SPINNER_TEMPLATE: &str = "{spinner:.green} {elapsed_precise} {msg}";

fn style(template: &str, fallback: ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or(fallback)
}

/// Create a progress bar that counts completed pipeline stages
///
/// # Arguments
/// * `stages` - Number of stages in the run
/// * `visible` - Draw to stderr; otherwise the bar is hidden
#[must_use]
pub fn create_stage_bar(stages: u64, visible: bool) -> ProgressBar {
    let pb = ProgressBar::new(stages);
    if visible {
        pb.set_style(
            style(STAGE_TEMPLATE, ProgressStyle::default_bar()).progress_chars("#>-"),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
    } else {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    pb
}

/// Create a spinner for operations without a known length
#[must_use]
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(style(SPINNER_TEMPLATE, ProgressStyle::default_spinner()));
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Finish a progress bar with an optional completion message
pub fn finish_progress_bar(pb: &ProgressBar, message: Option<&str>) {
    if let Some(msg) = message {
        pb.finish_with_message(msg.to_string());
    } else {
        pb.finish();
    }
}
