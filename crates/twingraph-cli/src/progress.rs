//! Progress feedback utilities for CLI commands
//!
//! All progress output is suppressed when --quiet flag is set.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner with a message
pub fn spinner(message: &str, quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Finish a spinner with a success message
pub fn finish_spinner(pb: Option<ProgressBar>, message: &str) {
    finish_with(pb, "{prefix:.green} {msg}", "✓", message);
}

/// Finish a spinner with a warning message
pub fn finish_spinner_warn(pb: Option<ProgressBar>, message: &str) {
    finish_with(pb, "{prefix:.yellow} {msg}", "!", message);
}

/// Finish a spinner with a warning if `result` failed, then pass it through.
pub fn warn_on_err<T, E>(
    pb: &Option<ProgressBar>,
    message: &str,
    result: Result<T, E>,
) -> Result<T, E> {
    if result.is_err() {
        finish_spinner_warn(pb.clone(), message);
    }
    result
}

fn finish_with(pb: Option<ProgressBar>, template: &str, prefix: &'static str, message: &str) {
    if let Some(pb) = pb {
        if let Ok(style) = ProgressStyle::default_spinner().template(template) {
            pb.set_style(style);
        }
        pb.set_prefix(prefix);
        pb.finish_with_message(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_quiet_returns_none() {
        assert!(spinner("test", true).is_none());
    }

    #[test]
    fn test_spinner_not_quiet_returns_some() {
        let pb = spinner("test", false);
        assert!(pb.is_some());
        finish_spinner(pb, "done");
    }

    #[test]
    fn test_warn_on_err_stops_spinner() {
        let pb = spinner("loading", false);
        let result: Result<(), &str> = warn_on_err(&pb, "failed", Err("boom"));

        assert_eq!(result, Err("boom"));
        assert!(pb.is_some_and(|pb| pb.is_finished()));
    }

    #[test]
    fn test_warn_on_err_leaves_spinner_on_success() {
        let pb = spinner("loading", false);
        let result: Result<u8, &str> = warn_on_err(&pb, "failed", Ok(1));

        assert_eq!(result, Ok(1));
        assert!(pb.as_ref().is_some_and(|pb| !pb.is_finished()));
        finish_spinner(pb, "done");
    }

    #[test]
    fn test_finish_spinner_handles_none() {
        finish_spinner(None, "done");
        finish_spinner_warn(None, "warning");
    }
}
