//! Output formatting utilities for the CLI.

pub mod progress;
pub mod table;

use serde::Serialize;

pub use progress::{create_progress_bar, ProgressBarExt};
pub use table::TableFormatter;

/// A command result that renders for people or as JSON.
pub trait CommandOutput: Serialize {
    /// Plain text for the terminal.
    fn to_human(&self) -> String;
    /// Value printed in `--json` mode.
    fn to_json(&self) -> serde_json::Value;
}

/// Print `result` in the selected mode.
pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Truncate a string to at most `max_len` characters, appending "..." if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string_unchanged() {
        assert_eq!(truncate("payroll", 10), "payroll");
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("Termination Compliance Advisory", 14), "Termination...");
        assert_eq!(truncate("薪酬福利与税务筹划", 5), "薪酬...");
    }
}
