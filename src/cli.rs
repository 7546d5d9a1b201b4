use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::settings::Settings;

#[derive(Parser, Debug, Default)]
#[command(
    name = "chatwatch",
    version,
    about = "Watch a chat window for marked questions and answer them with a completion service"
)]
pub struct Cli {
    /// Settings JSON file (default: $CHATWATCH_SETTINGS, else built-in defaults)
    #[arg(long)]
    pub settings: Option<PathBuf>,
    /// Override the chat window title prefix
    #[arg(long)]
    pub window_prefix: Option<String>,
    /// Override the poll interval in seconds
    #[arg(long)]
    pub poll_interval_secs: Option<u64>,
    /// Override the total run budget in seconds
    #[arg(long)]
    pub run_budget_secs: Option<u64>,
    /// Print visible window titles and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub list_windows: bool,
    /// Log at debug level (same as CHATWATCH_DEBUG=1)
    #[arg(long, action = ArgAction::SetTrue)]
    pub debug: bool,
}

impl Cli {
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(prefix) = &self.window_prefix {
            settings.window_title_prefix = prefix.clone();
        }
        if let Some(secs) = self.poll_interval_secs {
            settings.poll_interval_secs = secs;
        }
        if let Some(secs) = self.run_budget_secs {
            settings.run_budget_secs = secs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_only_given_values() {
        let cli = Cli::parse_from(["chatwatch", "--window-prefix", "Family", "--run-budget-secs", "60"]);
        let mut settings = Settings::default();
        cli.apply_overrides(&mut settings);

        assert_eq!(settings.window_title_prefix, "Family");
        assert_eq!(settings.run_budget_secs, 60);
        assert_eq!(settings.poll_interval_secs, 5);
        assert!(!cli.list_windows);
    }

    #[test]
    fn list_windows_flag_parses() {
        let cli = Cli::parse_from(["chatwatch", "--list-windows", "--debug"]);
        assert!(cli.list_windows);
        assert!(cli.debug);
    }
}
