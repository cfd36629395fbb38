//! Output formatting and logging utilities
//!
//! Status lines go to stderr so stdout only carries replies and data.

use owo_colors::OwoColorize;
use std::env;
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

/// Output level for controlling what gets displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLevel {
    /// Show all output (normal mode)
    Normal,
    /// Show only errors (quiet mode)
    Quiet,
    /// Show extra debug information (verbose mode)
    Verbose,
}

impl OutputLevel {
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose {
            Self::Verbose
        } else {
            Self::Normal
        }
    }

    /// Check if user-facing messages should be shown (excludes errors/hints which always show)
    pub fn show_user(&self) -> bool {
        matches!(self, Self::Normal | Self::Verbose)
    }

    /// Log filter used when `RUST_LOG` is unset
    fn default_filter(&self) -> &'static str {
        match self {
            Self::Verbose => "debug",
            Self::Normal => "warn",
            Self::Quiet => "error",
        }
    }
}

/// Install the log subscriber; `RUST_LOG` wins over the output level
pub fn init_logging(output_level: OutputLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(output_level.default_filter()));

    // A subscriber installed by an embedding process is left alone
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Check if colored output should be disabled
pub fn colors_disabled() -> bool {
    env::var("NO_COLOR").is_ok()
        || env::var("TERM").is_ok_and(|t| t == "dumb")
        || !std::io::stderr().is_terminal()
}

fn print_colored<T>(msg: &str, styled_msg: T, output_level: OutputLevel, always_show: bool)
where
    T: std::fmt::Display,
{
    if always_show || output_level.show_user() {
        if !colors_disabled() {
            eprintln!("{styled_msg}");
        } else {
            eprintln!("{msg}");
        }
    }
}

/// Print a heading with bold formatting
pub fn heading(msg: &str, output_level: OutputLevel) {
    print_colored(msg, msg.bold(), output_level, false);
}

pub fn note(msg: &str, output_level: OutputLevel) {
    if output_level.show_user() {
        eprintln!("{msg}");
    }
}

pub fn success(msg: &str, output_level: OutputLevel) {
    print_colored(msg, msg.green(), output_level, false);
}

pub fn warning(msg: &str, output_level: OutputLevel) {
    if output_level.show_user() {
        if !colors_disabled() {
            eprintln!("{} {}", "Warning:".yellow().bold(), msg.yellow());
        } else {
            eprintln!("Warning: {msg}");
        }
    }
}

/// Print an error message with "Error:" prefix in red (always shown)
pub fn error(msg: &str) {
    if !colors_disabled() {
        eprintln!("{} {}", "Error:".red().bold(), msg.red());
    } else {
        eprintln!("Error: {msg}");
    }
}

/// Print a hint message with "Hint:" prefix in blue (always shown)
pub fn hint(msg: &str) {
    if !colors_disabled() {
        eprintln!("{} {}", "Hint:".blue().bold(), msg.blue());
    } else {
        eprintln!("Hint: {msg}");
    }
}

pub fn error_with_suggestion(msg: &str, suggestion: &str) {
    error(msg);
    hint(suggestion);
}

/// Format an agent name with colors
pub fn format_agent(name: &str) -> String {
    if colors_disabled() {
        name.to_string()
    } else {
        name.magenta().bold().to_string()
    }
}

/// Format an identifier (agent, chat or file id) with colors
pub fn format_id(id: &str) -> String {
    if colors_disabled() {
        id.to_string()
    } else {
        id.cyan().to_string()
    }
}

/// Format a command or option with colors
pub fn format_command(cmd: &str) -> String {
    if colors_disabled() {
        format!("`{cmd}`")
    } else {
        format!("`{}`", cmd.yellow().bold())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_level_from_flags() {
        assert_eq!(OutputLevel::from_flags(false, false), OutputLevel::Normal);
        assert_eq!(OutputLevel::from_flags(false, true), OutputLevel::Verbose);
        // quiet wins when both are given
        assert_eq!(OutputLevel::from_flags(true, true), OutputLevel::Quiet);
        assert!(!OutputLevel::Quiet.show_user());
    }

    #[test]
    fn test_default_filter_follows_level() {
        assert_eq!(OutputLevel::Verbose.default_filter(), "debug");
        assert_eq!(OutputLevel::Normal.default_filter(), "warn");
        assert_eq!(OutputLevel::Quiet.default_filter(), "error");
    }
}
