// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `launchdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "launchdag",
    version,
    about = "Run a startup task plan through the dependency-aware launcher.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the plan file (TOML).
    ///
    /// Default: `Launch.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Launch.toml")]
    pub plan: String,

    /// Validate the plan and print the dispatch order without running it.
    #[arg(long)]
    pub dry_run: bool,

    /// Run as a secondary process: primary-only tasks are skipped.
    #[arg(long)]
    pub secondary: bool,

    /// Override `dispatch.wait_timeout_ms`.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Situation label recorded by the statistics collector once the run
    /// finishes.
    #[arg(long, value_name = "LABEL")]
    pub situation: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `LAUNCHDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_launch_toml() {
        let args = CliArgs::parse_from(["launchdag"]);
        assert_eq!(args.plan, "Launch.toml");
        assert!(!args.dry_run);
        assert!(!args.secondary);
        assert!(args.timeout_ms.is_none());
    }

    #[test]
    fn parses_overrides() {
        let args = CliArgs::parse_from([
            "launchdag",
            "--plan",
            "demo.toml",
            "--secondary",
            "--timeout-ms",
            "250",
            "--situation",
            "first-frame",
            "--log-level",
            "debug",
        ]);
        assert_eq!(args.plan, "demo.toml");
        assert!(args.secondary);
        assert_eq!(args.timeout_ms, Some(250));
        assert_eq!(args.situation.as_deref(), Some("first-frame"));
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    }
}
