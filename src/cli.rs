//! CLI argument parsing for calltrace

use crate::config::ColorMode;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for decoded traces
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "calltrace")]
#[command(version)]
#[command(about = "Binary call-trace decoder and inspection tools", long_about = None)]
pub struct Cli {
    /// Enable debug logging on stderr
    #[arg(long, global = true)]
    pub debug: bool,

    /// Configuration file (defaults to $CALLTRACE_CONFIG)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decode a trace and print one call per line
    Dump {
        /// Trace file to decode
        trace: PathBuf,

        /// Colorize output (overrides the configured default)
        #[arg(long, value_enum, value_name = "WHEN")]
        color: Option<ColorMode>,

        /// Output format (text or json)
        #[arg(long = "format", value_enum, default_value = "text")]
        format: OutputFormat,

        /// Calls to show (e.g., -e call=glClear,/^glDraw/)
        #[arg(short = 'e', long = "filter", value_name = "EXPR")]
        filter: Option<String>,

        /// Append a SHA-256 content fingerprint to each call
        #[arg(long)]
        fingerprint: bool,

        /// Leave pointer addresses out of fingerprints
        #[arg(long, requires = "fingerprint")]
        ignore_pointers: bool,
    },

    /// Compare two JSON state dumps with jsondiff.py
    DiffState {
        state1: PathBuf,
        state2: PathBuf,

        /// Explicit path to the comparison script
        #[arg(long, value_name = "PATH")]
        script: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_dump_defaults() {
        let cli = Cli::parse_from(["calltrace", "dump", "app.trace"]);
        match cli.command {
            Commands::Dump {
                trace,
                color,
                format,
                filter,
                fingerprint,
                ignore_pointers,
            } => {
                assert_eq!(trace, PathBuf::from("app.trace"));
                assert!(color.is_none());
                assert_eq!(format, OutputFormat::Text);
                assert!(filter.is_none());
                assert!(!fingerprint);
                assert!(!ignore_pointers);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(!cli.debug);
    }

    #[test]
    fn test_cli_dump_options() {
        let cli = Cli::parse_from([
            "calltrace",
            "--debug",
            "dump",
            "--color",
            "never",
            "--format",
            "json",
            "-e",
            "call=glClear",
            "--fingerprint",
            "app.trace",
        ]);
        assert!(cli.debug);
        match cli.command {
            Commands::Dump {
                color,
                format,
                filter,
                fingerprint,
                ..
            } => {
                assert_eq!(color, Some(ColorMode::Never));
                assert_eq!(format, OutputFormat::Json);
                assert_eq!(filter.as_deref(), Some("call=glClear"));
                assert!(fingerprint);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_ignore_pointers_requires_fingerprint() {
        assert!(Cli::try_parse_from(["calltrace", "dump", "--ignore-pointers", "t"]).is_err());

        let cli = Cli::parse_from(["calltrace", "dump", "--fingerprint", "--ignore-pointers", "t"]);
        match cli.command {
            Commands::Dump {
                fingerprint,
                ignore_pointers,
                ..
            } => assert!(fingerprint && ignore_pointers),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_diff_state() {
        let cli = Cli::parse_from(["calltrace", "diff-state", "a.json", "b.json"]);
        match cli.command {
            Commands::DiffState {
                state1,
                state2,
                script,
            } => {
                assert_eq!(state1, PathBuf::from("a.json"));
                assert_eq!(state2, PathBuf::from("b.json"));
                assert!(script.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_diff_state_requires_two_files() {
        assert!(Cli::try_parse_from(["calltrace", "diff-state", "a.json"]).is_err());
        assert!(Cli::try_parse_from(["calltrace", "diff-state", "a", "b", "c"]).is_err());
    }

    #[test]
    fn test_cli_global_config_after_subcommand() {
        let cli = Cli::parse_from(["calltrace", "dump", "t", "--config", "ct.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("ct.toml")));
    }
}
