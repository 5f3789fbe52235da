//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Incident Timeline -- forensic timelines from JSON and free-text logs.
///
/// Use `incident-timeline <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "incident-timeline", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file.
    ///
    /// Without this flag, `incident-timeline.toml` in the working directory is used
    /// if present, otherwise defaults plus environment overrides.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a correlated timeline from a log file.
    Build(BuildArgs),

    /// Build a timeline and print an incident summary.
    Summarize(InputArgs),

    /// Normalize a log file and print the events only.
    Load(InputArgs),

    /// Manage detection rules.
    Rules(RulesArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- build ----

/// Build a timeline from a log file.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Log file (`.json` array or free text).
    pub path: PathBuf,

    /// Exit with code 4 when any rule fires.
    #[arg(long)]
    pub fail_on_findings: bool,
}

// ---- summarize / load ----

/// A single log file input.
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Log file (`.json` array or free text).
    pub path: PathBuf,
}

// ---- rules ----

/// Manage detection rules.
#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub action: RulesAction,
}

#[derive(Subcommand, Debug)]
pub enum RulesAction {
    /// List the effective rule set (built-ins + rules directory).
    List,
    /// Validate YAML rule files without building a rule set.
    Validate {
        /// Directory containing YAML rule files (default: `rules.rules_dir`).
        path: Option<PathBuf>,
    },
}

// ---- config ----

/// Manage configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, ingest, rules).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_build() {
        let cli = Cli::try_parse_from(["incident-timeline", "build", "auth.json"])
            .expect("should parse 'build' subcommand");
        match cli.command {
            Commands::Build(args) => {
                assert_eq!(args.path, PathBuf::from("auth.json"));
                assert!(!args.fail_on_findings, "fail_on_findings should default to false");
            }
            _ => panic!("expected Build command"),
        }
        assert!(cli.config.is_none());
        assert_eq!(cli.output, OutputFormat::Text);
    }

    #[test]
    fn test_cli_parse_build_fail_on_findings() {
        let cli = Cli::try_parse_from(["incident-timeline", "build", "a.log", "--fail-on-findings"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Build(args) => assert!(args.fail_on_findings),
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    fn test_cli_parse_build_requires_path() {
        let result = Cli::try_parse_from(["incident-timeline", "build"]);
        assert!(result.is_err(), "build without a path should fail");
    }

    #[test]
    fn test_cli_parse_summarize_and_load() {
        let cli = Cli::try_parse_from(["incident-timeline", "summarize", "x.log"])
            .expect("parse succeeded");
        assert!(matches!(cli.command, Commands::Summarize(_)));

        let cli =
            Cli::try_parse_from(["incident-timeline", "load", "x.json"]).expect("parse succeeded");
        match cli.command {
            Commands::Load(args) => assert_eq!(args.path, PathBuf::from("x.json")),
            _ => panic!("expected Load command"),
        }
    }

    #[test]
    fn test_cli_parse_rules_list() {
        let cli =
            Cli::try_parse_from(["incident-timeline", "rules", "list"]).expect("parse succeeded");
        match cli.command {
            Commands::Rules(rules_args) => {
                assert!(matches!(rules_args.action, RulesAction::List));
            }
            _ => panic!("expected Rules command"),
        }
    }

    #[test]
    fn test_cli_parse_rules_validate() {
        let cli = Cli::try_parse_from(["incident-timeline", "rules", "validate"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Rules(rules_args) => match rules_args.action {
                RulesAction::Validate { path } => assert!(path.is_none()),
                _ => panic!("expected Validate action"),
            },
            _ => panic!("expected Rules command"),
        }

        let cli = Cli::try_parse_from(["incident-timeline", "rules", "validate", "/tmp/rules"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Rules(rules_args) => match rules_args.action {
                RulesAction::Validate { path } => {
                    assert_eq!(path, Some(PathBuf::from("/tmp/rules")));
                }
                _ => panic!("expected Validate action"),
            },
            _ => panic!("expected Rules command"),
        }
    }

    #[test]
    fn test_cli_parse_config_show_section() {
        let cli = Cli::try_parse_from(["incident-timeline", "config", "show", "--section", "ingest"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Config(config_args) => match config_args.action {
                ConfigAction::Show { section } => assert_eq!(section, Some("ingest".to_owned())),
                _ => panic!("expected Show action"),
            },
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "incident-timeline",
            "build",
            "a.json",
            "--output",
            "json",
            "--log-level",
            "debug",
            "--config",
            "custom.toml",
        ])
        .expect("global flags should be accepted after the subcommand");
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
    }

    #[test]
    fn test_cli_invalid_output_format() {
        let result = Cli::try_parse_from(["incident-timeline", "--output", "xml", "rules", "list"]);
        assert!(result.is_err(), "unknown output format should be rejected");
    }

    #[test]
    fn test_cli_command_factory_is_consistent() {
        Cli::command().debug_assert();
    }
}
