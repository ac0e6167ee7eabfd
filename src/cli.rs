//! Command-line interface for actimate and commit-at
//!
//! Provides argument parsing using clap derive macros.

use crate::config::Config;
use crate::git::CommitRequest;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Human activity recognition from smartphone inertial sensors
#[derive(Parser, Debug)]
#[command(
    name = "actimate",
    version,
    about = "Train and export activity classifiers from smartphone sensor recordings"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (default: ./actimate.toml if present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Dataset root containing one directory per activity
    #[arg(long, global = true, value_name = "DIR")]
    pub dataset: Option<PathBuf>,

    /// Directory that receives every artifact
    #[arg(long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Only report warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Apply `--dataset` and `--output-dir` on top of file and env values.
    pub fn apply_overrides(&self, mut config: Config) -> Config {
        if let Some(dataset) = &self.dataset {
            config.dataset.root = dataset.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output.dir = dir.clone();
        }
        config
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the bidirectional LSTM on normalized windows
    #[cfg(feature = "sequence")]
    TrainSequence,

    /// Train random forest, AdaBoost and gradient boosting on summary features
    TrainClassical,

    /// Re-export trained models from the output directory
    Export {
        #[command(subcommand)]
        target: ExportTarget,
    },

    /// Load the dataset, write the load manifest and print per-activity counts
    Scan,

    /// View or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Export targets
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportTarget {
    /// Portable document for the recurrent network
    #[cfg(feature = "sequence")]
    Sequence,
    /// Portable documents for the three tree ensembles
    Classical,
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Write the default configuration to a file
    Init {
        /// Destination (default: ./actimate.toml)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Commit staged work with a backdated author and committer date
#[derive(Parser, Debug)]
#[command(name = "commit-at", version)]
pub struct CommitAtCli {
    /// Commit message
    #[arg(short, long)]
    pub message: String,

    /// Commit timestamp, "YYYY-MM-DD HH:MM:SS"
    #[arg(short, long, value_name = "DATETIME")]
    pub date: String,

    /// Set git user.name before committing
    #[arg(long, value_name = "NAME")]
    pub author_name: Option<String>,

    /// Set git user.email before committing
    #[arg(long, value_name = "EMAIL")]
    pub author_email: Option<String>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Default filter for the given `-q` / `-v` combination.
pub fn log_level(quiet: bool, verbose: u8) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    }
}

/// Install the fmt subscriber. `RUST_LOG` wins over the flags.
pub fn init_logging(quiet: bool, verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("actimate={}", log_level(quiet, verbose))));
    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose > 1)
        .with_writer(std::io::stderr)
        .try_init();
    if let Err(e) = result {
        eprintln!("Failed to initialise logging: {}", e);
    }
}

impl From<CommitAtCli> for CommitRequest {
    fn from(cli: CommitAtCli) -> Self {
        CommitRequest {
            message: cli.message,
            date: cli.date,
            author_name: cli.author_name,
            author_email: cli.author_email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scan() {
        let cli = Cli::try_parse_from(["actimate", "scan"]).unwrap();
        assert!(matches!(cli.command, Commands::Scan));
        assert!(cli.config.is_none());
        assert!(cli.dataset.is_none());
        assert!(cli.output_dir.is_none());
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["actimate"]).is_err());
    }

    #[test]
    fn test_parse_verbose_double() {
        let cli = Cli::try_parse_from(["actimate", "-vv", "scan"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_verbose_repeated_flags() {
        let cli = Cli::try_parse_from(["actimate", "scan", "-v", "-v"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_global_paths_after_subcommand() {
        let cli = Cli::try_parse_from([
            "actimate",
            "train-classical",
            "--dataset",
            "/data/har",
            "--output-dir",
            "/tmp/out",
            "--config",
            "/etc/actimate.toml",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::TrainClassical));
        assert_eq!(cli.dataset, Some(PathBuf::from("/data/har")));
        assert_eq!(cli.output_dir, Some(PathBuf::from("/tmp/out")));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/actimate.toml")));
    }

    #[test]
    fn test_parse_quiet_short_flag() {
        let cli = Cli::try_parse_from(["actimate", "-q", "scan"]).unwrap();
        assert!(cli.quiet);
    }

    #[cfg(feature = "sequence")]
    #[test]
    fn test_parse_train_sequence() {
        let cli = Cli::try_parse_from(["actimate", "train-sequence"]).unwrap();
        assert!(matches!(cli.command, Commands::TrainSequence));
    }

    #[test]
    fn test_parse_export_classical() {
        let cli = Cli::try_parse_from(["actimate", "export", "classical"]).unwrap();
        match cli.command {
            Commands::Export { target } => assert_eq!(target, ExportTarget::Classical),
            other => panic!("Expected Export command, got {:?}", other),
        }
    }

    #[test]
    fn test_export_requires_target() {
        assert!(Cli::try_parse_from(["actimate", "export"]).is_err());
    }

    #[test]
    fn test_parse_config_init_with_force() {
        let cli =
            Cli::try_parse_from(["actimate", "config", "init", "custom.toml", "--force"]).unwrap();
        match cli.command {
            Commands::Config {
                action: ConfigAction::Init { path, force },
            } => {
                assert_eq!(path, Some(PathBuf::from("custom.toml")));
                assert!(force);
            }
            other => panic!("Expected Config Init, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_completions() {
        let cli = Cli::try_parse_from(["actimate", "completions", "bash"]).unwrap();
        match cli.command {
            Commands::Completions { shell } => assert_eq!(shell, Shell::Bash),
            other => panic!("Expected Completions command, got {:?}", other),
        }
    }

    #[test]
    fn test_overrides_replace_config_paths() {
        let cli = Cli::try_parse_from(["actimate", "scan", "--dataset", "elsewhere"]).unwrap();
        let config = cli.apply_overrides(Config::default());
        assert_eq!(config.dataset.root, PathBuf::from("elsewhere"));
        assert_eq!(config.output.dir, Config::default().output.dir);
    }

    #[test]
    fn test_log_level_follows_flags() {
        assert_eq!(log_level(false, 0), "info");
        assert_eq!(log_level(false, 1), "debug");
        assert_eq!(log_level(false, 3), "trace");
        assert_eq!(log_level(true, 2), "warn");
    }

    #[test]
    fn test_commit_at_requires_message_and_date() {
        assert!(CommitAtCli::try_parse_from(["commit-at", "-m", "msg"]).is_err());
        assert!(CommitAtCli::try_parse_from(["commit-at", "-d", "2024-03-15 14:30:00"]).is_err());
    }

    #[test]
    fn test_commit_at_into_request() {
        let cli = CommitAtCli::try_parse_from([
            "commit-at",
            "-m",
            "Add samples",
            "--date",
            "2024-03-15 14:30:00",
            "--author-email",
            "ada@example.com",
        ])
        .unwrap();
        let request = CommitRequest::from(cli);
        assert_eq!(request.message, "Add samples");
        assert_eq!(request.date, "2024-03-15 14:30:00");
        assert!(request.author_name.is_none());
        assert_eq!(request.author_email.as_deref(), Some("ada@example.com"));
    }
}
