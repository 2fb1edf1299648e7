//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use crate::logger::Verbosity;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// sitekit build pipeline CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Project root directory (contains config.json and src/)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Suppress all output except errors and warnings
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Show per-file and per-task detail
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// subcommands (default: serve)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build static assets and core bundles only (no templates, no server)
    Core,

    /// Sync pages.json with the template files on disk
    Pages,

    /// Run one full build and exit
    Build,

    /// Serve the output directory, rebuild and reload on change (default)
    Serve {
        /// Interface to bind on
        #[arg(short, long)]
        interface: Option<String>,

        /// Port to serve on (auto-increments when taken)
        #[arg(short, long)]
        port: Option<u16>,

        /// Disable the file watcher
        #[arg(long)]
        no_watch: bool,
    },
}

impl Cli {
    /// Resolve the effective subcommand; no subcommand means `serve`.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve {
            interface: None,
            port: None,
            no_watch: false,
        })
    }

    /// Map the quiet/verbose flags onto a verbosity level.
    pub const fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    pub fn is_serve(&self) -> bool {
        matches!(self.command(), Commands::Serve { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_serve() {
        let cli = Cli::parse_from(["sitekit"]);
        assert!(cli.is_serve());
    }

    #[test]
    fn test_build_command() {
        let cli = Cli::parse_from(["sitekit", "build"]);
        assert!(matches!(cli.command(), Commands::Build));
        assert!(!cli.is_serve());
    }

    #[test]
    fn test_serve_flags() {
        let cli = Cli::parse_from(["sitekit", "serve", "-p", "8080", "--no-watch"]);
        match cli.command() {
            Commands::Serve { port, no_watch, .. } => {
                assert_eq!(port, Some(8080));
                assert!(no_watch);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_verbosity_flags() {
        let cli = Cli::parse_from(["sitekit", "--quiet", "build"]);
        assert_eq!(cli.verbosity(), Verbosity::Quiet);

        let cli = Cli::parse_from(["sitekit", "--verbose", "build"]);
        assert_eq!(cli.verbosity(), Verbosity::Verbose);

        let cli = Cli::parse_from(["sitekit", "build"]);
        assert_eq!(cli.verbosity(), Verbosity::Normal);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["sitekit", "-q", "-v", "build"]).is_err());
    }
}
