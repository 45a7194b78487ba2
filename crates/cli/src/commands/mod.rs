//! Command-line definition and dispatch

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use stow_core::ConfigManager;
use stow_core::config::CONFIG_DIR_ENV;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

pub mod alias;
pub mod cat;
pub mod cp;
pub mod ls;
pub mod session;
pub mod sync;

/// stow - copy, sync and inspect files across local disks and S3-compatible storage
#[derive(Parser, Debug)]
#[command(name = "stow", version, about, propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags accepted by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Print JSON lines instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Configuration directory
    #[arg(long, global = true, env = CONFIG_DIR_ENV, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List files and objects
    Ls(ls::LsArgs),

    /// Print the contents of files and objects
    Cat(cat::CatArgs),

    /// Copy files and objects (resumable)
    Cp(cp::CpArgs),

    /// Copy a source to several targets (resumable)
    Sync(sync::SyncArgs),

    /// Manage interrupted cp/sync sessions
    #[command(subcommand)]
    Session(session::SessionCommands),

    /// Manage storage service aliases
    #[command(subcommand)]
    Alias(alias::AliasCommands),
}

/// Everything a command needs from the global flags
#[derive(Debug, Clone)]
pub struct Context {
    pub output: OutputConfig,
    pub config: ConfigManager,
}

impl Context {
    pub fn formatter(&self) -> Formatter {
        Formatter::new(self.output.clone())
    }
}

/// Run the parsed command line
pub async fn execute(cli: Cli) -> ExitCode {
    let output = OutputConfig {
        json: cli.global.json,
        no_color: cli.global.no_color,
        quiet: cli.global.quiet,
    };

    let config = match cli.global.config_dir {
        Some(dir) => ConfigManager::with_dir(dir),
        None => match ConfigManager::new() {
            Ok(config) => config,
            Err(e) => {
                Formatter::new(output).error(&e.to_string());
                return ExitCode::from_error(&e);
            }
        },
    };
    let ctx = Context { output, config };

    match cli.command {
        Commands::Ls(args) => ls::execute(args, &ctx).await,
        Commands::Cat(args) => cat::execute(args, &ctx).await,
        Commands::Cp(args) => cp::execute(args, &ctx).await,
        Commands::Sync(args) => sync::execute(args, &ctx).await,
        Commands::Session(cmd) => session::execute(cmd, &ctx).await,
        Commands::Alias(cmd) => alias::execute(cmd, &ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["stow", "ls", "--json", "-q", "/tmp"]).unwrap();
        assert!(cli.global.json);
        assert!(cli.global.quiet);
        assert!(matches!(cli.command, Commands::Ls(_)));
    }

    #[test]
    fn test_session_subcommands() {
        let cli = Cli::try_parse_from(["stow", "session", "resume", "AbCdEfGh"]).unwrap();
        match cli.command {
            Commands::Session(session::SessionCommands::Resume(args)) => {
                assert_eq!(args.id, "AbCdEfGh")
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from(["stow", "session", "clear", "all"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Session(session::SessionCommands::Clear(_))
        ));
    }

    #[test]
    fn test_cp_needs_source_and_target() {
        assert!(Cli::try_parse_from(["stow", "cp", "only-one"]).is_err());
        let cli = Cli::try_parse_from(["stow", "cp", "-r", "a", "b", "dst"]).unwrap();
        match cli.command {
            Commands::Cp(args) => {
                assert!(args.recursive);
                assert_eq!(args.paths, vec!["a", "b", "dst"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_config_dir_flag() {
        let cli =
            Cli::try_parse_from(["stow", "--config-dir", "/tmp/stow", "session", "list"]).unwrap();
        assert_eq!(cli.global.config_dir, Some(PathBuf::from("/tmp/stow")));
    }
}
