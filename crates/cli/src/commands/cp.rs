//! cp command - Copy files and objects
//!
//! The copy runs as a session: an interrupted or partly failed copy can be
//! continued with `stow session resume <id>`.

use clap::Args;
use stow_core::CommandType;
use stow_core::transfer;

use super::Context;
use super::session;
use crate::backend::Backends;
use crate::exit_code::ExitCode;

/// Copy files and objects
#[derive(Args, Debug)]
pub struct CpArgs {
    /// Copy directories and prefixes recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Sources followed by the target
    #[arg(required = true, num_args = 2.., value_name = "SOURCE... TARGET")]
    pub paths: Vec<String>,
}

impl CpArgs {
    /// Sources and the target
    fn split(&self) -> Option<(&[String], &String)> {
        match self.paths.split_last() {
            Some((target, sources)) if !sources.is_empty() => Some((sources, target)),
            _ => None,
        }
    }
}

/// Execute the cp command
pub async fn execute(args: CpArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();
    let backends = match Backends::load(&ctx.config) {
        Ok(b) => b,
        Err(e) => {
            formatter.error(&format!("Failed to load aliases: {e}"));
            return ExitCode::from_error(&e);
        }
    };

    let Some((sources, target)) = args.split() else {
        formatter.error("cp needs at least one source and a target");
        return ExitCode::UsageError;
    };
    let targets = std::slice::from_ref(target);
    let planned = transfer::plan(
        &backends,
        CommandType::Copy,
        sources,
        targets,
        args.recursive,
        |err| formatter.error(&format!("Failed with: {err}")),
    )
    .await;

    let items = match planned {
        Ok(items) => items,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };
    if items.is_empty() {
        formatter.info("Nothing to copy.");
        return ExitCode::Success;
    }

    session::run_new(ctx, CommandType::Copy, args.paths, items, backends).await
}
