//! sync command - Copy one source to several targets
//!
//! A directory source is mirrored into every target. Like `cp`, the work is
//! tracked in a resumable session.

use clap::Args;
use stow_core::CommandType;
use stow_core::transfer;

use super::Context;
use super::session;
use crate::backend::Backends;
use crate::exit_code::ExitCode;

/// Copy one source to several targets
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Source file, directory or prefix
    pub source: String,

    /// Targets to copy into
    #[arg(required = true)]
    pub targets: Vec<String>,
}

/// Execute the sync command
pub async fn execute(args: SyncArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();
    let backends = match Backends::load(&ctx.config) {
        Ok(b) => b,
        Err(e) => {
            formatter.error(&format!("Failed to load aliases: {e}"));
            return ExitCode::from_error(&e);
        }
    };

    let planned = transfer::plan(
        &backends,
        CommandType::Sync,
        std::slice::from_ref(&args.source),
        &args.targets,
        true,
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
        formatter.info("Nothing to sync.");
        return ExitCode::Success;
    }

    let mut urls = Vec::with_capacity(args.targets.len() + 1);
    urls.push(args.source);
    urls.extend(args.targets);
    session::run_new(ctx, CommandType::Sync, urls, items, backends).await
}
