//! ls command - List files and objects
//!
//! Entries are printed as they arrive. Unreadable entries (broken symlinks,
//! permission errors, entries that vanished mid-listing) are reported and
//! skipped; any other failure ends the listing of that target.

use clap::Args;
use jiff::tz::TimeZone;
use stow_core::listing::{self, Listed};
use stow_core::{Client, ClientFactory};

use super::Context;
use crate::backend::Backends;
use crate::exit_code::ExitCode;
use crate::output::{ContentMessage, Formatter};

/// List files and objects
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Targets to list (local path or alias/bucket/prefix)
    #[arg(default_value = ".")]
    pub targets: Vec<String>,

    /// List the whole subtree
    #[arg(short, long)]
    pub recursive: bool,
}

/// Separator appended to directory names for this client
fn dir_separator(client: &dyn Client) -> char {
    if client.url().scheme() == "file" {
        std::path::MAIN_SEPARATOR
    } else {
        '/'
    }
}

/// Execute the ls command
pub async fn execute(args: LsArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();
    let backends = match Backends::load(&ctx.config) {
        Ok(b) => b,
        Err(e) => {
            formatter.error(&format!("Failed to load aliases: {e}"));
            return ExitCode::from_error(&e);
        }
    };
    let tz = TimeZone::system();

    let mut code = ExitCode::Success;
    for target in &args.targets {
        let result = list_target(&backends, target, args.recursive, &tz, &formatter).await;
        if let Err(e) = result {
            formatter.error(&e.to_string());
            code = ExitCode::from_error(&e);
        }
    }
    code
}

async fn list_target(
    backends: &Backends,
    target: &str,
    recursive: bool,
    tz: &TimeZone,
    formatter: &Formatter,
) -> stow_core::Result<()> {
    let client = backends.open(target).await?;
    // A missing target is fatal; entries vanishing mid-listing are not.
    client
        .stat()
        .await
        .map_err(|e| e.with_target(client.url().to_string()))?;
    let separator = dir_separator(client.as_ref());

    listing::list(client.as_ref(), recursive, |listed| match listed {
        Listed::Entry(content) => {
            formatter.content(&ContentMessage::new(&content, separator, tz));
        }
        Listed::Skipped(err) => formatter.error(&format!("Failed with: {err}")),
    })
    .await
}
