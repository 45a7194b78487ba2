//! cat command - Print the contents of files and objects
//!
//! Sources are streamed to stdout one after another. A reader that closes
//! the pipe early (`stow cat big.log | head`) ends the command successfully.

use clap::Args;
use stow_core::ClientFactory;

use super::Context;
use crate::backend::Backends;
use crate::exit_code::ExitCode;

/// Print the contents of files and objects
#[derive(Args, Debug)]
pub struct CatArgs {
    /// Sources to print (local path or alias/bucket/key)
    #[arg(required = true)]
    pub sources: Vec<String>,
}

/// Execute the cat command
pub async fn execute(args: CatArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();
    let backends = match Backends::load(&ctx.config) {
        Ok(b) => b,
        Err(e) => {
            formatter.error(&format!("Failed to load aliases: {e}"));
            return ExitCode::from_error(&e);
        }
    };

    let mut stdout = tokio::io::stdout();
    for source in &args.sources {
        let client = match backends.open(source).await {
            Ok(c) => c,
            Err(e) => {
                formatter.error(&e.to_string());
                return ExitCode::from_error(&e);
            }
        };

        match stow_core::cat::cat(client.as_ref(), &mut stdout).await {
            Ok(written) => tracing::debug!(source = %source, written, "Printed"),
            Err(e) if e.is_broken_pipe() => return ExitCode::Success,
            Err(e) => {
                formatter.error(&e.to_string());
                return ExitCode::from_error(&e);
            }
        }
    }
    ExitCode::Success
}
