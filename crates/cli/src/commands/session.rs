//! session command - List, resume and clear interrupted transfers
//!
//! `cp` and `sync` also run through [`run_new`], so every transfer is a
//! session that survives Ctrl-C.

use std::sync::Arc;

use clap::{Args, Subcommand};
use jiff::tz::TimeZone;
use stow_core::transfer::ClientTransfer;
use stow_core::{
    ClearTarget, CommandType, Executors, SessionController, SessionId, SessionOutcome,
    SessionSettings, SessionStore, TransferItem,
};
use tokio_util::sync::CancellationToken;

use super::Context;
use crate::backend::Backends;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, SessionMessage, TransferReporter};

/// Session subcommands
#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// List interrupted sessions
    List,

    /// Resume an interrupted session
    Resume(ResumeArgs),

    /// Remove one session, or all of them
    Clear(ClearArgs),
}

#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Session id, as shown by `stow session list`
    pub id: String,
}

#[derive(Args, Debug)]
pub struct ClearArgs {
    /// Session id, or `all`
    pub target: String,
}

/// Execute a session subcommand
pub async fn execute(cmd: SessionCommands, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();
    let controller = match controller(ctx) {
        Ok(c) => c,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    match cmd {
        SessionCommands::List => execute_list(&controller, &formatter),
        SessionCommands::Resume(args) => execute_resume(args, &controller, ctx).await,
        SessionCommands::Clear(args) => execute_clear(args, &controller, &formatter),
    }
}

fn controller(ctx: &Context) -> stow_core::Result<SessionController<SessionStore>> {
    let config = ctx.config.load_or_default()?;
    let settings = SessionSettings {
        quiet: ctx.output.quiet,
        cleanup: config.session.cleanup,
    };
    let store = SessionStore::new(ctx.config.session_dir(&config));
    Ok(SessionController::new(store, settings))
}

fn execute_list(controller: &SessionController<SessionStore>, formatter: &Formatter) -> ExitCode {
    let mut sessions = match controller.list() {
        Ok(s) => s,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };
    sessions.sort_by(|a, b| a.started.cmp(&b.started));

    if sessions.is_empty() && !formatter.is_json() {
        formatter.println("No sessions found.");
        return ExitCode::Success;
    }

    let tz = TimeZone::system();
    for record in &sessions {
        let message = SessionMessage::from(record);
        if formatter.is_json() {
            formatter.json_line(&message);
        } else {
            formatter.println(&message.line(&tz));
        }
    }
    ExitCode::Success
}

async fn execute_resume(
    args: ResumeArgs,
    controller: &SessionController<SessionStore>,
    ctx: &Context,
) -> ExitCode {
    let formatter = ctx.formatter();
    let id: SessionId = match args.id.parse() {
        Ok(id) => id,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };
    let executors = match executors(ctx) {
        Ok(e) => e,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    let cancel = cancel_on_ctrl_c();
    let mut reporter = TransferReporter::new(formatter.clone());
    let result = controller
        .resume(&id, &executors, &mut reporter, cancel.clone())
        .await;
    finish(result, &reporter, &cancel, &formatter)
}

fn execute_clear(
    args: ClearArgs,
    controller: &SessionController<SessionStore>,
    formatter: &Formatter,
) -> ExitCode {
    let target: ClearTarget = match args.target.parse() {
        Ok(t) => t,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    match controller.clear(&target) {
        Ok(count) => {
            let message = match &target {
                ClearTarget::All => format!("Cleared {count} session(s)."),
                ClearTarget::One(id) => format!("Session ‘{id}’ cleared successfully."),
            };
            formatter.success(&message);
            ExitCode::Success
        }
        Err(e) => {
            formatter.error(&e.to_string());
            ExitCode::from_error(&e)
        }
    }
}

/// Create a session for `items` and run it to completion or interruption
pub async fn run_new(
    ctx: &Context,
    command_type: CommandType,
    urls: Vec<String>,
    items: Vec<TransferItem>,
    backends: Backends,
) -> ExitCode {
    let formatter = ctx.formatter();
    let controller = match controller(ctx) {
        Ok(c) => c,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    let executors = Executors::uniform(Arc::new(ClientTransfer::new(Arc::new(backends))));
    let cancel = cancel_on_ctrl_c();
    let mut reporter = TransferReporter::new(formatter.clone());
    let result = controller
        .start(
            command_type,
            urls,
            items,
            &executors,
            &mut reporter,
            cancel.clone(),
        )
        .await;
    finish(result, &reporter, &cancel, &formatter)
}

fn executors(ctx: &Context) -> stow_core::Result<Executors> {
    let backends = Backends::load(&ctx.config)?;
    Ok(Executors::uniform(Arc::new(ClientTransfer::new(Arc::new(
        backends,
    )))))
}

/// Map a finished run to an exit code
///
/// A run stopped by Ctrl-C has been checkpointed and exits cleanly; a run
/// that left items pending because they failed exits with an error.
fn finish(
    result: stow_core::Result<SessionOutcome>,
    reporter: &TransferReporter,
    cancel: &CancellationToken,
    formatter: &Formatter,
) -> ExitCode {
    match result {
        Ok(SessionOutcome::Completed { .. }) => ExitCode::Success,
        Ok(SessionOutcome::Interrupted { .. }) if cancel.is_cancelled() => ExitCode::Success,
        Ok(SessionOutcome::Interrupted { pending }) => {
            tracing::debug!(pending, failures = reporter.failures(), "Session left work pending");
            ExitCode::GeneralError
        }
        Err(e) => {
            formatter.error(&e.to_string());
            ExitCode::from_error(&e)
        }
    }
}

/// A token cancelled on the first Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let watcher = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    tracing::debug!("Interrupt received, checkpointing session");
                    watcher.cancel();
                }
            }
            _ = watcher.cancelled() => {}
        }
    });
    token
}
