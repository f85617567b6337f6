//! Command handlers.
//!
//! [`execute`] runs one resolved command against the shared [`ShellContext`]
//! and returns the bytes to send plus an [`Effect`] telling the session what
//! to do next (stay, switch mode, close, stop the server).  Handlers do not
//! touch the session's mode themselves.
//!
//! Failures come back as [`CommandError`] and are rendered by
//! [`render_failure`] as a single `<NAME>: <error>` line.  A failed command
//! never changes the store.

use std::error::Error as StdError;
use std::fmt::Write as _;

use backdoros_core::{CommandKind, CommandTable, StoreError};
use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{info, warn};

use super::collaborators::CollaboratorError;
use super::control::StopReason;
use super::session::ShellContext;

/// ANSI "erase display" followed by "cursor home".
pub const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Prefix selecting the HTTP fetcher for `WRITE`.
const URL_PREFIX: &str = "http";

/// Source placeholder that switches `WRITE` into paste capture.
const PASTE_SOURCE: &str = "-";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Error type for command handlers.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("Invalid argument: {0} (expected true, false or status)")]
    InvalidDebugArgument(String),
}

/// What the session must do after a command succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Stay in `Normal` mode.
    Stay,
    /// Enter paste capture for the named file.
    EnterPaste(String),
    /// Enter the REPL with a fresh evaluator.
    EnterRepl,
    /// Close this connection.
    Close,
    /// Close this connection and stop admitting new ones.
    Stop(StopReason),
}

/// Successful command result.
#[derive(Debug)]
pub struct CommandOutput {
    pub output: Vec<u8>,
    pub effect: Effect,
}

impl CommandOutput {
    fn text(text: impl Into<String>) -> Self {
        Self {
            output: text.into().into_bytes(),
            effect: Effect::Stay,
        }
    }

    fn with_effect(mut self, effect: Effect) -> Self {
        self.effect = effect;
        self
    }
}

/// Runs `kind` with `args`.
///
/// `args` must already satisfy the command's minimum argument count, which
/// [`CommandTable::resolve`] guarantees.
///
/// # Errors
///
/// Returns [`CommandError`] when a file is missing, a collaborator fails or
/// an argument is invalid.
pub async fn execute(
    ctx: &ShellContext,
    kind: CommandKind,
    args: &[String],
) -> Result<CommandOutput, CommandError> {
    match kind {
        CommandKind::Write => write(ctx, &args[0], &args[1]).await,
        CommandKind::Read => read(ctx, &args[0]).await,
        CommandKind::Delete => delete(ctx, &args[0]),
        CommandKind::Dir => Ok(dir(ctx)),
        CommandKind::Help => Ok(help(ctx)),
        CommandKind::Quit => Ok(CommandOutput::text("Bye!\n").with_effect(Effect::Close)),
        CommandKind::Reboot => Ok(stop(ctx, StopReason::Reboot, "REBOOT: Rebooting the system\n")),
        CommandKind::Shutdown => Ok(stop(
            ctx,
            StopReason::Shutdown,
            "SHUTDOWN: Shutting down the system\n",
        )),
        CommandKind::Uptime => Ok(uptime(ctx)),
        CommandKind::Repl => Ok(CommandOutput::text(format!(
            "REPL: {} evaluator ready, type exit() to leave\n",
            ctx.evaluator
        ))
        .with_effect(Effect::EnterRepl)),
        CommandKind::Debug => debug(ctx, &args[0]),
        CommandKind::Cls => Ok(CommandOutput::text(CLEAR_SCREEN)),
    }
}

/// Formats a failed command as one line.
///
/// With `verbose` set (debug mode) every `source()` in the chain is appended,
/// e.g. `WRITE: Unable to fetch http://x: connection refused`.
pub fn render_failure(command: &str, err: &CommandError, verbose: bool) -> String {
    let mut line = format!("{command}: {err}");
    if verbose {
        let mut cause = err.source();
        while let Some(inner) = cause {
            let _ = write!(line, ": {inner}");
            cause = inner.source();
        }
    }
    line.push('\n');
    line
}

// ── File commands ─────────────────────────────────────────────────────────────

async fn write(
    ctx: &ShellContext,
    source: &str,
    name: &str,
) -> Result<CommandOutput, CommandError> {
    if source == PASTE_SOURCE {
        return Ok(CommandOutput::text("").with_effect(Effect::EnterPaste(name.to_string())));
    }

    // Fetch before touching the store so a failure leaves it unchanged.
    let bytes = if source.starts_with(URL_PREFIX) {
        ctx.collaborators.fetcher.fetch(source).await?
    } else {
        ctx.collaborators.reader.read_file(source).await?
    };

    let size = ctx.store.write(name, bytes);
    info!(file = %name, source = %source, size, "file written");
    Ok(CommandOutput::text(format!("WRITE: Wrote {size} bytes to {name}\n")))
}

async fn read(ctx: &ShellContext, name: &str) -> Result<CommandOutput, CommandError> {
    let mut content = match ctx.store.read(name) {
        Ok(file) => file.content().to_vec(),
        Err(StoreError::NotFound(_)) => ctx.collaborators.reader.read_file(name).await?,
    };

    if !content.is_empty() && !content.ends_with(b"\n") {
        content.push(b'\n');
    }
    Ok(CommandOutput {
        output: content,
        effect: Effect::Stay,
    })
}

fn delete(ctx: &ShellContext, name: &str) -> Result<CommandOutput, CommandError> {
    let size = ctx.store.delete(name)?;
    info!(file = %name, size, "file deleted");
    Ok(CommandOutput::text(format!("DELETE: Deleted {name}\n")))
}

fn dir(ctx: &ShellContext) -> CommandOutput {
    let now = ctx.collaborators.clock.now();
    let listing = ctx.store.list();

    let mut text = format!("DIR: Listing of mem as of {}\n", now.format(TIMESTAMP_FORMAT));
    for entry in &listing.entries {
        let _ = writeln!(text, "{:>12}  {}", entry.size, entry.name);
    }
    let _ = writeln!(text, "{} File(s) {} bytes", listing.count, listing.total_size);
    CommandOutput::text(text)
}

// ── System commands ───────────────────────────────────────────────────────────

fn help(ctx: &ShellContext) -> CommandOutput {
    let mut text = ctx.banner();
    text.push('\n');
    for spec in CommandTable::all() {
        let _ = writeln!(
            text,
            "{:<10}{:<26}{}",
            spec.name,
            spec.usage.unwrap_or(""),
            spec.description
        );
    }
    CommandOutput::text(text)
}

fn stop(ctx: &ShellContext, reason: StopReason, announcement: &str) -> CommandOutput {
    warn!(%reason, "stop requested by client");
    ctx.control.request_stop(reason);
    CommandOutput::text(announcement).with_effect(Effect::Stop(reason))
}

fn uptime(ctx: &ShellContext) -> CommandOutput {
    let now = ctx.collaborators.clock.now();
    CommandOutput::text(format!(
        "UPTIME: up {} since {}\n",
        format_elapsed(ctx.started_at, now),
        ctx.started_at.format(TIMESTAMP_FORMAT)
    ))
}

fn debug(ctx: &ShellContext, arg: &str) -> Result<CommandOutput, CommandError> {
    match arg.to_ascii_lowercase().as_str() {
        "true" => ctx.set_debug(true),
        "false" => ctx.set_debug(false),
        "status" => {}
        _ => return Err(CommandError::InvalidDebugArgument(arg.to_string())),
    }
    let state = if ctx.debug_enabled() { "on" } else { "off" };
    Ok(CommandOutput::text(format!("DEBUG: Debug mode is {state}\n")))
}

/// Formats `now - since` as `[N day(s), ]H:MM:SS`.  A clock that went
/// backwards reads as zero.
pub fn format_elapsed(since: DateTime<Local>, now: DateTime<Local>) -> String {
    let total = (now - since).num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    let clock = format!("{hours}:{minutes:02}:{seconds:02}");
    match days {
        0 => clock,
        1 => format!("1 day, {clock}"),
        n => format!("{n} days, {clock}"),
    }
}
