//! ShellSession: the per-connection protocol state machine.
//!
//! # Modes (for beginners)
//!
//! A session is always in exactly one of three modes:
//!
//! ```text
//!            WRITE - f                    line containing EOF
//!   Normal ─────────────▶ CapturePaste ──────────────────────▶ Normal
//!     │                                                          ▲
//!     │ REPL                         exit()                      │
//!     └───────────────▶ Repl ────────────────────────────────────┘
//! ```
//!
//! - **Normal**: each line is tokenized and run as a command, then the `%> `
//!   prompt is sent.
//! - **CapturePaste**: each line is appended to the paste buffer.  No prompt
//!   is sent until the `EOF` sentinel commits the file.
//! - **Repl**: each line goes to the session's own [`Evaluator`]; the prompt
//!   is `>>> ` or `... ` depending on whether the statement is complete.
//!
//! Mode-specific data lives inside the `Mode` variant, so a paste buffer
//! cannot exist outside paste mode and an evaluator is dropped as soon as the
//! REPL ends or the session is dropped.
//!
//! The session never performs socket I/O.  The transport hands it raw chunks
//! through [`ShellSession::handle_chunk`] and writes back whatever bytes the
//! returned [`Reply`] carries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use backdoros_core::eval::{CONTINUATION_PROMPT, EXIT_SENTINEL, PRIMARY_PROMPT};
use backdoros_core::protocol::framer::decode_line;
use backdoros_core::{
    split_command_line, CommandSpec, CommandTable, Evaluator, EvaluatorKind, FrameError,
    LineFramer, PasteCapture, Resolution, VirtualStore, DEFAULT_MAX_LINE_BYTES,
};
use chrono::{DateTime, Local};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::collaborators::Collaborators;
use super::commands::{self, render_failure, Effect};
use super::control::{StopReason, SystemControl};

/// Prompt sent whenever the session is ready for a command.
pub const PROMPT: &str = "%> ";

/// Release string shown in the banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ── Shared context ────────────────────────────────────────────────────────────

/// Shell behaviour knobs taken from the `[shell]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellSettings {
    pub debug: bool,
    pub evaluator: EvaluatorKind,
    pub max_line_bytes: usize,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            debug: false,
            evaluator: EvaluatorKind::default(),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

/// State shared by every session of one server run.
///
/// One `ShellContext` is created per server start (and per reboot), wrapped
/// in an `Arc`, and cloned into every connection task.
pub struct ShellContext {
    pub store: Arc<VirtualStore>,
    pub collaborators: Collaborators,
    pub control: Arc<SystemControl>,
    /// When this server run started; `UPTIME` measures from here.
    pub started_at: DateTime<Local>,
    pub evaluator: EvaluatorKind,
    pub max_line_bytes: usize,
    debug: AtomicBool,
}

impl ShellContext {
    pub fn new(
        store: Arc<VirtualStore>,
        collaborators: Collaborators,
        control: Arc<SystemControl>,
        settings: ShellSettings,
    ) -> Self {
        let started_at = collaborators.clock.now();
        Self {
            store,
            collaborators,
            control,
            started_at,
            evaluator: settings.evaluator,
            max_line_bytes: settings.max_line_bytes,
            debug: AtomicBool::new(settings.debug),
        }
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    pub fn set_debug(&self, enabled: bool) {
        self.debug.store(enabled, Ordering::Relaxed);
    }

    /// First line of the greeting and of `HELP`, newline included.
    pub fn banner(&self) -> String {
        format!(
            "BackdorOS release {VERSION} on an {}\n",
            self.collaborators.platform.describe_host()
        )
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// What the transport must do after delivering a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading.
    Continue,
    /// Flush the output, then close the connection (`QUIT`).
    Close,
    /// Flush the output, close the connection; the server is stopping.
    Stop(StopReason),
}

/// Output produced for one chunk of input.
#[derive(Debug)]
pub struct Reply {
    pub output: Vec<u8>,
    pub flow: Flow,
}

enum Mode {
    Normal,
    CapturePaste(PasteCapture),
    Repl {
        evaluator: Box<dyn Evaluator>,
        needs_more: bool,
    },
}

/// One client connection's protocol state.
pub struct ShellSession {
    id: Uuid,
    mode: Mode,
    framer: LineFramer,
    ctx: Arc<ShellContext>,
}

impl ShellSession {
    pub fn new(ctx: Arc<ShellContext>) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode: Mode::Normal,
            framer: LineFramer::new(ctx.max_line_bytes),
            ctx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Short name of the current mode, for logs and tests.
    pub fn mode_name(&self) -> &'static str {
        match self.mode {
            Mode::Normal => "normal",
            Mode::CapturePaste(_) => "paste",
            Mode::Repl { .. } => "repl",
        }
    }

    /// Banner plus the first prompt, sent right after connecting.
    pub fn greeting(&self) -> Vec<u8> {
        let mut out = self.ctx.banner().into_bytes();
        out.extend_from_slice(PROMPT.as_bytes());
        out
    }

    /// Feeds one chunk from the transport and returns everything to send back.
    ///
    /// Lines are handled one at a time, so a chunk holding `WRITE - f`,
    /// `hello` and `EOF` is processed with the right mode for each line.
    /// Input after a closing command in the same chunk is ignored.
    pub async fn handle_chunk(&mut self, chunk: &[u8]) -> Reply {
        let mut out = Vec::new();
        let overflow = self.framer.extend(chunk).err();

        while let Some(line) = self.framer.next_line() {
            let flow = self.handle_line(line, &mut out).await;
            if flow != Flow::Continue {
                return Reply { output: out, flow };
            }
        }

        if let Some(err) = overflow {
            warn!(session = %self.id, "{err}");
            push_line(&mut out, &format!("KERNEL: {err}"));
            self.push_prompt(&mut out);
        }

        Reply {
            output: out,
            flow: Flow::Continue,
        }
    }

    async fn handle_line(
        &mut self,
        framed: Result<Vec<u8>, FrameError>,
        out: &mut Vec<u8>,
    ) -> Flow {
        let line = match framed.and_then(decode_line) {
            Ok(line) => line,
            Err(err) => {
                debug!(session = %self.id, "{err}");
                push_line(out, &format!("KERNEL: {err}"));
                self.push_prompt(out);
                return Flow::Continue;
            }
        };

        if self.ctx.debug_enabled() {
            info!(session = %self.id, mode = self.mode_name(), line = %line, "line received");
        }

        match &mut self.mode {
            Mode::CapturePaste(paste) => {
                if let Some(content) = paste.push_line(&line) {
                    let target = paste.target().to_string();
                    let size = self.ctx.store.write(&target, content.into_bytes());
                    info!(session = %self.id, file = %target, size, "paste committed");
                    push_line(out, &format!("WRITE: Wrote {size} bytes to {target}"));
                    self.mode = Mode::Normal;
                    self.push_prompt(out);
                }
                return Flow::Continue;
            }
            Mode::Repl {
                evaluator,
                needs_more,
            } => {
                let line = line.strip_suffix('\r').unwrap_or(line.as_str());
                if line == EXIT_SENTINEL {
                    debug!(session = %self.id, "leaving REPL");
                    self.mode = Mode::Normal;
                    push_line(out, "End of REPL");
                } else {
                    *needs_more = evaluator.push(line).needs_more;
                    for chunk in evaluator.drain_output() {
                        push_line(out, &chunk);
                    }
                }
                self.push_prompt(out);
                return Flow::Continue;
            }
            Mode::Normal => {}
        }

        self.dispatch(&line, out).await
    }

    /// Runs one command line in `Normal` mode.
    async fn dispatch(&mut self, line: &str, out: &mut Vec<u8>) -> Flow {
        let words = match split_command_line(line) {
            Ok(words) => words,
            Err(err) => {
                push_line(out, &format!("KERNEL: {err}"));
                self.push_prompt(out);
                return Flow::Continue;
            }
        };

        let flow = match CommandTable::resolve(words) {
            Resolution::Empty => Flow::Continue,
            Resolution::Unknown(name) => {
                debug!(session = %self.id, command = %name, "unknown command");
                push_line(out, &format!("KERNEL: Unknown command: {name}"));
                Flow::Continue
            }
            Resolution::NotEnoughParameters(spec) => {
                push_line(out, &format!("{}: Not enough parameters", spec.name));
                Flow::Continue
            }
            Resolution::Ready { spec, args } => self.run(spec, &args, out).await,
        };

        if flow == Flow::Continue {
            self.push_prompt(out);
        }
        flow
    }

    async fn run(&mut self, spec: &CommandSpec, args: &[String], out: &mut Vec<u8>) -> Flow {
        debug!(session = %self.id, command = spec.name, ?args, "running command");

        let result = match commands::execute(&self.ctx, spec.kind, args).await {
            Ok(result) => result,
            Err(err) => {
                let verbose = self.ctx.debug_enabled();
                warn!(session = %self.id, command = spec.name, "command failed: {err}");
                out.extend_from_slice(render_failure(spec.name, &err, verbose).as_bytes());
                return Flow::Continue;
            }
        };

        out.extend_from_slice(&result.output);
        match result.effect {
            Effect::Stay => Flow::Continue,
            Effect::EnterPaste(target) => {
                debug!(session = %self.id, file = %target, "capturing paste");
                self.mode = Mode::CapturePaste(PasteCapture::new(target));
                Flow::Continue
            }
            Effect::EnterRepl => {
                self.mode = Mode::Repl {
                    evaluator: self.ctx.evaluator.build(),
                    needs_more: false,
                };
                Flow::Continue
            }
            Effect::Close => Flow::Close,
            Effect::Stop(reason) => Flow::Stop(reason),
        }
    }

    fn push_prompt(&self, out: &mut Vec<u8>) {
        let prompt = match &self.mode {
            Mode::Normal => PROMPT,
            Mode::CapturePaste(_) => return,
            Mode::Repl { needs_more: true, .. } => CONTINUATION_PROMPT,
            Mode::Repl { .. } => PRIMARY_PROMPT,
        };
        out.extend_from_slice(prompt.as_bytes());
    }
}

fn push_line(out: &mut Vec<u8>, line: &str) {
    out.extend_from_slice(line.as_bytes());
    out.push(b'\n');
}

// ── Tests ─────────────────────────────────────────────────────────────────────
