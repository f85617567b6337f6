//! REPL evaluators.
//!
//! The `REPL` command hands every following line to an [`Evaluator`] until
//! the client types `exit()`.  The session owns the evaluator exclusively and
//! drops it when the REPL ends or the connection closes, so output produced
//! by one client's evaluator can never reach another client.
//!
//! Two implementations ship with the crate:
//!
//! - [`EchoEvaluator`] – prints each line back; useful for wiring tests.
//! - [`CalcEvaluator`] – a small arithmetic interpreter with variables.

mod calc;

use std::fmt;
use std::str::FromStr;

pub use calc::CalcEvaluator;

/// Primary REPL prompt: the evaluator is ready for a new statement.
pub const PRIMARY_PROMPT: &str = ">>> ";

/// Continuation prompt: the evaluator needs more lines to finish a statement.
pub const CONTINUATION_PROMPT: &str = "... ";

/// Line that leaves the REPL.
pub const EXIT_SENTINEL: &str = "exit()";

/// Result of pushing one line into an evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushOutcome {
    /// `true` when the statement is incomplete and a continuation line is needed.
    pub needs_more: bool,
}

/// A line-at-a-time interpreter driven by the REPL mode.
pub trait Evaluator: Send {
    /// Feeds one line of input.
    fn push(&mut self, line: &str) -> PushOutcome;

    /// Takes all output produced since the previous call, in order.
    fn drain_output(&mut self) -> Vec<String>;

    /// Short name shown in the REPL banner.
    fn name(&self) -> &'static str;
}

// ── EchoEvaluator ─────────────────────────────────────────────────────────────

/// Stub evaluator that echoes every line it receives.
#[derive(Debug, Default)]
pub struct EchoEvaluator {
    output: Vec<String>,
}

impl EchoEvaluator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Evaluator for EchoEvaluator {
    fn push(&mut self, line: &str) -> PushOutcome {
        self.output.push(line.to_string());
        PushOutcome { needs_more: false }
    }

    fn drain_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    fn name(&self) -> &'static str {
        "echo"
    }
}

// ── Evaluator selection ───────────────────────────────────────────────────────

/// Which evaluator a new REPL session gets.  Selected in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvaluatorKind {
    Echo,
    #[default]
    Calc,
}

impl EvaluatorKind {
    /// Builds a fresh evaluator of this kind.
    pub fn build(self) -> Box<dyn Evaluator> {
        match self {
            EvaluatorKind::Echo => Box::new(EchoEvaluator::new()),
            EvaluatorKind::Calc => Box::new(CalcEvaluator::new()),
        }
    }
}

impl FromStr for EvaluatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "echo" => Ok(EvaluatorKind::Echo),
            "calc" => Ok(EvaluatorKind::Calc),
            other => Err(format!("unknown evaluator '{other}' (expected 'calc' or 'echo')")),
        }
    }
}

impl fmt::Display for EvaluatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluatorKind::Echo => f.write_str("echo"),
            EvaluatorKind::Calc => f.write_str("calc"),
        }
    }
}
