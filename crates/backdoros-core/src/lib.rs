//! # backdoros-core
//!
//! Shared library for the BackdorOS shell containing the in-memory virtual
//! store, the session line framer, the command table and the REPL evaluators.
//!
//! This crate has zero dependencies on sockets, async runtimes, or the file
//! system.  Everything here can be exercised from a plain `#[test]`.
//!
//! # Architecture overview (for beginners)
//!
//! BackdorOS is a remote shell: a client opens a TCP connection, receives a
//! banner and a `%> ` prompt, and types short commands such as
//! `WRITE - notes.txt` or `DIR`.  The commands operate on a *virtual
//! filesystem*: named byte buffers that live only in process memory.
//!
//! This crate (`backdoros-core`) is the protocol foundation.  It defines:
//!
//! - **`domain`** – The [`VirtualStore`] and [`VirtualFile`] types, with the
//!   aggregate size accounting that `DIR` reports.
//!
//! - **`protocol`** – How bytes become commands: the [`LineFramer`] splits a
//!   byte stream into lines, the tokenizer splits a line into shell-style
//!   words, the [`CommandTable`] resolves the first word into a command, and
//!   [`PasteCapture`] accumulates pasted lines until the `EOF` sentinel.
//!
//! - **`eval`** – The [`Evaluator`] trait behind the interactive REPL mode,
//!   with an echoing stub and a small calculator.

pub mod domain;
pub mod eval;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `backdoros_core::VirtualStore` instead of the full module path.
pub use domain::store::{FileEntry, Listing, StoreError, VirtualFile, VirtualStore};
pub use eval::{CalcEvaluator, EchoEvaluator, Evaluator, EvaluatorKind, PushOutcome};
pub use protocol::commands::{CommandKind, CommandSpec, CommandTable, Resolution};
pub use protocol::framer::{FrameError, LineFramer, DEFAULT_MAX_LINE_BYTES};
pub use protocol::paste::PasteCapture;
pub use protocol::tokenizer::{split_command_line, TokenizeError};
