//! Session protocol: line framing, tokenizing, command lookup and paste capture.

pub mod commands;
pub mod framer;
pub mod paste;
pub mod tokenizer;

pub use commands::{CommandKind, CommandSpec, CommandTable, Resolution};
pub use framer::{FrameError, LineFramer, DEFAULT_MAX_LINE_BYTES};
pub use paste::{PasteCapture, PASTE_SENTINEL};
pub use tokenizer::{split_command_line, TokenizeError};
