//! Application layer for the BackdorOS shell.
//!
//! # What lives here? (for beginners)
//!
//! The *application* layer turns framed lines into shell behaviour.  It knows
//! about sessions, modes and commands, but it never opens a socket or touches
//! the disk itself.  Everything outside the process (HTTP, the local file
//! system, the host description, the wall clock) is reached through the small
//! traits in [`collaborators`], so every code path can be driven from a test
//! with in-memory doubles.
//!
//! # Sub-modules
//!
//! - **`collaborators`** – Traits for the outside world plus their error type.
//! - **`control`**       – Process-wide stop signal raised by REBOOT/SHUTDOWN.
//! - **`commands`**      – One handler per command-table entry.
//! - **`session`**       – The per-connection state machine
//!   (`Normal` / `CapturePaste` / `Repl`).

pub mod collaborators;
pub mod commands;
pub mod control;
pub mod session;

pub use collaborators::{
    Clock, CollaboratorError, Collaborators, Fetcher, LocalFileReader, PlatformInfo,
};
pub use control::{StopReason, SystemControl};
pub use session::{Flow, Reply, ShellContext, ShellSession};
