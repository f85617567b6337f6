//! Static command registry.
//!
//! Every command the shell understands is described once, in [`COMMANDS`],
//! with its description, usage string and minimum argument count.  The
//! handler is identified by a [`CommandKind`] tag; the session layer matches
//! on the tag to run the right code, so adding a command is a compile-checked
//! two-step change (new table row + new match arm).
//!
//! Lookup is case-insensitive: the first word of a line is upper-cased before
//! it is looked up.

/// Identifies which handler runs a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Write,
    Read,
    Delete,
    Dir,
    Help,
    Quit,
    Reboot,
    Shutdown,
    Uptime,
    Repl,
    Debug,
    Cls,
}

/// One row of the command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    /// Upper-case command name.
    pub name: &'static str,
    /// One-line human description shown by `HELP`.
    pub description: &'static str,
    /// Argument synopsis shown by `HELP`, if the command takes arguments.
    pub usage: Option<&'static str>,
    /// Minimum number of arguments (excluding the command name).
    pub min_args: usize,
    pub kind: CommandKind,
}

/// The canonical command table, in `HELP` display order.
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "WRITE",
        description: "write file to mem",
        usage: Some("[-|url|path] [filename]"),
        min_args: 2,
        kind: CommandKind::Write,
    },
    CommandSpec {
        name: "READ",
        description: "read file from mem/disk",
        usage: Some("[path]"),
        min_args: 1,
        kind: CommandKind::Read,
    },
    CommandSpec {
        name: "DELETE",
        description: "delete file from mem",
        usage: Some("[filename]"),
        min_args: 1,
        kind: CommandKind::Delete,
    },
    CommandSpec {
        name: "DIR",
        description: "list all files on mem",
        usage: None,
        min_args: 0,
        kind: CommandKind::Dir,
    },
    CommandSpec {
        name: "REPL",
        description: "in-memory expression REPL",
        usage: None,
        min_args: 0,
        kind: CommandKind::Repl,
    },
    CommandSpec {
        name: "HELP",
        description: "print this screen",
        usage: None,
        min_args: 0,
        kind: CommandKind::Help,
    },
    CommandSpec {
        name: "REBOOT",
        description: "stopping and restarting the system",
        usage: None,
        min_args: 0,
        kind: CommandKind::Reboot,
    },
    CommandSpec {
        name: "SHUTDOWN",
        description: "close down the system",
        usage: None,
        min_args: 0,
        kind: CommandKind::Shutdown,
    },
    CommandSpec {
        name: "QUIT",
        description: "close this session",
        usage: None,
        min_args: 0,
        kind: CommandKind::Quit,
    },
    CommandSpec {
        name: "UPTIME",
        description: "print how long the system has been running",
        usage: None,
        min_args: 0,
        kind: CommandKind::Uptime,
    },
    CommandSpec {
        name: "DEBUG",
        description: "toggle debug mode",
        usage: Some("[true|false|status]"),
        min_args: 1,
        kind: CommandKind::Debug,
    },
    CommandSpec {
        name: "CLS",
        description: "attempt to clear the screen",
        usage: None,
        min_args: 0,
        kind: CommandKind::Cls,
    },
];

/// Outcome of resolving a tokenized line against the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The line had no words.
    Empty,
    /// No command has this (upper-cased) name.
    Unknown(String),
    /// The command exists but too few arguments were given.
    NotEnoughParameters(&'static CommandSpec),
    /// The command exists and has enough arguments.
    Ready {
        spec: &'static CommandSpec,
        args: Vec<String>,
    },
}

/// Read-only view over [`COMMANDS`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandTable;

impl CommandTable {
    /// Finds a command by name, ignoring case.
    pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
        let upper = name.to_uppercase();
        COMMANDS.iter().find(|spec| spec.name == upper)
    }

    /// All commands in display order.
    pub fn all() -> &'static [CommandSpec] {
        COMMANDS
    }

    /// Resolves a tokenized line (command name first) into a [`Resolution`].
    pub fn resolve(mut words: Vec<String>) -> Resolution {
        if words.is_empty() {
            return Resolution::Empty;
        }
        let name = words.remove(0).to_uppercase();
        match Self::lookup(&name) {
            None => Resolution::Unknown(name),
            Some(spec) if words.len() < spec.min_args => Resolution::NotEnoughParameters(spec),
            Some(spec) => Resolution::Ready { spec, args: words },
        }
    }
}
