//! BackdorOS shell server: entry point.
//!
//! Listens on a raw TCP port (31337 by default) and gives every client a
//! line-oriented shell over an in-memory virtual file system.
//!
//! # Usage
//!
//! ```text
//! backdoros [OPTIONS]
//!
//! Options:
//!   --config <PATH>      TOML config file
//!   --bind <IP>          Address to bind [config default: 127.0.0.1]
//!   --port <PORT>        TCP port [config default: 31337]
//!   --log-level <LEVEL>  tracing level when RUST_LOG is unset
//!   --debug              Start with DEBUG mode on
//!   --print-config       Print the effective config as TOML and exit
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable            | Flag          |
//! |---------------------|---------------|
//! | `BACKDOROS_CONFIG`  | `--config`    |
//! | `BACKDOROS_BIND`    | `--bind`      |
//! | `BACKDOROS_PORT`    | `--port`      |
//! | `BACKDOROS_LOG`     | `--log-level` |
//!
//! # Lifecycle
//!
//! ```text
//! main()
//!  └─ loop
//!       ├─ fresh VirtualStore + ShellContext (start time = now)
//!       ├─ ShellServer::bind / run   -- returns a StopReason
//!       └─ Reboot → loop again; Shutdown / Interrupted → exit
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use backdoros_core::VirtualStore;
use backdoros_server::application::{ShellContext, StopReason, SystemControl};
use backdoros_server::infrastructure::host::host_collaborators;
use backdoros_server::infrastructure::network::ShellServer;
use backdoros_server::infrastructure::storage::{load_config, AppConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// BackdorOS line-oriented shell server.
#[derive(Debug, Parser)]
#[command(
    name = "backdoros",
    about = "Remote line-oriented shell over raw TCP with an in-memory file system",
    version
)]
struct Cli {
    /// Path to a TOML configuration file.  Missing files fall back to defaults.
    #[arg(long, env = "BACKDOROS_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to bind, overriding `server.bind_address`.
    #[arg(long, env = "BACKDOROS_BIND")]
    bind: Option<String>,

    /// TCP port, overriding `server.port`.
    #[arg(long, env = "BACKDOROS_PORT")]
    port: Option<u16>,

    /// Log level, overriding `logging.level`.  `RUST_LOG` still wins.
    #[arg(long, env = "BACKDOROS_LOG")]
    log_level: Option<String>,

    /// Start with the process-wide DEBUG flag on.
    #[arg(long)]
    debug: bool,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    /// Loads the config file and applies command-line overrides on top.
    fn into_app_config(self) -> anyhow::Result<(AppConfig, bool)> {
        let mut config = load_config(self.config.as_deref()).with_context(|| {
            format!(
                "failed to load config from {}",
                self.config
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<defaults>".to_string())
            )
        })?;

        if let Some(bind) = self.bind {
            config.server.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if self.debug {
            config.shell.debug = true;
        }
        Ok((config, self.print_config))
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, print_config) = Cli::parse().into_app_config()?;

    if print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    // `RUST_LOG` overrides the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    let bind_addr = config.bind_addr()?;
    let settings = config.shell_settings()?;
    let collaborators =
        host_collaborators(config.fetch_timeout()).context("failed to build HTTP client")?;

    loop {
        // Every boot gets a fresh store, start time and stop flag.
        let control = Arc::new(SystemControl::new());
        let ctx = Arc::new(ShellContext::new(
            Arc::new(VirtualStore::new()),
            collaborators.clone(),
            Arc::clone(&control),
            settings,
        ));

        let server = ShellServer::bind(bind_addr, ctx).await?;
        let interrupt = spawn_interrupt_watcher(Arc::clone(&control));
        let reason = server.run().await?;
        interrupt.abort();

        match reason {
            StopReason::Reboot => info!("rebooting BackdorOS"),
            StopReason::Shutdown | StopReason::Interrupted => {
                info!("BackdorOS stopped ({reason})");
                return Ok(());
            }
        }
    }
}

/// Turns Ctrl-C into [`StopReason::Interrupted`] for the current boot.
fn spawn_interrupt_watcher(control: Arc<SystemControl>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                control.request_stop(StopReason::Interrupted);
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
