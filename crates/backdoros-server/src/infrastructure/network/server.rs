//! Shell server: TCP accept loop and per-session task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming connections and giving each its own Tokio task.
//! 3. Polling the shared [`SystemControl`] so the loop stops admitting new
//!    connections after `REBOOT`, `SHUTDOWN` or Ctrl-C.
//!
//! Sessions that are already running when the loop stops are not cancelled.
//! They end when their peer leaves or the process exits.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::application::{Flow, ShellContext, ShellSession, StopReason};
use crate::infrastructure::network::connection::run_connection;

/// How long one `accept()` may block before the running flag is re-checked.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Pause after the first failed `accept()`; doubled on each further failure.
const ACCEPT_ERROR_BACKOFF_MIN: Duration = Duration::from_millis(10);
const ACCEPT_ERROR_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// A bound listener plus the context shared by all its sessions.
pub struct ShellServer {
    listener: TcpListener,
    ctx: Arc<ShellContext>,
}

impl ShellServer {
    /// Binds the listener.  Port `0` picks a free port; see
    /// [`local_addr`](Self::local_addr).
    ///
    /// # Errors
    ///
    /// Returns an error if the address is in use or cannot be bound.
    pub async fn bind(addr: SocketAddr, ctx: Arc<ShellContext>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind shell listener on {addr}"))?;
        Ok(Self { listener, ctx })
    }

    /// The address actually bound.
    ///
    /// # Errors
    ///
    /// Propagates the OS error if the socket address cannot be queried.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until a stop is requested and returns its reason.
    ///
    /// # Errors
    ///
    /// Only fails if the listener's local address cannot be read at startup;
    /// individual accept errors are logged and retried after a short backoff.
    pub async fn run(self) -> anyhow::Result<StopReason> {
        let addr = self
            .local_addr()
            .context("failed to read listener address")?;
        info!("BackdorOS listening on {addr}");

        let mut backoff: Option<Duration> = None;
        loop {
            if !self.ctx.control.is_running() {
                info!("stop requested; no longer accepting connections");
                break;
            }

            match timeout(ACCEPT_POLL_INTERVAL, self.listener.accept()).await {
                Ok(Ok((stream, peer_addr))) => {
                    backoff = None;
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        handle_shell_session(stream, peer_addr, ctx).await;
                    });
                }
                Ok(Err(e)) => {
                    // Persistent failures (e.g. EMFILE) would otherwise spin.
                    let pause = next_accept_backoff(backoff);
                    backoff = Some(pause);
                    error!("accept error: {e}; retrying in {pause:?}");
                    tokio::time::sleep(pause).await;
                }
                Err(_) => {
                    // No connection in the last interval; re-check the flag.
                }
            }
        }

        Ok(self
            .ctx
            .control
            .stop_reason()
            .unwrap_or(StopReason::Interrupted))
    }
}

/// Delay before retrying after a failed `accept()`.
fn next_accept_backoff(previous: Option<Duration>) -> Duration {
    match previous {
        None => ACCEPT_ERROR_BACKOFF_MIN,
        Some(d) => (d * 2).min(ACCEPT_ERROR_BACKOFF_MAX),
    }
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Entry point of each per-connection task.  Wraps [`run_connection`] and
/// logs the outcome.
async fn handle_shell_session(stream: TcpStream, peer_addr: SocketAddr, ctx: Arc<ShellContext>) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("could not set TCP_NODELAY for {peer_addr}: {e}");
    }

    let session = ShellSession::new(ctx);
    let id = session.id();
    info!(session = %id, "connection from {peer_addr}");

    match run_connection(stream, session).await {
        Ok(Flow::Stop(reason)) => info!(session = %id, %reason, "session {peer_addr} stopped the server"),
        Ok(_) => info!(session = %id, "session {peer_addr} closed"),
        Err(e) => debug!(session = %id, "session {peer_addr} closed with I/O error: {e}"),
    }
}
