//! Transport adapter: moves bytes between a socket and a [`ShellSession`].
//!
//! The adapter is generic over any `AsyncRead + AsyncWrite` stream so the
//! same code runs against a `TcpStream` in production, a `tokio::io::duplex`
//! pair in integration tests and a `tokio_test::io::Mock` in unit tests.
//!
//! # Stream reassembly
//!
//! `read()` may return a partial line or several lines at once.  The adapter
//! does not care: every chunk goes straight to the session, whose line framer
//! keeps the partial remainder until the rest arrives.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::application::{Flow, ShellSession};

/// Size of the temporary buffer for each individual `read()` call.
const READ_CHUNK_BYTES: usize = 4096;

/// Runs `session` over `stream` until the client quits, the peer closes the
/// connection or the server is told to stop.
///
/// Returns the [`Flow`] that ended the session.  A peer that closes its end
/// counts as an implicit `QUIT` and yields [`Flow::Close`].
///
/// # Errors
///
/// Returns the underlying I/O error if reading from or writing to the
/// stream fails.  The session (and its REPL evaluator, if any) is dropped
/// either way; the shared store is never touched on this path.
pub async fn run_connection<S>(mut stream: S, mut session: ShellSession) -> std::io::Result<Flow>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(&session.greeting()).await?;

    let mut read_tmp = vec![0u8; READ_CHUNK_BYTES];

    loop {
        let n = stream.read(&mut read_tmp).await?;
        if n == 0 {
            debug!(session = %session.id(), "peer closed the connection");
            return Ok(Flow::Close);
        }

        let reply = session.handle_chunk(&read_tmp[..n]).await;
        if !reply.output.is_empty() {
            stream.write_all(&reply.output).await?;
        }

        if reply.flow != Flow::Continue {
            if let Err(e) = stream.shutdown().await {
                debug!(session = %session.id(), "shutdown after {:?} failed: {e}", reply.flow);
            }
            return Ok(reply.flow);
        }
    }
}
