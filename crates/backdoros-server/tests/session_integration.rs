//! End-to-end session tests over an in-memory duplex stream.
//!
//! Each test plays the client side of a connection: it reads the greeting,
//! sends command lines and checks the bytes that come back.  Collaborators
//! are simple in-memory doubles so no test touches the network or the disk.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

use backdoros_core::{EvaluatorKind, VirtualStore};
use backdoros_server::application::collaborators::{
    Clock, CollaboratorError, Collaborators, Fetcher, LocalFileReader, PlatformInfo,
};
use backdoros_server::application::session::ShellSettings;
use backdoros_server::application::{Flow, ShellContext, ShellSession, StopReason, SystemControl};
use backdoros_server::infrastructure::network::run_connection;

// ── Test doubles ──────────────────────────────────────────────────────────────

/// Serves canned bodies for known URLs and records every request.
#[derive(Default)]
struct StaticFetcher {
    bodies: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, CollaboratorError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| CollaboratorError::Http {
                url: url.to_string(),
                source: "404 Not Found".into(),
            })
    }
}

/// A tiny fake disk.
#[derive(Default)]
struct FakeDisk {
    files: HashMap<String, Vec<u8>>,
}

#[async_trait]
impl LocalFileReader for FakeDisk {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, CollaboratorError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound(path.to_string()))
    }
}

struct FixedPlatform;

impl PlatformInfo for FixedPlatform {
    fn describe_host(&self) -> String {
        "testos-1.0-x86_64".to_string()
    }
}

/// Clock that only moves when the test advances it.
struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    fn new() -> Self {
        let start = Local
            .with_ymd_and_hms(2026, 5, 4, 10, 0, 0)
            .single()
            .expect("unambiguous local time");
        Self {
            now: Mutex::new(start),
        }
    }

    fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap()
    }
}

// ── Harness ───────────────────────────────────────────────────────────────────

struct Harness {
    ctx: Arc<ShellContext>,
    clock: Arc<ManualClock>,
    fetcher: Arc<StaticFetcher>,
}

impl Harness {
    fn new(settings: ShellSettings) -> Self {
        let mut fetcher = StaticFetcher::default();
        fetcher
            .bodies
            .insert("http://files.test/payload.bin".to_string(), vec![7u8; 10]);
        let fetcher = Arc::new(fetcher);

        let mut disk = FakeDisk::default();
        disk.files
            .insert("/srv/motd".to_string(), b"welcome".to_vec());

        let clock = Arc::new(ManualClock::new());
        let ctx = Arc::new(ShellContext::new(
            Arc::new(VirtualStore::new()),
            Collaborators {
                fetcher: Arc::clone(&fetcher) as Arc<dyn Fetcher>,
                reader: Arc::new(disk),
                platform: Arc::new(FixedPlatform),
                clock: Arc::clone(&clock) as Arc<dyn Clock>,
            },
            Arc::new(SystemControl::new()),
            settings,
        ));
        Self { ctx, clock, fetcher }
    }

    /// Starts a session task and returns the client end plus the task handle.
    async fn connect(&self) -> (Client, JoinHandle<std::io::Result<Flow>>) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let session = ShellSession::new(Arc::clone(&self.ctx));
        let handle = tokio::spawn(run_connection(server, session));
        let mut client = Client { stream: client };
        let greeting = client.read_until("%> ").await;
        assert!(greeting.starts_with("BackdorOS release "));
        (client, handle)
    }
}

struct Client {
    stream: DuplexStream,
}

impl Client {
    async fn send(&mut self, bytes: &str) {
        self.stream.write_all(bytes.as_bytes()).await.unwrap();
    }

    /// Reads until the accumulated output ends with `marker`.
    async fn read_until(&mut self, marker: &str) -> String {
        let mut out = Vec::new();
        let mut buf = [0u8; 1024];
        tokio::time::timeout(Duration::from_secs(5), async {
            while !out.ends_with(marker.as_bytes()) {
                let n = self.stream.read(&mut buf).await.unwrap();
                assert!(n > 0, "connection closed before {marker:?}; got {out:?}");
                out.extend_from_slice(&buf[..n]);
            }
        })
        .await
        .expect("timed out waiting for output");
        String::from_utf8(out).unwrap()
    }

    /// Sends a line and returns the reply up to the next `%> ` prompt.
    async fn command(&mut self, line: &str) -> String {
        self.send(&format!("{line}\n")).await;
        self.read_until("%> ").await
    }

    /// Reads everything until the server closes the connection.
    async fn read_to_close(&mut self) -> String {
        let mut out = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), self.stream.read_to_end(&mut out))
            .await
            .expect("timed out waiting for close")
            .unwrap();
        String::from_utf8(out).unwrap()
    }
}

// ── Greeting and dispatch ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_greeting_names_version_and_platform() {
    let harness = Harness::new(ShellSettings::default());
    let (client, server) = tokio::io::duplex(4096);
    let session = ShellSession::new(Arc::clone(&harness.ctx));
    tokio::spawn(run_connection(server, session));

    let mut client = Client { stream: client };
    let greeting = client.read_until("%> ").await;

    assert_eq!(
        greeting,
        format!(
            "BackdorOS release {} on an testos-1.0-x86_64\n%> ",
            env!("CARGO_PKG_VERSION")
        )
    );
}

#[tokio::test]
async fn test_unknown_command_reply() {
    let harness = Harness::new(ShellSettings::default());
    let (mut client, _) = harness.connect().await;

    assert_eq!(client.command("foo").await, "KERNEL: Unknown command: FOO\n%> ");
}

#[tokio::test]
async fn test_command_split_across_deliveries_runs_once() {
    // Arrange
    let harness = Harness::new(ShellSettings::default());
    let (mut client, _) = harness.connect().await;
    harness.ctx.store.write("a", b"abc".to_vec());

    // Act: "DIR" and "\n" in two separate writes
    client.send("DIR").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.send("\n").await;
    let reply = client.read_until("%> ").await;

    // Assert
    assert_eq!(reply.matches("File(s)").count(), 1);
    assert!(reply.contains("1 File(s) 3 bytes"));
}

// ── Store commands ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_paste_then_read_round_trip() {
    let harness = Harness::new(ShellSettings::default());
    let (mut client, _) = harness.connect().await;

    client.send("WRITE - f\nhello\n").await;
    client.send("EOF\n").await;
    let commit = client.read_until("%> ").await;
    let read = client.command("READ f").await;

    assert_eq!(commit, "WRITE: Wrote 6 bytes to f\n%> ");
    assert_eq!(read, "hello\n%> ");
}

#[tokio::test]
async fn test_crlf_paste_keeps_only_the_pasted_line() {
    // Arrange
    let harness = Harness::new(ShellSettings::default());
    let (mut client, _) = harness.connect().await;

    // Act: telnet-style client terminating every line with CRLF
    client.send("WRITE - f\r\nhello\r\nEOF\r\n").await;
    let commit = client.read_until("%> ").await;
    let read = client.command("READ f").await;

    // Assert
    assert_eq!(commit, "WRITE: Wrote 7 bytes to f\n%> ");
    assert_eq!(read, "hello\r\n%> ");
    assert_eq!(harness.ctx.store.aggregate_size(), 7);
}

#[tokio::test]
async fn test_overwrite_then_read_returns_latest() {
    let harness = Harness::new(ShellSettings::default());
    let (mut client, _) = harness.connect().await;

    client.send("WRITE - f\nfirst version\nEOF\n").await;
    client.read_until("%> ").await;
    client.send("WRITE - f\nv2\nEOF\n").await;
    client.read_until("%> ").await;

    assert_eq!(client.command("READ f").await, "v2\n%> ");
    assert_eq!(harness.ctx.store.aggregate_size(), 3);
}

#[tokio::test]
async fn test_dir_after_two_writes_reports_totals() {
    let harness = Harness::new(ShellSettings::default());
    let (mut client, _) = harness.connect().await;

    client.send("WRITE - three\nab\nEOF\n").await;
    client.read_until("%> ").await;
    client.send("WRITE - five\nabcd\nEOF\n").await;
    client.read_until("%> ").await;
    let dir = client.command("dir").await;

    assert!(dir.starts_with("DIR: Listing of mem as of 2026-05-04 10:00:00\n"));
    assert!(dir.ends_with("2 File(s) 8 bytes\n%> "));
}

#[tokio::test]
async fn test_delete_missing_file_keeps_aggregate() {
    let harness = Harness::new(ShellSettings::default());
    let (mut client, _) = harness.connect().await;
    harness.ctx.store.write("keep", b"1234".to_vec());

    let reply = client.command("DELETE nothing").await;

    assert_eq!(reply, "DELETE: File not found: nothing\n%> ");
    assert_eq!(harness.ctx.store.aggregate_size(), 4);
}

#[tokio::test]
async fn test_write_from_url_and_from_disk() {
    let harness = Harness::new(ShellSettings::default());
    let (mut client, _) = harness.connect().await;

    let from_url = client.command("WRITE http://files.test/payload.bin p").await;
    let from_disk = client.command("write /srv/motd motd").await;

    assert_eq!(from_url, "WRITE: Wrote 10 bytes to p\n%> ");
    assert_eq!(from_disk, "WRITE: Wrote 7 bytes to motd\n%> ");
    assert_eq!(
        harness.fetcher.requests.lock().unwrap().as_slice(),
        ["http://files.test/payload.bin".to_string()]
    );
    assert_eq!(harness.ctx.store.aggregate_size(), 17);
}

#[tokio::test]
async fn test_failed_fetch_reports_error_and_keeps_store() {
    let harness = Harness::new(ShellSettings::default());
    let (mut client, _) = harness.connect().await;

    let reply = client.command("WRITE http://files.test/missing m").await;

    assert_eq!(reply, "WRITE: Unable to fetch http://files.test/missing\n%> ");
    assert_eq!(harness.ctx.store.count(), 0);
}

#[tokio::test]
async fn test_debug_mode_shows_error_cause() {
    let harness = Harness::new(ShellSettings::default());
    let (mut client, _) = harness.connect().await;

    client.command("DEBUG true").await;
    let reply = client.command("WRITE http://files.test/missing m").await;

    assert_eq!(
        reply,
        "WRITE: Unable to fetch http://files.test/missing: 404 Not Found\n%> "
    );
}

#[tokio::test]
async fn test_read_falls_back_to_disk_for_unknown_names() {
    let harness = Harness::new(ShellSettings::default());
    let (mut client, _) = harness.connect().await;

    assert_eq!(client.command("READ /srv/motd").await, "welcome\n%> ");
    assert_eq!(
        client.command("READ /srv/none").await,
        "READ: File not found: /srv/none\n%> "
    );
}

// ── System commands ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_uptime_uses_clock_since_start() {
    let harness = Harness::new(ShellSettings::default());
    let (mut client, _) = harness.connect().await;

    harness.clock.advance(chrono::Duration::seconds(2 * 86_400 + 61));
    let reply = client.command("UPTIME").await;

    assert_eq!(
        reply,
        "UPTIME: up 2 days, 0:01:01 since 2026-05-04 10:00:00\n%> "
    );
}

#[tokio::test]
async fn test_help_lists_commands() {
    let harness = Harness::new(ShellSettings::default());
    let (mut client, _) = harness.connect().await;

    let help = client.command("help").await;

    for name in ["WRITE", "READ", "DELETE", "DIR", "HELP", "QUIT", "REBOOT", "SHUTDOWN", "UPTIME"] {
        assert!(help.contains(name), "HELP is missing {name}");
    }
}

#[tokio::test]
async fn test_quit_closes_connection() {
    let harness = Harness::new(ShellSettings::default());
    let (mut client, handle) = harness.connect().await;

    client.send("QUIT\n").await;
    let rest = client.read_to_close().await;

    assert_eq!(rest, "Bye!\n");
    assert_eq!(handle.await.unwrap().unwrap(), Flow::Close);
    assert!(harness.ctx.control.is_running(), "QUIT must not stop the server");
}

#[tokio::test]
async fn test_shutdown_closes_connection_and_stops_admissions() {
    let harness = Harness::new(ShellSettings::default());
    let (mut client, handle) = harness.connect().await;

    client.send("SHUTDOWN\n").await;
    client.read_to_close().await;

    assert_eq!(
        handle.await.unwrap().unwrap(),
        Flow::Stop(StopReason::Shutdown)
    );
    assert_eq!(harness.ctx.control.stop_reason(), Some(StopReason::Shutdown));
}

#[tokio::test]
async fn test_peer_close_mid_paste_is_implicit_quit() {
    let harness = Harness::new(ShellSettings::default());
    let (mut client, handle) = harness.connect().await;

    client.send("WRITE - f\npartial\n").await;
    drop(client);

    assert_eq!(handle.await.unwrap().unwrap(), Flow::Close);
    assert_eq!(harness.ctx.store.count(), 0);
}

// ── REPL ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_repl_session_with_calc_evaluator() {
    let harness = Harness::new(ShellSettings::default());
    let (mut client, _) = harness.connect().await;

    client.send("REPL\n").await;
    client.read_until(">>> ").await;
    client.send("x = 6\n").await;
    assert_eq!(client.read_until(">>> ").await, ">>> ");
    client.send("x * 7\n").await;
    assert_eq!(client.read_until(">>> ").await, "42\n>>> ");
    client.send("exit()\n").await;

    assert_eq!(client.read_until("%> ").await, "End of REPL\n%> ");
}

#[tokio::test]
async fn test_concurrent_repls_do_not_share_output() {
    let harness = Harness::new(ShellSettings {
        evaluator: EvaluatorKind::Echo,
        ..ShellSettings::default()
    });
    let (mut alice, _) = harness.connect().await;
    let (mut bob, _) = harness.connect().await;

    alice.send("REPL\n").await;
    alice.read_until(">>> ").await;
    bob.send("REPL\n").await;
    bob.read_until(">>> ").await;

    alice.send("alice-line\n").await;
    bob.send("bob-line\n").await;

    assert_eq!(alice.read_until(">>> ").await, "alice-line\n>>> ");
    assert_eq!(bob.read_until(">>> ").await, "bob-line\n>>> ");
}
