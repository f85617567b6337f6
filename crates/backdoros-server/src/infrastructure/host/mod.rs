//! Real implementations of the application's collaborator traits.
//!
//! | Adapter          | Trait               | Backed by                  |
//! |------------------|---------------------|----------------------------|
//! | [`HttpFetcher`]  | `Fetcher`           | `reqwest` (rustls)         |
//! | [`DiskReader`]   | `LocalFileReader`   | `tokio::fs`                |
//! | [`HostPlatform`] | `PlatformInfo`      | `std::env::consts`         |
//! | [`SystemClock`]  | `Clock`             | `chrono::Local`            |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};

use crate::application::collaborators::{
    Clock, CollaboratorError, Collaborators, Fetcher, LocalFileReader, PlatformInfo,
};

/// Builds the production collaborator set.
///
/// # Errors
///
/// Returns the `reqwest` error if the HTTP client cannot be constructed
/// (for example when the TLS backend fails to initialise).
pub fn host_collaborators(fetch_timeout: Duration) -> Result<Collaborators, reqwest::Error> {
    Ok(Collaborators {
        fetcher: Arc::new(HttpFetcher::new(fetch_timeout)?),
        reader: Arc::new(DiskReader),
        platform: Arc::new(HostPlatform),
        clock: Arc::new(SystemClock),
    })
}

// ── HTTP ──────────────────────────────────────────────────────────────────────

/// Downloads `WRITE http...` sources.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// # Errors
    ///
    /// Returns the builder error if the client cannot be created.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .user_agent(concat!("backdoros/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, CollaboratorError> {
        let http_error = |e: reqwest::Error| CollaboratorError::Http {
            url: url.to_string(),
            source: Box::new(e),
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(http_error)?;
        let body = response.bytes().await.map_err(http_error)?;
        Ok(body.to_vec())
    }
}

// ── Disk ──────────────────────────────────────────────────────────────────────

/// Reads `WRITE <path>` sources and `READ` fallbacks from the local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskReader;

#[async_trait]
impl LocalFileReader for DiskReader {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, CollaboratorError> {
        tokio::fs::read(path).await.map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => CollaboratorError::NotFound(path.to_string()),
            _ => CollaboratorError::Io {
                path: path.to_string(),
                source,
            },
        })
    }
}

// ── Platform and clock ────────────────────────────────────────────────────────

/// Describes the host as `<os>-<arch>`, e.g. `linux-x86_64`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostPlatform;

impl PlatformInfo for HostPlatform {
    fn describe_host(&self) -> String {
        format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}
