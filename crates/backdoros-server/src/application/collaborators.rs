//! Narrow interfaces to everything outside the process.
//!
//! Command handlers never call `reqwest`, `tokio::fs` or `chrono::Local`
//! directly.  They go through these traits, which the infrastructure layer
//! implements for real and tests implement with doubles.
//!
//! | Trait               | Used by            | Real implementation            |
//! |---------------------|--------------------|--------------------------------|
//! | [`Fetcher`]         | `WRITE <url> f`    | `infrastructure::host::HttpFetcher` |
//! | [`LocalFileReader`] | `WRITE <path> f`, `READ` fallback | `infrastructure::host::DiskReader` |
//! | [`PlatformInfo`]    | banner, `HELP`     | `infrastructure::host::HostPlatform` |
//! | [`Clock`]           | `DIR`, `UPTIME`    | `infrastructure::host::SystemClock` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use thiserror::Error;

/// Failure reported by a collaborator.  Rendered to the client as
/// `<COMMAND>: <error>`; the underlying cause is only shown in debug mode.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The path does not exist on the local disk.
    #[error("File not found: {0}")]
    NotFound(String),

    /// Any other local I/O failure (permissions, a directory, ...).
    #[error("Unable to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP request failed or returned a non-success status.
    #[error("Unable to fetch {url}")]
    Http {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Downloads the body behind a URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, CollaboratorError>;
}

/// Reads a file from the host file system.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocalFileReader: Send + Sync {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, CollaboratorError>;
}

/// Describes the host for the banner (e.g. `linux-x86_64`).
#[cfg_attr(test, mockall::automock)]
pub trait PlatformInfo: Send + Sync {
    fn describe_host(&self) -> String;
}

/// Wall-clock source.
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// The full set of collaborators a session needs, bundled so it can be
/// cloned into every connection task.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn Fetcher>,
    pub reader: Arc<dyn LocalFileReader>,
    pub platform: Arc<dyn PlatformInfo>,
    pub clock: Arc<dyn Clock>,
}
