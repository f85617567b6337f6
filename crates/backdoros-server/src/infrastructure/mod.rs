//! Infrastructure layer for the BackdorOS server.
//!
//! Contains the OS-facing adapters: the TCP accept loop and per-connection
//! transport, the host collaborators (HTTP, disk, platform, clock) and the
//! TOML configuration loader.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `backdoros_core`, but MUST NOT be imported by the `application` layer.

pub mod host;
pub mod network;
pub mod storage;
