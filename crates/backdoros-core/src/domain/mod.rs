//! Domain entities for BackdorOS.
//!
//! This module contains pure business logic with no infrastructure
//! dependencies.  The one concept that lives here is the virtual filesystem:
//! a process-wide map from names to in-memory byte buffers.
//!
//! Code in outer layers (the session state machine, the TCP server) depends
//! on the domain, but the domain never depends on them.

/// In-memory virtual filesystem.
///
/// See [`store::VirtualStore`] for the main type.
pub mod store;
