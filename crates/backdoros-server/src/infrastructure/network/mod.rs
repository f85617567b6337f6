//! Network adapters: the accept loop and the per-connection byte pump.

pub mod connection;
pub mod server;

pub use connection::run_connection;
pub use server::ShellServer;
