//! Daemon side: a Unix socket speaking one JSON request per line.

mod dispatch;
mod runtime;
mod server;
mod watch;

pub use server::{client_request, run_daemon};
