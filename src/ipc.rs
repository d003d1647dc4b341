//! JSON-line IPC over a unix domain socket.

mod pipeline;
mod runtime;
mod server;

pub use server::{client_request, run_daemon};
