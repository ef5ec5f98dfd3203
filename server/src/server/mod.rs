//! Client-facing server: accept loops, connection framing and command dispatch.

mod connection;
mod handler;
mod listener;

pub use listener::{serve_tcp, serve_unix};
