//! Helper library for native RoQ applications.
//!
//! Establishes RTP-over-QUIC sessions with the `roq-10` ALPN:
//! - [Client] dials a server and returns the initiating [roq_lite::Session].
//! - [Server] listens on an address and accepts one [roq_lite::Session] per call.
//!
//! Both are configured with clap/serde structs so applications can flatten them into their own CLI.
//! See [Log] for setting up `tracing` output.

mod client;
mod crypto;
mod error;
mod log;
mod server;
mod transport;

pub use client::*;
pub use error::*;
pub use log::*;
pub use server::*;
pub use transport::*;

// Re-export these crates.
pub use quinn;
pub use roq_lite;
pub use rustls;
