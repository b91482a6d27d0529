//! # Network Service
//!
//! TCP server, per-connection handler, and a typed client.
//!
//! ## Connection Lifecycle
//! 1. Server accepts, or refuses when `max_connections` are already open
//! 2. Handler reads framed packets one at a time and answers each
//! 3. Connection ends on peer EOF, logout, idle timeout, a transport error,
//!    or server shutdown

pub mod client;
pub mod connection;
pub mod server;

pub use client::{BankClient, Receipt};
pub use connection::ConnectionHandler;
pub use server::BankServer;
