//! # Protocol Layer
//!
//! Typed messages, per-connection session state, and request dispatch.
//!
//! ## Components
//! - **Message**: `Request`/`Response` variants and their wire mapping
//! - **Session**: `Unauthenticated -> Authenticated -> Closed`
//! - **Dispatcher**: authorization and routing into the transaction engine

pub mod dispatcher;
pub mod message;
pub mod session;
