//! # Utility Modules
//!
//! Supporting utilities for cryptography, logging, metrics, and timing.
//!
//! ## Components
//! - **Crypto**: AES-256-CBC envelopes and sealed values
//! - **Logging**: Structured logging configuration
//! - **Timeout**: Async timeout wrappers
//! - **Metrics**: Thread-safe observability counters
//!
//! ## Security
//! - Cryptographically secure IVs (getrandom)
//! - Memory zeroing for key material (zeroize crate)

pub mod crypto;
pub mod logging;
pub mod metrics;
pub mod timeout;

pub use metrics::Metrics;
