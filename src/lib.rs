//! # secure-bank
//!
//! Encrypted request/response protocol and a transactional account engine for
//! a small banking service.
//!
//! Clients connect over TCP, log in, and then check balances, deposit, and
//! withdraw. Every message is a flat JSON mapping, optionally wrapped in an
//! AES-256-CBC envelope, and carried in a length-prefixed packet. Account
//! names and balances are sealed under the same cipher while at rest.
//!
//! ## Layout
//! - [`bank`]: accounts, credentials, storage, and the transaction engine
//! - [`core`]: packet framing and the wire codec
//! - [`protocol`]: typed messages, session state, and request dispatch
//! - [`service`]: TCP server, connection handler, and client
//! - [`utils`]: cipher, logging, metrics, and timeouts
//! - [`config`]: TOML/env configuration
//!
//! ## Quick Start
//! ```rust,no_run
//! use secure_bank::bank::{MemoryStore, NewAccount, TransactionEngine};
//! use secure_bank::config::BankConfig;
//! use secure_bank::service::BankServer;
//! use secure_bank::utils::crypto::SymmetricCipher;
//! use std::sync::Arc;
//!
//! # async fn run() -> secure_bank::error::Result<()> {
//! let config = BankConfig::default();
//! let cipher = Arc::new(SymmetricCipher::from_passphrase(&config.transport.passphrase));
//! let engine = Arc::new(TransactionEngine::new(Arc::new(MemoryStore::new()), cipher));
//!
//! engine.open_account(NewAccount {
//!     name: "Alice Smith".into(),
//!     account_number: "1234-5678-9012".into(),
//!     opening_balance: "1000.50".parse().unwrap_or_default(),
//!     username: "alice".into(),
//!     secret: "password123".into(),
//! })?;
//!
//! BankServer::bind(&config, engine).await?.run().await
//! # }
//! ```

pub mod bank;
pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod utils;

pub use error::{BankError, Result};
