//! # Banking Core
//!
//! Accounts, credentials, the ledger, and the engine that mutates them.
//!
//! ## Components
//! - **Account**: data model (balances and owner names sealed at rest)
//! - **Store**: persistence trait with atomic units of work, plus `MemoryStore`
//! - **Locks**: per-account mutex registry
//! - **Credential**: Argon2id secret hashing
//! - **Engine**: login, balance, deposit, withdraw

pub mod account;
pub mod credential;
pub mod engine;
pub mod locks;
pub mod store;

pub use account::{AccountId, AccountSummary, NewAccount, TransactionKind, TransactionRecord};
pub use engine::TransactionEngine;
pub use store::{AccountStore, MemoryStore};
