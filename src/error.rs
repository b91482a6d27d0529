//! # Error Types
//!
//! Error handling for the banking protocol and the account engine.
//!
//! This module defines every error variant that can occur while serving a
//! client, from socket failures up to business-rule rejections.
//!
//! ## Error Categories
//! - **Business errors**: validation, authentication, authorization, missing
//!   accounts, insufficient funds. These become `status=error` responses and
//!   never close the connection.
//! - **Framing errors**: decryption and codec failures. The offending message
//!   cannot be answered, so the connection is closed.
//! - **Transport errors**: I/O failures, timeouts, closed peers.
//! - **Storage errors**: persistence failures. The cause is logged; clients
//!   only ever see a generic message.
//!
//! ## Example Usage
//! ```rust
//! use secure_bank::error::{BankError, Result};
//! use rust_decimal::Decimal;
//!
//! fn ensure_positive(amount: Decimal) -> Result<Decimal> {
//!     if amount <= Decimal::ZERO {
//!         return Err(BankError::Validation("Invalid amount".into()));
//!     }
//!     Ok(amount)
//! }
//!
//! assert!(ensure_positive(Decimal::ONE).is_ok());
//! assert_eq!(
//!     ensure_positive(Decimal::ZERO).unwrap_err().client_message(),
//!     "Invalid amount"
//! );
//! ```

use crate::bank::account::AccountId;
use crate::bank::store::StoreError;
use std::io;
use thiserror::Error;

/// Error message constants shared by the engine, dispatcher and transport.
pub mod constants {
    /// Business rule messages
    pub const ERR_INVALID_CREDENTIALS: &str = "Invalid credentials";
    pub const ERR_INSUFFICIENT_FUNDS: &str = "Insufficient funds";
    pub const ERR_ACCOUNT_NOT_FOUND: &str = "Account not found";
    pub const ERR_INVALID_DEPOSIT: &str = "Invalid deposit amount";
    pub const ERR_INVALID_WITHDRAWAL: &str = "Invalid withdrawal amount";
    pub const ERR_INVALID_ACTION: &str = "Invalid action";

    /// Session messages
    pub const ERR_AUTH_REQUIRED: &str = "Authentication required";
    pub const ERR_FOREIGN_ACCOUNT: &str = "Not authorized for this account";

    /// Persistence failures are reported with this text only
    pub const ERR_OPERATION_FAILED: &str = "Failed to process operation";

    /// Framing errors
    pub const ERR_INVALID_HEADER: &str = "Invalid protocol header";
    pub const ERR_OVERSIZED_PACKET: &str = "Packet exceeds maximum size";
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
    pub const ERR_CONNECTION_TIMEOUT: &str = "Connection timed out (no activity)";
    pub const ERR_TIMEOUT: &str = "Operation timed out";

    /// Cryptographic errors
    pub const ERR_ENCRYPTION_FAILED: &str = "Encryption failed";
    pub const ERR_DECRYPTION_FAILED: &str = "Decryption failed";
    pub const ERR_SHORT_ENVELOPE: &str = "Envelope shorter than one block";
    pub const ERR_MISALIGNED_CIPHERTEXT: &str = "Ciphertext is not block aligned";
    pub const ERR_BAD_PADDING: &str = "Invalid padding";
}

/// BankError is the error type for every protocol and engine operation
#[derive(Error, Debug)]
pub enum BankError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication failed")]
    Authentication,

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("{}: {0}", constants::ERR_DECRYPTION_FAILED)]
    Decryption(&'static str),

    #[error("{}", constants::ERR_ENCRYPTION_FAILED)]
    EncryptionFailure,

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("{}", constants::ERR_INVALID_HEADER)]
    InvalidHeader,

    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("{}: {0} bytes", constants::ERR_OVERSIZED_PACKET)]
    OversizedPacket(usize),

    #[error("{}", constants::ERR_CONNECTION_CLOSED)]
    ConnectionClosed,

    #[error("{}", constants::ERR_CONNECTION_TIMEOUT)]
    ConnectionTimeout,

    #[error("{}", constants::ERR_TIMEOUT)]
    Timeout,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server rejected request: {0}")]
    Remote(String),
}

impl BankError {
    /// Text placed in the `message` field of an error response.
    ///
    /// Storage causes stay in the server log; the peer gets a generic reason.
    pub fn client_message(&self) -> String {
        match self {
            BankError::Validation(msg) | BankError::Authorization(msg) => msg.clone(),
            BankError::Authentication => constants::ERR_INVALID_CREDENTIALS.to_string(),
            BankError::AccountNotFound(_) => constants::ERR_ACCOUNT_NOT_FOUND.to_string(),
            BankError::InsufficientFunds => constants::ERR_INSUFFICIENT_FUNDS.to_string(),
            BankError::Remote(msg) => msg.clone(),
            _ => constants::ERR_OPERATION_FAILED.to_string(),
        }
    }

    /// Whether the error is fatal to the connection it occurred on.
    pub fn closes_connection(&self) -> bool {
        matches!(
            self,
            BankError::Decryption(_)
                | BankError::Codec(_)
                | BankError::Connection(_)
                | BankError::Io(_)
                | BankError::InvalidHeader
                | BankError::UnsupportedVersion(_)
                | BankError::OversizedPacket(_)
                | BankError::ConnectionClosed
                | BankError::ConnectionTimeout
                | BankError::Timeout
        )
    }

    /// Whether the error comes from an envelope that did not decrypt, either
    /// directly or as the cause of a wire decode failure.
    pub fn is_decryption_failure(&self) -> bool {
        match self {
            BankError::Decryption(_) => true,
            BankError::Codec(msg) => msg.starts_with(constants::ERR_DECRYPTION_FAILED),
            _ => false,
        }
    }
}

/// Type alias for Results using BankError
pub type Result<T> = std::result::Result<T, BankError>;
