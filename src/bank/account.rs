//! Account, credential and ledger records.

use crate::utils::crypto::SealedValue;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Customer/account identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(u64);

impl AccountId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stored account.
///
/// `name` and `balance` are only ever held encrypted; the engine opens them
/// for the duration of a single operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub account_number: String,
    pub name: SealedValue,
    pub balance: SealedValue,
}

/// Login credential linked to exactly one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    /// Argon2id PHC string (algorithm, params, salt and hash)
    pub secret_hash: String,
    pub account_id: AccountId,
}

/// Public view of an account returned by a successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account_id: AccountId,
    pub username: String,
    pub name: String,
    pub account_number: String,
}

/// Balance query result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceView {
    pub balance: Decimal,
    pub account_number: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Deposit => f.write_str("deposit"),
            TransactionKind::Withdrawal => f.write_str("withdrawal"),
        }
    }
}

/// Append-only ledger entry, written in the same unit of work as the balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Ledger sequence number, assigned by the store on commit. Zero until then.
    pub id: u64,
    pub account_id: AccountId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn new(account_id: AccountId, kind: TransactionKind, amount: Decimal) -> Self {
        Self {
            id: 0,
            account_id,
            kind,
            amount,
            timestamp: Utc::now(),
        }
    }
}

/// Input for provisioning a new account and its login
#[derive(Clone)]
pub struct NewAccount {
    pub name: String,
    pub account_number: String,
    pub opening_balance: Decimal,
    pub username: String,
    pub secret: String,
}

impl fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccount")
            .field("account_number", &self.account_number)
            .field("opening_balance", &self.opening_balance)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
