//! # Account Store
//!
//! Persistence boundary for accounts, credentials and the transaction ledger.
//!
//! Reads go straight through [`AccountStore`]. Writes that must land together
//! (a balance update and its ledger entry) go through a [`StoreTransaction`]
//! obtained from [`AccountStore::begin`]: staged changes become visible only on
//! [`StoreTransaction::commit`], and dropping an uncommitted transaction
//! discards them.
//!
//! [`MemoryStore`] is the in-process implementation used by the server and the
//! tests. A relational backend would map `begin`/`commit` onto a database
//! transaction.

use crate::bank::account::{Account, AccountId, Credential, TransactionRecord};
use crate::utils::crypto::SealedValue;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::debug;

const ERR_STATE_POISONED: &str = "store state lock poisoned";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Username already registered: {0}")]
    DuplicateUsername(String),

    #[error("Account number already registered: {0}")]
    DuplicateAccountNumber(String),

    #[error("Account {0} does not exist")]
    MissingAccount(AccountId),

    #[error("Backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Everything needed to register an account; the store assigns the id
#[derive(Debug, Clone)]
pub struct AccountDraft {
    pub account_number: String,
    pub name: SealedValue,
    pub balance: SealedValue,
    pub username: String,
    pub secret_hash: String,
}

/// Durable state owned by the store
pub trait AccountStore: Send + Sync {
    fn find_account(&self, id: AccountId) -> StoreResult<Option<Account>>;

    fn find_credential(&self, username: &str) -> StoreResult<Option<Credential>>;

    /// Register an account together with its credential
    fn insert_account(&self, draft: AccountDraft) -> StoreResult<AccountId>;

    /// Ledger entries for one account, oldest first
    fn transactions(&self, id: AccountId) -> StoreResult<Vec<TransactionRecord>>;

    /// Open a unit of work
    fn begin(&self) -> StoreResult<Box<dyn StoreTransaction + '_>>;
}

/// Unit of work: either every staged write is applied, or none is
pub trait StoreTransaction {
    fn save_account(&mut self, account: &Account) -> StoreResult<()>;

    fn append_transaction(&mut self, record: TransactionRecord) -> StoreResult<()>;

    fn commit(self: Box<Self>) -> StoreResult<()>;
}

#[derive(Debug, Default)]
struct MemoryState {
    accounts: HashMap<AccountId, Account>,
    credentials: HashMap<String, Credential>,
    ledger: Vec<TransactionRecord>,
    next_account_id: u64,
    next_record_id: u64,
}

/// Thread-safe in-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend(ERR_STATE_POISONED.to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend(ERR_STATE_POISONED.to_string()))
    }

    /// Number of ledger entries across all accounts
    pub fn ledger_len(&self) -> StoreResult<usize> {
        Ok(self.read()?.ledger.len())
    }
}

impl AccountStore for MemoryStore {
    fn find_account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        Ok(self.read()?.accounts.get(&id).cloned())
    }

    fn find_credential(&self, username: &str) -> StoreResult<Option<Credential>> {
        Ok(self.read()?.credentials.get(username).cloned())
    }

    fn insert_account(&self, draft: AccountDraft) -> StoreResult<AccountId> {
        let mut state = self.write()?;

        if state.credentials.contains_key(&draft.username) {
            return Err(StoreError::DuplicateUsername(draft.username));
        }
        if state
            .accounts
            .values()
            .any(|a| a.account_number == draft.account_number)
        {
            return Err(StoreError::DuplicateAccountNumber(draft.account_number));
        }

        state.next_account_id += 1;
        let id = AccountId::new(state.next_account_id);

        state.accounts.insert(
            id,
            Account {
                id,
                account_number: draft.account_number,
                name: draft.name,
                balance: draft.balance,
            },
        );
        state.credentials.insert(
            draft.username.clone(),
            Credential {
                username: draft.username,
                secret_hash: draft.secret_hash,
                account_id: id,
            },
        );

        debug!(account_id = %id, "Account registered");
        Ok(id)
    }

    fn transactions(&self, id: AccountId) -> StoreResult<Vec<TransactionRecord>> {
        Ok(self
            .read()?
            .ledger
            .iter()
            .filter(|r| r.account_id == id)
            .cloned()
            .collect())
    }

    fn begin(&self) -> StoreResult<Box<dyn StoreTransaction + '_>> {
        Ok(Box::new(MemoryTransaction {
            store: self,
            accounts: Vec::new(),
            records: Vec::new(),
        }))
    }
}

/// Staged writes against a [`MemoryStore`]
struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    accounts: Vec<Account>,
    records: Vec<TransactionRecord>,
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn save_account(&mut self, account: &Account) -> StoreResult<()> {
        self.accounts.push(account.clone());
        Ok(())
    }

    fn append_transaction(&mut self, record: TransactionRecord) -> StoreResult<()> {
        self.records.push(record);
        Ok(())
    }

    fn commit(self: Box<Self>) -> StoreResult<()> {
        let store = self.store;
        let mut state = store.write()?;

        // Validate everything before touching state so a failure applies nothing
        let touched = self
            .accounts
            .iter()
            .map(|a| a.id)
            .chain(self.records.iter().map(|r| r.account_id));
        for id in touched {
            if !state.accounts.contains_key(&id) {
                return Err(StoreError::MissingAccount(id));
            }
        }

        let MemoryTransaction {
            accounts, records, ..
        } = *self;
        for account in accounts {
            state.accounts.insert(account.id, account);
        }
        for mut record in records {
            state.next_record_id += 1;
            record.id = state.next_record_id;
            state.ledger.push(record);
        }
        Ok(())
    }
}
