//! # Transaction Engine
//!
//! Business operations over an [`AccountStore`]: login, balance queries,
//! deposits and withdrawals, plus account provisioning.
//!
//! ## Mutation Cycle
//! Deposits and withdrawals run the following steps while holding the
//! account's lock from [`AccountLocks`]:
//!
//! ```text
//! load -> decrypt balance -> validate -> compute -> encrypt -> begin
//!      -> save_account + append_transaction -> commit -> unlock
//! ```
//!
//! A failed commit leaves neither the new balance nor the ledger entry behind.
//! Mutations on other accounts proceed in parallel.
//!
//! All methods are blocking (password hashing, std locks); async callers run
//! them on the blocking pool.

use crate::bank::account::{
    Account, AccountId, AccountSummary, BalanceView, NewAccount, TransactionKind,
    TransactionRecord,
};
use crate::bank::credential;
use crate::bank::locks::AccountLocks;
use crate::bank::store::{AccountDraft, AccountStore};
use crate::error::{constants, BankError, Result};
use crate::utils::crypto::SymmetricCipher;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

pub struct TransactionEngine {
    store: Arc<dyn AccountStore>,
    cipher: Arc<SymmetricCipher>,
    locks: AccountLocks,
}

impl TransactionEngine {
    pub fn new(store: Arc<dyn AccountStore>, cipher: Arc<SymmetricCipher>) -> Self {
        Self {
            store,
            cipher,
            locks: AccountLocks::new(),
        }
    }

    /// Cipher used for data at rest, shared with the wire codec
    pub fn cipher(&self) -> Arc<SymmetricCipher> {
        self.cipher.clone()
    }

    /// Register an account and its login.
    ///
    /// Stands in for the seed-data import: the secret is hashed, the owner name
    /// and opening balance are encrypted before they reach the store.
    #[instrument(skip(self, new), fields(account_number = %new.account_number, username = %new.username))]
    pub fn open_account(&self, new: NewAccount) -> Result<AccountSummary> {
        if new.opening_balance < Decimal::ZERO {
            return Err(BankError::Validation(
                "Opening balance cannot be negative".to_string(),
            ));
        }
        for (field, value) in [
            ("name", &new.name),
            ("account_number", &new.account_number),
            ("username", &new.username),
            ("secret", &new.secret),
        ] {
            if value.trim().is_empty() {
                return Err(BankError::Validation(format!("Field '{field}' cannot be empty")));
            }
        }

        let draft = AccountDraft {
            account_number: new.account_number.clone(),
            name: self.cipher.seal_text(&new.name)?,
            balance: self.cipher.seal_text(&new.opening_balance.to_string())?,
            username: new.username.clone(),
            secret_hash: credential::hash_secret(&new.secret)?,
        };

        let account_id = self.store.insert_account(draft).map_err(|e| {
            warn!(error = %e, "Account registration rejected");
            BankError::Validation(e.to_string())
        })?;

        info!(%account_id, "Account opened");
        Ok(AccountSummary {
            account_id,
            username: new.username,
            name: new.name,
            account_number: new.account_number,
        })
    }

    /// Authenticate a customer.
    ///
    /// Unknown usernames and wrong secrets produce the same error.
    #[instrument(skip(self, secret))]
    pub fn login(&self, username: &str, secret: &str) -> Result<AccountSummary> {
        let Some(credential) = self.store.find_credential(username)? else {
            credential::verify_against_decoy(secret);
            info!("Login rejected");
            return Err(BankError::Authentication);
        };

        if !credential::verify_secret(secret, &credential.secret_hash) {
            info!("Login rejected");
            return Err(BankError::Authentication);
        }

        let account = self.load(credential.account_id)?;
        let name = self.cipher.open_text(&account.name).map_err(|e| {
            error!(account_id = %account.id, error = %e, "Stored owner name is unreadable");
            corrupt(account.id)
        })?;

        info!(account_id = %account.id, "Login accepted");
        Ok(AccountSummary {
            account_id: account.id,
            username: credential.username,
            name,
            account_number: account.account_number,
        })
    }

    /// Current balance. Read-only, writes no ledger entry.
    #[instrument(skip(self))]
    pub fn get_balance(&self, account_id: AccountId) -> Result<BalanceView> {
        let account = self.load(account_id)?;
        let balance = self.open_balance(&account)?;
        Ok(BalanceView {
            balance,
            account_number: account.account_number,
        })
    }

    #[instrument(skip(self))]
    pub fn deposit(&self, account_id: AccountId, amount: Decimal) -> Result<Decimal> {
        self.mutate(account_id, TransactionKind::Deposit, amount)
    }

    #[instrument(skip(self))]
    pub fn withdraw(&self, account_id: AccountId, amount: Decimal) -> Result<Decimal> {
        self.mutate(account_id, TransactionKind::Withdrawal, amount)
    }

    /// Ledger entries for an account, oldest first
    pub fn transactions(&self, account_id: AccountId) -> Result<Vec<TransactionRecord>> {
        self.load(account_id)?;
        Ok(self.store.transactions(account_id)?)
    }

    fn mutate(&self, account_id: AccountId, kind: TransactionKind, amount: Decimal) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            let reason = match kind {
                TransactionKind::Deposit => constants::ERR_INVALID_DEPOSIT,
                TransactionKind::Withdrawal => constants::ERR_INVALID_WITHDRAWAL,
            };
            return Err(BankError::Validation(reason.to_string()));
        }

        // Only known accounts get a lock entry; reload under the lock for the
        // authoritative balance.
        self.load(account_id)?;
        let lock = self.locks.handle(account_id);
        let _guard = lock.lock();

        let mut account = self.load(account_id)?;
        let balance = self.open_balance(&account)?;

        let new_balance = match kind {
            TransactionKind::Deposit => balance
                .checked_add(amount)
                .ok_or_else(|| BankError::Validation(constants::ERR_INVALID_DEPOSIT.to_string()))?,
            TransactionKind::Withdrawal => {
                if amount > balance {
                    info!(%account_id, %amount, "Withdrawal exceeds balance");
                    return Err(BankError::InsufficientFunds);
                }
                balance - amount
            }
        };

        account.balance = self.cipher.seal_text(&new_balance.to_string())?;
        let record = TransactionRecord::new(account_id, kind, amount);

        let committed = self.store.begin().and_then(|mut tx| {
            tx.save_account(&account)?;
            tx.append_transaction(record)?;
            tx.commit()
        });
        if let Err(e) = committed {
            error!(%account_id, %kind, error = %e, "Mutation rolled back");
            return Err(e.into());
        }

        info!(%account_id, %kind, %amount, "Mutation committed");
        Ok(new_balance)
    }

    fn load(&self, account_id: AccountId) -> Result<Account> {
        self.store
            .find_account(account_id)?
            .ok_or(BankError::AccountNotFound(account_id))
    }

    fn open_balance(&self, account: &Account) -> Result<Decimal> {
        let text = self.cipher.open_text(&account.balance).map_err(|e| {
            error!(account_id = %account.id, error = %e, "Stored balance is unreadable");
            corrupt(account.id)
        })?;

        match Decimal::from_str(&text) {
            Ok(balance) if balance >= Decimal::ZERO => Ok(balance),
            _ => {
                error!(account_id = %account.id, "Stored balance is not a non-negative decimal");
                Err(corrupt(account.id))
            }
        }
    }
}

fn corrupt(account_id: AccountId) -> BankError {
    BankError::Storage(crate::bank::store::StoreError::Backend(format!(
        "account {account_id} holds corrupt data"
    )))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::bank::account::Credential;
    use crate::bank::store::{MemoryStore, StoreError, StoreResult, StoreTransaction};
    use rust_decimal_macros::dec;

    fn alice() -> NewAccount {
        NewAccount {
            name: "Alice Smith".into(),
            account_number: "ACC-1001".into(),
            opening_balance: dec!(1000.50),
            username: "alice".into(),
            secret: "password123".into(),
        }
    }

    fn engine_with(store: Arc<dyn AccountStore>) -> TransactionEngine {
        TransactionEngine::new(store, Arc::new(SymmetricCipher::from_passphrase("test")))
    }

    fn setup() -> (Arc<MemoryStore>, TransactionEngine, AccountId) {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_with(store.clone());
        let id = engine.open_account(alice()).unwrap().account_id;
        (store, engine, id)
    }

    #[test]
    fn test_balance_is_encrypted_at_rest() {
        let (store, engine, id) = setup();
        let account = store.find_account(id).unwrap().unwrap();
        assert!(!account.balance.as_str().contains("1000.50"));
        assert!(!account.name.as_str().contains("Alice"));
        assert_eq!(engine.get_balance(id).unwrap().balance, dec!(1000.50));
    }

    #[test]
    fn test_secret_is_not_stored_in_clear() {
        let (store, _engine, _id) = setup();
        let credential = store.find_credential("alice").unwrap().unwrap();
        assert!(!credential.secret_hash.contains("password123"));
    }

    #[test]
    fn test_login_success_and_uniform_failure() {
        let (_store, engine, id) = setup();
        let summary = engine.login("alice", "password123").unwrap();
        assert_eq!(summary.account_id, id);
        assert_eq!(summary.name, "Alice Smith");
        assert_eq!(summary.account_number, "ACC-1001");

        let wrong = engine.login("alice", "nope").unwrap_err();
        let unknown = engine.login("mallory", "password123").unwrap_err();
        assert!(matches!(wrong, BankError::Authentication));
        assert!(matches!(unknown, BankError::Authentication));
        assert_eq!(wrong.client_message(), unknown.client_message());
    }

    #[test]
    fn test_deposit_then_overdraw_scenario() {
        let (store, engine, id) = setup();
        assert_eq!(engine.deposit(id, dec!(100.00)).unwrap(), dec!(1100.50));

        let err = engine.withdraw(id, dec!(2000.00)).unwrap_err();
        assert!(matches!(err, BankError::InsufficientFunds));
        assert_eq!(engine.get_balance(id).unwrap().balance, dec!(1100.50));

        let ledger = store.transactions(id).unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].kind, TransactionKind::Deposit);
        assert_eq!(ledger[0].amount, dec!(100.00));
    }

    #[test]
    fn test_withdraw_to_exactly_zero() {
        let (_store, engine, id) = setup();
        assert_eq!(engine.withdraw(id, dec!(1000.50)).unwrap(), Decimal::ZERO);
        assert!(matches!(
            engine.withdraw(id, dec!(0.01)),
            Err(BankError::InsufficientFunds)
        ));
    }

    #[test]
    fn test_non_positive_amounts_rejected_without_mutation() {
        let (store, engine, id) = setup();
        for amount in [dec!(0), dec!(-5)] {
            assert!(matches!(engine.deposit(id, amount), Err(BankError::Validation(_))));
            assert!(matches!(engine.withdraw(id, amount), Err(BankError::Validation(_))));
        }
        assert_eq!(engine.get_balance(id).unwrap().balance, dec!(1000.50));
        assert_eq!(store.ledger_len().unwrap(), 0);
    }

    #[test]
    fn test_unknown_account() {
        let (_store, engine, _id) = setup();
        let ghost = AccountId::new(404);
        assert!(matches!(engine.get_balance(ghost), Err(BankError::AccountNotFound(_))));
        assert!(matches!(
            engine.deposit(ghost, dec!(1)),
            Err(BankError::AccountNotFound(_))
        ));
        assert!(matches!(
            engine.withdraw(ghost, dec!(1)),
            Err(BankError::AccountNotFound(_))
        ));
    }

    #[test]
    fn test_unknown_accounts_never_enter_lock_registry() {
        let (_store, engine, id) = setup();
        for n in 1000..1100 {
            let _ = engine.deposit(AccountId::new(n), dec!(1));
            let _ = engine.withdraw(AccountId::new(n), dec!(1));
        }
        assert!(engine.locks.is_empty());

        engine.deposit(id, dec!(1)).unwrap();
        assert_eq!(engine.locks.len(), 1);
    }

    #[test]
    fn test_open_account_validation() {
        let (_store, engine, _id) = setup();

        let mut negative = alice();
        negative.username = "neg".into();
        negative.account_number = "ACC-2".into();
        negative.opening_balance = dec!(-1);
        assert!(matches!(engine.open_account(negative), Err(BankError::Validation(_))));

        assert!(matches!(engine.open_account(alice()), Err(BankError::Validation(_))));
    }

    #[test]
    fn test_concurrent_withdraw_and_deposit_lose_no_update() {
        let (store, engine, _) = setup();
        let engine = Arc::new(engine);
        let id = engine
            .open_account(NewAccount {
                name: "Bob".into(),
                account_number: "ACC-2002".into(),
                opening_balance: dec!(1000),
                username: "bob".into(),
                secret: "pw".into(),
            })
            .unwrap()
            .account_id;

        // Five rounds of -100/+50 never dip below 750, whatever the interleaving
        for _ in 0..5 {
            let withdraw = {
                let engine = engine.clone();
                std::thread::spawn(move || engine.withdraw(id, dec!(100)))
            };
            let deposit = {
                let engine = engine.clone();
                std::thread::spawn(move || engine.deposit(id, dec!(50)))
            };
            withdraw.join().unwrap().unwrap();
            deposit.join().unwrap().unwrap();
        }

        assert_eq!(engine.get_balance(id).unwrap().balance, dec!(750));
        assert_eq!(store.transactions(id).unwrap().len(), 10);
    }

    /// Store whose units of work always fail to commit
    struct FailingCommitStore {
        inner: MemoryStore,
    }

    struct FailingTransaction;

    impl StoreTransaction for FailingTransaction {
        fn save_account(&mut self, _account: &Account) -> StoreResult<()> {
            Ok(())
        }

        fn append_transaction(&mut self, _record: TransactionRecord) -> StoreResult<()> {
            Ok(())
        }

        fn commit(self: Box<Self>) -> StoreResult<()> {
            Err(StoreError::Backend("simulated commit failure".into()))
        }
    }

    impl AccountStore for FailingCommitStore {
        fn find_account(&self, id: AccountId) -> StoreResult<Option<Account>> {
            self.inner.find_account(id)
        }

        fn find_credential(&self, username: &str) -> StoreResult<Option<Credential>> {
            self.inner.find_credential(username)
        }

        fn insert_account(&self, draft: AccountDraft) -> StoreResult<AccountId> {
            self.inner.insert_account(draft)
        }

        fn transactions(&self, id: AccountId) -> StoreResult<Vec<TransactionRecord>> {
            self.inner.transactions(id)
        }

        fn begin(&self) -> StoreResult<Box<dyn StoreTransaction + '_>> {
            Ok(Box::new(FailingTransaction))
        }
    }

    #[test]
    fn test_failed_commit_leaves_no_partial_state() {
        let store = Arc::new(FailingCommitStore {
            inner: MemoryStore::new(),
        });
        let engine = engine_with(store.clone());
        let id = engine.open_account(alice()).unwrap().account_id;

        let err = engine.deposit(id, dec!(10)).unwrap_err();
        assert!(matches!(err, BankError::Storage(_)));
        assert_eq!(err.client_message(), constants::ERR_OPERATION_FAILED);

        assert_eq!(engine.get_balance(id).unwrap().balance, dec!(1000.50));
        assert!(engine.transactions(id).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_balance_is_a_storage_error() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_with(store.clone());
        let id = engine.open_account(alice()).unwrap().account_id;

        // Re-seal the balance under a different key
        let other = SymmetricCipher::from_passphrase("other key");
        let mut account = store.find_account(id).unwrap().unwrap();
        account.balance = other.seal_text("1000.50").unwrap();
        let mut tx = store.begin().unwrap();
        tx.save_account(&account).unwrap();
        tx.commit().unwrap();

        let err = engine.deposit(id, dec!(1)).unwrap_err();
        assert!(matches!(err, BankError::Storage(_)));
        assert_eq!(store.ledger_len().unwrap(), 0);
    }
}
