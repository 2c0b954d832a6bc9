//! Bulk persistence of the caches.
//!
//! A store only moves flat records around: loads return every record of one
//! kind, saves replace every record of one kind with the cache enumeration.

use crate::{
    AccountCache, BalanceCache, PermanentCache, ResultLedger, TransactionIndex,
    records::{AccountRecord, BalanceRecord, PermanentRecord, TransactionRecord},
};

pub use csv_store::CsvStore;
pub use sqlite_store::SqliteStore;

mod csv_store;
mod sqlite_store;

#[allow(async_fn_in_trait)]
pub trait Store {
    async fn load_accounts(&self) -> ResultLedger<Vec<AccountRecord>>;

    async fn load_transactions(&self) -> ResultLedger<Vec<TransactionRecord>>;

    /// Records come back in the order they were saved, dependencies first.
    async fn load_permanents(&self) -> ResultLedger<Vec<PermanentRecord>>;

    async fn load_balances(&self) -> ResultLedger<Vec<BalanceRecord>>;

    async fn save_accounts(&self, accounts: &AccountCache) -> ResultLedger<()>;

    async fn save_transactions(&self, transactions: &TransactionIndex) -> ResultLedger<()>;

    async fn save_permanents(&self, permanents: &PermanentCache) -> ResultLedger<()>;

    async fn save_balances(&self, balances: &BalanceCache) -> ResultLedger<()>;
}

pub(crate) fn account_records(accounts: &AccountCache) -> ResultLedger<Vec<AccountRecord>> {
    accounts.get_all().map(AccountRecord::try_from).collect()
}

pub(crate) fn transaction_records(
    transactions: &TransactionIndex,
) -> ResultLedger<Vec<TransactionRecord>> {
    transactions
        .get_all()
        .map(TransactionRecord::try_from)
        .collect()
}

/// Dependency order, so that a load can resolve every record in one pass.
pub(crate) fn permanent_records(permanents: &PermanentCache) -> ResultLedger<Vec<PermanentRecord>> {
    permanents
        .get_all()?
        .into_iter()
        .map(PermanentRecord::try_from)
        .collect()
}

pub(crate) fn balance_records(balances: &BalanceCache) -> Vec<BalanceRecord> {
    balances.get_all().map(BalanceRecord::from).collect()
}
