//! In-memory caches of a personal double-entry ledger.
//!
//! Four caches make up a [`Ledger`]: accounts, transactions (indexed by
//! value date and by clearing date), recurring operations and month-end
//! balances. They are filled in bulk from a [`Store`], mutated in memory and
//! written back in bulk when dirty.

use std::collections::BTreeMap;

pub use accounts::{Account, AccountCache, AccountKind};
pub use balances::{BalanceCache, BalanceSource};
pub use error::LedgerError;
pub use ids::{AccountId, IdGenerator, Identifier, PermanentId, TransactionId};
pub use money::MoneyCents;
pub use month::Month;
pub use permanent_cache::{LoadContext, PermanentCache};
pub use permanents::{Permanent, PermanentKind};
pub use records::{AccountRecord, BalanceRecord, PermanentRecord, TransactionRecord};
pub use store::{CsvStore, SqliteStore, Store};
pub use tracking::{Cache, SaveState};
pub use transaction_index::{Direction, TransactionIndex};
pub use transactions::{ClearingMonth, Transaction};

mod accounts;
mod balances;
mod error;
mod ids;
mod money;
mod month;
mod permanent_cache;
mod permanents;
mod records;
mod store;
mod tracking;
mod transaction_index;
mod transactions;

pub type ResultLedger<T> = Result<T, LedgerError>;

#[derive(Debug)]
pub struct Ledger {
    pub accounts: AccountCache,
    pub transactions: TransactionIndex,
    pub permanents: PermanentCache,
    pub balances: BalanceCache,
}

impl Ledger {
    /// Return a builder for `Ledger`. Help to build the struct.
    pub fn builder() -> LedgerBuilder {
        LedgerBuilder::default()
    }

    /// `true` if any cache changed since the last load or save.
    pub fn must_be_saved(&self) -> bool {
        self.accounts.must_be_saved()
            || self.permanents.must_be_saved()
            || self.transactions.must_be_saved()
            || self.balances.must_be_saved()
    }

    /// Writes every dirty cache, accounts first so references always resolve
    /// on reload. Stops at the first failure; caches written before it stay
    /// clean, the others stay dirty.
    pub async fn save<S: Store>(&mut self, store: &S) -> ResultLedger<()> {
        if self.accounts.must_be_saved() {
            store.save_accounts(&self.accounts).await?;
            self.accounts.set_saved();
        }
        if self.permanents.must_be_saved() {
            store.save_permanents(&self.permanents).await?;
            self.permanents.set_saved();
        }
        if self.transactions.must_be_saved() {
            store.save_transactions(&self.transactions).await?;
            self.transactions.set_saved();
        }
        if self.balances.must_be_saved() {
            store.save_balances(&self.balances).await?;
            self.balances.set_saved();
        }
        tracing::info!("ledger saved");
        Ok(())
    }

    /// Adds a transaction after checking both accounts exist. Cached balances
    /// from its month on are dropped.
    pub fn add_transaction(&mut self, transaction: Transaction) -> ResultLedger<Transaction> {
        check_accounts(&self.accounts, [transaction.debit, transaction.credit])?;
        let stored = self.transactions.add(transaction)?;
        self.balances.invalidate_from(stored.month());
        Ok(stored)
    }

    pub fn remove_transaction(&mut self, id: TransactionId) -> ResultLedger<Transaction> {
        let removed = self.transactions.remove(id)?;
        self.balances.invalidate_from(removed.month());
        Ok(removed)
    }

    /// Generates the recurring transactions due in `month` and stores them.
    ///
    /// Amounts are all resolved and every account checked before the first
    /// insertion, so a balance-clearing operation reads the balance as it was
    /// before the run and a failing run stores nothing.
    pub fn generate_recurring(&mut self, month: Month) -> ResultLedger<Vec<Transaction>> {
        let drafts = self.permanents.generate(month, &self.balances)?;
        for draft in &drafts {
            check_accounts(&self.accounts, [draft.debit, draft.credit])?;
        }
        let mut stored = Vec::with_capacity(drafts.len());
        for draft in drafts {
            stored.push(self.add_transaction(draft)?);
        }
        tracing::info!("generated {} recurring transactions for {month}", stored.len());
        Ok(stored)
    }

    /// Recomputes the month-end balance of every account for `month`.
    ///
    /// The credited account gains the amount, the debited one loses it.
    /// Accounts without any movement up to `month` get no entry.
    pub fn compute_balances(&mut self, month: Month) -> ResultLedger<usize> {
        let mut totals: BTreeMap<AccountId, MoneyCents> = BTreeMap::new();
        for transaction in self.transactions.get_all_to(month) {
            let overflow = || {
                LedgerError::InvalidAmount(format!(
                    "balance overflow on transaction {:?}",
                    transaction.id
                ))
            };
            let credit = totals.entry(transaction.credit).or_default();
            *credit = credit.checked_add(transaction.amount).ok_or_else(overflow)?;
            let debit = totals.entry(transaction.debit).or_default();
            *debit = debit.checked_sub(transaction.amount).ok_or_else(overflow)?;
        }
        for (&account, &amount) in &totals {
            self.balances.set(month, account, amount);
        }
        tracing::debug!("computed {} balances for {month}", totals.len());
        Ok(totals.len())
    }
}

fn check_accounts(accounts: &AccountCache, ids: [AccountId; 2]) -> ResultLedger<()> {
    match ids.into_iter().find(|&id| accounts.get(id).is_none()) {
        Some(unknown) => Err(LedgerError::UnknownAccount(unknown.raw())),
        None => Ok(()),
    }
}

#[derive(Debug, Default)]
pub struct LedgerBuilder {
    current_month: Option<Month>,
}

impl LedgerBuilder {
    /// Fix the month the transaction index treats as the present.
    pub fn current_month(mut self, month: Month) -> LedgerBuilder {
        self.current_month = Some(month);
        self
    }

    fn transactions(&self) -> TransactionIndex {
        match self.current_month {
            Some(month) => TransactionIndex::with_current_month(month),
            None => TransactionIndex::new(),
        }
    }

    /// Construct an empty `Ledger`.
    pub fn build(self) -> Ledger {
        Ledger {
            accounts: AccountCache::new(),
            transactions: self.transactions(),
            permanents: PermanentCache::new(),
            balances: BalanceCache::new(),
        }
    }

    /// Construct `Ledger` from the content of `store`. Accounts are loaded
    /// first, every other cache is checked against them.
    pub async fn load<S: Store>(self, store: &S) -> ResultLedger<Ledger> {
        let accounts = AccountCache::load(store.load_accounts().await?)?;
        let mut transactions = self.transactions();
        transactions.load(store.load_transactions().await?, &accounts)?;
        let permanents = PermanentCache::load(store.load_permanents().await?)?;
        for permanent in permanents.get_all()? {
            check_accounts(&accounts, [permanent.debit, permanent.credit])?;
        }
        let balances = BalanceCache::load(store.load_balances().await?, &accounts)?;

        tracing::info!(
            "ledger loaded: {} accounts, {} transactions, {} permanents, {} balances",
            accounts.len(),
            transactions.len(),
            permanents.len(),
            balances.len()
        );
        Ok(Ledger {
            accounts,
            transactions,
            permanents,
            balances,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn month(y: i32, m: u32) -> Month {
        Month::new(y, m).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ledger() -> Ledger {
        let mut ledger = Ledger::builder().current_month(month(2024, 3)).build();
        ledger.accounts.add(Account::bank("Checking", None)).unwrap();
        ledger.accounts.add(Account::budget("Rent")).unwrap();
        ledger.accounts.add(Account::budget("Savings")).unwrap();
        ledger
    }

    #[test]
    fn build_is_clean_until_mutated() {
        let mut ledger = Ledger::builder().current_month(month(2024, 3)).build();
        assert!(!ledger.must_be_saved());
        assert_eq!(ledger.transactions.current_month(), month(2024, 3));
        ledger.accounts.add(Account::budget("Food")).unwrap();
        assert!(ledger.must_be_saved());
    }

    #[test]
    fn add_transaction_checks_accounts() {
        let mut ledger = ledger();
        let tx = Transaction::new(
            date(2024, 1, 2),
            AccountId::new(0),
            AccountId::new(9),
            MoneyCents::new(10),
        );
        assert_eq!(
            ledger.add_transaction(tx).unwrap_err(),
            LedgerError::UnknownAccount(9)
        );
        assert!(ledger.transactions.is_empty());
    }

    #[test]
    fn compute_balances_accumulates_history() {
        let mut ledger = ledger();
        let checking = AccountId::new(0);
        let rent = AccountId::new(1);
        ledger
            .add_transaction(Transaction::new(
                date(2024, 1, 5),
                rent,
                checking,
                MoneyCents::new(5000),
            ))
            .unwrap();
        ledger
            .add_transaction(Transaction::new(
                date(2024, 2, 5),
                checking,
                rent,
                MoneyCents::new(1200),
            ))
            .unwrap();
        ledger
            .add_transaction(Transaction::new(
                date(2024, 3, 5),
                checking,
                rent,
                MoneyCents::new(99),
            ))
            .unwrap();

        assert_eq!(ledger.compute_balances(month(2024, 2)).unwrap(), 2);
        assert_eq!(
            ledger.balances.get(month(2024, 2), checking),
            Some(MoneyCents::new(3800))
        );
        assert_eq!(
            ledger.balances.get(month(2024, 2), rent),
            Some(MoneyCents::new(-3800))
        );

        // A change in February makes the cached February balance stale.
        ledger.remove_transaction(TransactionId::new(1)).unwrap();
        assert_eq!(ledger.balances.get(month(2024, 2), checking), None);
    }

    #[test]
    fn generate_recurring_assigns_ids() {
        let mut ledger = ledger();
        let checking = AccountId::new(0);
        let savings = AccountId::new(2);
        ledger
            .add_transaction(Transaction::new(
                date(2024, 1, 1),
                savings,
                checking,
                MoneyCents::new(700),
            ))
            .unwrap();
        ledger.compute_balances(month(2024, 1)).unwrap();

        let sweep = Permanent::new("Sweep", checking, savings, PermanentKind::BalanceClearing)
            .with_day(month(2024, 1), 31)
            .reconciled();
        ledger.permanents.add(sweep).unwrap();

        let generated = ledger.generate_recurring(month(2024, 1)).unwrap();
        assert_eq!(generated.len(), 1);
        assert_eq!(generated[0].id, Some(TransactionId::new(1)));
        assert_eq!(generated[0].amount, MoneyCents::new(700));
        assert_eq!(generated[0].clearing_date, Some(date(2024, 1, 31)));
        assert_eq!(ledger.transactions.len(), 2);

        ledger.compute_balances(month(2024, 1)).unwrap();
        assert_eq!(
            ledger.balances.get(month(2024, 1), checking),
            Some(MoneyCents::ZERO)
        );
        // Nothing left to clear.
        assert!(ledger.generate_recurring(month(2024, 1)).unwrap().is_empty());
    }

    #[test]
    fn generate_recurring_with_unknown_account_stores_nothing() {
        let mut ledger = ledger();
        let checking = AccountId::new(0);
        let rent = AccountId::new(1);
        ledger
            .add_transaction(Transaction::new(
                date(2024, 1, 1),
                rent,
                checking,
                MoneyCents::new(700),
            ))
            .unwrap();
        ledger.compute_balances(month(2024, 1)).unwrap();
        ledger.transactions.set_saved();
        ledger.balances.set_saved();

        let fixed = |name: &str, credit: AccountId| {
            Permanent::new(
                name,
                checking,
                credit,
                PermanentKind::Fixed {
                    amounts: BTreeMap::from([(month(2024, 1), MoneyCents::new(100))]),
                },
            )
            .with_day(month(2024, 1), 10)
        };
        ledger.permanents.add(fixed("Rent", rent)).unwrap();
        ledger
            .permanents
            .add(fixed("Gone", AccountId::new(99)))
            .unwrap();

        assert_eq!(
            ledger.generate_recurring(month(2024, 1)).unwrap_err(),
            LedgerError::UnknownAccount(99)
        );
        assert_eq!(ledger.transactions.len(), 1);
        assert!(!ledger.transactions.must_be_saved());
        assert_eq!(
            ledger.balances.get(month(2024, 1), checking),
            Some(MoneyCents::new(700))
        );
        assert!(!ledger.balances.must_be_saved());
    }
}
