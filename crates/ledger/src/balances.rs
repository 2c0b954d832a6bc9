//! Cached month-end balances, keyed by month and account.

use std::collections::BTreeMap;

use crate::{
    AccountCache, AccountId, Cache, LedgerError, MoneyCents, Month, ResultLedger, SaveState,
    records::BalanceRecord,
};

/// Anything able to report the balance of an account for a month.
pub trait BalanceSource {
    fn balance(&self, month: Month, account: AccountId) -> Option<MoneyCents>;
}

#[derive(Debug, Default)]
pub struct BalanceCache {
    entries: BTreeMap<(Month, AccountId), MoneyCents>,
    state: SaveState,
}

impl BalanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a clean cache; every record must reference a known account.
    pub fn load<I>(records: I, accounts: &AccountCache) -> ResultLedger<Self>
    where
        I: IntoIterator<Item = BalanceRecord>,
    {
        let mut cache = Self::new();
        for record in records {
            let account = AccountId::new(record.account);
            if accounts.get(account).is_none() {
                return Err(LedgerError::UnknownAccount(record.account));
            }
            cache
                .entries
                .insert((record.month, account), MoneyCents::new(record.amount));
        }
        tracing::debug!("loaded {} balances", cache.entries.len());
        Ok(cache)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, month: Month, account: AccountId) -> Option<MoneyCents> {
        self.entries.get(&(month, account)).copied()
    }

    pub fn set(&mut self, month: Month, account: AccountId, amount: MoneyCents) {
        self.entries.insert((month, account), amount);
        self.state.mark_dirty();
    }

    pub fn remove(&mut self, month: Month, account: AccountId) -> ResultLedger<MoneyCents> {
        let removed = self
            .entries
            .remove(&(month, account))
            .ok_or_else(|| LedgerError::KeyNotFound(format!("balance {month}/{account}")))?;
        self.state.mark_dirty();
        Ok(removed)
    }

    /// Every entry, month then account order.
    pub fn get_all(&self) -> impl Iterator<Item = (Month, AccountId, MoneyCents)> + '_ {
        self.entries
            .iter()
            .map(|(&(month, account), &amount)| (month, account, amount))
    }

    pub fn get_month(&self, month: Month) -> impl Iterator<Item = (AccountId, MoneyCents)> + '_ {
        self.entries
            .range((month, AccountId::new(i64::MIN))..=(month, AccountId::new(i64::MAX)))
            .map(|(&(_, account), &amount)| (account, amount))
    }

    pub fn earliest_month(&self) -> Option<Month> {
        self.entries.keys().next().map(|&(month, _)| month)
    }

    /// Drops every entry at `month` or later; they are stale once an older
    /// transaction changed.
    pub fn invalidate_from(&mut self, month: Month) {
        let stale = self
            .entries
            .split_off(&(month, AccountId::new(i64::MIN)));
        if !stale.is_empty() {
            tracing::debug!("dropped {} balances from {month}", stale.len());
            self.state.mark_dirty();
        }
    }
}

impl BalanceSource for BalanceCache {
    fn balance(&self, month: Month, account: AccountId) -> Option<MoneyCents> {
        self.get(month, account)
    }
}

impl Cache for BalanceCache {
    fn save_state(&self) -> &SaveState {
        &self.state
    }

    fn save_state_mut(&mut self) -> &mut SaveState {
        &mut self.state
    }

    fn erase(&mut self) {
        self.entries.clear();
        self.state.mark_dirty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(y: i32, m: u32) -> Month {
        Month::new(y, m).unwrap()
    }

    fn cache() -> BalanceCache {
        let mut cache = BalanceCache::new();
        cache.set(month(2024, 2), AccountId::new(1), MoneyCents::new(300));
        cache.set(month(2024, 1), AccountId::new(2), MoneyCents::new(200));
        cache.set(month(2024, 1), AccountId::new(1), MoneyCents::new(100));
        cache
    }

    #[test]
    fn get_all_orders_by_month_then_account() {
        let cache = cache();
        let all: Vec<(Month, i64)> = cache
            .get_all()
            .map(|(m, a, _)| (m, i64::from(a)))
            .collect();
        assert_eq!(
            all,
            vec![
                (month(2024, 1), 1),
                (month(2024, 1), 2),
                (month(2024, 2), 1)
            ]
        );
        assert_eq!(cache.get_month(month(2024, 1)).count(), 2);
        assert_eq!(cache.earliest_month(), Some(month(2024, 1)));
    }

    #[test]
    fn invalidate_from_drops_later_months() {
        let mut cache = cache();
        cache.set_saved();
        cache.invalidate_from(month(2024, 3));
        assert!(!cache.must_be_saved());

        cache.invalidate_from(month(2024, 2));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(month(2024, 2), AccountId::new(1)), None);
        assert!(cache.must_be_saved());
    }

    #[test]
    fn balance_source_reads_entries() {
        let cache = cache();
        assert_eq!(
            cache.balance(month(2024, 1), AccountId::new(2)),
            Some(MoneyCents::new(200))
        );
        assert_eq!(cache.balance(month(2024, 5), AccountId::new(2)), None);
    }

    #[test]
    #[should_panic(expected = "KeyNotFound(\"balance 2024-05/2\")")]
    fn fail_remove_unknown() {
        let mut cache = cache();
        cache.remove(month(2024, 5), AccountId::new(2)).unwrap();
    }

    #[test]
    fn erase_always_dirties() {
        let mut cache = cache();
        cache.set_saved();
        cache.erase();
        assert!(cache.must_be_saved());
        assert!(cache.is_empty());
    }
}
