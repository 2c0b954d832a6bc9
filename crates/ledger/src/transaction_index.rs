//! In-memory transaction index.
//!
//! Every transaction is held once (behind an `Rc`) and filed three times:
//!
//! - by identifier, for point lookups and full scans;
//! - in the natural-order bucket map, keyed by the month of the value date;
//! - in the clearing-order bucket map, keyed by the month of the clearing
//!   date, or [`ClearingMonth::Pending`] when the entry is not cleared yet.
//!
//! The two bucket maps are only touched through [`TransactionIndex::add`],
//! [`TransactionIndex::remove`] and [`TransactionIndex::update`], which keep
//! them in sync.

use std::{
    collections::{BTreeMap, HashMap},
    rc::Rc,
};

use crate::{
    AccountCache, AccountId, Cache, ClearingMonth, IdGenerator, LedgerError, Month, ResultLedger,
    SaveState, Transaction, TransactionId,
    records::TransactionRecord,
    transactions::{ClearingKey, NaturalKey},
};

mod iter;

pub use iter::Direction;
use iter::{Bucket, MonthMerge};

#[derive(Debug)]
pub struct TransactionIndex {
    by_id: HashMap<TransactionId, Rc<Transaction>>,
    natural: BTreeMap<Month, Bucket<NaturalKey>>,
    clearing: BTreeMap<ClearingMonth, Bucket<ClearingKey>>,
    ids: IdGenerator<TransactionId>,
    current_month: Month,
    state: SaveState,
}

impl Default for TransactionIndex {
    fn default() -> Self {
        Self::with_current_month(Month::current())
    }
}

impl TransactionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index whose "present" is `current_month` instead of the system month.
    pub fn with_current_month(current_month: Month) -> Self {
        Self {
            by_id: HashMap::new(),
            natural: BTreeMap::new(),
            clearing: BTreeMap::new(),
            ids: IdGenerator::new(),
            current_month,
            state: SaveState::default(),
        }
    }

    /// Fills the index from raw records and leaves it clean.
    ///
    /// Every record must reference known accounts and carry a unique id.
    pub fn load<I>(&mut self, records: I, accounts: &AccountCache) -> ResultLedger<usize>
    where
        I: IntoIterator<Item = TransactionRecord>,
    {
        let mut loaded = 0;
        for record in records {
            let id = TransactionId::new(record.id);
            for account in [record.debit, record.credit] {
                if accounts.get(AccountId::new(account)).is_none() {
                    return Err(LedgerError::UnknownAccount(account));
                }
            }
            if self.by_id.contains_key(&id) {
                return Err(LedgerError::ExistingKey(format!("transaction {id}")));
            }
            self.ids.register(id);
            self.insert(id, Transaction::from(record));
            loaded += 1;
        }
        self.state.set_saved();
        tracing::debug!("loaded {loaded} transactions");
        Ok(loaded)
    }

    /// The month considered as the present by clearing-order queries.
    pub fn current_month(&self) -> Month {
        self.current_month
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: TransactionId) -> Option<&Transaction> {
        self.by_id.get(&id).map(Rc::as_ref)
    }

    /// Every transaction, natural order.
    pub fn get_all(&self) -> impl Iterator<Item = &Transaction> + '_ {
        self.natural_range(.., Direction::Ascending)
    }

    pub fn get_all_desc(&self) -> impl Iterator<Item = &Transaction> + '_ {
        self.natural_range(.., Direction::Descending)
    }

    /// Transactions whose value date lies in `from..=to`, natural order.
    pub fn get_all_between(
        &self,
        from: Month,
        to: Month,
    ) -> impl Iterator<Item = &Transaction> + '_ {
        self.natural_between(from, to, Direction::Ascending)
    }

    pub fn get_all_between_desc(
        &self,
        from: Month,
        to: Month,
    ) -> impl Iterator<Item = &Transaction> + '_ {
        self.natural_between(from, to, Direction::Descending)
    }

    pub fn get_all_since(&self, month: Month) -> impl Iterator<Item = &Transaction> + '_ {
        self.natural_range(month.., Direction::Ascending)
    }

    pub fn get_all_since_desc(&self, month: Month) -> impl Iterator<Item = &Transaction> + '_ {
        self.natural_range(month.., Direction::Descending)
    }

    pub fn get_all_to(&self, month: Month) -> impl Iterator<Item = &Transaction> + '_ {
        self.natural_range(..=month, Direction::Ascending)
    }

    pub fn get_all_to_desc(&self, month: Month) -> impl Iterator<Item = &Transaction> + '_ {
        self.natural_range(..=month, Direction::Descending)
    }

    /// Clearing order, cleared in `month` or later. Un-cleared transactions
    /// are always included.
    pub fn get_pointages_since(&self, month: Month) -> impl Iterator<Item = &Transaction> + '_ {
        self.clearing_since(month, Direction::Ascending)
    }

    pub fn get_pointages_since_desc(
        &self,
        month: Month,
    ) -> impl Iterator<Item = &Transaction> + '_ {
        self.clearing_since(month, Direction::Descending)
    }

    /// Clearing order, cleared in `month` or earlier. Un-cleared transactions
    /// are included when `month` reaches the current month.
    pub fn get_pointages_to(&self, month: Month) -> impl Iterator<Item = &Transaction> + '_ {
        self.clearing_to(month, Direction::Ascending)
    }

    pub fn get_pointages_to_desc(&self, month: Month) -> impl Iterator<Item = &Transaction> + '_ {
        self.clearing_to(month, Direction::Descending)
    }

    /// Month of the earliest stored transaction (value date).
    pub fn earliest_month(&self) -> Option<Month> {
        self.natural.keys().next().copied()
    }

    /// Stores `transaction`, minting an id when it has none.
    ///
    /// Returns the stored value, id included.
    pub fn add(&mut self, transaction: Transaction) -> ResultLedger<Transaction> {
        let (id, transaction) = match transaction.id {
            Some(id) => {
                if self.by_id.contains_key(&id) {
                    return Err(LedgerError::ExistingKey(format!("transaction {id}")));
                }
                self.ids.register(id);
                (id, transaction)
            }
            None => {
                let id = self.ids.next()?;
                (id, transaction.with_id(id))
            }
        };
        let stored = self.insert(id, transaction);
        self.state.mark_dirty();
        Ok(stored.as_ref().clone())
    }

    /// Drops a stored transaction and returns it.
    pub fn remove(&mut self, id: TransactionId) -> ResultLedger<Transaction> {
        let stored = self.remove_at(id)?;
        self.state.mark_dirty();
        Ok(Rc::unwrap_or_clone(stored))
    }

    /// Replaces the stored transaction with the same id.
    pub fn update(&mut self, transaction: Transaction) -> ResultLedger<Transaction> {
        let id = transaction
            .id
            .ok_or_else(|| LedgerError::KeyNotFound("transaction without id".to_string()))?;
        self.remove(id)?;
        self.add(transaction)
    }

    /// Occurrences of every label and payee, for autocompletion.
    pub fn construct_comment_index(&self) -> HashMap<String, usize> {
        let mut index = HashMap::new();
        for transaction in self.by_id.values() {
            for text in [&transaction.label, &transaction.payee].into_iter().flatten() {
                *index.entry(text.clone()).or_insert(0) += 1;
            }
        }
        index
    }

    fn insert(&mut self, id: TransactionId, transaction: Transaction) -> Rc<Transaction> {
        let stored = Rc::new(transaction);
        self.natural
            .entry(stored.month())
            .or_default()
            .insert(stored.natural_key(id), Rc::clone(&stored));
        self.clearing
            .entry(stored.clearing_month())
            .or_default()
            .insert(stored.clearing_key(id), Rc::clone(&stored));
        self.by_id.insert(id, Rc::clone(&stored));
        stored
    }

    fn remove_at(&mut self, id: TransactionId) -> ResultLedger<Rc<Transaction>> {
        let stored = self
            .by_id
            .remove(&id)
            .ok_or_else(|| LedgerError::KeyNotFound(format!("transaction {id}")))?;

        let month = stored.month();
        if let Some(bucket) = self.natural.get_mut(&month) {
            bucket.remove(&stored.natural_key(id));
            if bucket.is_empty() {
                self.natural.remove(&month);
            }
        }
        let clearing_month = stored.clearing_month();
        if let Some(bucket) = self.clearing.get_mut(&clearing_month) {
            bucket.remove(&stored.clearing_key(id));
            if bucket.is_empty() {
                self.clearing.remove(&clearing_month);
            }
        }
        Ok(stored)
    }

    fn natural_range<R>(&self, range: R, direction: Direction) -> impl Iterator<Item = &Transaction>
    where
        R: std::ops::RangeBounds<Month>,
    {
        MonthMerge::new(self.natural.range(range).map(|(_, bucket)| bucket), direction)
    }

    fn natural_between(
        &self,
        from: Month,
        to: Month,
        direction: Direction,
    ) -> impl Iterator<Item = &Transaction> {
        // `BTreeMap::range` panics on inverted bounds.
        let buckets = (from <= to)
            .then(|| self.natural.range(from..=to))
            .into_iter()
            .flatten()
            .map(|(_, bucket)| bucket);
        MonthMerge::new(buckets, direction)
    }

    fn clearing_since(
        &self,
        month: Month,
        direction: Direction,
    ) -> impl Iterator<Item = &Transaction> {
        let buckets = self
            .clearing
            .range(ClearingMonth::Cleared(month)..)
            .map(|(_, bucket)| bucket);
        MonthMerge::new(buckets, direction)
    }

    fn clearing_to(
        &self,
        month: Month,
        direction: Direction,
    ) -> impl Iterator<Item = &Transaction> {
        let pending = if month >= self.current_month {
            self.clearing.get(&ClearingMonth::Pending)
        } else {
            None
        };
        let buckets = self
            .clearing
            .range(..=ClearingMonth::Cleared(month))
            .map(|(_, bucket)| bucket)
            .chain(pending);
        MonthMerge::new(buckets, direction)
    }
}

impl Cache for TransactionIndex {
    fn save_state(&self) -> &SaveState {
        &self.state
    }

    fn save_state_mut(&mut self) -> &mut SaveState {
        &mut self.state
    }

    fn erase(&mut self) {
        self.by_id.clear();
        self.natural.clear();
        self.clearing.clear();
        self.state.mark_dirty();
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::MoneyCents;

    fn month(y: i32, m: u32) -> Month {
        Month::new(y, m).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(d: NaiveDate) -> Transaction {
        Transaction::new(d, AccountId::new(1), AccountId::new(2), MoneyCents::new(1000))
    }

    fn index() -> TransactionIndex {
        TransactionIndex::with_current_month(month(2024, 6))
    }

    fn ids<'a>(iter: impl Iterator<Item = &'a Transaction>) -> Vec<i64> {
        iter.filter_map(|tx| tx.id.map(i64::from)).collect()
    }

    #[test]
    fn since_keeps_month_and_later() {
        let mut index = index();
        index.add(tx(date(2024, 3, 10)).with_id(TransactionId::new(1))).unwrap();
        index.add(tx(date(2024, 4, 2)).with_id(TransactionId::new(2))).unwrap();
        index.add(tx(date(2024, 2, 28)).with_id(TransactionId::new(3))).unwrap();

        assert_eq!(ids(index.get_all_since(month(2024, 3))), vec![1, 2]);
        assert_eq!(ids(index.get_all_to(month(2024, 3))), vec![3, 1]);
        assert_eq!(ids(index.get_all()), vec![3, 1, 2]);
        assert_eq!(ids(index.get_all_desc()), vec![2, 1, 3]);
    }

    #[test]
    fn add_without_id_mints_from_zero() {
        let mut index = index();
        let first = index.add(tx(date(2024, 1, 1))).unwrap();
        let second = index.add(tx(date(2024, 1, 1))).unwrap();
        assert_eq!(first.id, Some(TransactionId::new(0)));
        assert_eq!(second.id, Some(TransactionId::new(1)));
        assert_eq!(index.get(TransactionId::new(0)), Some(&first));
    }

    #[test]
    fn add_registers_external_ids() {
        let mut index = index();
        index.add(tx(date(2024, 1, 1)).with_id(TransactionId::new(41))).unwrap();
        let minted = index.add(tx(date(2024, 1, 1))).unwrap();
        assert_eq!(minted.id, Some(TransactionId::new(42)));
    }

    #[test]
    fn add_after_highest_id_fails_without_touching_buckets() {
        let mut index = index();
        index
            .add(tx(date(2024, 1, 1)).with_id(TransactionId::new(i64::MAX)))
            .unwrap();
        assert_eq!(
            index.add(tx(date(2024, 2, 1))).unwrap_err(),
            LedgerError::IdsExhausted
        );
        assert_eq!(index.len(), 1);
        assert_eq!(ids(index.get_all()), vec![i64::MAX]);
        assert_eq!(ids(index.get_pointages_since(month(2024, 1))), vec![i64::MAX]);
        assert_eq!(index.earliest_month(), Some(month(2024, 1)));
    }

    #[test]
    fn add_duplicate_id_is_rejected() {
        let mut index = index();
        index.add(tx(date(2024, 1, 1)).with_id(TransactionId::new(1))).unwrap();
        let err = index
            .add(tx(date(2024, 2, 1)).with_id(TransactionId::new(1)))
            .unwrap_err();
        assert_eq!(err, LedgerError::ExistingKey("transaction 1".to_string()));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn update_moves_between_buckets() {
        let mut index = index();
        let stored = index.add(tx(date(2024, 1, 15))).unwrap();
        let moved = Transaction {
            date: date(2024, 3, 15),
            ..stored.clone()
        };
        index.update(moved).unwrap();

        assert_eq!(index.get_all_between(month(2024, 1), month(2024, 1)).count(), 0);
        assert_eq!(
            ids(index.get_all_between(month(2024, 3), month(2024, 3))),
            vec![0]
        );
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn remove_drops_from_every_view() {
        let mut index = index();
        let stored = index
            .add(tx(date(2024, 1, 15)).cleared_on(date(2024, 2, 1)))
            .unwrap();
        let id = stored.id.unwrap();
        let removed = index.remove(id).unwrap();

        assert_eq!(removed, stored);
        assert_eq!(index.get(id), None);
        assert_eq!(index.get_all().count(), 0);
        assert_eq!(index.get_pointages_since(month(2000, 1)).count(), 0);
        assert_eq!(index.earliest_month(), None);
    }

    #[test]
    #[should_panic(expected = "KeyNotFound(\"transaction 9\")")]
    fn fail_remove_unknown() {
        let mut index = index();
        index.remove(TransactionId::new(9)).unwrap();
    }

    #[test]
    #[should_panic(expected = "KeyNotFound(\"transaction 3\")")]
    fn fail_update_unknown() {
        let mut index = index();
        index
            .update(tx(date(2024, 1, 1)).with_id(TransactionId::new(3)))
            .unwrap();
    }

    #[test]
    fn pointages_treat_uncleared_as_present() {
        let mut index = index();
        index
            .add(
                tx(date(2024, 1, 1))
                    .cleared_on(date(2024, 2, 3))
                    .with_id(TransactionId::new(1)),
            )
            .unwrap();
        index
            .add(
                tx(date(2024, 1, 2))
                    .cleared_on(date(2024, 4, 3))
                    .with_id(TransactionId::new(2)),
            )
            .unwrap();
        index.add(tx(date(2023, 1, 2)).with_id(TransactionId::new(3))).unwrap();

        assert_eq!(ids(index.get_pointages_since(month(2024, 3))), vec![2, 3]);
        assert_eq!(ids(index.get_pointages_since(month(2030, 1))), vec![3]);
        assert_eq!(ids(index.get_pointages_to(month(2024, 3))), vec![1]);
        assert_eq!(ids(index.get_pointages_to(month(2024, 6))), vec![1, 2, 3]);
        assert_eq!(ids(index.get_pointages_to_desc(month(2024, 6))), vec![3, 2, 1]);
        assert_eq!(ids(index.get_pointages_since_desc(month(2024, 1))), vec![3, 2, 1]);
    }

    #[test]
    fn inverted_range_is_empty() {
        let mut index = index();
        index.add(tx(date(2024, 1, 1))).unwrap();
        assert_eq!(index.get_all_between(month(2024, 2), month(2024, 1)).count(), 0);
        assert_eq!(
            index.get_all_between_desc(month(2024, 2), month(2024, 1)).count(),
            0
        );
    }

    #[test]
    fn same_date_orders_by_id_then_check_number() {
        let mut index = index();
        index.add(tx(date(2024, 1, 1)).with_id(TransactionId::new(5))).unwrap();
        index
            .add(
                tx(date(2024, 1, 1))
                    .with_check_number(1)
                    .with_id(TransactionId::new(2)),
            )
            .unwrap();
        index.add(tx(date(2023, 12, 31)).with_id(TransactionId::new(9))).unwrap();
        assert_eq!(ids(index.get_all()), vec![9, 2, 5]);
    }

    #[test]
    fn comment_index_counts_labels_and_payees() {
        let mut index = index();
        index
            .add(tx(date(2024, 1, 1)).with_label("Rent").with_payee("Landlord"))
            .unwrap();
        index.add(tx(date(2024, 2, 1)).with_label("Rent")).unwrap();
        index.add(tx(date(2024, 2, 1))).unwrap();

        let comments = index.construct_comment_index();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments["Rent"], 2);
        assert_eq!(comments["Landlord"], 1);
    }

    #[test]
    fn earliest_month_follows_value_dates() {
        let mut index = index();
        assert_eq!(index.earliest_month(), None);
        index.add(tx(date(2024, 5, 1))).unwrap();
        let early = index.add(tx(date(2023, 11, 1))).unwrap();
        assert_eq!(index.earliest_month(), Some(month(2023, 11)));
        index.remove(early.id.unwrap()).unwrap();
        assert_eq!(index.earliest_month(), Some(month(2024, 5)));
    }

    #[test]
    fn dirty_tracking() {
        let mut index = index();
        assert!(!index.must_be_saved());
        index.add(tx(date(2024, 5, 1))).unwrap();
        assert!(index.must_be_saved());
        index.set_saved();
        index.set_saved();
        assert!(!index.must_be_saved());
        index.erase();
        assert!(index.must_be_saved());
        assert!(index.is_empty());
    }

    #[test]
    fn update_marks_dirty_even_when_unchanged() {
        let mut index = index();
        let stored = index.add(tx(date(2024, 5, 1))).unwrap();
        index.set_saved();
        index.update(stored).unwrap();
        assert!(index.must_be_saved());
    }
}
