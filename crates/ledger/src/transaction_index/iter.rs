//! Lazy flattening of `month -> sorted bucket` maps.

use std::{
    collections::{BTreeMap, btree_map},
    rc::Rc,
};

use crate::Transaction;

/// Transactions of one month, sorted by `S`.
pub(crate) type Bucket<S> = BTreeMap<S, Rc<Transaction>>;

/// Walking direction of a range query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// Two cursors: `outer` over buckets, `inner` over the current bucket.
///
/// Nothing is copied: the outer cursor only moves when the inner one is
/// exhausted. Mutating the index while this is alive is rejected by the
/// borrow checker.
pub(crate) struct MonthMerge<'a, O, S> {
    outer: O,
    inner: Option<btree_map::Values<'a, S, Rc<Transaction>>>,
    direction: Direction,
}

impl<'a, O, S> MonthMerge<'a, O, S>
where
    O: DoubleEndedIterator<Item = &'a Bucket<S>>,
    S: 'a,
{
    pub(crate) fn new(outer: O, direction: Direction) -> Self {
        Self {
            outer,
            inner: None,
            direction,
        }
    }
}

impl<'a, O, S> Iterator for MonthMerge<'a, O, S>
where
    O: DoubleEndedIterator<Item = &'a Bucket<S>>,
    S: 'a,
{
    type Item = &'a Transaction;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(inner) = self.inner.as_mut() {
                let next = match self.direction {
                    Direction::Ascending => inner.next(),
                    Direction::Descending => inner.next_back(),
                };
                if let Some(transaction) = next {
                    return Some(transaction.as_ref());
                }
            }
            let bucket = match self.direction {
                Direction::Ascending => self.outer.next(),
                Direction::Descending => self.outer.next_back(),
            }?;
            self.inner = Some(bucket.values());
        }
    }
}
