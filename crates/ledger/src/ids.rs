//! Record identifiers and the generator that mints them.
//!
//! Each entity kind gets its own identifier type and its own
//! [`IdGenerator`], so transaction ids never collide with account ids by
//! construction, and a generator cannot be handed the wrong kind.

use std::{fmt, hash::Hash, marker::PhantomData};

use serde::{Deserialize, Serialize};

use crate::{LedgerError, ResultLedger};

/// Integer-backed identifier of one entity kind.
pub trait Identifier: Copy + Eq + Ord + Hash + fmt::Debug + fmt::Display {
    fn from_raw(raw: i64) -> Self;
    fn raw(self) -> i64;
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl Identifier for $name {
            fn from_raw(raw: i64) -> Self {
                Self(raw)
            }

            fn raw(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

identifier!(
    /// Identifier of a ledger transaction.
    TransactionId
);
identifier!(
    /// Identifier of a recurring operation.
    PermanentId
);
identifier!(
    /// Identifier of an account (bank or budget).
    AccountId
);

/// Hands out identifiers that were never emitted nor registered before.
///
/// The counter only moves forward: an identifier is never reused within the
/// lifetime of the generator, even after the record carrying it is removed.
/// Once `i64::MAX` is taken the generator is exhausted and minting fails.
#[derive(Debug)]
pub struct IdGenerator<T> {
    next: Option<i64>,
    _kind: PhantomData<T>,
}

impl<T> Default for IdGenerator<T> {
    fn default() -> Self {
        Self {
            next: Some(0),
            _kind: PhantomData,
        }
    }
}

impl<T: Identifier> IdGenerator<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a fresh identifier and moves past it.
    pub fn next(&mut self) -> ResultLedger<T> {
        let raw = self.next.ok_or(LedgerError::IdsExhausted)?;
        self.next = raw.checked_add(1);
        let id = T::from_raw(raw);
        tracing::debug!("minted identifier {id}");
        Ok(id)
    }

    /// Records that `id` is taken. Idempotent.
    pub fn register(&mut self, id: T) {
        let raw = id.raw();
        if self.next.is_some_and(|next| raw >= next) {
            self.next = raw.checked_add(1);
        }
    }

    /// The identifier the next call to [`IdGenerator::next`] returns, if any.
    pub fn peek(&self) -> Option<T> {
        self.next.map(T::from_raw)
    }
}
