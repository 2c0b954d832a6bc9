//! Transaction primitives.
//!
//! A `Transaction` is an immutable dated ledger entry moving an amount from a
//! debit account to a credit account. Changing one means building a new
//! value and swapping it in the index, never editing the stored one: its
//! dates decide where it is filed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{AccountId, MoneyCents, Month, TransactionId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// `None` until the index assigns one.
    pub id: Option<TransactionId>,
    /// Value date.
    pub date: NaiveDate,
    /// Date the entry was reconciled against a statement.
    pub clearing_date: Option<NaiveDate>,
    pub debit: AccountId,
    pub credit: AccountId,
    pub amount: MoneyCents,
    pub label: Option<String>,
    pub payee: Option<String>,
    pub check_number: Option<u32>,
}

impl Transaction {
    pub fn new(date: NaiveDate, debit: AccountId, credit: AccountId, amount: MoneyCents) -> Self {
        Self {
            id: None,
            date,
            clearing_date: None,
            debit,
            credit,
            amount,
            label: None,
            payee: None,
            check_number: None,
        }
    }

    /// Same transaction carrying `id`.
    #[must_use]
    pub fn with_id(self, id: TransactionId) -> Self {
        Self {
            id: Some(id),
            ..self
        }
    }

    #[must_use]
    pub fn with_label(self, label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..self
        }
    }

    #[must_use]
    pub fn with_payee(self, payee: impl Into<String>) -> Self {
        Self {
            payee: Some(payee.into()),
            ..self
        }
    }

    #[must_use]
    pub fn with_check_number(self, check_number: u32) -> Self {
        Self {
            check_number: Some(check_number),
            ..self
        }
    }

    #[must_use]
    pub fn cleared_on(self, clearing_date: NaiveDate) -> Self {
        Self {
            clearing_date: Some(clearing_date),
            ..self
        }
    }

    /// Month bucket of the value date.
    #[must_use]
    pub fn month(&self) -> Month {
        Month::from_date(self.date)
    }

    /// Bucket of the clearing order.
    #[must_use]
    pub fn clearing_month(&self) -> ClearingMonth {
        self.clearing_date
            .map_or(ClearingMonth::Pending, |date| {
                ClearingMonth::Cleared(Month::from_date(date))
            })
    }

    pub(crate) fn natural_key(&self, id: TransactionId) -> NaturalKey {
        NaturalKey {
            date: self.date,
            id,
            check_number: self.check_number,
        }
    }

    pub(crate) fn clearing_key(&self, id: TransactionId) -> ClearingKey {
        ClearingKey {
            clearing_date: self.clearing_date,
            id,
            check_number: self.check_number,
        }
    }
}

/// Bucket key of the clearing order. Un-cleared transactions live in
/// `Pending`, which sorts after every cleared month.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClearingMonth {
    Cleared(Month),
    Pending,
}

/// Position in the natural order: date, id, then check number (absent
/// first).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct NaturalKey {
    date: NaiveDate,
    id: TransactionId,
    check_number: Option<u32>,
}

/// Position in the clearing order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct ClearingKey {
    clearing_date: Option<NaiveDate>,
    id: TransactionId,
    check_number: Option<u32>,
}
