//! Recurring operations ("permanents").
//!
//! A permanent is a template producing at most one transaction per month.
//! All variants share the same header; how the amount of a month is found is
//! decided by [`PermanentKind`]:
//!
//! - `Fixed`: read from an explicit per-month amount table.
//! - `Proportional`: a percentage of what another permanent generated the
//!   same month.
//! - `BalanceClearing`: the balance of the debit account that month, so the
//!   generated transaction brings it back to zero.
//!
//! A permanent is due in a month when a day is defined for it and an amount
//! resolves to something other than zero.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    AccountId, BalanceSource, LedgerError, MoneyCents, Month, PermanentId, ResultLedger,
    Transaction,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permanent {
    /// `None` until the cache assigns one.
    pub id: Option<PermanentId>,
    pub name: String,
    pub debit: AccountId,
    pub credit: AccountId,
    pub label: Option<String>,
    pub payee: Option<String>,
    /// Generated transactions are already cleared on their own date.
    pub reconciled: bool,
    /// Day of month to apply, per month.
    pub days: BTreeMap<Month, u32>,
    pub kind: PermanentKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PermanentKind {
    Fixed {
        amounts: BTreeMap<Month, MoneyCents>,
    },
    Proportional {
        dependency: PermanentId,
        /// Percentage of the dependency's amount.
        rate: Decimal,
    },
    BalanceClearing,
}

impl PermanentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed { .. } => "fixed",
            Self::Proportional { .. } => "proportional",
            Self::BalanceClearing => "balance_clearing",
        }
    }
}

impl Permanent {
    pub fn new(
        name: impl Into<String>,
        debit: AccountId,
        credit: AccountId,
        kind: PermanentKind,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            debit,
            credit,
            label: None,
            payee: None,
            reconciled: false,
            days: BTreeMap::new(),
            kind,
        }
    }

    /// Same operation, same variant payload, carrying `id`.
    #[must_use]
    pub fn with_id(self, id: PermanentId) -> Self {
        Self {
            id: Some(id),
            ..self
        }
    }

    #[must_use]
    pub fn with_day(mut self, month: Month, day: u32) -> Self {
        self.days.insert(month, day);
        self
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
    pub fn reconciled(self) -> Self {
        Self {
            reconciled: true,
            ..self
        }
    }

    /// The operation this one scales, if any.
    pub fn dependency(&self) -> Option<PermanentId> {
        match self.kind {
            PermanentKind::Proportional { dependency, .. } => Some(dependency),
            PermanentKind::Fixed { .. } | PermanentKind::BalanceClearing => None,
        }
    }

    pub fn day_for(&self, month: Month) -> Option<u32> {
        self.days.get(&month).copied()
    }

    /// Amount for `month`, `None` when nothing is due.
    ///
    /// `generated` holds what the operations already processed this month
    /// produced; a proportional operation reads its dependency there.
    pub fn amount_for<B>(
        &self,
        month: Month,
        generated: &HashMap<PermanentId, MoneyCents>,
        balances: &B,
    ) -> ResultLedger<Option<MoneyCents>>
    where
        B: BalanceSource + ?Sized,
    {
        if self.day_for(month).is_none() {
            return Ok(None);
        }
        let amount = match &self.kind {
            PermanentKind::Fixed { amounts } => amounts.get(&month).copied(),
            PermanentKind::Proportional { dependency, rate } => match generated.get(dependency) {
                Some(base) => Some(base.percent(*rate).ok_or_else(|| {
                    LedgerError::InvalidAmount(format!("{rate}% of {base} overflows"))
                })?),
                None => None,
            },
            PermanentKind::BalanceClearing => balances.balance(month, self.debit),
        };
        Ok(amount.filter(|amount| !amount.is_zero()))
    }

    /// The transaction this operation generates for `month`, without id.
    pub fn transaction_for(&self, month: Month, amount: MoneyCents) -> Option<Transaction> {
        let date = month.day(self.day_for(month)?);
        let label = self.label.clone().unwrap_or_else(|| self.name.clone());
        let mut transaction =
            Transaction::new(date, self.debit, self.credit, amount).with_label(label);
        transaction.payee = self.payee.clone();
        if self.reconciled {
            transaction = transaction.cleared_on(date);
        }
        Some(transaction)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    struct NoBalances;

    impl BalanceSource for NoBalances {
        fn balance(&self, _month: Month, _account: AccountId) -> Option<MoneyCents> {
            None
        }
    }

    struct FixedBalance(MoneyCents);

    impl BalanceSource for FixedBalance {
        fn balance(&self, _month: Month, _account: AccountId) -> Option<MoneyCents> {
            Some(self.0)
        }
    }

    fn month(y: i32, m: u32) -> Month {
        Month::new(y, m).unwrap()
    }

    fn rent() -> Permanent {
        let mut amounts = BTreeMap::new();
        amounts.insert(month(2024, 1), MoneyCents::new(80_000));
        Permanent::new(
            "Rent",
            AccountId::new(1),
            AccountId::new(2),
            PermanentKind::Fixed { amounts },
        )
        .with_id(PermanentId::new(10))
        .with_day(month(2024, 1), 31)
        .with_day(month(2024, 2), 5)
    }

    #[test]
    fn fixed_needs_day_and_amount() {
        let rent = rent();
        let none = HashMap::new();
        assert_eq!(
            rent.amount_for(month(2024, 1), &none, &NoBalances).unwrap(),
            Some(MoneyCents::new(80_000))
        );
        // Day defined, no amount.
        assert_eq!(rent.amount_for(month(2024, 2), &none, &NoBalances).unwrap(), None);
        // Nothing defined.
        assert_eq!(rent.amount_for(month(2024, 3), &none, &NoBalances).unwrap(), None);
    }

    #[test]
    fn proportional_scales_dependency() {
        let tax = Permanent::new(
            "Tax",
            AccountId::new(1),
            AccountId::new(3),
            PermanentKind::Proportional {
                dependency: PermanentId::new(10),
                rate: Decimal::new(20, 0),
            },
        )
        .with_day(month(2024, 1), 1);
        assert_eq!(tax.dependency(), Some(PermanentId::new(10)));

        let mut generated = HashMap::new();
        assert_eq!(tax.amount_for(month(2024, 1), &generated, &NoBalances).unwrap(), None);
        generated.insert(PermanentId::new(10), MoneyCents::new(80_000));
        assert_eq!(
            tax.amount_for(month(2024, 1), &generated, &NoBalances).unwrap(),
            Some(MoneyCents::new(16_000))
        );
    }

    #[test]
    fn balance_clearing_reads_debit_balance() {
        let sweep = Permanent::new(
            "Sweep",
            AccountId::new(4),
            AccountId::new(5),
            PermanentKind::BalanceClearing,
        )
        .with_day(month(2024, 1), 28);
        let none = HashMap::new();
        assert_eq!(
            sweep
                .amount_for(month(2024, 1), &none, &FixedBalance(MoneyCents::new(1234)))
                .unwrap(),
            Some(MoneyCents::new(1234))
        );
        assert_eq!(
            sweep
                .amount_for(month(2024, 1), &none, &FixedBalance(MoneyCents::ZERO))
                .unwrap(),
            None
        );
    }

    #[test]
    fn transaction_for_clamps_day_and_copies_header() {
        let rent = rent().with_payee("Landlord").reconciled();
        let tx = rent
            .transaction_for(month(2024, 2), MoneyCents::new(100))
            .unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 2, 5).unwrap();
        assert_eq!(tx.id, None);
        assert_eq!(tx.date, date);
        assert_eq!(tx.clearing_date, Some(date));
        assert_eq!(tx.label.as_deref(), Some("Rent"));
        assert_eq!(tx.payee.as_deref(), Some("Landlord"));

        let late = rent
            .transaction_for(month(2024, 1), MoneyCents::new(100))
            .unwrap();
        assert_eq!(late.date, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert!(rent.transaction_for(month(2024, 3), MoneyCents::new(1)).is_none());
    }
}
