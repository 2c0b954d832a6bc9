//! Flat records exchanged with a [`Store`](crate::Store).
//!
//! They carry raw integers and strings only, so every backend (flat files,
//! SQL rows) can map them one-to-one. Nested tables of a permanent travel as
//! JSON text.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    Account, AccountId, AccountKind, LedgerError, MoneyCents, Month, Permanent, PermanentId,
    PermanentKind, Transaction, TransactionId,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: i64,
    pub name: String,
    pub kind: String,
    pub number: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: i64,
    pub date: NaiveDate,
    pub clearing_date: Option<NaiveDate>,
    pub debit: i64,
    pub credit: i64,
    /// Cents.
    pub amount: i64,
    pub label: Option<String>,
    pub payee: Option<String>,
    pub check_number: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermanentRecord {
    pub id: i64,
    pub name: String,
    pub kind: String,
    pub debit: i64,
    pub credit: i64,
    pub label: Option<String>,
    pub payee: Option<String>,
    pub reconciled: bool,
    /// JSON object `{"YYYY-MM": day}`.
    pub days: String,
    /// JSON object `{"YYYY-MM": cents}`, fixed operations only.
    pub amounts: Option<String>,
    pub dependency: Option<i64>,
    pub rate: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub month: Month,
    pub account: i64,
    /// Cents.
    pub amount: i64,
}

impl TryFrom<AccountRecord> for Account {
    type Error = LedgerError;

    fn try_from(record: AccountRecord) -> Result<Self, Self::Error> {
        let kind = match record.kind.as_str() {
            "bank" => AccountKind::Bank {
                number: record.number,
            },
            "budget" => AccountKind::Budget,
            other => {
                return Err(LedgerError::InvalidRecord(format!(
                    "account {}: unknown kind {other}",
                    record.id
                )));
            }
        };
        Ok(Self {
            id: Some(AccountId::new(record.id)),
            name: record.name,
            kind,
        })
    }
}

impl TryFrom<&Account> for AccountRecord {
    type Error = LedgerError;

    fn try_from(account: &Account) -> Result<Self, Self::Error> {
        let id = account
            .id
            .ok_or_else(|| LedgerError::InvalidRecord("account without id".to_string()))?;
        let number = match &account.kind {
            AccountKind::Bank { number } => number.clone(),
            AccountKind::Budget => None,
        };
        Ok(Self {
            id: id.into(),
            name: account.name.clone(),
            kind: account.kind.as_str().to_string(),
            number,
        })
    }
}

impl From<TransactionRecord> for Transaction {
    fn from(record: TransactionRecord) -> Self {
        Self {
            id: Some(TransactionId::new(record.id)),
            date: record.date,
            clearing_date: record.clearing_date,
            debit: AccountId::new(record.debit),
            credit: AccountId::new(record.credit),
            amount: MoneyCents::new(record.amount),
            label: record.label,
            payee: record.payee,
            check_number: record.check_number,
        }
    }
}

impl TryFrom<&Transaction> for TransactionRecord {
    type Error = LedgerError;

    fn try_from(transaction: &Transaction) -> Result<Self, Self::Error> {
        let id = transaction
            .id
            .ok_or_else(|| LedgerError::InvalidRecord("transaction without id".to_string()))?;
        Ok(Self {
            id: id.into(),
            date: transaction.date,
            clearing_date: transaction.clearing_date,
            debit: transaction.debit.into(),
            credit: transaction.credit.into(),
            amount: transaction.amount.cents(),
            label: transaction.label.clone(),
            payee: transaction.payee.clone(),
            check_number: transaction.check_number,
        })
    }
}

impl TryFrom<PermanentRecord> for Permanent {
    type Error = LedgerError;

    fn try_from(record: PermanentRecord) -> Result<Self, Self::Error> {
        let invalid =
            |what: &str| LedgerError::InvalidRecord(format!("permanent {}: {what}", record.id));

        let days: BTreeMap<Month, u32> = serde_json::from_str(&record.days)?;
        let kind = match record.kind.as_str() {
            "fixed" => {
                let raw = record.amounts.as_deref().ok_or_else(|| invalid("missing amounts"))?;
                PermanentKind::Fixed {
                    amounts: serde_json::from_str(raw)?,
                }
            }
            "proportional" => PermanentKind::Proportional {
                dependency: PermanentId::new(
                    record.dependency.ok_or_else(|| invalid("missing dependency"))?,
                ),
                rate: record.rate.ok_or_else(|| invalid("missing rate"))?,
            },
            "balance_clearing" => PermanentKind::BalanceClearing,
            other => return Err(invalid(&format!("unknown kind {other}"))),
        };

        Ok(Self {
            id: Some(PermanentId::new(record.id)),
            name: record.name,
            debit: AccountId::new(record.debit),
            credit: AccountId::new(record.credit),
            label: record.label,
            payee: record.payee,
            reconciled: record.reconciled,
            days,
            kind,
        })
    }
}

impl TryFrom<&Permanent> for PermanentRecord {
    type Error = LedgerError;

    fn try_from(permanent: &Permanent) -> Result<Self, Self::Error> {
        let id = permanent
            .id
            .ok_or_else(|| LedgerError::InvalidRecord("permanent without id".to_string()))?;
        let (amounts, dependency, rate) = match &permanent.kind {
            PermanentKind::Fixed { amounts } => (Some(serde_json::to_string(amounts)?), None, None),
            PermanentKind::Proportional { dependency, rate } => {
                (None, Some(i64::from(*dependency)), Some(*rate))
            }
            PermanentKind::BalanceClearing => (None, None, None),
        };
        Ok(Self {
            id: id.into(),
            name: permanent.name.clone(),
            kind: permanent.kind.as_str().to_string(),
            debit: permanent.debit.into(),
            credit: permanent.credit.into(),
            label: permanent.label.clone(),
            payee: permanent.payee.clone(),
            reconciled: permanent.reconciled,
            days: serde_json::to_string(&permanent.days)?,
            amounts,
            dependency,
            rate,
        })
    }
}

impl From<(Month, AccountId, MoneyCents)> for BalanceRecord {
    fn from((month, account, amount): (Month, AccountId, MoneyCents)) -> Self {
        Self {
            month,
            account: account.into(),
            amount: amount.cents(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: &str) -> PermanentRecord {
        PermanentRecord {
            id: 3,
            name: "Rent".to_string(),
            kind: kind.to_string(),
            debit: 1,
            credit: 2,
            label: None,
            payee: Some("Landlord".to_string()),
            reconciled: false,
            days: r#"{"2024-01":5}"#.to_string(),
            amounts: Some(r#"{"2024-01":80000}"#.to_string()),
            dependency: None,
            rate: None,
        }
    }

    #[test]
    fn fixed_record_decodes_tables() {
        let permanent = Permanent::try_from(record("fixed")).unwrap();
        let january = Month::new(2024, 1).unwrap();
        assert_eq!(permanent.day_for(january), Some(5));
        assert_eq!(
            permanent.kind,
            PermanentKind::Fixed {
                amounts: BTreeMap::from([(january, MoneyCents::new(80_000))])
            }
        );
        let back = PermanentRecord::try_from(&permanent).unwrap();
        assert_eq!(back, record("fixed"));
    }

    #[test]
    fn proportional_record_requires_dependency() {
        let err = Permanent::try_from(record("proportional")).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InvalidRecord("permanent 3: missing dependency".to_string())
        );
    }

    #[test]
    #[should_panic(expected = "InvalidRecord(\"permanent 3: unknown kind weekly\")")]
    fn fail_unknown_kind() {
        Permanent::try_from(record("weekly")).unwrap();
    }

    #[test]
    fn malformed_days_are_rejected() {
        let bad = PermanentRecord {
            days: r#"{"2024-13":5}"#.to_string(),
            ..record("fixed")
        };
        assert!(matches!(
            Permanent::try_from(bad).unwrap_err(),
            LedgerError::Json(_)
        ));
    }

    #[test]
    fn unknown_account_kind_is_rejected() {
        let record = AccountRecord {
            id: 1,
            name: "X".to_string(),
            kind: "credit_card".to_string(),
            number: None,
        };
        assert!(Account::try_from(record).is_err());
    }
}
