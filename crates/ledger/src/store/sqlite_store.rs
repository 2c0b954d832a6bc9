//! Relational store on top of `sea-orm`.
//!
//! The schema comes from the `migration` crate. Each save wipes and refills
//! one table inside a single database transaction, so a failed save leaves
//! the previous content untouched.

use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityName, EntityTrait, IntoActiveModel, QueryOrder,
    TransactionTrait,
};

use crate::{
    AccountCache, BalanceCache, PermanentCache, ResultLedger, Store, TransactionIndex,
    records::{AccountRecord, BalanceRecord, PermanentRecord, TransactionRecord},
};

/// Rows per `INSERT`, below the SQLite bound-parameter limit.
const CHUNK: usize = 200;

#[derive(Clone, Debug)]
pub struct SqliteStore {
    db: DatabaseConnection,
}

impl SqliteStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn replace<E, A>(&self, rows: Vec<A>) -> ResultLedger<()>
    where
        E: EntityTrait,
        A: ActiveModelTrait<Entity = E> + Clone,
        E::Model: IntoActiveModel<A>,
    {
        let count = rows.len();
        let db_tx = self.db.begin().await?;
        E::delete_many().exec(&db_tx).await?;
        for chunk in rows.chunks(CHUNK) {
            E::insert_many(chunk.to_vec())
                .exec_without_returning(&db_tx)
                .await?;
        }
        db_tx.commit().await?;
        tracing::debug!("replaced {} with {count} rows", E::default().table_name());
        Ok(())
    }
}

impl Store for SqliteStore {
    async fn load_accounts(&self) -> ResultLedger<Vec<AccountRecord>> {
        let models = accounts::Entity::find()
            .order_by_asc(accounts::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(AccountRecord::from).collect())
    }

    async fn load_transactions(&self) -> ResultLedger<Vec<TransactionRecord>> {
        let models = transactions::Entity::find()
            .order_by_asc(transactions::Column::Id)
            .all(&self.db)
            .await?;
        models.into_iter().map(TransactionRecord::try_from).collect()
    }

    async fn load_permanents(&self) -> ResultLedger<Vec<PermanentRecord>> {
        let models = permanents::Entity::find()
            .order_by_asc(permanents::Column::Position)
            .all(&self.db)
            .await?;
        models.into_iter().map(PermanentRecord::try_from).collect()
    }

    async fn load_balances(&self) -> ResultLedger<Vec<BalanceRecord>> {
        let models = balances::Entity::find()
            .order_by_asc(balances::Column::Month)
            .order_by_asc(balances::Column::Account)
            .all(&self.db)
            .await?;
        models.into_iter().map(BalanceRecord::try_from).collect()
    }

    async fn save_accounts(&self, accounts: &AccountCache) -> ResultLedger<()> {
        let rows = super::account_records(accounts)?
            .into_iter()
            .map(accounts::ActiveModel::from)
            .collect();
        self.replace::<accounts::Entity, _>(rows).await
    }

    async fn save_transactions(&self, transactions: &TransactionIndex) -> ResultLedger<()> {
        let rows = super::transaction_records(transactions)?
            .into_iter()
            .map(transactions::ActiveModel::from)
            .collect();
        self.replace::<transactions::Entity, _>(rows).await
    }

    async fn save_permanents(&self, permanents: &PermanentCache) -> ResultLedger<()> {
        let rows = super::permanent_records(permanents)?
            .into_iter()
            .enumerate()
            .map(|(position, record)| permanents::active_model(position, record))
            .collect::<ResultLedger<Vec<_>>>()?;
        self.replace::<permanents::Entity, _>(rows).await
    }

    async fn save_balances(&self, balances: &BalanceCache) -> ResultLedger<()> {
        let rows = super::balance_records(balances)
            .into_iter()
            .map(balances::ActiveModel::from)
            .collect();
        self.replace::<balances::Entity, _>(rows).await
    }
}

mod accounts {
    use sea_orm::entity::{ActiveValue, prelude::*};

    use crate::records::AccountRecord;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "accounts")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: i64,
        pub name: String,
        pub kind: String,
        pub number: Option<String>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    impl From<Model> for AccountRecord {
        fn from(model: Model) -> Self {
            Self {
                id: model.id,
                name: model.name,
                kind: model.kind,
                number: model.number,
            }
        }
    }

    impl From<AccountRecord> for ActiveModel {
        fn from(record: AccountRecord) -> Self {
            Self {
                id: ActiveValue::Set(record.id),
                name: ActiveValue::Set(record.name),
                kind: ActiveValue::Set(record.kind),
                number: ActiveValue::Set(record.number),
            }
        }
    }
}

mod transactions {
    use sea_orm::entity::{ActiveValue, prelude::*};

    use crate::{LedgerError, records::TransactionRecord};

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "transactions")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: i64,
        pub date: Date,
        pub clearing_date: Option<Date>,
        pub debit: i64,
        pub credit: i64,
        pub amount: i64,
        pub label: Option<String>,
        pub payee: Option<String>,
        pub check_number: Option<i64>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    impl TryFrom<Model> for TransactionRecord {
        type Error = LedgerError;

        fn try_from(model: Model) -> Result<Self, Self::Error> {
            let check_number = model
                .check_number
                .map(u32::try_from)
                .transpose()
                .map_err(|_| {
                    LedgerError::InvalidRecord(format!(
                        "transaction {}: check number out of range",
                        model.id
                    ))
                })?;
            Ok(Self {
                id: model.id,
                date: model.date,
                clearing_date: model.clearing_date,
                debit: model.debit,
                credit: model.credit,
                amount: model.amount,
                label: model.label,
                payee: model.payee,
                check_number,
            })
        }
    }

    impl From<TransactionRecord> for ActiveModel {
        fn from(record: TransactionRecord) -> Self {
            Self {
                id: ActiveValue::Set(record.id),
                date: ActiveValue::Set(record.date),
                clearing_date: ActiveValue::Set(record.clearing_date),
                debit: ActiveValue::Set(record.debit),
                credit: ActiveValue::Set(record.credit),
                amount: ActiveValue::Set(record.amount),
                label: ActiveValue::Set(record.label),
                payee: ActiveValue::Set(record.payee),
                check_number: ActiveValue::Set(record.check_number.map(i64::from)),
            }
        }
    }
}

mod permanents {
    use std::str::FromStr;

    use rust_decimal::Decimal;
    use sea_orm::entity::{ActiveValue, prelude::*};

    use crate::{LedgerError, ResultLedger, records::PermanentRecord};

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "permanents")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: i64,
        pub position: i32,
        pub name: String,
        pub kind: String,
        pub debit: i64,
        pub credit: i64,
        pub label: Option<String>,
        pub payee: Option<String>,
        pub reconciled: bool,
        pub days: String,
        pub amounts: Option<String>,
        pub dependency: Option<i64>,
        /// Decimal percentage, kept as text.
        pub rate: Option<String>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    impl TryFrom<Model> for PermanentRecord {
        type Error = LedgerError;

        fn try_from(model: Model) -> Result<Self, Self::Error> {
            let rate = match model.rate.as_deref() {
                Some(raw) => Some(Decimal::from_str(raw).map_err(|err| {
                    LedgerError::InvalidRecord(format!("permanent {}: rate {raw}: {err}", model.id))
                })?),
                None => None,
            };
            Ok(Self {
                id: model.id,
                name: model.name,
                kind: model.kind,
                debit: model.debit,
                credit: model.credit,
                label: model.label,
                payee: model.payee,
                reconciled: model.reconciled,
                days: model.days,
                amounts: model.amounts,
                dependency: model.dependency,
                rate,
            })
        }
    }

    pub fn active_model(position: usize, record: PermanentRecord) -> ResultLedger<ActiveModel> {
        let position = i32::try_from(position).map_err(|_| {
            LedgerError::InvalidRecord(format!("permanent {}: too many operations", record.id))
        })?;
        Ok(ActiveModel {
            id: ActiveValue::Set(record.id),
            position: ActiveValue::Set(position),
            name: ActiveValue::Set(record.name),
            kind: ActiveValue::Set(record.kind),
            debit: ActiveValue::Set(record.debit),
            credit: ActiveValue::Set(record.credit),
            label: ActiveValue::Set(record.label),
            payee: ActiveValue::Set(record.payee),
            reconciled: ActiveValue::Set(record.reconciled),
            days: ActiveValue::Set(record.days),
            amounts: ActiveValue::Set(record.amounts),
            dependency: ActiveValue::Set(record.dependency),
            rate: ActiveValue::Set(record.rate.map(|rate| rate.to_string())),
        })
    }
}

mod balances {
    use sea_orm::entity::{ActiveValue, prelude::*};

    use crate::{LedgerError, records::BalanceRecord};

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "balances")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub month: String,
        #[sea_orm(primary_key, auto_increment = false)]
        pub account: i64,
        pub amount: i64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    impl TryFrom<Model> for BalanceRecord {
        type Error = LedgerError;

        fn try_from(model: Model) -> Result<Self, Self::Error> {
            Ok(Self {
                month: model.month.parse()?,
                account: model.account,
                amount: model.amount,
            })
        }
    }

    impl From<BalanceRecord> for ActiveModel {
        fn from(record: BalanceRecord) -> Self {
            Self {
                month: ActiveValue::Set(record.month.to_string()),
                account: ActiveValue::Set(record.account),
                amount: ActiveValue::Set(record.amount),
            }
        }
    }
}
