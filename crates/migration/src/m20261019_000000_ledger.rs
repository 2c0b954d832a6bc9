//! Ledger schema.
//!
//! - `accounts`: bank and budget accounts
//! - `transactions`: dated movements between two accounts, amounts in cents
//! - `permanents`: recurring operations, `position` keeps dependency order
//! - `balances`: cached month-end balances per account
//!
//! No foreign keys: every save replaces a whole table, and the library checks
//! references when it loads.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Accounts {
    Table,
    Id,
    Name,
    Kind,
    Number,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    Date,
    ClearingDate,
    Debit,
    Credit,
    Amount,
    Label,
    Payee,
    CheckNumber,
}

#[derive(Iden)]
enum Permanents {
    Table,
    Id,
    Position,
    Name,
    Kind,
    Debit,
    Credit,
    Label,
    Payee,
    Reconciled,
    Days,
    Amounts,
    Dependency,
    Rate,
}

#[derive(Iden)]
enum Balances {
    Table,
    Month,
    Account,
    Amount,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Accounts::Name).string().not_null())
                    .col(ColumnDef::new(Accounts::Kind).string().not_null())
                    .col(ColumnDef::new(Accounts::Number).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::Date).date().not_null())
                    .col(ColumnDef::new(Transactions::ClearingDate).date())
                    .col(ColumnDef::new(Transactions::Debit).big_integer().not_null())
                    .col(ColumnDef::new(Transactions::Credit).big_integer().not_null())
                    .col(ColumnDef::new(Transactions::Amount).big_integer().not_null())
                    .col(ColumnDef::new(Transactions::Label).string())
                    .col(ColumnDef::new(Transactions::Payee).string())
                    .col(ColumnDef::new(Transactions::CheckNumber).big_integer())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-date")
                    .table(Transactions::Table)
                    .col(Transactions::Date)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Permanents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Permanents::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Permanents::Position).integer().not_null())
                    .col(ColumnDef::new(Permanents::Name).string().not_null())
                    .col(ColumnDef::new(Permanents::Kind).string().not_null())
                    .col(ColumnDef::new(Permanents::Debit).big_integer().not_null())
                    .col(ColumnDef::new(Permanents::Credit).big_integer().not_null())
                    .col(ColumnDef::new(Permanents::Label).string())
                    .col(ColumnDef::new(Permanents::Payee).string())
                    .col(
                        ColumnDef::new(Permanents::Reconciled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Permanents::Days).text().not_null())
                    .col(ColumnDef::new(Permanents::Amounts).text())
                    .col(ColumnDef::new(Permanents::Dependency).big_integer())
                    .col(ColumnDef::new(Permanents::Rate).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Balances::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Balances::Month).string().not_null())
                    .col(ColumnDef::new(Balances::Account).big_integer().not_null())
                    .col(ColumnDef::new(Balances::Amount).big_integer().not_null())
                    .primary_key(
                        Index::create()
                            .col(Balances::Month)
                            .col(Balances::Account),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Balances::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Permanents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        Ok(())
    }
}
