//! Flat-file store: one CSV file per record kind inside a directory.

use std::{io, path::PathBuf};

use csv::{Reader, Writer};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    AccountCache, BalanceCache, PermanentCache, ResultLedger, Store, TransactionIndex,
    records::{AccountRecord, BalanceRecord, PermanentRecord, TransactionRecord},
};

const ACCOUNTS: &str = "accounts.csv";
const TRANSACTIONS: &str = "transactions.csv";
const PERMANENTS: &str = "permanents.csv";
const BALANCES: &str = "balances.csv";

#[derive(Clone, Debug)]
pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// A missing file reads as no record at all.
    async fn read<T: DeserializeOwned>(&self, file: &str) -> ResultLedger<Vec<T>> {
        let path = self.dir.join(file);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("{} not found, nothing to load", path.display());
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };
        let mut reader = Reader::from_reader(data.as_slice());
        let records = reader
            .deserialize()
            .collect::<Result<Vec<T>, csv::Error>>()?;
        tracing::debug!("read {} records from {}", records.len(), path.display());
        Ok(records)
    }

    /// Rewrites `file` entirely. The content goes to a sibling temporary file
    /// first, then replaces the old one.
    async fn write<T: Serialize>(&self, file: &str, records: &[T]) -> ResultLedger<()> {
        let mut writer = Writer::from_writer(vec![]);
        for record in records {
            writer.serialize(record)?;
        }
        let data = writer.into_inner().map_err(|err| err.into_error())?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file);
        let tmp = self.dir.join(format!("{file}.tmp"));
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!("wrote {} records to {}", records.len(), path.display());
        Ok(())
    }
}

impl Store for CsvStore {
    async fn load_accounts(&self) -> ResultLedger<Vec<AccountRecord>> {
        self.read(ACCOUNTS).await
    }

    async fn load_transactions(&self) -> ResultLedger<Vec<TransactionRecord>> {
        self.read(TRANSACTIONS).await
    }

    async fn load_permanents(&self) -> ResultLedger<Vec<PermanentRecord>> {
        self.read(PERMANENTS).await
    }

    async fn load_balances(&self) -> ResultLedger<Vec<BalanceRecord>> {
        self.read(BALANCES).await
    }

    async fn save_accounts(&self, accounts: &AccountCache) -> ResultLedger<()> {
        self.write(ACCOUNTS, &super::account_records(accounts)?).await
    }

    async fn save_transactions(&self, transactions: &TransactionIndex) -> ResultLedger<()> {
        self.write(TRANSACTIONS, &super::transaction_records(transactions)?)
            .await
    }

    async fn save_permanents(&self, permanents: &PermanentCache) -> ResultLedger<()> {
        self.write(PERMANENTS, &super::permanent_records(permanents)?)
            .await
    }

    async fn save_balances(&self, balances: &BalanceCache) -> ResultLedger<()> {
        self.write(BALANCES, &super::balance_records(balances)).await
    }
}
