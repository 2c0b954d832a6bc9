//! Accounts and their cache.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    AccountId, Cache, IdGenerator, LedgerError, ResultLedger, SaveState, records::AccountRecord,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Option<AccountId>,
    pub name: String,
    pub kind: AccountKind,
}

/// A bank account mirrors a real statement; a budget account is a purely
/// logical envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccountKind {
    Bank { number: Option<String> },
    Budget,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bank { .. } => "bank",
            Self::Budget => "budget",
        }
    }
}

impl Account {
    pub fn bank(name: impl Into<String>, number: Option<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            kind: AccountKind::Bank { number },
        }
    }

    pub fn budget(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            kind: AccountKind::Budget,
        }
    }

    #[must_use]
    pub fn with_id(self, id: AccountId) -> Self {
        Self {
            id: Some(id),
            ..self
        }
    }
}

#[derive(Debug, Default)]
pub struct AccountCache {
    by_id: BTreeMap<AccountId, Account>,
    ids: IdGenerator<AccountId>,
    state: SaveState,
}

impl AccountCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a clean cache from raw records.
    pub fn load<I>(records: I) -> ResultLedger<Self>
    where
        I: IntoIterator<Item = AccountRecord>,
    {
        let mut cache = Self::new();
        for record in records {
            let account = Account::try_from(record)?;
            cache.add(account)?;
        }
        cache.state.set_saved();
        tracing::debug!("loaded {} accounts", cache.by_id.len());
        Ok(cache)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: AccountId) -> Option<&Account> {
        self.by_id.get(&id)
    }

    /// Every account, by id.
    pub fn get_all(&self) -> impl Iterator<Item = &Account> + '_ {
        self.by_id.values()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Account> {
        self.by_id
            .values()
            .find(|account| account.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn add(&mut self, account: Account) -> ResultLedger<Account> {
        let (id, account) = match account.id {
            Some(id) => {
                if self.by_id.contains_key(&id) {
                    return Err(LedgerError::ExistingKey(format!("account {id}")));
                }
                self.ids.register(id);
                (id, account)
            }
            None => {
                let id = self.ids.next()?;
                (id, account.with_id(id))
            }
        };
        self.by_id.insert(id, account.clone());
        self.state.mark_dirty();
        Ok(account)
    }

    pub fn update(&mut self, account: Account) -> ResultLedger<Account> {
        let id = account
            .id
            .ok_or_else(|| LedgerError::KeyNotFound("account without id".to_string()))?;
        self.remove(id)?;
        self.add(account)
    }

    /// Drops an account. Transactions and balances referencing it are not
    /// checked.
    pub fn remove(&mut self, id: AccountId) -> ResultLedger<Account> {
        let removed = self
            .by_id
            .remove(&id)
            .ok_or_else(|| LedgerError::KeyNotFound(format!("account {id}")))?;
        self.state.mark_dirty();
        Ok(removed)
    }
}

impl Cache for AccountCache {
    fn save_state(&self) -> &SaveState {
        &self.state
    }

    fn save_state_mut(&mut self) -> &mut SaveState {
        &mut self.state
    }

    fn erase(&mut self) {
        self.by_id.clear();
        self.state.mark_dirty();
    }
}
