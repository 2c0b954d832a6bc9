//! Cache of recurring operations.
//!
//! Enumeration is in dependency order: an operation always comes after the
//! operation it scales, transitively. The order is computed with an explicit
//! stack, so a dependency loop is reported as
//! [`LedgerError::DependencyCycle`] instead of recursing forever.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::{
    BalanceSource, Cache, IdGenerator, Identifier, LedgerError, Month, Permanent, PermanentId,
    ResultLedger, SaveState, Transaction, records::PermanentRecord,
};

#[derive(Debug, Default)]
pub struct PermanentCache {
    by_id: BTreeMap<PermanentId, Permanent>,
    ids: IdGenerator<PermanentId>,
    state: SaveState,
}

impl PermanentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a clean cache from records listed dependencies first.
    pub fn load<I>(records: I) -> ResultLedger<Self>
    where
        I: IntoIterator<Item = PermanentRecord>,
    {
        let mut context = LoadContext::default();
        for record in records {
            context.register(record)?;
        }
        Ok(context.finish())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: PermanentId) -> Option<&Permanent> {
        self.by_id.get(&id)
    }

    /// Every operation, each one preceded by everything it depends on.
    pub fn get_all(&self) -> ResultLedger<Vec<&Permanent>> {
        let mut ordered: Vec<&Permanent> = Vec::with_capacity(self.by_id.len());
        let mut placed: HashSet<PermanentId> = HashSet::with_capacity(self.by_id.len());
        let mut visiting: HashSet<PermanentId> = HashSet::new();

        for &root in self.by_id.keys() {
            let mut stack = vec![root];
            while let Some(&id) = stack.last() {
                if placed.contains(&id) {
                    stack.pop();
                    continue;
                }
                let operation = self
                    .by_id
                    .get(&id)
                    .ok_or_else(|| LedgerError::KeyNotFound(format!("permanent {id}")))?;
                visiting.insert(id);

                match operation.dependency() {
                    Some(dependency) if !placed.contains(&dependency) => {
                        if visiting.contains(&dependency) {
                            return Err(LedgerError::DependencyCycle(dependency.raw()));
                        }
                        if !self.by_id.contains_key(&dependency) {
                            tracing::warn!(
                                "permanent {id} depends on missing permanent {dependency}"
                            );
                            return Err(LedgerError::MissingDependency {
                                operation: id.raw(),
                                dependency: dependency.raw(),
                            });
                        }
                        stack.push(dependency);
                    }
                    _ => {
                        visiting.remove(&id);
                        placed.insert(id);
                        ordered.push(operation);
                        stack.pop();
                    }
                }
            }
        }
        Ok(ordered)
    }

    /// Stores `permanent`, minting an id when it has none.
    pub fn add(&mut self, permanent: Permanent) -> ResultLedger<Permanent> {
        let (id, permanent) = match permanent.id {
            Some(id) => {
                if self.by_id.contains_key(&id) {
                    return Err(LedgerError::ExistingKey(format!("permanent {id}")));
                }
                self.ids.register(id);
                (id, permanent)
            }
            None => {
                let id = self.ids.next()?;
                (id, permanent.with_id(id))
            }
        };
        self.by_id.insert(id, permanent.clone());
        self.state.mark_dirty();
        Ok(permanent)
    }

    pub fn update(&mut self, permanent: Permanent) -> ResultLedger<Permanent> {
        let id = permanent
            .id
            .ok_or_else(|| LedgerError::KeyNotFound("permanent without id".to_string()))?;
        self.remove(id)?;
        self.add(permanent)
    }

    /// Drops an operation. Operations depending on it are left dangling and
    /// make the next [`PermanentCache::get_all`] fail.
    pub fn remove(&mut self, id: PermanentId) -> ResultLedger<Permanent> {
        let removed = self
            .by_id
            .remove(&id)
            .ok_or_else(|| LedgerError::KeyNotFound(format!("permanent {id}")))?;
        self.state.mark_dirty();
        Ok(removed)
    }

    /// Transactions due in `month`, in dependency order and without ids.
    pub fn generate<B>(&self, month: Month, balances: &B) -> ResultLedger<Vec<Transaction>>
    where
        B: BalanceSource + ?Sized,
    {
        let mut generated = HashMap::new();
        let mut transactions = Vec::new();
        for operation in self.get_all()? {
            let Some(id) = operation.id else {
                continue;
            };
            let Some(amount) = operation.amount_for(month, &generated, balances)? else {
                continue;
            };
            generated.insert(id, amount);
            transactions.extend(operation.transaction_for(month, amount));
        }
        tracing::debug!("{} recurring transactions due in {month}", transactions.len());
        Ok(transactions)
    }
}

impl Cache for PermanentCache {
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

/// Registry of the operations built so far by one load.
///
/// A proportional record can only be resolved against operations registered
/// before it; the registry dies with the load.
#[derive(Debug, Default)]
pub struct LoadContext {
    registry: BTreeMap<PermanentId, Permanent>,
}

impl LoadContext {
    pub fn resolve(&self, id: PermanentId) -> Option<&Permanent> {
        self.registry.get(&id)
    }

    pub fn register(&mut self, record: PermanentRecord) -> ResultLedger<&Permanent> {
        let permanent = Permanent::try_from(record)?;
        let id = permanent
            .id
            .ok_or_else(|| LedgerError::InvalidRecord("permanent without id".to_string()))?;
        if let Some(dependency) = permanent.dependency()
            && self.resolve(dependency).is_none()
        {
            return Err(LedgerError::MissingDependency {
                operation: id.raw(),
                dependency: dependency.raw(),
            });
        }
        if self.registry.contains_key(&id) {
            return Err(LedgerError::ExistingKey(format!("permanent {id}")));
        }
        Ok(self.registry.entry(id).or_insert(permanent))
    }

    pub fn finish(self) -> PermanentCache {
        let mut ids = IdGenerator::new();
        for &id in self.registry.keys() {
            ids.register(id);
        }
        tracing::debug!("loaded {} permanents", self.registry.len());
        PermanentCache {
            by_id: self.registry,
            ids,
            state: SaveState::default(),
        }
    }
}
